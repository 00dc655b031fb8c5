//! Core domain types and trading logic.

pub mod error;
pub mod price_bar;
pub mod indicator;
pub mod signal;
pub mod sizer;
pub mod position;
pub mod strategy;
pub mod trade_log;
pub mod controller;
pub mod engine;
pub mod screener;
pub mod metrics;
pub mod universe;
pub mod sweep;
pub mod config_validation;
