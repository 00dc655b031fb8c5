//! swingtrader: swing-trade lifecycle backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`]. [`cli`] wires them together.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
