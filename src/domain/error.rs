//! Domain error types.
//!
//! Only conditions that stop an instrument or a run are errors. A sizer
//! returning zero shares and a run producing no trades are ordinary outcomes.

/// Top-level error type for swingtrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("no data for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error("execution failed for {ticker}: {reason}")]
    EngineFailure { ticker: String, reason: String },

    #[error("no instrument in the universe had usable data")]
    UniverseExhausted,

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) | TraderError::Csv(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::DataUnavailable { .. }
            | TraderError::InsufficientData { .. }
            | TraderError::UniverseExhausted => 5,
            TraderError::EngineFailure { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
