//! Domain error types.
//!
//! Only whole-operation failures live here (unreadable files, bad config).
//! Problems with individual trade records are [`Rejection`](crate::domain::trade::Rejection)
//! values carried in the report instead.

/// Top-level error type for tradejournal.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
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

    #[error("trade source {source_name}: {reason}")]
    Source { source_name: String, reason: String },

    #[error("failed to write report to {path}: {reason}")]
    ReportWrite { path: String, reason: String },

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&JournalError> for std::process::ExitCode {
    fn from(err: &JournalError) -> Self {
        let code: u8 = match err {
            JournalError::Io(_) => 1,
            JournalError::ConfigParse { .. }
            | JournalError::ConfigMissing { .. }
            | JournalError::ConfigInvalid { .. } => 2,
            JournalError::Source { .. } => 3,
            JournalError::ReportWrite { .. } | JournalError::Serialize(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}
