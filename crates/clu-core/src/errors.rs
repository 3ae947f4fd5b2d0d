use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so reconciliation and
/// relabeling can decide what is fatal (schema) and what is scoped to one unit of
/// work (platform failures).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("settings schema error: {0}")]
    SchemaParse(String),

    #[error("setting {identifier} has kind {kind}, which is not implemented")]
    UnsupportedSettingKind { identifier: String, kind: String },

    #[error("unknown setting: {0}")]
    UnknownSetting(String),

    #[error("platform error during {operation}: {reason}")]
    Platform { operation: String, reason: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("i/o error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn platform(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Platform {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
