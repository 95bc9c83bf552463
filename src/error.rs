//! Error types shared by the bridge.

use thiserror::Error;

/// Broad classification used by callers to decide whether a failure aborts
/// the task before row processing, ends the row stream, or only needs logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Row,
    Conflict,
    Resource,
    Io,
}

#[derive(Error, Debug)]
pub enum BridgeError {
    /// `es.write.operation` holds something other than create, index or update.
    #[error("Unknown operation [{0}]; expected one of [create, index, update]")]
    UnknownOperation(String),

    #[error("Invalid value [{value}] for setting [{key}]")]
    InvalidSetting { key: String, value: String },

    #[error("Setting [{key}] is required: {reason}")]
    MissingSetting { key: String, reason: String },

    #[error("Malformed alias pair [{pair}] in setting [{key}]; expected [logical:store]")]
    MalformedAlias { key: String, pair: String },

    #[error("Cannot decode transported object: {0}")]
    Decode(String),

    #[error("Transported object version [{found}] is incompatible with [{expected}]")]
    VersionMismatch { found: String, expected: String },

    #[error("Transported object kind [{found}] does not match expected [{expected}]")]
    KindMismatch { found: String, expected: String },

    /// A row lacks the field named by an id/parent/routing setting.
    #[error("Field [{field}] named by setting [{key}] is missing from row")]
    MissingField { key: String, field: String },

    #[error("Field [{field}] named by setting [{key}] has unusable value [{value}]")]
    InvalidFieldValue {
        key: String,
        field: String,
        value: String,
    },

    #[error("Cannot convert [{value}] to date: {reason}")]
    InvalidDate { value: String, reason: String },

    /// Failure reported by the store for a single bulk item, passed through verbatim.
    #[error("[{status}] {error_type}: {reason}")]
    WriteConflict {
        id: Option<String>,
        status: u16,
        error_type: String,
        reason: String,
    },

    #[error("Target resource [{0}] does not exist")]
    TargetNotFound(String),

    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::UnknownOperation(_)
            | BridgeError::InvalidSetting { .. }
            | BridgeError::MissingSetting { .. }
            | BridgeError::MalformedAlias { .. }
            | BridgeError::Decode(_)
            | BridgeError::VersionMismatch { .. }
            | BridgeError::KindMismatch { .. } => ErrorKind::Configuration,
            BridgeError::MissingField { .. }
            | BridgeError::InvalidFieldValue { .. }
            | BridgeError::InvalidDate { .. }
            | BridgeError::Json(_) => ErrorKind::Row,
            BridgeError::WriteConflict { .. } => ErrorKind::Conflict,
            BridgeError::TargetNotFound(_) => ErrorKind::Resource,
            BridgeError::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
