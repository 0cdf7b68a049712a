//! Parse errors for text and annotation inputs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid IP prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Unknown network type: {0}")]
    UnknownNetworkType(String),

    #[error("Invalid migration setting '{0}': expected <target>[:rollback]")]
    InvalidMigration(String),

    #[error("Malformed route on line {line}: {reason}")]
    MalformedRoute { line: usize, reason: String },

    #[error("Invalid network-status annotation: {0}")]
    InvalidNetworkStatus(String),
}
