//! Error types for sprig operations

use crate::handle::Handle;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SprigError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Handle not found: {0}")]
    HandleNotFound(Handle),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config already exists at {}", .0.display())]
    ConfigExists(PathBuf),

    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl SprigError {
    /// True for every flavour of "the thing asked for does not exist":
    /// missing files, unknown handles and searches without a match.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::HandleNotFound(_) | Self::NotFound(_)
        )
    }

    /// Short machine-readable code, used for `--json` error output
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) | Self::HandleNotFound(_) | Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Parse { .. } => "parse_error",
            Self::Io(_) => "io_error",
            Self::ConfigExists(_) | Self::ConfigParse(_) => "config_error",
        }
    }
}
