//! Error types for fwset.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FwsetError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid port range {from}-{to}: must satisfy 1 <= from <= to <= 65535")]
    InvalidRange { from: u32, to: u32 },

    #[error("invalid address prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid service format: {0}")]
    InvalidFormat(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("system service conflicts with managed service names: {0}")]
    Conflict(String),

    #[error("firewall-cmd failed: {0}")]
    External(String),

    #[error("{}: {source}", path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<FwsetError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FwsetError {
    /// Wrap this error with the path of the file being processed.
    pub fn in_file(self, path: impl Into<PathBuf>) -> FwsetError {
        FwsetError::InFile {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
