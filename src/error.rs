use std::io;
use thiserror::Error;

/// Result type for resource container operations
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Broad failure classes, used by callers to decide how to report an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unrecognized container header
    Format,
    /// Internally inconsistent container tables
    Corrupt,
    /// Decompression failure or content length/checksum mismatch
    Decode,
    /// Path or locale absent from every mounted container
    NotFound,
    /// Underlying I/O failure (file mapping, manifest inputs)
    Io,
    /// Invalid encoder input or manifest
    Config,
}

/// Unified error type for all resource container operations
#[derive(Debug, Error)]
pub enum ResourceError {
    // Format errors
    #[error("Invalid container format: {0}")]
    InvalidFormat(String),

    #[error("Invalid magic number in container header")]
    InvalidMagic,

    #[error("Unsupported container format version: {0}")]
    UnsupportedVersion(u32),

    // Corruption errors
    #[error("Corrupt container: {0}")]
    Corrupt(String),

    #[error("Header CRC mismatch: expected {expected:08x}, got {actual:08x}")]
    HeaderCrcMismatch { expected: u32, actual: u32 },

    // Decode errors
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("CRC mismatch for {path}: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        path: String,
        expected: u32,
        actual: u32,
    },

    // Lookup errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    // Encoder / manifest errors
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Path error: {0}")]
    PathError(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("TOML error: {0}")]
    TomlError(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ResourceError {
    /// Classify this error into one of the broad failure classes
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat(_) | Self::InvalidMagic | Self::UnsupportedVersion(_) => {
                ErrorKind::Format
            }
            Self::Corrupt(_) | Self::HeaderCrcMismatch { .. } => ErrorKind::Corrupt,
            Self::DecompressionFailed(_) | Self::SizeMismatch { .. } | Self::CrcMismatch { .. } => {
                ErrorKind::Decode
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io(_) => ErrorKind::Io,
            Self::CompressionFailed(_)
            | Self::PathError(_)
            | Self::InvalidManifest(_)
            | Self::TomlError(_) => ErrorKind::Config,
        }
    }

    /// Process exit status a command-line front end should report for this error
    ///
    /// Usage errors (status 1) never originate here; everything the library reports is a
    /// load or resolution failure.
    pub fn exit_code(&self) -> i32 {
        2
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

impl From<toml::de::Error> for ResourceError {
    fn from(err: toml::de::Error) -> Self {
        ResourceError::TomlError(err.to_string())
    }
}

impl From<toml::ser::Error> for ResourceError {
    fn from(err: toml::ser::Error) -> Self {
        ResourceError::TomlError(err.to_string())
    }
}
