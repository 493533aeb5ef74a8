//! Error types for target resolution

use std::fmt;

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Errors that can occur while resolving store targets
#[derive(Debug)]
pub enum ResolverError {
    /// Error returned by the record directory (Route53 API, transport, credentials)
    DirectoryApi(String),

    /// The directory answered with a page we cannot continue from
    InvalidResponse(String),
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolverError::DirectoryApi(msg) => write!(f, "Directory API error: {}", msg),
            ResolverError::InvalidResponse(msg) => write!(f, "Invalid directory response: {}", msg),
        }
    }
}

impl std::error::Error for ResolverError {}
