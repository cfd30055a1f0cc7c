//! Crate-level error type.
//!
//! Wraps the module errors for callers that load configuration, decode
//! rule sets and parse accounts in one flow (the `ruleset-tool` binary,
//! integration code). Transfer denials are not errors; they are reported
//! through [`Verdict`](crate::engine::Verdict).

use crate::config::ConfigError;
use crate::rules::RuleSetError;
use crate::types::{MetadataError, ParseError};

/// Errors raised outside the authorization decision itself.
#[derive(Debug)]
pub enum TransferAuthError {
    /// Invalid engine configuration
    Config(ConfigError),
    /// Rule set refused at decode or publication
    RuleSet(RuleSetError),
    /// Inconsistent asset metadata
    Metadata(MetadataError),
    /// Malformed key or account bytes
    Parse(ParseError),
    /// Rule set source could not be deserialized
    InvalidInput {
        reason: alloc::string::String,
    },
    /// File I/O Error
    #[cfg(feature = "std")]
    IOError(std::io::Error),
}

impl core::fmt::Display for TransferAuthError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "Configuration error: {}", e),
            Self::RuleSet(e) => write!(f, "Rule set error: {}", e),
            Self::Metadata(e) => write!(f, "Metadata error: {}", e),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::InvalidInput { reason } => write!(f, "Invalid input: {}", reason),
            #[cfg(feature = "std")]
            Self::IOError(e) => write!(f, "IO error: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransferAuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::RuleSet(e) => Some(e),
            Self::Metadata(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::InvalidInput { .. } => None,
            Self::IOError(e) => Some(e),
        }
    }
}

impl From<ConfigError> for TransferAuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RuleSetError> for TransferAuthError {
    fn from(e: RuleSetError) -> Self {
        Self::RuleSet(e)
    }
}

impl From<MetadataError> for TransferAuthError {
    fn from(e: MetadataError) -> Self {
        Self::Metadata(e)
    }
}

impl From<ParseError> for TransferAuthError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<serde_json::Error> for TransferAuthError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidInput {
            reason: alloc::string::ToString::to_string(&e),
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for TransferAuthError {
    fn from(e: std::io::Error) -> Self {
        Self::IOError(e)
    }
}

/// Result type alias for crate-level operations.
pub type Result<T> = core::result::Result<T, TransferAuthError>;
