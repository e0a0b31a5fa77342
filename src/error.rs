use crate::credential::{OtpType, SecretEncoding};
use thiserror::Error;

/// Errors surfaced to callers of the codec and migration layers.
///
/// Messages never carry secret material, only the kind of failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("secret is not valid {encoding} text")]
    InvalidEncodingFormat { encoding: SecretEncoding },
    #[error("invalid otpauth uri: {0}")]
    InvalidUriFormat(String),
    #[error("a secret key must be set")]
    MissingSecret,
    #[error("the time step must be a non-zero positive integer (standard value is 30)")]
    InvalidPeriod,
    #[error("unsupported digit count {0}, expected 6 or 8")]
    InvalidDigits(u32),
    #[error("{0} credentials cannot be stored in built-in fields")]
    NoBuiltInEquivalent(OtpType),
}

impl OtpError {
    pub fn encoding(encoding: SecretEncoding) -> Self {
        Self::InvalidEncodingFormat { encoding }
    }
}

pub type Result<T, E = OtpError> = std::result::Result<T, E>;
