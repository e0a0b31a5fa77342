//! One-time-password credentials attached to password-manager entries.
//!
//! Models a credential's parameters, converts its secret between Base32,
//! Base64, hex and UTF-8 text, reads `otpauth://` URIs and stores the
//! credential on an entry either as the legacy `otp` string or as the host's
//! built-in `TimeOtp-*` / `HmacOtp-*` fields.

pub mod codec;
pub mod credential;
pub mod error;
pub mod fields;
pub mod legacy;
pub mod migration;
pub mod sensitive;
pub mod uri;

pub use credential::{HashAlgorithm, OtpCredential, OtpType, SecretEncoding, parse_period};
pub use error::OtpError;
pub use fields::FieldMap;
pub use migration::{SaveReport, StorageShape, load, save};
pub use sensitive::SensitiveBytes;
