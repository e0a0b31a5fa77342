use crate::codec;
use crate::error::{OtpError, Result};
use crate::sensitive::SensitiveBytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

pub const DEFAULT_DIGITS: u32 = 6;
pub const DEFAULT_PERIOD: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    #[default]
    Totp,
    Hotp,
    /// Steam Guard style codes. No built-in equivalent exists, so these always
    /// live in the legacy field.
    Steam,
}

impl OtpType {
    pub fn is_proprietary(self) -> bool {
        matches!(self, Self::Steam)
    }

    /// Whether `period` drives code generation (as opposed to `counter`).
    pub fn is_time_based(self) -> bool {
        !matches!(self, Self::Hotp)
    }

    /// Case-insensitive match against `totp`, `hotp`, `steam`.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "totp" => Some(Self::Totp),
            "hotp" => Some(Self::Hotp),
            "steam" => Some(Self::Steam),
            _ => None,
        }
    }

    pub fn uri_host(self) -> &'static str {
        match self {
            Self::Totp => "totp",
            Self::Hotp => "hotp",
            Self::Steam => "steam",
        }
    }
}

impl fmt::Display for OtpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_host())
    }
}

/// Textual form a secret is displayed and persisted in. Does not change the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretEncoding {
    #[default]
    Base32,
    Base64,
    Hex,
    Utf8,
}

impl SecretEncoding {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "base32" => Some(Self::Base32),
            "base64" => Some(Self::Base64),
            "hex" => Some(Self::Hex),
            "utf8" | "utf-8" => Some(Self::Utf8),
            _ => None,
        }
    }
}

impl fmt::Display for SecretEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base32 => write!(f, "Base32"),
            Self::Base64 => write!(f, "Base64"),
            Self::Hex => write!(f, "Hex"),
            Self::Utf8 => write!(f, "UTF-8"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Parse from a case-insensitive string, with or without dash/HMAC prefix.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" | "HMACSHA1" | "HMAC-SHA1" | "HMAC-SHA-1" => Some(Self::Sha1),
            "SHA256" | "SHA-256" | "HMACSHA256" | "HMAC-SHA256" | "HMAC-SHA-256" => {
                Some(Self::Sha256)
            }
            "SHA512" | "SHA-512" | "HMACSHA512" | "HMAC-SHA512" | "HMAC-SHA-512" => {
                Some(Self::Sha512)
            }
            _ => None,
        }
    }

    /// Name used in `otpauth://` parameters.
    pub fn uri_name(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_name())
    }
}

/// One OTP credential's full configuration.
///
/// Construct with [`OtpCredential::new`] (documented defaults), from a field map
/// via [`crate::migration::load`], or from a URI via [`crate::uri::parse`].
/// Set the encoding before assigning the secret from text, since the text is
/// interpreted under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCredential {
    secret: SensitiveBytes,
    otp_type: OtpType,
    encoding: SecretEncoding,
    pub algorithm: HashAlgorithm,
    pub digits: u32,
    pub period: u32,
    pub counter: u64,
    legacy_mode: bool,
    proprietary: bool,
    source_fields: Vec<String>,
}

impl Default for OtpCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpCredential {
    pub fn new() -> Self {
        Self {
            secret: SensitiveBytes::empty(),
            otp_type: OtpType::Totp,
            encoding: SecretEncoding::Base32,
            algorithm: HashAlgorithm::Sha1,
            digits: DEFAULT_DIGITS,
            period: DEFAULT_PERIOD,
            counter: 0,
            legacy_mode: false,
            proprietary: false,
            source_fields: Vec::new(),
        }
    }

    pub fn secret(&self) -> &SensitiveBytes {
        &self.secret
    }

    pub fn set_secret(&mut self, secret: SensitiveBytes) {
        self.secret = secret;
    }

    pub fn otp_type(&self) -> OtpType {
        self.otp_type
    }

    /// Changing to a proprietary type pins the record to the legacy shape.
    pub fn set_otp_type(&mut self, otp_type: OtpType) {
        self.otp_type = otp_type;
        self.proprietary = otp_type.is_proprietary();
        if self.proprietary {
            self.legacy_mode = true;
        }
    }

    pub fn encoding(&self) -> SecretEncoding {
        self.encoding
    }

    /// Only the textual view changes; the stored bytes are kept as they are.
    pub fn set_encoding(&mut self, encoding: SecretEncoding) {
        self.encoding = encoding;
    }

    pub fn legacy_mode(&self) -> bool {
        self.legacy_mode
    }

    /// Proprietary records stay in legacy mode regardless of `enabled`.
    pub fn set_legacy_mode(&mut self, enabled: bool) {
        self.legacy_mode = enabled || self.proprietary;
    }

    pub fn proprietary(&self) -> bool {
        self.proprietary
    }

    pub fn source_fields(&self) -> &[String] {
        &self.source_fields
    }

    pub(crate) fn set_source_fields(&mut self, fields: Vec<String>) {
        self.source_fields.clear();
        for f in fields {
            self.add_source_field(f);
        }
    }

    pub(crate) fn add_source_field(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.source_fields.contains(&field) {
            self.source_fields.push(field);
        }
    }

    /// Secret rendered in the current encoding, `None` when no secret is set.
    pub fn plain_secret(&self) -> Result<Option<Zeroizing<String>>> {
        if self.secret.is_empty() {
            return Ok(None);
        }
        codec::encode(self.secret.expose(), self.encoding).map(Some)
    }

    /// Validate and assign the secret from text in the current encoding.
    pub fn set_plain_secret(&mut self, text: &str) -> Result<()> {
        codec::validate(text, self.encoding)?;
        self.secret = codec::decode_normalized(text, self.encoding)?;
        Ok(())
    }

    /// True when any setting deviates from the documented defaults.
    pub fn requires_custom_settings(&self) -> bool {
        self.period != DEFAULT_PERIOD
            || self.legacy_mode
            || self.encoding != SecretEncoding::Base32
            || self.digits != DEFAULT_DIGITS
            || self.algorithm != HashAlgorithm::Sha1
            || self.otp_type != OtpType::Totp
            || self.counter != 0
    }

    /// Whether the record cannot be expressed with built-in fields at all.
    ///
    /// Built-in HMAC-OTP only stores a secret and a counter, so HOTP records
    /// with a non-default length or algorithm need the legacy field too.
    pub fn is_forced_legacy(&self) -> bool {
        match self.otp_type {
            OtpType::Steam => true,
            OtpType::Hotp => {
                self.digits != DEFAULT_DIGITS || self.algorithm != HashAlgorithm::Sha1
            }
            OtpType::Totp => false,
        }
    }

    /// Checks performed before a record is persisted.
    ///
    /// Proprietary records keep whatever positive length their issuer uses.
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(OtpError::MissingSecret);
        }
        if self.otp_type.is_time_based() && self.period == 0 {
            return Err(OtpError::InvalidPeriod);
        }
        let digits_ok = if self.proprietary {
            self.digits > 0
        } else {
            matches!(self.digits, 6 | 8)
        };
        if !digits_ok {
            return Err(OtpError::InvalidDigits(self.digits));
        }
        Ok(())
    }
}

/// Parse a user-typed time step. Must be a positive integer.
pub fn parse_period(text: &str) -> Result<u32> {
    match text.trim().parse::<u32>() {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(OtpError::InvalidPeriod),
    }
}
