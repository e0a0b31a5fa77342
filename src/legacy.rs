//! The legacy single-field otp string.
//!
//! The value is a URL-encoded list of `name=value` pairs, e.g.
//! `key=JBSWY3DPEHPK3PXP&type=Totp&encoding=base32&otpHashMode=Sha1&size=6&step=30&counter=0`.
//! Older writers only emitted fields that differed from their defaults, so every
//! field except `key` is optional on read.

use crate::codec;
use crate::credential::{
    DEFAULT_DIGITS, DEFAULT_PERIOD, HashAlgorithm, OtpCredential, OtpType, SecretEncoding,
};
use crate::error::OtpError;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use url::form_urlencoded;
use zeroize::Zeroizing;

/// Typed fields of the legacy string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKey {
    Key,
    Type,
    Encoding,
    HashMode,
    Size,
    Step,
    Counter,
}

impl LegacyKey {
    pub fn name(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Type => "type",
            Self::Encoding => "encoding",
            Self::HashMode => "otpHashMode",
            Self::Size => "size",
            Self::Step => "step",
            Self::Counter => "counter",
        }
    }
}

pub const VERSION_KEY: &str = "version";

/// Versions of the legacy layout this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacySchema {
    /// First layout, written before version tags existed.
    V1,
}

impl LegacySchema {
    pub const CURRENT: Self = Self::V1;

    pub fn version(self) -> u32 {
        match self {
            Self::V1 => 1,
        }
    }

    pub fn from_version(version: u32) -> Option<Self> {
        match version {
            1 => Some(Self::V1),
            _ => None,
        }
    }

    /// Fields in the order the writer emits them.
    pub fn fields(self) -> &'static [LegacyKey] {
        match self {
            Self::V1 => &[
                LegacyKey::Key,
                LegacyKey::Type,
                LegacyKey::Encoding,
                LegacyKey::HashMode,
                LegacyKey::Size,
                LegacyKey::Step,
                LegacyKey::Counter,
            ],
        }
    }

    /// Whether the version tag is written out. V1 predates the tag.
    fn writes_version_tag(self) -> bool {
        !matches!(self, Self::V1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegacyParseError {
    #[error("no key field")]
    MissingKey,
    #[error("unsupported legacy format version {0}")]
    UnsupportedVersion(String),
    #[error("invalid value for '{0}'")]
    InvalidValue(&'static str),
    #[error(transparent)]
    Secret(#[from] OtpError),
}

fn type_name(t: OtpType) -> &'static str {
    match t {
        OtpType::Totp => "Totp",
        OtpType::Hotp => "Hotp",
        OtpType::Steam => "Steam",
    }
}

fn encoding_name(e: SecretEncoding) -> &'static str {
    match e {
        SecretEncoding::Base32 => "base32",
        SecretEncoding::Base64 => "base64",
        SecretEncoding::Hex => "hex",
        SecretEncoding::Utf8 => "utf8",
    }
}

fn hash_mode_name(a: HashAlgorithm) -> &'static str {
    match a {
        HashAlgorithm::Sha1 => "Sha1",
        HashAlgorithm::Sha256 => "Sha256",
        HashAlgorithm::Sha512 => "Sha512",
    }
}

/// Pack `credential` into the legacy string using the current schema.
pub fn to_legacy_string(credential: &OtpCredential) -> Result<Zeroizing<String>, OtpError> {
    let secret = credential.plain_secret()?.ok_or(OtpError::MissingSecret)?;
    let schema = LegacySchema::CURRENT;

    let mut out = form_urlencoded::Serializer::new(String::new());
    for key in schema.fields() {
        let value: String = match key {
            LegacyKey::Key => secret.to_string(),
            LegacyKey::Type => type_name(credential.otp_type()).to_string(),
            LegacyKey::Encoding => encoding_name(credential.encoding()).to_string(),
            LegacyKey::HashMode => hash_mode_name(credential.algorithm).to_string(),
            LegacyKey::Size => credential.digits.to_string(),
            LegacyKey::Step => credential.period.to_string(),
            LegacyKey::Counter => credential.counter.to_string(),
        };
        let value = Zeroizing::new(value);
        out.append_pair(key.name(), &value);
    }
    if schema.writes_version_tag() {
        out.append_pair(VERSION_KEY, &schema.version().to_string());
    }
    Ok(Zeroizing::new(out.finish()))
}

/// Unpack a legacy string. Malformed content yields `None`.
///
/// The field name is common enough that unrelated data may sit under it, and
/// nothing destructive follows a failed read, so failures are not surfaced.
pub fn from_legacy_string(text: &str) -> Option<OtpCredential> {
    match decode_legacy(text) {
        Ok(c) => Some(c),
        Err(e) => {
            debug!(error = %e, "ignoring unreadable legacy otp field");
            None
        }
    }
}

/// Strict variant of [`from_legacy_string`] that reports why a string is unreadable.
pub fn decode_legacy(text: &str) -> Result<OtpCredential, LegacyParseError> {
    let pairs: HashMap<String, Zeroizing<String>> = form_urlencoded::parse(text.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), Zeroizing::new(v.into_owned())))
        .collect();

    if let Some(v) = pairs.get(VERSION_KEY) {
        let schema = v
            .parse::<u32>()
            .ok()
            .and_then(LegacySchema::from_version)
            .ok_or_else(|| LegacyParseError::UnsupportedVersion(v.to_string()))?;
        debug!(version = schema.version(), "legacy otp string carries version tag");
    }

    let get = |key: LegacyKey| pairs.get(key.name()).map(|v| v.as_str());

    let secret_text = get(LegacyKey::Key)
        .filter(|k| !k.is_empty())
        .ok_or(LegacyParseError::MissingKey)?;

    let otp_type = parse_or(get(LegacyKey::Type), LegacyKey::Type, OtpType::Totp, |s| {
        OtpType::from_str_loose(s)
    })?;
    let encoding = parse_or(
        get(LegacyKey::Encoding),
        LegacyKey::Encoding,
        SecretEncoding::Base32,
        SecretEncoding::from_str_loose,
    )?;
    let algorithm = parse_or(
        get(LegacyKey::HashMode),
        LegacyKey::HashMode,
        HashAlgorithm::Sha1,
        HashAlgorithm::from_str_loose,
    )?;
    let digits = parse_or(get(LegacyKey::Size), LegacyKey::Size, DEFAULT_DIGITS, |s| {
        s.parse().ok()
    })?;
    let period = parse_or(get(LegacyKey::Step), LegacyKey::Step, DEFAULT_PERIOD, |s| {
        s.parse().ok()
    })?;
    let counter = parse_or(get(LegacyKey::Counter), LegacyKey::Counter, 0u64, |s| {
        s.parse().ok()
    })?;

    let secret = codec::decode_stored(secret_text, encoding)?;

    let mut credential = OtpCredential::new();
    credential.set_otp_type(otp_type);
    credential.set_encoding(encoding);
    credential.set_secret(secret);
    credential.algorithm = algorithm;
    credential.digits = digits;
    credential.period = period;
    credential.counter = counter;
    credential.set_legacy_mode(true);
    Ok(credential)
}

fn parse_or<T>(
    value: Option<&str>,
    key: LegacyKey,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T, LegacyParseError> {
    match value {
        None | Some("") => Ok(default),
        Some(v) => parse(v.trim()).ok_or(LegacyParseError::InvalidValue(key.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> OtpCredential {
        let mut c = OtpCredential::new();
        c.set_plain_secret("JBSWY3DPEHPK3PXP").unwrap();
        c
    }

    #[test]
    fn writes_every_field_in_schema_order() {
        let s = to_legacy_string(&sample()).unwrap();
        assert_eq!(
            s.as_str(),
            "key=JBSWY3DPEHPK3PXP&type=Totp&encoding=base32&otpHashMode=Sha1&size=6&step=30&counter=0"
        );
    }

    #[test]
    fn reads_minimal_old_strings() {
        let c = from_legacy_string("key=JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(c.otp_type(), OtpType::Totp);
        assert_eq!(c.encoding(), SecretEncoding::Base32);
        assert_eq!(c.digits, 6);
        assert_eq!(c.period, 30);
        assert!(c.legacy_mode());

        let c = from_legacy_string("key=JBSWY3DPEHPK3PXP&size=8&step=60&otpHashMode=Sha256").unwrap();
        assert_eq!(c.digits, 8);
        assert_eq!(c.period, 60);
        assert_eq!(c.algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn reads_raw_base64_plus_signs() {
        let c = from_legacy_string("key=+/8=&encoding=base64").unwrap();
        assert_eq!(c.secret().expose(), &[0xfb, 0xff]);
    }

    #[test]
    fn round_trips_self_produced_strings() {
        let mut hotp = OtpCredential::new();
        hotp.set_encoding(SecretEncoding::Base64);
        hotp.set_plain_secret("+/8AAQ==").unwrap();
        hotp.set_otp_type(OtpType::Hotp);
        hotp.counter = 12;
        hotp.digits = 8;
        hotp.algorithm = HashAlgorithm::Sha512;

        let mut utf8 = OtpCredential::new();
        utf8.set_encoding(SecretEncoding::Utf8);
        utf8.set_plain_secret("p&ss=wörd").unwrap();

        let mut steam = sample();
        steam.set_otp_type(OtpType::Steam);
        steam.digits = 5;

        for c in [sample(), hotp, utf8, steam] {
            let s = to_legacy_string(&c).unwrap();
            let back = from_legacy_string(&s).unwrap();
            assert_eq!(back.secret(), c.secret());
            assert_eq!(back.otp_type(), c.otp_type());
            assert_eq!(back.encoding(), c.encoding());
            assert_eq!(back.algorithm, c.algorithm);
            assert_eq!(back.digits, c.digits);
            assert_eq!(back.period, c.period);
            assert_eq!(back.counter, c.counter);
            assert_eq!(back.proprietary(), c.proprietary());
            assert_eq!(to_legacy_string(&back).unwrap(), s);
        }
    }

    #[test]
    fn malformed_content_is_no_credential() {
        assert!(from_legacy_string("").is_none());
        assert!(from_legacy_string("some unrelated note").is_none());
        assert!(from_legacy_string("key=!!!!").is_none());
        assert!(from_legacy_string("key=JBSWY3DPEHPK3PXP&size=eight").is_none());
        assert!(from_legacy_string("key=JBSWY3DPEHPK3PXP&type=motp").is_none());
    }

    #[test]
    fn strict_decode_explains_failures() {
        assert_eq!(decode_legacy("type=Totp").unwrap_err(), LegacyParseError::MissingKey);
        assert_eq!(
            decode_legacy("key=ABCD&step=x").unwrap_err(),
            LegacyParseError::InvalidValue("step")
        );
        assert_eq!(
            decode_legacy("key=zz&encoding=hex").unwrap_err(),
            LegacyParseError::Secret(OtpError::InvalidEncodingFormat {
                encoding: SecretEncoding::Hex
            })
        );
        assert!(matches!(
            decode_legacy("key=ABCD&version=2"),
            Err(LegacyParseError::UnsupportedVersion(_))
        ));
        assert!(decode_legacy("key=ABCD&version=1").is_ok());
    }

    #[test]
    fn error_messages_do_not_leak_the_key() {
        let err = decode_legacy("key=SECRETSECRET&size=x").unwrap_err();
        assert!(!err.to_string().contains("SECRET"));
    }
}
