//! Field names used on an entry and the key/value map abstraction they live in.

use crate::credential::{HashAlgorithm, SecretEncoding};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};

/// Name of the single field holding the legacy otp string.
pub const LEGACY_FIELD: &str = "otp";

pub const TIME_OTP_SECRET: &str = "TimeOtp-Secret";
pub const TIME_OTP_SECRET_HEX: &str = "TimeOtp-Secret-Hex";
pub const TIME_OTP_SECRET_BASE32: &str = "TimeOtp-Secret-Base32";
pub const TIME_OTP_SECRET_BASE64: &str = "TimeOtp-Secret-Base64";
pub const TIME_OTP_LENGTH: &str = "TimeOtp-Length";
pub const TIME_OTP_PERIOD: &str = "TimeOtp-Period";
pub const TIME_OTP_ALGORITHM: &str = "TimeOtp-Algorithm";

pub const HMAC_OTP_SECRET: &str = "HmacOtp-Secret";
pub const HMAC_OTP_SECRET_HEX: &str = "HmacOtp-Secret-Hex";
pub const HMAC_OTP_SECRET_BASE32: &str = "HmacOtp-Secret-Base32";
pub const HMAC_OTP_SECRET_BASE64: &str = "HmacOtp-Secret-Base64";
pub const HMAC_OTP_COUNTER: &str = "HmacOtp-Counter";

/// Every field the host's built-in OTP support owns.
pub const BUILTIN_FIELDS: [&str; 12] = [
    TIME_OTP_SECRET_BASE32,
    TIME_OTP_SECRET_BASE64,
    TIME_OTP_SECRET_HEX,
    TIME_OTP_SECRET,
    TIME_OTP_LENGTH,
    TIME_OTP_PERIOD,
    TIME_OTP_ALGORITHM,
    HMAC_OTP_SECRET_BASE32,
    HMAC_OTP_SECRET_BASE64,
    HMAC_OTP_SECRET_HEX,
    HMAC_OTP_SECRET,
    HMAC_OTP_COUNTER,
];

/// Secret field names per encoding, in the order they are probed on load.
pub const TIME_OTP_SECRETS: [(&str, SecretEncoding); 4] = [
    (TIME_OTP_SECRET_BASE32, SecretEncoding::Base32),
    (TIME_OTP_SECRET_BASE64, SecretEncoding::Base64),
    (TIME_OTP_SECRET_HEX, SecretEncoding::Hex),
    (TIME_OTP_SECRET, SecretEncoding::Utf8),
];

pub const HMAC_OTP_SECRETS: [(&str, SecretEncoding); 4] = [
    (HMAC_OTP_SECRET_BASE32, SecretEncoding::Base32),
    (HMAC_OTP_SECRET_BASE64, SecretEncoding::Base64),
    (HMAC_OTP_SECRET_HEX, SecretEncoding::Hex),
    (HMAC_OTP_SECRET, SecretEncoding::Utf8),
];

pub fn time_otp_secret_field(encoding: SecretEncoding) -> &'static str {
    match encoding {
        SecretEncoding::Base32 => TIME_OTP_SECRET_BASE32,
        SecretEncoding::Base64 => TIME_OTP_SECRET_BASE64,
        SecretEncoding::Hex => TIME_OTP_SECRET_HEX,
        SecretEncoding::Utf8 => TIME_OTP_SECRET,
    }
}

pub fn hmac_otp_secret_field(encoding: SecretEncoding) -> &'static str {
    match encoding {
        SecretEncoding::Base32 => HMAC_OTP_SECRET_BASE32,
        SecretEncoding::Base64 => HMAC_OTP_SECRET_BASE64,
        SecretEncoding::Hex => HMAC_OTP_SECRET_HEX,
        SecretEncoding::Utf8 => HMAC_OTP_SECRET,
    }
}

/// Value stored in `TimeOtp-Algorithm`.
pub fn builtin_algorithm_name(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha1 => "HMAC-SHA-1",
        HashAlgorithm::Sha256 => "HMAC-SHA-256",
        HashAlgorithm::Sha512 => "HMAC-SHA-512",
    }
}

/// An entry's string fields, owned by the host store.
pub trait FieldMap {
    fn get_field(&self, name: &str) -> Option<&str>;
    fn set_field(&mut self, name: &str, value: String);
    /// Returns whether the field existed.
    fn remove_field(&mut self, name: &str) -> bool;

    fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }
}

impl FieldMap for BTreeMap<String, String> {
    fn get_field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn set_field(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }

    fn remove_field(&mut self, name: &str) -> bool {
        self.remove(name).is_some()
    }
}

impl FieldMap for HashMap<String, String> {
    fn get_field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn set_field(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }

    fn remove_field(&mut self, name: &str) -> bool {
        self.remove(name).is_some()
    }
}

impl FieldMap for IndexMap<String, String> {
    fn get_field(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }

    fn set_field(&mut self, name: &str, value: String) {
        self.insert(name.to_string(), value);
    }

    fn remove_field(&mut self, name: &str) -> bool {
        self.shift_remove(name).is_some()
    }
}
