//! Reading and writing a credential on an entry, in either storage shape.

use crate::codec;
use crate::credential::{
    DEFAULT_DIGITS, DEFAULT_PERIOD, HashAlgorithm, OtpCredential, OtpType, SecretEncoding,
};
use crate::error::{OtpError, Result};
use crate::fields::{
    BUILTIN_FIELDS, FieldMap, HMAC_OTP_COUNTER, HMAC_OTP_SECRETS, LEGACY_FIELD,
    TIME_OTP_ALGORITHM, TIME_OTP_LENGTH, TIME_OTP_PERIOD, TIME_OTP_SECRETS,
    builtin_algorithm_name, hmac_otp_secret_field, time_otp_secret_field,
};
use crate::legacy;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, warn};

pub use crate::legacy::{from_legacy_string, to_legacy_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageShape {
    /// Single `otp` field holding the packed string.
    Legacy,
    /// The host's own `TimeOtp-*` / `HmacOtp-*` fields.
    BuiltIn,
}

/// What a [`save`] changed on the field map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub shape: StorageShape,
    pub written: Vec<String>,
    pub purged: Vec<String>,
}

/// Shape a credential will actually be written in.
///
/// Legacy mode, proprietary types and records the built-in fields cannot
/// express all override the requested shape.
pub fn resolve_shape(credential: &OtpCredential, requested: StorageShape) -> StorageShape {
    if credential.legacy_mode() || credential.proprietary() || credential.is_forced_legacy() {
        StorageShape::Legacy
    } else {
        requested
    }
}

/// Detect and read the credential stored on `fields`.
///
/// A readable legacy field wins over built-in fields. `None` means the entry
/// has no OTP configured.
pub fn load<M: FieldMap + ?Sized>(fields: &M) -> Option<OtpCredential> {
    let mut credential = load_legacy(fields)
        .or_else(|| load_builtin(fields, &TIME_OTP_SECRETS, OtpType::Totp))
        .or_else(|| load_builtin(fields, &HMAC_OTP_SECRETS, OtpType::Hotp))?;

    // built-in fields present alongside are consumed too, so a save clears them
    for name in BUILTIN_FIELDS {
        if fields.has_field(name) {
            credential.add_source_field(name);
        }
    }
    Some(credential)
}

fn load_legacy<M: FieldMap + ?Sized>(fields: &M) -> Option<OtpCredential> {
    let text = fields.get_field(LEGACY_FIELD)?;
    let mut credential = legacy::from_legacy_string(text)?;
    credential.add_source_field(LEGACY_FIELD);
    debug!(otp_type = %credential.otp_type(), "loaded otp credential from legacy field");
    Some(credential)
}

fn load_builtin<M: FieldMap + ?Sized>(
    fields: &M,
    secrets: &[(&str, SecretEncoding)],
    otp_type: OtpType,
) -> Option<OtpCredential> {
    let (name, encoding, secret) = secrets.iter().find_map(|(name, encoding)| {
        let text = fields.get_field(name).filter(|t| !t.is_empty())?;
        match codec::decode_stored(text, *encoding) {
            Ok(secret) => Some((*name, *encoding, secret)),
            Err(e) => {
                debug!(field = name, error = %e, "skipping undecodable built-in secret");
                None
            }
        }
    })?;

    let mut credential = OtpCredential::new();
    credential.set_otp_type(otp_type);
    credential.set_encoding(encoding);
    credential.set_secret(secret);
    credential.add_source_field(name);

    match otp_type {
        OtpType::Hotp => {
            credential.counter = read_number(fields, HMAC_OTP_COUNTER, 0);
        }
        _ => {
            credential.digits = read_number(fields, TIME_OTP_LENGTH, DEFAULT_DIGITS);
            credential.period = read_number(fields, TIME_OTP_PERIOD, DEFAULT_PERIOD);
            if let Some(value) = fields.get_field(TIME_OTP_ALGORITHM) {
                credential.algorithm = HashAlgorithm::from_str_loose(value.trim())
                    .unwrap_or_else(|| {
                        warn!(field = TIME_OTP_ALGORITHM, "unknown algorithm, using HMAC-SHA-1");
                        HashAlgorithm::Sha1
                    });
            }
        }
    }
    debug!(otp_type = %otp_type, field = name, "loaded otp credential from built-in fields");
    Some(credential)
}

fn read_number<M: FieldMap + ?Sized, T: FromStr + Copy>(fields: &M, name: &str, default: T) -> T {
    match fields.get_field(name) {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(field = name, "unparseable value, using default");
            default
        }),
    }
}

/// Write `credential` onto `fields` and drop whatever the previous
/// configuration left behind.
///
/// The record must pass [`OtpCredential::validate`]. On success its source
/// fields become the fields just written and its legacy mode follows the
/// shape actually used.
pub fn save<M: FieldMap + ?Sized>(
    credential: &mut OtpCredential,
    fields: &mut M,
    requested: StorageShape,
) -> Result<SaveReport> {
    credential.validate()?;
    let shape = resolve_shape(credential, requested);
    if shape != requested {
        debug!(?requested, ?shape, "storage shape overridden by credential settings");
    }

    let mut stale: Vec<String> = credential.source_fields().to_vec();
    if let Some(existing) = load(&*fields) {
        stale.extend(existing.source_fields().iter().cloned());
    }
    stale.extend(
        BUILTIN_FIELDS
            .iter()
            .filter(|name| fields.has_field(name))
            .map(|name| name.to_string()),
    );

    let written = match shape {
        StorageShape::Legacy => write_legacy(credential, fields)?,
        StorageShape::BuiltIn => write_builtin(credential, fields)?,
    };

    let keep: Vec<&str> = written.iter().map(String::as_str).collect();
    let purged = purge_loaded_fields(fields, &stale, &keep);
    credential.set_source_fields(written.clone());
    credential.set_legacy_mode(shape == StorageShape::Legacy);

    debug!(?shape, written = written.len(), purged = purged.len(), "saved otp credential");
    Ok(SaveReport {
        shape,
        written,
        purged,
    })
}

/// Remove every field in `loaded` except those in `keep`. Returns what was removed.
pub fn purge_loaded_fields<M: FieldMap + ?Sized>(
    fields: &mut M,
    loaded: &[String],
    keep: &[&str],
) -> Vec<String> {
    let mut purged = Vec::new();
    for name in loaded {
        if keep.contains(&name.as_str()) || purged.contains(name) {
            continue;
        }
        if fields.remove_field(name) {
            purged.push(name.clone());
        }
    }
    purged
}

/// Store `credential` in the legacy field.
pub fn migrate_to_legacy<M: FieldMap + ?Sized>(
    credential: &mut OtpCredential,
    fields: &mut M,
) -> Result<SaveReport> {
    credential.set_legacy_mode(true);
    save(credential, fields, StorageShape::Legacy)
}

/// Store `credential` in built-in fields, unless it can only live in the legacy field.
pub fn migrate_to_builtin<M: FieldMap + ?Sized>(
    credential: &mut OtpCredential,
    fields: &mut M,
) -> Result<SaveReport> {
    credential.set_legacy_mode(false);
    save(credential, fields, StorageShape::BuiltIn)
}

/// Replace the legacy `{TOTP}` placeholder with the host's built-in
/// `{TIMEOTP}` in an auto-type sequence.
pub fn migrate_autotype_sequence(sequence: &str) -> String {
    sequence.replace(LEGACY_AUTOTYPE_PLACEHOLDER, BUILTIN_AUTOTYPE_PLACEHOLDER)
}

pub const LEGACY_AUTOTYPE_PLACEHOLDER: &str = "{TOTP}";
pub const BUILTIN_AUTOTYPE_PLACEHOLDER: &str = "{TIMEOTP}";

fn write_legacy<M: FieldMap + ?Sized>(
    credential: &OtpCredential,
    fields: &mut M,
) -> Result<Vec<String>> {
    let packed = legacy::to_legacy_string(credential)?;
    fields.set_field(LEGACY_FIELD, packed.as_str().to_owned());
    Ok(vec![LEGACY_FIELD.to_string()])
}

fn write_builtin<M: FieldMap + ?Sized>(
    credential: &OtpCredential,
    fields: &mut M,
) -> Result<Vec<String>> {
    let secret = credential.plain_secret()?.ok_or(OtpError::MissingSecret)?;
    let mut written = Vec::new();
    let mut put = |name: &str, value: String| {
        fields.set_field(name, value);
        written.push(name.to_string());
    };

    match credential.otp_type() {
        OtpType::Hotp => {
            put(
                hmac_otp_secret_field(credential.encoding()),
                secret.as_str().to_owned(),
            );
            put(HMAC_OTP_COUNTER, credential.counter.to_string());
        }
        OtpType::Totp => {
            put(
                time_otp_secret_field(credential.encoding()),
                secret.as_str().to_owned(),
            );
            if credential.digits != DEFAULT_DIGITS {
                put(TIME_OTP_LENGTH, credential.digits.to_string());
            }
            if credential.period != DEFAULT_PERIOD {
                put(TIME_OTP_PERIOD, credential.period.to_string());
            }
            if credential.algorithm != HashAlgorithm::Sha1 {
                put(
                    TIME_OTP_ALGORITHM,
                    builtin_algorithm_name(credential.algorithm).to_string(),
                );
            }
        }
        other => return Err(OtpError::NoBuiltInEquivalent(other)),
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn totp() -> OtpCredential {
        let mut c = OtpCredential::new();
        c.set_plain_secret("JBSWY3DPEHPK3PXP").unwrap();
        c
    }

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn load_empty_entry_is_none() {
        assert!(load(&map(&[("Title", "x"), ("Password", "y")])).is_none());
    }

    #[test]
    fn load_legacy_field() {
        let m = map(&[("otp", "key=JBSWY3DPEHPK3PXP&size=8")]);
        let c = load(&m).unwrap();
        assert!(c.legacy_mode());
        assert_eq!(c.digits, 8);
        assert_eq!(c.source_fields(), &["otp".to_string()]);
    }

    #[test]
    fn load_builtin_time_fields() {
        let m = map(&[
            ("TimeOtp-Secret-Hex", "48656C6C6F21DEADBEEF"),
            ("TimeOtp-Length", "8"),
            ("TimeOtp-Period", "60"),
            ("TimeOtp-Algorithm", "HMAC-SHA-256"),
        ]);
        let c = load(&m).unwrap();
        assert_eq!(c.otp_type(), OtpType::Totp);
        assert_eq!(c.encoding(), SecretEncoding::Hex);
        assert_eq!(c.digits, 8);
        assert_eq!(c.period, 60);
        assert_eq!(c.algorithm, HashAlgorithm::Sha256);
        assert!(!c.legacy_mode());
        assert_eq!(c.plain_secret().unwrap().unwrap().as_str(), "48656C6C6F21DEADBEEF");
        assert_eq!(c.source_fields().len(), 4);
    }

    #[test]
    fn load_builtin_hmac_fields() {
        let m = map(&[("HmacOtp-Secret", "12345678901234567890"), ("HmacOtp-Counter", "5")]);
        let c = load(&m).unwrap();
        assert_eq!(c.otp_type(), OtpType::Hotp);
        assert_eq!(c.encoding(), SecretEncoding::Utf8);
        assert_eq!(c.counter, 5);
    }

    #[test]
    fn load_falls_back_on_bad_numbers() {
        let m = map(&[
            ("TimeOtp-Secret-Base32", "JBSWY3DPEHPK3PXP"),
            ("TimeOtp-Period", "soon"),
            ("TimeOtp-Algorithm", "MD5"),
        ]);
        let c = load(&m).unwrap();
        assert_eq!(c.period, 30);
        assert_eq!(c.algorithm, HashAlgorithm::Sha1);
    }

    #[test]
    fn unreadable_legacy_field_falls_through_to_builtin() {
        let m = map(&[
            ("otp", "not an otp string"),
            ("TimeOtp-Secret-Base32", "JBSWY3DPEHPK3PXP"),
        ]);
        let c = load(&m).unwrap();
        assert!(!c.legacy_mode());
        assert!(!c.source_fields().contains(&"otp".to_string()));
    }

    #[test]
    fn save_builtin_writes_only_non_default_fields() {
        let mut m = map(&[("Title", "x")]);
        let mut c = totp();
        let report = save(&mut c, &mut m, StorageShape::BuiltIn).unwrap();
        assert_eq!(report.shape, StorageShape::BuiltIn);
        assert_eq!(report.written, vec!["TimeOtp-Secret-Base32".to_string()]);
        assert_eq!(m.get("TimeOtp-Secret-Base32").unwrap(), "JBSWY3DPEHPK3PXP");
        assert_eq!(m.len(), 2);
        assert_eq!(c.source_fields(), report.written.as_slice());
    }

    #[test]
    fn legacy_to_builtin_purges_legacy_field() {
        let mut m = map(&[("Title", "x"), ("otp", "key=JBSWY3DPEHPK3PXP&step=60")]);
        let mut c = load(&m).unwrap();
        let report = migrate_to_builtin(&mut c, &mut m).unwrap();
        assert_eq!(report.shape, StorageShape::BuiltIn);
        assert_eq!(report.purged, vec!["otp".to_string()]);
        assert!(!m.contains_key("otp"));
        let keys: Vec<&str> = m.keys().map(String::as_str).collect();
        assert_eq!(keys, ["TimeOtp-Period", "TimeOtp-Secret-Base32", "Title"]);
        let back = load(&m).unwrap();
        assert_eq!(back.period, 60);
        assert_eq!(back.secret(), c.secret());
    }

    #[test]
    fn builtin_to_legacy_purges_builtin_fields() {
        let mut m = map(&[
            ("TimeOtp-Secret-Base32", "JBSWY3DPEHPK3PXP"),
            ("TimeOtp-Length", "8"),
        ]);
        let mut c = load(&m).unwrap();
        let report = migrate_to_legacy(&mut c, &mut m).unwrap();
        assert_eq!(report.shape, StorageShape::Legacy);
        assert_eq!(m.len(), 1);
        let back = load(&m).unwrap();
        assert_eq!(back.digits, 8);
        assert!(back.legacy_mode());
    }

    #[test]
    fn stale_custom_fields_are_dropped_when_back_to_defaults() {
        let mut m = map(&[
            ("TimeOtp-Secret-Base32", "JBSWY3DPEHPK3PXP"),
            ("TimeOtp-Length", "8"),
            ("TimeOtp-Algorithm", "HMAC-SHA-512"),
        ]);
        let mut c = load(&m).unwrap();
        c.digits = 6;
        c.algorithm = HashAlgorithm::Sha1;
        let report = save(&mut c, &mut m, StorageShape::BuiltIn).unwrap();
        assert_eq!(report.purged.len(), 2);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn encoding_change_replaces_secret_field() {
        let mut m = map(&[("TimeOtp-Secret-Base32", "JBSWY3DPEHPK3PXP")]);
        let mut c = load(&m).unwrap();
        c.set_encoding(SecretEncoding::Base64);
        save(&mut c, &mut m, StorageShape::BuiltIn).unwrap();
        assert!(!m.contains_key("TimeOtp-Secret-Base32"));
        assert_eq!(m.get("TimeOtp-Secret-Base64").unwrap(), "SGVsbG8h3q2+7w==");
    }

    #[test]
    fn proprietary_always_saves_legacy() {
        let mut m: BTreeMap<String, String> = BTreeMap::new();
        let mut c = totp();
        c.set_otp_type(OtpType::Steam);
        let report = migrate_to_builtin(&mut c, &mut m).unwrap();
        assert_eq!(report.shape, StorageShape::Legacy);
        assert!(m.contains_key("otp"));
        assert!(m.keys().all(|k| !k.starts_with("TimeOtp")));
    }

    #[test]
    fn hotp_with_eight_digits_saves_legacy() {
        let mut m: BTreeMap<String, String> = BTreeMap::new();
        let mut c = totp();
        c.set_otp_type(OtpType::Hotp);
        c.digits = 8;
        assert!(!c.legacy_mode());
        let report = migrate_to_builtin(&mut c, &mut m).unwrap();
        assert_eq!(report.shape, StorageShape::Legacy);
        assert!(c.legacy_mode());
    }

    #[test]
    fn five_digit_steam_record_saves_legacy() {
        let mut m = map(&[("TimeOtp-Secret-Base32", "MZXW6")]);
        let mut c = crate::uri::parse("otpauth://steam/Steam:me?secret=JBSWY3DPEHPK3PXP&digits=5")
            .unwrap()
            .unwrap();
        assert_eq!(c.digits, 5);
        let report = save(&mut c, &mut m, StorageShape::BuiltIn).unwrap();
        assert_eq!(report.shape, StorageShape::Legacy);
        assert_eq!(report.purged, vec!["TimeOtp-Secret-Base32".to_string()]);
        let back = load(&m).unwrap();
        assert_eq!(back.otp_type(), OtpType::Steam);
        assert_eq!(back.digits, 5);
    }

    #[test]
    fn legacy_mode_follows_written_shape() {
        let mut m: BTreeMap<String, String> = BTreeMap::new();
        let mut c = totp();
        save(&mut c, &mut m, StorageShape::Legacy).unwrap();
        assert!(c.legacy_mode());
        assert!(m.contains_key("otp"));

        let report = migrate_to_builtin(&mut c, &mut m).unwrap();
        assert_eq!(report.shape, StorageShape::BuiltIn);
        assert!(!c.legacy_mode());
    }

    #[test]
    fn autotype_placeholder_is_rewritten() {
        assert_eq!(
            migrate_autotype_sequence("{USERNAME}{TAB}{PASSWORD}{ENTER}{TOTP}{ENTER}"),
            "{USERNAME}{TAB}{PASSWORD}{ENTER}{TIMEOTP}{ENTER}"
        );
        assert_eq!(migrate_autotype_sequence("{TIMEOTP}"), "{TIMEOTP}");
        assert_eq!(migrate_autotype_sequence("{totp}"), "{totp}");
    }

    #[test]
    fn save_rejects_invalid_records() {
        let mut m: BTreeMap<String, String> = BTreeMap::new();
        assert_eq!(
            save(&mut OtpCredential::new(), &mut m, StorageShape::BuiltIn).unwrap_err(),
            OtpError::MissingSecret
        );
        let mut c = totp();
        c.period = 0;
        assert_eq!(
            save(&mut c, &mut m, StorageShape::BuiltIn).unwrap_err(),
            OtpError::InvalidPeriod
        );
        assert!(m.is_empty());
    }

    #[test]
    fn unrelated_legacy_field_survives_builtin_save() {
        let mut m = map(&[("otp", "my one-time pad notes")]);
        save(&mut totp(), &mut m, StorageShape::BuiltIn).unwrap();
        assert_eq!(m.get("otp").unwrap(), "my one-time pad notes");
    }

    #[test]
    fn purge_skips_kept_and_missing_fields() {
        let mut m = map(&[("a", "1"), ("b", "2")]);
        let loaded = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let purged = purge_loaded_fields(&mut m, &loaded, &["b"]);
        assert_eq!(purged, vec!["a".to_string()]);
        assert_eq!(m.len(), 1);
    }
}
