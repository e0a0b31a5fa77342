//! `otpauth://` URI parsing and generation, following the Google Authenticator
//! key-URI format:
//! <https://github.com/google/google-authenticator/wiki/Key-Uri-Format>
//!
//! Format: `otpauth://totp/LABEL?secret=BASE32&algorithm=SHA1&digits=6&period=30`

use crate::codec;
use crate::credential::{
    DEFAULT_DIGITS, DEFAULT_PERIOD, HashAlgorithm, OtpCredential, OtpType, SecretEncoding,
};
use crate::error::{OtpError, Result};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

/// Parse an `otpauth://` URI.
///
/// Returns `Ok(None)` when the URI is well formed but carries no usable
/// `secret` parameter. The label is not interpreted.
pub fn parse(uri: &str) -> Result<Option<OtpCredential>> {
    let uri = uri.trim();
    let url = Url::parse(uri).map_err(|e| OtpError::InvalidUriFormat(e.to_string()))?;

    // Url lowercases the scheme, so check the input as written
    let scheme = uri.split(':').next().unwrap_or("");
    if scheme != "otpauth" {
        return Err(OtpError::InvalidUriFormat(format!(
            "expected scheme 'otpauth', got '{scheme}'"
        )));
    }

    let host = url.host_str().unwrap_or("");
    let otp_type = OtpType::from_str_loose(host)
        .ok_or_else(|| OtpError::InvalidUriFormat(format!("unknown otp type '{host}'")))?;

    let mut secret: Option<Zeroizing<String>> = None;
    let mut algorithm = HashAlgorithm::Sha1;
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;
    let mut counter = 0u64;

    // later duplicates overwrite earlier ones
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret = Some(Zeroizing::new(value.into_owned())),
            "algorithm" => {
                algorithm = HashAlgorithm::from_str_loose(&value).unwrap_or_default();
            }
            "digits" => {
                digits = value
                    .parse::<u32>()
                    .ok()
                    .filter(|d| *d > 0)
                    .unwrap_or(DEFAULT_DIGITS);
            }
            "period" => {
                period = value
                    .parse::<u32>()
                    .ok()
                    .filter(|p| *p > 0)
                    .unwrap_or(DEFAULT_PERIOD);
            }
            "counter" => counter = value.parse::<u64>().unwrap_or(0),
            _ => {}
        }
    }

    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        debug!(otp_type = %otp_type, "otpauth uri carries no secret");
        return Ok(None);
    };
    let bytes = codec::decode_normalized(&secret, SecretEncoding::Base32)?;

    let mut credential = OtpCredential::new();
    credential.set_otp_type(otp_type);
    credential.set_secret(bytes);
    credential.algorithm = algorithm;
    credential.digits = digits;
    if otp_type.is_time_based() {
        credential.period = period;
    } else {
        credential.counter = counter;
    }
    Ok(Some(credential))
}

/// Build an `otpauth://` URI for `credential`.
///
/// The secret is always written as Base32; parameters at their defaults are
/// omitted except `counter`, which HOTP consumers require.
pub fn build(credential: &OtpCredential, label: &str) -> Result<Zeroizing<String>> {
    if credential.secret().is_empty() {
        return Err(OtpError::MissingSecret);
    }
    let otp_type = credential.otp_type();
    let mut url = Url::parse(&format!("otpauth://{}/", otp_type.uri_host()))
        .map_err(|e| OtpError::InvalidUriFormat(e.to_string()))?;
    url.set_path(&format!("/{}", label.trim_start_matches('/')));

    let secret = codec::encode(credential.secret().expose(), SecretEncoding::Base32)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("secret", &secret);
        if credential.algorithm != HashAlgorithm::Sha1 {
            query.append_pair("algorithm", credential.algorithm.uri_name());
        }
        if credential.digits != DEFAULT_DIGITS {
            query.append_pair("digits", &credential.digits.to_string());
        }
        if otp_type.is_time_based() && credential.period != DEFAULT_PERIOD {
            query.append_pair("period", &credential.period.to_string());
        }
        if otp_type == OtpType::Hotp {
            query.append_pair("counter", &credential.counter.to_string());
        }
    }
    Ok(Zeroizing::new(url.into()))
}
