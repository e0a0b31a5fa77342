//! Conversion of raw secret bytes to and from their textual encodings.

use crate::credential::SecretEncoding;
use crate::error::{OtpError, Result};
use crate::sensitive::SensitiveBytes;
use base32::Alphabet;
use base64::{Engine as _, engine::general_purpose};
use zeroize::Zeroizing;

const BASE32: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Strip the space and hyphen separators authenticator apps group keys with.
pub fn normalize(text: &str) -> Zeroizing<String> {
    Zeroizing::new(text.chars().filter(|c| *c != ' ' && *c != '-').collect())
}

/// Decode `text` under `encoding`. Does not normalize.
pub fn decode(text: &str, encoding: SecretEncoding) -> Result<SensitiveBytes> {
    let err = || OtpError::encoding(encoding);
    let bytes = match encoding {
        SecretEncoding::Base32 => decode_base32(text).ok_or_else(err)?,
        SecretEncoding::Base64 => general_purpose::STANDARD
            .decode(text)
            .map_err(|_| err())?,
        SecretEncoding::Hex => hex::decode(text).map_err(|_| err())?,
        SecretEncoding::Utf8 => text.as_bytes().to_vec(),
    };
    Ok(SensitiveBytes::new(bytes))
}

/// Encode `bytes` as text. Base32 is unpadded upper-case, hex is upper-case.
pub fn encode(bytes: &[u8], encoding: SecretEncoding) -> Result<Zeroizing<String>> {
    let text = match encoding {
        SecretEncoding::Base32 => base32::encode(BASE32, bytes),
        SecretEncoding::Base64 => general_purpose::STANDARD.encode(bytes),
        SecretEncoding::Hex => hex::encode_upper(bytes),
        SecretEncoding::Utf8 => String::from_utf8(bytes.to_vec())
            .map_err(|_| OtpError::encoding(SecretEncoding::Utf8))?,
    };
    Ok(Zeroizing::new(text))
}

/// Normalize then decode, discarding the bytes.
pub fn validate(text: &str, encoding: SecretEncoding) -> Result<()> {
    decode(&normalize(text), encoding).map(drop)
}

/// Normalize then decode.
pub fn decode_normalized(text: &str, encoding: SecretEncoding) -> Result<SensitiveBytes> {
    decode(&normalize(text), encoding)
}

/// Decode secret text read back from an entry field.
///
/// UTF-8 text is taken verbatim, since spaces and hyphens are part of such
/// secrets. Base64 spaces are restored to `+`, which form decoding turns into
/// spaces when older writers left them unescaped.
pub(crate) fn decode_stored(text: &str, encoding: SecretEncoding) -> Result<SensitiveBytes> {
    match encoding {
        SecretEncoding::Utf8 => decode(text, encoding),
        SecretEncoding::Base64 => {
            let restored = Zeroizing::new(text.replace(' ', "+"));
            decode(&restored, encoding)
        }
        SecretEncoding::Base32 | SecretEncoding::Hex => decode_normalized(text, encoding),
    }
}

fn decode_base32(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim_end_matches('=');
    let upper = Zeroizing::new(trimmed.to_ascii_uppercase());
    if !upper
        .bytes()
        .all(|b| b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b))
    {
        return None;
    }
    // 1, 3 or 6 trailing symbols cannot come from a whole number of bytes
    if matches!(upper.len() % 8, 1 | 3 | 6) {
        return None;
    }
    base32::decode(BASE32, &upper)
}
