//! Bearer credential decoding. Only the payload segment is read; the signature
//! segment is never checked, so decoded claims are good for UX gating and
//! nothing else. The API remains the authority on access.

use crate::session::role::Role;
use base64ct::{Base64UrlUnpadded, Encoding};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// Raw bearer credential. Redacted in `Debug` output; never log the exposed value.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Claims carried in the credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub role: Role,
    /// Seconds since the Unix epoch.
    #[serde(rename = "exp")]
    pub expiry: i64,
}

impl Claims {
    /// A credential is still usable only while its expiry is strictly in the future.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry <= now
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 3 token segments, found {0}")]
    Segments(usize),
    #[error("invalid base64url encoding")]
    Base64,
    #[error("payload is not a JSON object")]
    Json,
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("invalid claim: {0}")]
    InvalidClaim(&'static str),
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Decode the payload of a `header.payload.signature` credential.
///
/// # Errors
///
/// Returns a [`DecodeError`] when the credential does not have three segments,
/// the payload is not base64url JSON, or `sub`, `role` or `exp` are missing or
/// of the wrong type.
pub fn decode(credential: &str) -> Result<Claims, DecodeError> {
    let segments: Vec<&str> = credential.split('.').collect();
    let [_, payload, _] = segments.as_slice() else {
        return Err(DecodeError::Segments(segments.len()));
    };

    let bytes = Base64UrlUnpadded::decode_vec(&canonical_payload(payload))
        .map_err(|_| DecodeError::Base64)?;

    let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(&bytes) else {
        return Err(DecodeError::Json);
    };

    Ok(Claims {
        subject: subject_claim(&fields)?,
        role: role_claim(&fields)?,
        expiry: expiry_claim(&fields)?,
    })
}

const URL_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Rewrites a payload segment into unpadded base64url with zeroed trailing bits.
///
/// Issuers differ: some keep `=` padding, some use the standard `+`/`/`
/// alphabet, and some leave garbage in the bits past the last byte.
fn canonical_payload(payload: &str) -> String {
    let mut chars: Vec<char> = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let unused_bits = match chars.len() % 4 {
        2 => 4,
        3 => 2,
        _ => 0,
    };
    if unused_bits > 0 {
        if let Some(last) = chars.last_mut() {
            if let Some(index) = URL_ALPHABET.iter().position(|&b| char::from(b) == *last) {
                *last = char::from(URL_ALPHABET[index & !((1 << unused_bits) - 1)]);
            }
        }
    }

    chars.into_iter().collect()
}

fn subject_claim(fields: &Map<String, Value>) -> Result<String, DecodeError> {
    match fields.get("sub") {
        Some(Value::String(subject)) => Ok(subject.clone()),
        Some(_) => Err(DecodeError::InvalidClaim("sub")),
        None => Err(DecodeError::MissingClaim("sub")),
    }
}

fn role_claim(fields: &Map<String, Value>) -> Result<Role, DecodeError> {
    match fields.get("role") {
        Some(Value::String(role)) => role
            .parse()
            .map_err(|_| DecodeError::UnknownRole(role.clone())),
        Some(_) => Err(DecodeError::InvalidClaim("role")),
        None => Err(DecodeError::MissingClaim("role")),
    }
}

fn expiry_claim(fields: &Map<String, Value>) -> Result<i64, DecodeError> {
    match fields.get("exp") {
        Some(Value::Number(exp)) => exp
            .as_i64()
            .or_else(|| {
                exp.as_f64()
                    .filter(|secs| secs.is_finite())
                    .map(|secs| secs.floor() as i64)
            })
            .ok_or(DecodeError::InvalidClaim("exp")),
        Some(_) => Err(DecodeError::InvalidClaim("exp")),
        None => Err(DecodeError::MissingClaim("exp")),
    }
}

/// Build an unsigned (`alg: none`) credential for the given claims.
///
/// Meant for tests and local tooling: the API would reject it, and this crate
/// would accept it, which is exactly the trust model described above.
#[must_use]
pub fn encode_unsigned(claims: &Claims) -> String {
    encode_unsigned_payload(&json!({
        "sub": claims.subject,
        "role": claims.role,
        "exp": claims.expiry,
    }))
}

/// Build an unsigned credential around an arbitrary JSON payload.
#[must_use]
pub fn encode_unsigned_payload(payload: &Value) -> String {
    let header = json!({ "alg": "none", "typ": "JWT" });
    format!(
        "{}.{}.",
        Base64UrlUnpadded::encode_string(header.to_string().as_bytes()),
        Base64UrlUnpadded::encode_string(payload.to_string().as_bytes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn claims(role: Role, expiry: i64) -> Claims {
        Claims {
            subject: "alice".to_string(),
            role,
            expiry,
        }
    }

    #[test]
    fn decodes_unsigned_credential() -> Result<(), DecodeError> {
        let token = encode_unsigned(&claims(Role::Student, NOW + 3600));
        let decoded = decode(&token)?;
        assert_eq!(decoded, claims(Role::Student, NOW + 3600));
        assert!(!decoded.is_expired_at(NOW));
        Ok(())
    }

    #[test]
    fn decodes_payload_from_signed_token_without_checking_signature() -> Result<(), DecodeError> {
        let payload = Base64UrlUnpadded::encode_string(
            br#"{"sub":"bob","role":"MENTOR","exp":1700003600,"iat":1700000000}"#,
        );
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.not-a-real-signature");
        let decoded = decode(&token)?;
        assert_eq!(decoded.subject, "bob");
        assert_eq!(decoded.role, Role::Mentor);
        assert_eq!(decoded.expiry, 1_700_003_600);
        Ok(())
    }

    #[test]
    fn accepts_padded_payload() -> Result<(), DecodeError> {
        // 43 bytes of JSON, so standard padding appends `==`.
        let json = br#"{"sub":"al","role":"ADMIN","exp":170000000}"#;
        let payload = format!("{}==", Base64UrlUnpadded::encode_string(json));
        let decoded = decode(&format!("h.{payload}.s"))?;
        assert_eq!(decoded.role, Role::Admin);
        Ok(())
    }

    #[test]
    fn accepts_standard_alphabet_payload() -> Result<(), DecodeError> {
        // A run of `~` guarantees `-` in the base64url form.
        let url = encode_unsigned_payload(&json!({
            "sub": "~~~~~~~~~", "role": "MENTOR", "exp": NOW
        }));
        assert!(url.contains('-'));
        let standard = url.replace('-', "+").replace('_', "/");

        let decoded = decode(&standard)?;
        assert_eq!(decoded.subject, "~~~~~~~~~");
        assert_eq!(decoded, decode(&url)?);
        Ok(())
    }

    #[test]
    fn ignores_non_canonical_trailing_bits() -> Result<(), DecodeError> {
        for subject in ["a", "ab", "abc"] {
            let payload = Base64UrlUnpadded::encode_string(
                json!({ "sub": subject, "role": "ADMIN", "exp": NOW })
                    .to_string()
                    .as_bytes(),
            );
            let unused_bits = match payload.len() % 4 {
                2 => 4,
                3 => 2,
                _ => continue,
            };

            let mut bytes = payload.clone().into_bytes();
            let last = bytes.len() - 1;
            let index = URL_ALPHABET
                .iter()
                .position(|&b| b == bytes[last])
                .expect("base64url output");
            bytes[last] = URL_ALPHABET[index | ((1 << unused_bits) - 1)];
            let sloppy = String::from_utf8(bytes).expect("ascii");
            assert_ne!(sloppy, payload);

            let decoded = decode(&format!("h.{sloppy}.s"))?;
            assert_eq!(decoded.subject, subject);
        }
        Ok(())
    }

    #[test]
    fn expiry_boundary_is_expired() {
        assert!(claims(Role::Admin, NOW).is_expired_at(NOW));
        assert!(claims(Role::Admin, NOW - 1).is_expired_at(NOW));
        assert!(!claims(Role::Admin, NOW + 1).is_expired_at(NOW));
    }

    #[test]
    fn fractional_expiry_is_floored() -> Result<(), DecodeError> {
        let token = encode_unsigned_payload(&json!({
            "sub": "alice", "role": "STUDENT", "exp": 1_700_000_000.9
        }));
        assert_eq!(decode(&token)?.expiry, NOW);
        Ok(())
    }

    #[test]
    fn rejects_wrong_segment_count() {
        assert_eq!(decode("only-one"), Err(DecodeError::Segments(1)));
        assert_eq!(decode("a.b"), Err(DecodeError::Segments(2)));
        assert_eq!(decode("a.b.c.d"), Err(DecodeError::Segments(4)));
    }

    #[test]
    fn rejects_non_base64_and_non_json_payloads() {
        assert_eq!(decode("h.!!!.s"), Err(DecodeError::Base64));

        let not_json = Base64UrlUnpadded::encode_string(b"not json");
        assert_eq!(decode(&format!("h.{not_json}.s")), Err(DecodeError::Json));

        let array = Base64UrlUnpadded::encode_string(b"[1,2,3]");
        assert_eq!(decode(&format!("h.{array}.s")), Err(DecodeError::Json));
    }

    #[test]
    fn rejects_missing_or_mistyped_claims() {
        let missing_exp = encode_unsigned_payload(&json!({ "sub": "a", "role": "STUDENT" }));
        assert_eq!(decode(&missing_exp), Err(DecodeError::MissingClaim("exp")));

        let string_exp =
            encode_unsigned_payload(&json!({ "sub": "a", "role": "STUDENT", "exp": "soon" }));
        assert_eq!(decode(&string_exp), Err(DecodeError::InvalidClaim("exp")));

        let missing_sub = encode_unsigned_payload(&json!({ "role": "STUDENT", "exp": NOW }));
        assert_eq!(decode(&missing_sub), Err(DecodeError::MissingClaim("sub")));

        let numeric_role = encode_unsigned_payload(&json!({ "sub": "a", "role": 1, "exp": NOW }));
        assert_eq!(decode(&numeric_role), Err(DecodeError::InvalidClaim("role")));

        let unknown_role =
            encode_unsigned_payload(&json!({ "sub": "a", "role": "JANITOR", "exp": NOW }));
        assert_eq!(
            decode(&unknown_role),
            Err(DecodeError::UnknownRole("JANITOR".to_string()))
        );
    }

    #[test]
    fn credential_debug_is_redacted() {
        let credential = Credential::new("secret.token.value");
        assert_eq!(format!("{credential:?}"), "Credential([REDACTED])");
        assert_eq!(credential.clone().expose(), "secret.token.value");
    }
}
