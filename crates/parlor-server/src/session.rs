//! Signed identity cookies.
//!
//! The login flow stores the user's profile in a signed cookie as base64
//! encoded JSON. Every request that needs an identity reads it back through
//! a [`SignedCookieJar`], so a tampered cookie is treated as missing.

use anyhow::{bail, Result};
use axum::http::header::SET_COOKIE;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use parlor_core::Profile;
use thiserror::Error;
use tracing::warn;

use crate::secrets::{Secrets, CHAT_SECRET};

/// Minimum length of the `chat` secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Why a session cookie could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// No valid signed cookie was sent.
    #[error("No session cookie")]
    Missing,

    /// The cookie was signed but its value is not a profile.
    #[error("Malformed session cookie: {0}")]
    Malformed(String),
}

/// Derive the cookie signing key from the `chat` secret.
///
/// Without secrets a random key is generated, which invalidates every
/// cookie on restart.
///
/// # Errors
///
/// Returns an error if the secrets have no usable `chat` entry.
pub fn signing_key(secrets: Option<&Secrets>) -> Result<Key> {
    let Some(secrets) = secrets else {
        warn!("No secrets file configured, using a random cookie key");
        return Ok(Key::generate());
    };

    let Some(chat) = secrets.get(CHAT_SECRET) else {
        bail!("Secrets file has no '{CHAT_SECRET}' entry");
    };
    if chat.secret.len() < MIN_SECRET_LEN {
        bail!("The '{CHAT_SECRET}' secret must be at least {MIN_SECRET_LEN} bytes");
    }
    Ok(Key::derive_from(chat.secret.as_bytes()))
}

/// Encode a profile as a cookie value.
///
/// # Errors
///
/// Returns an error if the profile cannot be serialized.
pub fn encode_profile(profile: &Profile) -> Result<String, SessionError> {
    let json = serde_json::to_vec(profile).map_err(|e| SessionError::Malformed(e.to_string()))?;
    Ok(STANDARD.encode(json))
}

/// Decode a cookie value into a profile.
///
/// # Errors
///
/// Returns [`SessionError::Malformed`] unless the value is base64 of a JSON object.
pub fn decode_profile(value: &str) -> Result<Profile, SessionError> {
    let bytes = STANDARD
        .decode(value)
        .map_err(|e| SessionError::Malformed(e.to_string()))?;
    let json: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| SessionError::Malformed(e.to_string()))?;
    Profile::from_value(json).ok_or_else(|| SessionError::Malformed("not an object".into()))
}

/// Read the caller's profile from the signed cookie `name`.
///
/// # Errors
///
/// Returns an error if the cookie is absent, unsigned, tampered or malformed.
pub fn resolve_profile(jar: &SignedCookieJar, name: &str) -> Result<Profile, SessionError> {
    let cookie = jar.get(name).ok_or(SessionError::Missing)?;
    decode_profile(cookie.value())
}

/// Add a signed cookie `name` carrying `profile`.
///
/// # Errors
///
/// Returns an error if the profile cannot be serialized.
pub fn login(
    jar: SignedCookieJar,
    name: &str,
    profile: &Profile,
) -> Result<SignedCookieJar, SessionError> {
    let cookie = Cookie::build((name.to_string(), encode_profile(profile)?))
        .path("/")
        .http_only(true);
    Ok(jar.add(cookie))
}

/// Expire the cookie `name`.
#[must_use]
pub fn logout(jar: SignedCookieJar, name: &str) -> SignedCookieJar {
    jar.remove(Cookie::build((name.to_string(), "")).path("/"))
}

/// A `Cookie` request header value (`name=signed-value`) for `profile`.
///
/// # Errors
///
/// Returns an error if the profile cannot be serialized.
pub fn cookie_header(key: &Key, name: &str, profile: &Profile) -> Result<String, SessionError> {
    let jar = login(SignedCookieJar::new(key.clone()), name, profile)?;
    let response = jar.into_response();
    response
        .headers()
        .get(SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
        .ok_or_else(|| SessionError::Malformed("cookie not set".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderMap, HeaderValue};

    fn jar_from_header(key: &Key, header: &str) -> SignedCookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(header).unwrap());
        SignedCookieJar::from_headers(&headers, key.clone())
    }

    #[test]
    fn test_profile_roundtrip_through_cookie() {
        let key = Key::generate();
        let profile = Profile::new().with("name", "Ada").with("email", "ada@example.com");

        let header = cookie_header(&key, "auth", &profile).unwrap();
        assert!(header.starts_with("auth="));

        let jar = jar_from_header(&key, &header);
        assert_eq!(resolve_profile(&jar, "auth").unwrap(), profile);
    }

    #[test]
    fn test_foreign_key_rejected() {
        let profile = Profile::new().with("name", "Ada");
        let header = cookie_header(&Key::generate(), "auth", &profile).unwrap();

        let jar = jar_from_header(&Key::generate(), &header);
        assert_eq!(resolve_profile(&jar, "auth"), Err(SessionError::Missing));
    }

    #[test]
    fn test_unsigned_cookie_rejected() {
        let value = encode_profile(&Profile::new().with("name", "Eve")).unwrap();
        let jar = jar_from_header(&Key::generate(), &format!("auth={value}"));
        assert_eq!(resolve_profile(&jar, "auth"), Err(SessionError::Missing));
    }

    #[test]
    fn test_decode_profile() {
        assert!(matches!(
            decode_profile("%%%"),
            Err(SessionError::Malformed(_))
        ));
        assert!(matches!(
            decode_profile(&STANDARD.encode("[1,2]")),
            Err(SessionError::Malformed(_))
        ));

        let profile = decode_profile(&STANDARD.encode(r#"{"name":"Ada"}"#)).unwrap();
        assert_eq!(profile.name(), Some("Ada"));
    }

    #[test]
    fn test_signing_key() {
        assert!(signing_key(None).is_ok());

        let short = Secrets::from_json(r#"{"secrets":[{"secretName":"chat","secret":"x"}]}"#)
            .unwrap();
        assert!(signing_key(Some(&short)).is_err());

        let none = Secrets::from_json(r#"{"secrets":[]}"#).unwrap();
        assert!(signing_key(Some(&none)).is_err());

        let json = format!(
            r#"{{"secrets":[{{"secretName":"chat","secret":"{}"}}]}}"#,
            "k".repeat(MIN_SECRET_LEN)
        );
        let secrets = Secrets::from_json(&json).unwrap();
        let a = signing_key(Some(&secrets)).unwrap();
        let b = signing_key(Some(&secrets)).unwrap();
        assert_eq!(a.master(), b.master());
    }

    #[test]
    fn test_logout_expires_cookie() {
        let key = Key::generate();
        let jar = login(SignedCookieJar::new(key), "auth", &Profile::new()).unwrap();
        let jar = logout(jar, "auth");
        assert!(jar.get("auth").is_none());
    }
}
