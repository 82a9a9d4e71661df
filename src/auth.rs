use crate::config::AuthConfig;
use crate::types::alert::UserId;

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};
use base64::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD, decode_config, encode_config};
use jwt_simple::algorithms::MACLike;
use jwt_simple::prelude::{
    Claims, Duration as JwtDuration, HS256Key, NoCustomClaims, VerificationOptions,
};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use thiserror::Error;

use std::collections::HashSet;

const ISSUER: &str = "larder";

/// Verifies the bearer tokens and cookies that carry a user identity.
#[derive(Debug, Clone)]
pub struct AuthState {
    key: HS256Key,
    cookie_name: String,
    token_ttl: time::Duration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid auth key")]
    InvalidKey,
    #[error("invalid auth token")]
    InvalidToken,
    #[error("auth token missing expiry")]
    MissingExpiry,
    #[error("auth token missing subject")]
    MissingSubject,
    #[error("auth token subject is not a user id")]
    InvalidSubject,
}

impl AuthState {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let key_bytes = decode_key(&config.key)?;
        Ok(Self {
            key: HS256Key::from_bytes(&key_bytes),
            cookie_name: config.cookie_name.clone(),
            token_ttl: config.token_ttl,
        })
    }

    pub fn issue_token(&self, user_id: UserId) -> Result<String, AuthError> {
        let ttl_seconds = self.token_ttl.whole_seconds();
        if ttl_seconds <= 0 {
            return Err(AuthError::InvalidToken);
        }
        let claims = Claims::create(JwtDuration::from_secs(ttl_seconds as u64))
            .with_subject(user_id.to_string())
            .with_issuer(ISSUER);
        self.key
            .authenticate(claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let mut options = VerificationOptions::default();
        options.allowed_issuers = Some(HashSet::from([ISSUER.to_string()]));

        let claims = self
            .key
            .verify_token::<NoCustomClaims>(token, Some(options))
            .map_err(|_| AuthError::InvalidToken)?;

        if claims.expires_at.is_none() {
            return Err(AuthError::MissingExpiry);
        }

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        if subject.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }
        subject.parse().map_err(|_| AuthError::InvalidSubject)
    }

    /// Identity from an `Authorization: Bearer` header, falling back to the
    /// auth cookie. Invalid credentials count as none.
    pub fn identify(&self, headers: &HeaderMap) -> Option<UserId> {
        let token = bearer_token(headers).or_else(|| auth_cookie(headers, &self.cookie_name))?;
        self.verify_token(token).ok()
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn auth_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for header in headers.get_all(COOKIE).iter() {
        if let Ok(raw) = header.to_str()
            && let Some(value) = cookie_from_header(raw, name)
        {
            return Some(value);
        }
    }
    None
}

fn cookie_from_header<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some((cookie_name, cookie_value)) = trimmed.split_once('=')
            && cookie_name == name
        {
            return Some(cookie_value);
        }
    }
    None
}

fn decode_key(raw: &str) -> Result<Vec<u8>, AuthError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    let decoded = decode_config(trimmed, URL_SAFE_NO_PAD)
        .or_else(|_| decode_config(trimmed, STANDARD))
        .or_else(|_| decode_config(trimmed, STANDARD_NO_PAD))
        .map_err(|_| AuthError::InvalidKey)?;

    if decoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }

    Ok(decoded)
}

pub fn generate_auth_key() -> Result<String, AuthError> {
    let mut rng = OsRng;
    generate_auth_key_with_rng(&mut rng)
}

pub(crate) fn generate_auth_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<String, AuthError> {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    let encoded = encode_config(bytes, URL_SAFE_NO_PAD);
    if encoded.is_empty() {
        return Err(AuthError::InvalidKey);
    }
    Ok(encoded)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for value in dest.iter_mut() {
                *value = 0;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for ZeroRng {}

    fn auth_state() -> AuthState {
        AuthState::from_config(&AuthConfig {
            key: encode_config(b"larder-test-secret", URL_SAFE_NO_PAD),
            token_ttl: time::Duration::hours(1),
            cookie_name: "larder_auth".to_string(),
        })
        .expect("auth state")
    }

    #[test]
    fn generate_auth_key_with_rng__should_match_fixture() {
        // Given
        let mut rng = ZeroRng;

        // When
        let key = generate_auth_key_with_rng(&mut rng).expect("auth key");

        // Then
        assert_eq!(key, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
    }

    #[test]
    fn verify_token__should_return_subject_user_id() {
        // Given
        let auth = auth_state();
        let token = auth.issue_token(UserId(42)).expect("issue token");

        // When
        let user_id = auth.verify_token(&token).expect("verify token");

        // Then
        assert_eq!(user_id, UserId(42));
    }

    #[test]
    fn verify_token__should_reject_non_numeric_subjects() {
        // Given
        let auth = auth_state();
        let claims = Claims::create(JwtDuration::from_secs(60))
            .with_subject("marten")
            .with_issuer(ISSUER);
        let token = auth.key.authenticate(claims).expect("token");

        // Then
        assert!(matches!(
            auth.verify_token(&token),
            Err(AuthError::InvalidSubject)
        ));
    }

    #[test]
    fn verify_token__should_reject_foreign_keys() {
        // Given
        let auth = auth_state();
        let other = AuthState::from_config(&AuthConfig {
            key: encode_config(b"some-other-secret", URL_SAFE_NO_PAD),
            token_ttl: time::Duration::hours(1),
            cookie_name: "larder_auth".to_string(),
        })
        .expect("auth state");
        let token = other.issue_token(UserId(42)).expect("issue token");

        // Then
        assert!(matches!(
            auth.verify_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn identify__should_accept_bearer_and_cookie() {
        // Given
        let auth = auth_state();
        let token = auth.issue_token(UserId(7)).expect("issue token");
        let mut bearer = HeaderMap::new();
        bearer.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
        );
        let mut cookie = HeaderMap::new();
        cookie.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; larder_auth={token}")).expect("header"),
        );

        // Then
        assert_eq!(auth.identify(&bearer), Some(UserId(7)));
        assert_eq!(auth.identify(&cookie), Some(UserId(7)));
        assert_eq!(auth.identify(&HeaderMap::new()), None);
    }

    #[test]
    fn from_config__should_reject_empty_key() {
        // Given
        let config = AuthConfig {
            key: "   ".to_string(),
            token_ttl: time::Duration::hours(1),
            cookie_name: "larder_auth".to_string(),
        };

        // Then
        assert!(matches!(
            AuthState::from_config(&config),
            Err(AuthError::InvalidKey)
        ));
    }
}
