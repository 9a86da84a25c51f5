//! Bearer tokens for the server-verified mutation path.
//!
//! These are short-lived JSON Web Tokens minted for an already authenticated
//! user. The verified mutation endpoints check the token signature and expiry
//! and extract the subject user ID, instead of trusting the caller's claimed
//! identity.

// Code in this module is adapted from https://github.com/tokio-rs/axum/blob/main/examples/jwt/src/main.rs

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::{Error, user::UserID};

/// How long a freshly minted bearer token remains valid.
pub const TOKEN_DURATION: Duration = Duration::minutes(15);

/// The encoding and decoding keys for bearer tokens, derived from one secret.
#[derive(Clone)]
pub struct TokenKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenKeys {
    /// Derive the signing and verifying keys from a secret string.
    pub fn from_secret(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKeys { .. }")
    }
}

/// The contents of a JSON Web Token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The ID of the user the token was issued to.
    sub: i64,
    /// The time the token was issued as a unix timestamp.
    iat: usize,
    /// The expiry time of the token as a unix timestamp.
    exp: usize,
}

/// Mint a bearer token for `user_id` that expires after [TOKEN_DURATION].
///
/// # Errors
///
/// Returns [Error::TokenCreation] if the token could not be signed.
pub fn issue_token(user_id: UserID, keys: &TokenKeys) -> Result<String, Error> {
    let now = OffsetDateTime::now_utc();
    let claims = Claims {
        sub: user_id.as_i64(),
        iat: now.unix_timestamp() as usize,
        exp: (now + TOKEN_DURATION).unix_timestamp() as usize,
    };

    encode(&Header::default(), &claims, &keys.encoding_key).map_err(|error| {
        tracing::error!("could not sign auth token: {error}");
        Error::TokenCreation
    })
}

/// Verify a bearer token and extract the subject user ID.
///
/// # Errors
///
/// Returns [Error::InvalidAuthToken] if the signature does not verify or the
/// token has expired.
pub fn verify_token(token: &str, keys: &TokenKeys) -> Result<UserID, Error> {
    decode::<Claims>(token, &keys.decoding_key, &Validation::default())
        .map(|token_data| UserID::new(token_data.claims.sub))
        .map_err(|_| Error::InvalidAuthToken)
}
