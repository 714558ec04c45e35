//! Anonymous sign-in.
//!
//! Every sign-in mints a fresh opaque principal (`anon-{uuid}`) and an HS256
//! session token carrying it as `sub`. Verification checks signature and
//! expiry and hands the principal back.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use domains::{AuthError, IdentityProvider, Principal, Session};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// The anonymous principal.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, for audit.
    pub jti: String,
}

pub struct AnonymousAuthProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl AnonymousAuthProvider {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let raw = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(raw),
            decoding: DecodingKey::from_secret(raw),
            ttl,
        }
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "session token rejected");
                AuthError::InvalidToken
            })
    }
}

#[async_trait]
impl IdentityProvider for AnonymousAuthProvider {
    async fn sign_in_anonymously(&self) -> Result<Session, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let principal = Principal::new(format!("anon-{}", Uuid::new_v4().simple()));
        let claims = Claims {
            sub: principal.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| AuthError::SignInFailed(err.to_string()))?;
        tracing::info!(principal = %principal, "anonymous session issued");
        Ok(Session {
            principal,
            token,
            expires_at,
        })
    }

    fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        self.decode_claims(token).map(|claims| Principal::new(claims.sub))
    }
}
