use std::time::Duration;

use aws_lc_rs::hmac;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::{model::Key, prelude::*};

use super::AuthConfig;


/// The only signing algorithm we support. Tokens are only ever verified by
/// us, so there is no need for asymmetric keys.
const ALGORITHM: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

/// The payload of our access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Claims {
    /// ID of the user this token was issued to.
    pub(crate) id: Key,

    /// Issued at, as UNIX timestamp.
    pub(crate) iat: i64,

    /// Expiration time, as UNIX timestamp. Tokens without `exp` never expire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) exp: Option<i64>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum JwtError {
    #[error("token is not a well-formed JWT")]
    Malformed,
    #[error("token uses unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
}

/// Signs and verifies access tokens. Created once at startup.
pub(crate) struct JwtContext {
    key: hmac::Key,
    lifetime: Option<Duration>,
}

impl JwtContext {
    pub(crate) fn new(config: &AuthConfig) -> Self {
        Self::from_secret(
            config.jwt_secret.expose_secret().as_bytes(),
            Some(config.token_lifetime).filter(|d| !d.is_zero()),
        )
    }

    pub(crate) fn from_secret(secret: &[u8], lifetime: Option<Duration>) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            lifetime,
        }
    }

    /// Creates a new token for the given user.
    pub(crate) fn sign(&self, id: Key) -> String {
        self.sign_at(id, Utc::now())
    }

    fn sign_at(&self, id: Key, now: DateTime<Utc>) -> String {
        let exp = self.lifetime.map(|lifetime| {
            let lifetime = chrono::Duration::from_std(lifetime)
                .unwrap_or(chrono::Duration::MAX);
            now.checked_add_signed(lifetime).unwrap_or(DateTime::<Utc>::MAX_UTC).timestamp()
        });

        self.encode(&Claims { id, iat: now.timestamp(), exp })
    }

    fn encode(&self, claims: &Claims) -> String {
        let header = Header { alg: ALGORITHM, typ: "JWT" };

        let mut jwt = String::new();
        let header_json = serde_json::to_vec(&header).expect("failed to serialize JWT header");
        let claims_json = serde_json::to_vec(claims).expect("failed to serialize JWT claims");
        URL_SAFE_NO_PAD.encode_string(header_json, &mut jwt);
        jwt.push('.');
        URL_SAFE_NO_PAD.encode_string(claims_json, &mut jwt);

        let signature = hmac::sign(&self.key, jwt.as_bytes());
        jwt.push('.');
        URL_SAFE_NO_PAD.encode_string(signature.as_ref(), &mut jwt);

        jwt
    }

    /// Checks the signature and expiration of the given token and returns its
    /// claims.
    pub(crate) fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        let (message, signature) = token.rsplit_once('.').ok_or(JwtError::Malformed)?;
        let (header, claims) = message.split_once('.').ok_or(JwtError::Malformed)?;

        let header = URL_SAFE_NO_PAD.decode(header).map_err(|_| JwtError::Malformed)?;
        let header = serde_json::from_slice::<Header>(&header).map_err(|_| JwtError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(JwtError::UnsupportedAlgorithm);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| JwtError::Malformed)?;
        hmac::verify(&self.key, message.as_bytes(), &signature)
            .map_err(|_| JwtError::InvalidSignature)?;

        let claims = URL_SAFE_NO_PAD.decode(claims).map_err(|_| JwtError::Malformed)?;
        let claims = serde_json::from_slice::<Claims>(&claims).map_err(|_| JwtError::Malformed)?;
        if claims.exp.is_some_and(|exp| exp <= now.timestamp()) {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}
