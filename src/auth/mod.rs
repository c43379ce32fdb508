use std::time::Duration;

use hyper::{HeaderMap, header};
use secrecy::{ExposeSecret, SecretString};

use crate::{model::Key, prelude::*};


pub(crate) mod password;
mod jwt;

pub(crate) use self::jwt::{JwtContext, JwtError};


/// Authentication
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct AuthConfig {
    /// The shared secret used to sign and verify access tokens (HS256). Should
    /// be long and random, e.g. the output of `openssl rand -base64 48`. Can
    /// also be set via the `WPGATE_JWT_SECRET` environment variable.
    ///
    /// Changing this secret invalidates all previously issued tokens.
    #[config(env = "WPGATE_JWT_SECRET")]
    pub(crate) jwt_secret: SecretString,

    /// How long access tokens are valid after being issued. "0" means tokens
    /// never expire.
    #[config(default = "0", deserialize_with = crate::config::deserialize_duration)]
    pub(crate) token_lifetime: Duration,
}

impl AuthConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        let len = self.jwt_secret.expose_secret().len();
        if len == 0 {
            bail!("`auth.jwt_secret` must not be empty");
        }
        if len < 32 {
            warn!("`auth.jwt_secret` is only {len} bytes long. Consider using a longer secret.");
        }

        Ok(())
    }
}


/// Who is talking to us. Decoded from the `Authorization` header of every
/// API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Session {
    /// The user the bearer token was issued to, or `None` for anonymous
    /// requests.
    pub(crate) id: Option<Key>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SessionError {
    #[error("'Authorization' header is not of the form 'Bearer <token>'")]
    InvalidHeader,
    #[error(transparent)]
    InvalidToken(#[from] JwtError),
}

impl Session {
    pub(crate) fn anonymous() -> Self {
        Self { id: None }
    }

    /// Requests without `Authorization` header are anonymous. If the header
    /// is present, it has to contain a valid bearer token.
    pub(crate) fn from_headers(
        headers: &HeaderMap,
        jwt: &JwtContext,
    ) -> Result<Self, SessionError> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(Self::anonymous());
        };

        let token = value.to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::InvalidHeader)?;

        let claims = jwt.verify(token)?;
        Ok(Self { id: Some(claims.id) })
    }

    /// Returns a representation useful for logging.
    pub(crate) fn debug_log_user(&self) -> String {
        match self.id {
            None => "anonymous".into(),
            Some(id) => format!("user {id}"),
        }
    }
}
