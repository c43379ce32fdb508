//! API error handling.
//!
//! We define our own error to use for all resolvers. It has `From` impls to be
//! created from other common errors that occur (e.g. DB errors). This module
//! also offers a couple macros to easily create an error.

use juniper::{FieldError, IntoFieldError, ScalarValue, graphql_value};

use crate::{db::DbError, prelude::*};


pub(crate) type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) kind: ApiErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    /// The arguments passed to an endpoint are invalid somehow.
    InvalidInput,

    /// Some server error out of control of the API user.
    InternalServerError,
}

impl ApiErrorKind {
    fn kind_str(&self) -> &str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }

    fn message_prefix(&self) -> &str {
        match self {
            Self::InvalidInput => "Invalid input",
            Self::InternalServerError => "Internal server error",
        }
    }
}

impl From<DbError> for ApiError {
    fn from(src: DbError) -> Self {
        // This is the last point where we know about the error before it's
        // sent to the client, so we log it here.
        error!("{src}");

        let msg = match src {
            DbError::Connection(_) => "database unavailable",
            DbError::Query(_) => "database error",
        };

        Self {
            msg: msg.into(),
            kind: ApiErrorKind::InternalServerError,
        }
    }
}

impl<S: ScalarValue> IntoFieldError<S> for ApiError {
    fn into_field_error(self) -> FieldError<S> {
        let msg = format!("{}: {}", self.kind.message_prefix(), self.msg);
        let ext = graphql_value!({
            "kind": (self.kind.kind_str()),
        });

        FieldError::new(msg, ext)
    }
}


// ===== Helper macros to easily create errors ==================================================

/// Creates an `ApiError` with a `format!` like syntax.
macro_rules! api_err {
    ($kind:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::api::err::ApiError {
            msg: format!($fmt $(, $arg)*),
            kind: $crate::api::err::ApiErrorKind::$kind,
        }
    };
}

macro_rules! invalid_input {
    ($($t:tt)+) => { $crate::api::err::api_err!(InvalidInput, $($t)*) };
}

pub(crate) use api_err;
pub(crate) use invalid_input;
