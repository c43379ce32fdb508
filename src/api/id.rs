use juniper::{GraphQLScalar, InputValue, ScalarValue};
use paste::paste;
use static_assertions::const_assert;
use std::fmt;

use crate::model::Key;


/// An opaque, globally-unique identifier for all "nodes" that the GraphQL API
/// might return.
///
/// Clients should treat it as opaque, but internally it consists of a two
/// character prefix saying what kind of thing it refers to, followed by the
/// database key encoded as 11 base64 digits. So a user ID looks like
/// `usAAAAAAAAAAB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLScalar)]
#[graphql(
    name = "ID",
    description = "An opaque, globally-unique identifier",
    parse_token(String),
)]
pub(crate) struct Id {
    /// The kind of node, e.g. `b"us"` for users.
    kind: [u8; 2],

    /// Refers to one object of the class of objects defined by `kind`.
    /// Private, use [`Self::key_for`] to get to it.
    key: Key,
}


// Defines a list of "kinds", each with a two alphanumeric ASCII character
// prefix. Creates an associated const and constructor function on `Id` for
// each kind.
macro_rules! define_kinds {
    ($($name:ident = $val:literal ,)+) => {
        paste!(
            impl Id {
                $(
                    pub(crate) const [<$name:upper _KIND>]: [u8; 2] = *$val;

                    pub(crate) fn $name(key: Key) -> Self {
                        Self {
                            kind: Self:: [<$name:upper _KIND>],
                            key,
                        }
                    }
                )+
            }
        );

        $(
            const_assert!($val[0].is_ascii_alphanumeric());
            const_assert!($val[1].is_ascii_alphanumeric());
        )+

        // Duplicate prefixes result in duplicate discriminants.
        #[allow(non_camel_case_types)]
        #[repr(u16)]
        enum _KindChecker {
            $( $name = u16::from_ne_bytes(*$val), )+
        }
    };
}

// If you get a strange error:
// - "discriminant value `...` already exists": you added a duplicate prefix.
// - "evaluation of constant value failed": you added a prefix that's not
//   alphanumeric ASCII.
define_kinds![
    user = b"us",
    viewer = b"vi",
];


impl Id {
    const INVALID_KIND: [u8; 2] = *b"!!";

    /// An ID that refers to nothing. Malformed IDs are parsed as this, so
    /// that the API answers "no such node" instead of reporting a syntax
    /// error, keeping IDs opaque.
    fn invalid() -> Self {
        Self {
            kind: Self::INVALID_KIND,
            key: Key(0),
        }
    }

    /// Returns the key of this ID if its kind is `expected_kind`.
    pub(crate) fn key_for(&self, expected_kind: [u8; 2]) -> Option<Key> {
        if self.kind == expected_kind {
            Some(self.key)
        } else {
            None
        }
    }

    fn to_output<S: ScalarValue>(&self) -> juniper::Value<S> {
        juniper::Value::scalar(self.to_string())
    }

    fn from_input<S: ScalarValue>(input: &InputValue<S>) -> Result<Self, String> {
        let s = input.as_string_value().ok_or("expected string")?;
        Ok(s.parse().unwrap_or(Self::invalid()))
    }
}

impl std::str::FromStr for Id {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 13 {
            return Err("invalid length");
        }

        let bytes = s.as_bytes();
        let kind = [bytes[0], bytes[1]];
        let key = s.get(2..)
            .and_then(Key::from_base64)
            .ok_or("invalid base64")?;

        Ok(Self { kind, key })
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut key = [b' '; 11];
        let key = self.key.to_base64(&mut key);

        f.write_str(std::str::from_utf8(&self.kind).map_err(|_| fmt::Error)?)?;
        f.write_str(key)
    }
}
