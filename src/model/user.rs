use crate::db::{DbError, Row};

use super::Key;


/// A WordPress user as seen through this gateway: just the ID and the display
/// name. Only ever created by mapping a row of the users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct User {
    pub(crate) id: Key,
    pub(crate) name: String,
}

impl User {
    pub(crate) fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.get("ID")?,
            name: row.get("display_name")?,
        })
    }
}

/// Result of a successful login.
pub(crate) struct AuthResponse {
    pub(crate) id: Key,
    pub(crate) access_token: String,
}

// The token is a credential, we don't want it to show up in logs.
impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("id", &self.id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}
