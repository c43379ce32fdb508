//! Items that define the domain data model.
//!
//! These types are produced by the repository layer (`crate::users`) and
//! exposed via the API. They are read projections of rows in the WordPress
//! users table and are never written back.

mod key;
mod user;

pub(crate) use self::{
    key::Key,
    user::{AuthResponse, User},
};
