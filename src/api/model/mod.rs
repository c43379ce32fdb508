pub(crate) mod login;
pub(crate) mod user;
pub(crate) mod viewer;
