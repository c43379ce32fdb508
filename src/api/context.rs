use std::sync::Arc;

use crate::{auth::Session, users::UserStore};


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) session: Session,
}

impl juniper::Context for Context {}
