use juniper::graphql_object;

use crate::{
    api::{Context, Id, err::ApiResult},
    model::{Key, User},
};


/// The person using the API. Anonymous unless the request carries a valid
/// token, or a login in the same request succeeded.
pub(crate) struct Viewer {
    user_id: Option<Key>,
}

impl Viewer {
    pub(crate) fn new(user_id: Option<Key>) -> Self {
        Self { user_id }
    }
}

/// Whoever is sending the current request.
#[graphql_object(Context = Context)]
impl Viewer {
    /// The viewer is a singleton, so this is always the same ID.
    fn id(&self) -> Id {
        Id::viewer(Key(0))
    }

    /// The logged in user, or `null` for anonymous viewers.
    async fn user(&self, context: &Context) -> ApiResult<Option<User>> {
        match self.user_id {
            None => Ok(None),
            Some(id) => Ok(context.users.get_user(&id.to_string()).await?),
        }
    }
}
