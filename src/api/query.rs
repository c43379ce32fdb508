use juniper::graphql_object;

use crate::{model::User, prelude::*};

use super::{
    Context,
    Cursor,
    Id,
    NodeValue,
    common::ConnectionArgs,
    err::ApiResult,
    model::{user::UserConnection, viewer::Viewer},
};


/// The root query object.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    /// Retrieve a node by globally unique ID. Mostly useful for relay.
    async fn node(id: Id, context: &Context) -> ApiResult<Option<NodeValue>> {
        // Users are the only nodes so far.
        User::load_by_id(id, context).await?
            .map(NodeValue::from)
            .pipe(Ok)
    }

    /// The person using the API.
    fn viewer(context: &Context) -> Viewer {
        Viewer::new(context.session.id)
    }

    /// All users, in the order they are stored in.
    async fn users(
        first: Option<i32>,
        after: Option<Cursor>,
        last: Option<i32>,
        before: Option<Cursor>,
        context: &Context,
    ) -> ApiResult<UserConnection> {
        let args = ConnectionArgs { first, after, last, before };
        UserConnection::load(args, context).await
    }
}
