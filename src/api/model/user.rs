use juniper::graphql_object;

use crate::{
    api::{
        Context, Cursor, Id, NodeValue, PageInfo,
        common::{ConnectionArgs, Page},
        err::ApiResult,
    },
    model::User,
};


/// A person who uses our app
#[graphql_object(Context = Context, impl = NodeValue)]
impl User {
    fn id(&self) -> Id {
        Id::user(self.id)
    }

    /// A person's name
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

impl User {
    pub(crate) async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let Some(key) = id.key_for(Id::USER_KIND) else {
            return Ok(None);
        };

        Ok(context.users.get_user(&key.to_string()).await?)
    }
}

/// A connection to a list of users.
#[derive(juniper::GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct UserConnection {
    /// Information to aid in pagination.
    pub(crate) page_info: PageInfo,

    /// A list of edges.
    pub(crate) edges: Vec<UserEdge>,
}

/// An edge in a connection.
#[derive(juniper::GraphQLObject)]
#[graphql(Context = Context)]
pub(crate) struct UserEdge {
    /// The item at the end of the edge.
    pub(crate) node: User,

    /// A cursor for use in pagination.
    pub(crate) cursor: Cursor,
}

impl UserConnection {
    pub(crate) async fn load(args: ConnectionArgs, context: &Context) -> ApiResult<Self> {
        args.validate()?;
        let users = context.users.list_users().await?;
        let page = Page::from_vec(users, args);

        Ok(Self {
            page_info: page.page_info,
            edges: page.edges.into_iter()
                .map(|(cursor, node)| UserEdge { node, cursor })
                .collect(),
        })
    }
}
