use juniper::{GraphQLInputObject, graphql_object};

use crate::{
    api::{Context, err::ApiResult},
    prelude::*,
};

use super::viewer::Viewer;


#[derive(GraphQLInputObject)]
#[graphql(name = "LoginMutationInput")]
pub(crate) struct LoginInput {
    pub(crate) username: String,
    pub(crate) password: String,
    pub(crate) client_mutation_id: Option<String>,
}

pub(crate) struct LoginPayload {
    access_token: Option<String>,
    viewer: Viewer,
    client_mutation_id: Option<String>,
}

#[graphql_object(Context = Context, name = "LoginMutationPayload")]
impl LoginPayload {
    /// The user's access token
    #[graphql(name = "access_token")]
    fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    fn client_mutation_id(&self) -> Option<&str> {
        self.client_mutation_id.as_deref()
    }
}

impl LoginPayload {
    /// Checks the credentials. A failed login is not an error: the payload
    /// then has no token and the viewer stays whoever made the request.
    pub(crate) async fn login(input: LoginInput, context: &Context) -> ApiResult<Self> {
        let LoginInput { username, password, client_mutation_id } = input;

        let (access_token, user_id) = match context.users.authenticate(&username, &password).await? {
            Some(auth) => (Some(auth.access_token), Some(auth.id)),
            None => {
                debug!("Login attempt by {} failed", context.session.debug_log_user());
                (None, context.session.id)
            }
        };

        Ok(Self {
            access_token,
            viewer: Viewer::new(user_id),
            client_mutation_id,
        })
    }
}
