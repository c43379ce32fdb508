use juniper::graphql_object;

use super::{
    Context,
    err::ApiResult,
    model::login::{LoginInput, LoginPayload},
};


/// The root mutation object.
pub(crate) struct Mutation;

#[graphql_object(Context = Context)]
impl Mutation {
    /// Logs in with WordPress credentials. On success, the payload contains
    /// an access token to send as `Authorization: Bearer <token>` header.
    async fn login(input: LoginInput, context: &Context) -> ApiResult<LoginPayload> {
        LoginPayload::login(input, context).await
    }
}
