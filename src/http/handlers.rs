use std::{error::Error as StdError, sync::Arc, time::Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::{Method, StatusCode, body::Body};
use juniper::http::{GraphQLBatchRequest, graphiql::graphiql_source};

use crate::{api, auth::Session, prelude::*};
use super::{Context, Request, Response, log, response};


/// Maximum size of an API request body.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// This is the main HTTP entry point, called for each incoming request.
pub(super) async fn handle<B>(req: Request<B>, ctx: Arc<Context>) -> Response
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    log::req::log(&req);
    log::headers::log(&req);

    let method = req.method().clone();
    let path = req.uri().path().trim_end_matches('/').to_owned();

    match path.as_str() {
        // The GraphQL endpoint, also available at the root.
        "" | "/graphql" if method == Method::POST => handle_api(req, &ctx).await,

        // The interactive GraphQL IDE. It does not expose any information that
        // isn't already exposed by the API itself.
        "" | "/graphiql" if method == Method::GET || method == Method::HEAD => {
            if ctx.config.graphiql {
                response::html(graphiql_source("/graphql", None))
            } else {
                response::not_found()
            }
        }

        "" => response::method_not_allowed("GET, HEAD, POST"),
        "/graphql" => response::method_not_allowed("POST"),
        "/graphiql" => response::method_not_allowed("GET, HEAD"),

        _ => {
            debug!("Responding with 404 to {method:?} '{path}'");
            response::not_found()
        }
    }
}

/// Handles a GraphQL request.
async fn handle_api<B>(req: Request<B>, ctx: &Context) -> Response
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let before = Instant::now();

    // Requests without credentials are fine, but invalid credentials are not
    // silently ignored.
    let session = match Session::from_headers(req.headers(), &ctx.jwt) {
        Ok(session) => session,
        Err(e) => {
            debug!("Rejecting API request: {e}");
            return response::unauthorized();
        }
    };
    trace!("Session: {}", session.debug_log_user());

    let body = match Limited::new(req.into_body(), MAX_BODY_SIZE).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => return response::payload_too_large(),
        Err(e) => {
            warn!("Failed to read request body: {e}");
            return response::bad_request("failed to read request body");
        }
    };

    let gql_request = match serde_json::from_slice::<GraphQLBatchRequest>(&body) {
        Ok(r) => r,
        Err(e) => return response::bad_request(format!("invalid GraphQL request: {e}")),
    };

    let api_context = api::Context {
        users: Arc::clone(&ctx.users),
        session,
    };
    let gql_response = gql_request.execute(&ctx.api_root, &api_context).await;
    let status = if gql_response.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };

    let json = if ctx.config.pretty {
        serde_json::to_vec_pretty(&gql_response)
    } else {
        serde_json::to_vec(&gql_response)
    };
    let out = match json {
        Ok(json) => response::json(status, json),
        Err(e) => {
            error!("Failed to serialize GraphQL response: {e}");
            response::internal_server_error()
        }
    };

    debug!("Finished GraphQL request in {:.2?}", before.elapsed());
    out
}
