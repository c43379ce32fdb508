//! The HTTP server, handler and routes.
//!
//! This file itself contains fairly little business logic and just sets up the
//! `hyper` server and catches errors. The main logic is in `handlers.rs`.

use std::{
    convert::Infallible,
    future::Future,
    net::{IpAddr, SocketAddr},
    panic::AssertUnwindSafe,
    pin::pin,
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::{conn::auto, graceful::GracefulShutdown},
};
use tokio::net::TcpListener;

use crate::{api, auth::JwtContext, prelude::*, users::UserStore};
use self::handlers::handle;


mod handlers;
mod log;
mod response;


/// HTTP server configuration.
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct HttpConfig {
    /// The TCP port the HTTP server should listen on.
    #[config(default = 8080)]
    pub(crate) port: u16,

    /// The bind address to listen on.
    #[config(default = "127.0.0.1")]
    pub(crate) address: IpAddr,

    /// Whether to serve the GraphiQL IDE on `GET /` and `GET /graphiql`.
    #[config(default = true)]
    pub(crate) graphiql: bool,

    /// Whether to pretty print JSON responses of the API.
    #[config(default = true)]
    pub(crate) pretty: bool,
}


pub(crate) type ByteBody = Full<Bytes>;
type Response<T = ByteBody> = hyper::Response<T>;
type Request<T = hyper::body::Incoming> = hyper::Request<T>;


/// Context that the request handler has access to.
pub(crate) struct Context {
    pub(crate) api_root: api::RootNode,
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) jwt: Arc<JwtContext>,
    pub(crate) config: HttpConfig,
}


/// Starts the HTTP server and runs it until Ctrl+C is pressed.
pub(crate) async fn serve(ctx: Context) -> Result<()> {
    let addr = SocketAddr::new(ctx.config.address, ctx.config.port);
    let ctx = Arc::new(ctx);

    let listener = TcpListener::bind(addr).await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("Listening on http://{}", listener.local_addr().unwrap_or(addr));

    let builder = auto::Builder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut shutdown = pin!(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            conn = listener.accept() => {
                let (stream, peer) = match conn {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept TCP connection: {e}");
                        continue;
                    }
                };
                trace!("Accepted connection from {peer}");

                let ctx = Arc::clone(&ctx);
                let service = service_fn(move |req| {
                    handle_internal_errors(handle(req, Arc::clone(&ctx)))
                });
                let conn = builder.serve_connection(TokioIo::new(stream), service);
                let conn = graceful.watch(conn.into_owned());
                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        debug!("Error serving connection from {peer}: {e}");
                    }
                });
            }

            res = &mut shutdown => {
                if let Err(e) = res {
                    error!("Failed to listen for Ctrl+C: {e}");
                }
                info!("Shutting down HTTP server");
                break;
            }
        }
    }

    tokio::select! {
        _ = graceful.shutdown() => debug!("All connections closed"),
        _ = tokio::time::sleep(Duration::from_secs(10)) => {
            warn!("Timed out waiting for open connections to close");
        }
    }

    Ok(())
}

/// This just wraps another future and catches all panics that might occur when
/// resolving/polling that given future. This ensures that we always answer with
/// `500` instead of just crashing the thread and closing the connection.
async fn handle_internal_errors(
    future: impl Future<Output = Response>,
) -> Result<Response, Infallible> {
    // The `AssertUnwindSafe` says: if the future panics, the remaining
    // application state is not broken. The DB pool returns leased
    // connections on drop, so that holds.
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(response) => Ok(response),
        Err(panic) => {
            // For most panics (which use `panic!` like `println!`), this is
            // either `&str` or `String`.
            let msg = panic.downcast_ref::<String>()
                .map(|s| s.as_str())
                .or(panic.downcast_ref::<&str>().copied());

            match msg {
                Some(msg) => error!("INTERNAL SERVER ERROR: HTTP handler panicked: '{msg}'"),
                None => error!("INTERNAL SERVER ERROR: HTTP handler panicked"),
            }

            Ok(response::internal_server_error())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::{handle_internal_errors, response};
    use hyper::StatusCode;

    #[tokio::test]
    async fn panics_become_500() {
        let res = handle_internal_errors(async {
            if true {
                panic!("oh no");
            }
            response::not_found()
        }).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
