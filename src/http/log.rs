//! This module contains a bunch of small inline modules to make it possible to
//! easily filter out individual log messages with our filter system.

use hyper::Request;
use crate::prelude::*;

pub(crate) mod req {
    use super::*;

    pub(crate) fn log<B>(req: &Request<B>) {
        trace!(
            method = ?req.method(),
            path = req.uri().path_and_query().map_or("", |pq| pq.as_str()),
            "Incoming HTTP request",
        );
    }
}

pub(crate) mod headers {
    use super::*;

    /// Logs all headers, except for the value of `Authorization`.
    pub(crate) fn log<B>(req: &Request<B>) {
        if tracing::enabled!(tracing::Level::TRACE) {
            let mut out = String::new();
            for (name, value) in req.headers() {
                use std::fmt::Write;
                let value = if name == hyper::header::AUTHORIZATION {
                    "<redacted>".into()
                } else {
                    String::from_utf8_lossy(value.as_bytes())
                };
                let _ = write!(out, "\n  {name}: {value}");
            }
            trace!("HTTP Headers: {out}");
        }
    }
}
