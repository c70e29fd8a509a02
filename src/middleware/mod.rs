//! Middleware layer.
//!
//! A middleware turns one handler into another. Registered middleware
//! compose as an onion: the first one registered is the outermost, so it
//! sees the request first and the response last.
//!
//! ```text
//! [m0, m1, m2] + h   →   m0(m1(m2(h)))
//!
//! m0 before → m1 before → m2 before → h → m2 after → m1 after → m0 after
//! ```
//!
//! Any `Fn(Next) -> Next` is a middleware:
//!
//! ```rust
//! use httpkit::{Context, Next};
//!
//! fn request_id(next: Next) -> Next {
//!     Next::new(move |mut ctx: Context| {
//!         let next = next.clone();
//!         async move {
//!             ctx.set("request_id", "r-1".to_owned());
//!             next.run(ctx).await
//!         }
//!     })
//! }
//! ```
//!
//! Built-in middleware:
//! - [`logging`] — one `info` event per request with method, path, status, latency
//! - [`recover`] — turns a panicking handler into a `500`

mod logging;
mod recover;

use std::sync::Arc;

use crate::handler::Next;

pub use logging::logging;
pub use recover::recover;

/// Wraps a handler with additional before/after behaviour.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Next) -> Next;
}

impl<F> Middleware for F
where
    F: Fn(Next) -> Next + Send + Sync + 'static,
{
    fn wrap(&self, next: Next) -> Next {
        self(next)
    }
}

/// Composes `layers` around `handler`, `layers[0]` outermost.
///
/// An empty slice returns `handler` unchanged.
pub fn compose(layers: &[Arc<dyn Middleware>], handler: Next) -> Next {
    layers.iter().rev().fold(handler, |next, layer| layer.wrap(next))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http::StatusCode;

    use super::*;
    use crate::Context;

    type Log = Arc<Mutex<Vec<String>>>;

    fn tag(name: &'static str, log: Log) -> Arc<dyn Middleware> {
        Arc::new(move |next: Next| {
            let log = log.clone();
            Next::new(move |ctx: Context| {
                let next = next.clone();
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(format!("{name}:before"));
                    let res = next.run(ctx).await;
                    log.lock().unwrap().push(format!("{name}:after"));
                    res
                }
            })
        })
    }

    fn leaf(log: Log) -> Next {
        Next::new(move |_ctx: Context| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push("handler".to_owned());
                StatusCode::ACCEPTED
            }
        })
    }

    fn ctx() -> Context {
        Context::from_request(http::Request::new(bytes::Bytes::new()))
    }

    #[tokio::test]
    async fn first_layer_is_outermost() {
        let log = Log::default();
        let layers = vec![tag("m0", log.clone()), tag("m1", log.clone()), tag("m2", log.clone())];

        let res = compose(&layers, leaf(log.clone())).run(ctx()).await;

        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(
            *log.lock().unwrap(),
            ["m0:before", "m1:before", "m2:before", "handler", "m2:after", "m1:after", "m0:after"],
        );
    }

    #[tokio::test]
    async fn no_layers_is_identity() {
        let log = Log::default();
        let res = compose(&[], leaf(log.clone())).run(ctx()).await;

        assert_eq!(res.status_code(), StatusCode::ACCEPTED);
        assert_eq!(*log.lock().unwrap(), ["handler"]);
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let log = Log::default();
        let deny: Arc<dyn Middleware> =
            Arc::new(|_next: Next| Next::new(|_ctx: Context| async { StatusCode::FORBIDDEN }));

        let res = compose(&[deny], leaf(log.clone())).run(ctx()).await;

        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert!(log.lock().unwrap().is_empty());
    }
}
