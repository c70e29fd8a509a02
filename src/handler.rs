//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! Routes hold handlers of *different* concrete types, and middleware must be
//! able to wrap any of them. Both needs are met by one trait object,
//! `dyn ErasedHandler`, shared behind an `Arc` and exposed as [`Next`].
//!
//! ```text
//! async fn hello(ctx: Context) -> Response { … }   ← user writes this
//!        ↓ app.handle("/", hello)
//! Next::new(hello)                                 ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(hello))                       ← heap-allocated wrapper
//!        ↓  middleware wrap it: m0(m1(…(next)))
//! next.run(ctx)  at request time                   ← one vtable dispatch per layer
//!        ↓
//! Box::pin(async { hello(ctx).await.into_response() })
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future that resolves to a [`Response`].
pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Internal dispatch interface.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: Context) -> BoxFuture;
}

type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any `async fn` or
/// closure with the signature:
///
/// ```text
/// async fn name(ctx: Context) -> impl IntoResponse
/// ```
///
/// `impl IntoResponse` includes `()` for side-effect-only handlers and
/// `Result<T, E>` for handlers that signal failure explicitly.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_next(self) -> Next;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_next(self) -> Next {
        Next(Arc::new(FnHandler(self)))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.into_response() })
    }
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// A type-erased handler: either a route handler or a handler already
/// wrapped by some middleware.
///
/// This is what a [`Middleware`](crate::Middleware) receives and returns.
/// Cloning is one atomic increment.
#[derive(Clone)]
pub struct Next(BoxedHandler);

impl Next {
    pub fn new(handler: impl Handler) -> Self {
        handler.into_next()
    }

    /// Runs the wrapped chain to completion for one request.
    pub fn run(&self, ctx: Context) -> BoxFuture {
        self.0.call(ctx)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::HttpError;

    fn ctx() -> Context {
        Context::from_request(http::Request::new(bytes::Bytes::new()))
    }

    #[tokio::test]
    async fn unit_handler_is_ok() {
        let next = Next::new(|_ctx: Context| async {});
        assert_eq!(next.run(ctx()).await.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn error_handler_is_rendered() {
        async fn fails(_ctx: Context) -> Result<Response, HttpError> {
            Err(HttpError::new(StatusCode::CONFLICT, "taken"))
        }
        let res = Next::new(fails).run(ctx()).await;
        assert_eq!(res.status_code(), StatusCode::CONFLICT);
    }
}
