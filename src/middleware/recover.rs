//! Panic boundary.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::handler::Next;
use crate::response::Response;

/// Catches a panic raised anywhere inside the wrapped chain and answers
/// `500 Internal Server Error` instead.
///
/// Without this layer a panicking handler takes down its connection task;
/// the server keeps running either way, but the client gets no response.
/// Register it first so it wraps everything else.
pub fn recover(next: Next) -> Next {
    Next::new(move |ctx: Context| {
        let next = next.clone();
        let method = ctx.method().clone();
        let path = ctx.path().to_owned();
        // The call happens inside the future so a panic while building the
        // inner future is caught too.
        AssertUnwindSafe(async move { next.run(ctx).await })
            .catch_unwind()
            .map(move |outcome| match outcome {
                Ok(res) => res,
                Err(panic) => {
                    error!(%method, %path, panic = panic_message(&*panic), "recovered panic");
                    Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .text("Internal Server Error")
                }
            })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn ctx() -> Context {
        Context::from_request(http::Request::new(bytes::Bytes::new()))
    }

    #[tokio::test]
    async fn panic_becomes_500() {
        let inner = Next::new(|_ctx: Context| async {
            if true {
                panic!("boom");
            }
            StatusCode::OK
        });

        let res = recover(inner).run(ctx()).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), b"Internal Server Error");
    }

    #[tokio::test]
    async fn chain_stays_usable_after_a_panic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let inner = Next::new(move |_ctx: Context| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    panic!("first request fails");
                }
                StatusCode::OK
            }
        });
        let chain = recover(inner);

        assert_eq!(chain.run(ctx()).await.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(chain.run(ctx()).await.status_code(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn synchronous_panic_in_handler_is_caught() {
        let inner = Next::new(|_ctx: Context| -> std::future::Ready<StatusCode> {
            panic!("before the future exists")
        });

        let res = recover(inner).run(ctx()).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn panic_payloads() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*a), "static");
        assert_eq!(panic_message(&*b), "owned");
        assert_eq!(panic_message(&*c), "non-string panic payload");
    }
}
