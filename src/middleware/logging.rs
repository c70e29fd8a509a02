//! Per-request access log.

use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::handler::Next;

/// Emits one `info` event per request once the inner chain returns:
/// method, path, response status, and wall-clock time spent inside.
///
/// Purely observational; the response passes through untouched.
pub fn logging(next: Next) -> Next {
    Next::new(move |ctx: Context| {
        let next = next.clone();
        let method = ctx.method().clone();
        let path = ctx.path().to_owned();
        async move {
            let start = Instant::now();
            let res = next.run(ctx).await;
            info!(
                %method,
                %path,
                status = res.status_code().as_u16(),
                elapsed = ?start.elapsed(),
                "request"
            );
            res
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use http::StatusCode;

    use super::*;

    /// Collects everything the subscriber writes.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    fn delete_user() -> Context {
        let req = http::Request::builder()
            .method("DELETE")
            .uri("/users/7")
            .body(bytes::Bytes::new())
            .unwrap();
        Context::from_request(req)
    }

    #[tokio::test]
    async fn response_passes_through() {
        let inner = Next::new(|_ctx: Context| async { StatusCode::IM_A_TEAPOT });
        let res = logging(inner).run(delete_user()).await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
    }

    #[test]
    fn access_line_carries_method_path_status_and_elapsed() {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let inner = Next::new(|_ctx: Context| async { StatusCode::IM_A_TEAPOT });
            futures::executor::block_on(logging(inner).run(delete_user()));
        });

        let line = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(line.contains("DELETE"), "{line}");
        assert!(line.contains("/users/7"), "{line}");
        assert!(line.contains("status=418"), "{line}");
        assert!(line.contains("elapsed="), "{line}");
    }
}
