//! Accept loop and graceful shutdown.
//!
//! Each connection gets its own task, tracked in a `JoinSet`. When the
//! shutdown future resolves the loop stops accepting, waits for every
//! in-flight connection to finish, and returns.
//!
//! A handler that panics without the [`recover`](crate::middleware::recover)
//! middleware kills only its own connection task; the loop keeps accepting.
//!
//! A connection with no request in flight for
//! [`ServerConfig::idle_timeout`] is shut down gracefully.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::response::Response;
use crate::router::Router;

pub(crate) async fn serve<F>(
    listener: TcpListener,
    router: Router,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), Error>
where
    F: Future<Output = ()>,
{
    let router = Arc::new(router);

    info!(addr = %listener.local_addr()?, "httpkit listening");

    let mut tasks = tokio::task::JoinSet::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Shutdown first so a signal stops accepting even with a backlog.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let router = Arc::clone(&router);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    let idle = Arc::new(Idle::new());

                    // Called once per request on the connection.
                    let svc = {
                        let idle = Arc::clone(&idle);
                        service_fn(move |req| {
                            let router = Arc::clone(&router);
                            let busy = Busy::start(Arc::clone(&idle));
                            async move {
                                let res = dispatch(router, req).await;
                                drop(busy);
                                Ok::<_, Infallible>(res)
                            }
                        })
                    };

                    let mut builder = ConnBuilder::new(TokioExecutor::new());
                    builder
                        .http1()
                        .timer(TokioTimer::new())
                        .header_read_timeout(config.header_read_timeout)
                        .keep_alive(config.keep_alive);

                    let conn = builder.serve_connection(io, svc);
                    tokio::pin!(conn);
                    let mut closing = false;

                    loop {
                        tokio::select! {
                            res = conn.as_mut() => {
                                if let Err(e) = res {
                                    debug!(peer = %remote_addr, "connection closed: {e}");
                                }
                                break;
                            }
                            () = idle.expired(config.idle_timeout), if !closing => {
                                debug!(peer = %remote_addr, "closing idle connection");
                                closing = true;
                                conn.as_mut().graceful_shutdown();
                            }
                        }
                    }
                });
            }

            // Reap finished connection tasks so the set does not grow without
            // bound. A panicked task surfaces here as a JoinError.
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("connection task failed: {e}");
                }
            }
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("httpkit stopped");
    Ok(())
}

// ── Idle tracking ─────────────────────────────────────────────────────────────

/// Per-connection activity: requests in flight and when the last one ended.
struct Idle {
    epoch: Instant,
    in_flight: AtomicUsize,
    last_active_ms: AtomicU64,
}

impl Idle {
    fn new() -> Self {
        Self { epoch: Instant::now(), in_flight: AtomicUsize::new(0), last_active_ms: AtomicU64::new(0) }
    }

    fn touch(&self) {
        let ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_active_ms.store(ms, Ordering::Release);
    }

    fn last_active(&self) -> Instant {
        self.epoch + Duration::from_millis(self.last_active_ms.load(Ordering::Acquire))
    }

    /// Resolves once nothing has been in flight for `limit`.
    async fn expired(&self, limit: Duration) {
        loop {
            if self.in_flight.load(Ordering::Acquire) > 0 {
                tokio::time::sleep(limit).await;
                continue;
            }
            let deadline = self.last_active() + limit;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}

/// Marks one request in flight until dropped, including on panic.
struct Busy(Arc<Idle>);

impl Busy {
    fn start(idle: Arc<Idle>) -> Self {
        idle.in_flight.fetch_add(1, Ordering::AcqRel);
        idle.touch();
        Self(idle)
    }
}

impl Drop for Busy {
    fn drop(&mut self) {
        self.0.touch();
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads the whole body, then hands the request to the router.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
) -> http::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(path = %parts.uri.path(), "failed to read request body: {e}");
            return Response::status(StatusCode::BAD_REQUEST).into_inner();
        }
    };

    router
        .dispatch(http::Request::from_parts(parts, body))
        .await
        .into_inner()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or Ctrl-C. A handler that cannot be installed is
/// logged and that arm never fires.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn idle_waits_for_in_flight_requests() {
        let idle = Arc::new(Idle::new());
        let limit = Duration::from_millis(50);

        let busy = Busy::start(Arc::clone(&idle));
        let early = tokio::time::timeout(Duration::from_millis(150), idle.expired(limit)).await;
        assert!(early.is_err());

        drop(busy);
        let start = Instant::now();
        tokio::time::timeout(Duration::from_secs(2), idle.expired(limit)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
