//! The application registry.
//!
//! [`App`] collects middleware, plugins and routes, then serves them.
//! Registration composes eagerly: `handle` wraps the handler with the
//! middleware registered *so far* and stores the result. Middleware added
//! afterwards never reaches routes that already exist.
//!
//! `App` is a consuming builder. Once [`run`](App::run) or
//! [`serve`](App::serve) takes it, nothing can be registered any more, so
//! the route table is read-only for the whole life of the server.

use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::config::{self, ServerConfig};
use crate::error::Error;
use crate::handler::{Handler, Next};
use crate::middleware::{self, Middleware};
use crate::plugin::{Plugin, Plugins};
use crate::router::Router;
use crate::server;

/// The application: an ordered middleware list, the registered plugins, and
/// the route table.
///
/// ```rust,no_run
/// use httpkit::{App, Context, Response, StatusCode, middleware};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), httpkit::Error> {
///     App::new()
///         .middleware(middleware::recover)
///         .middleware(middleware::logging)
///         .handle("GET /users/{id}", get_user)
///         .run(&[])
///         .await
/// }
///
/// async fn get_user(ctx: Context) -> Response {
///     ctx.json(StatusCode::OK, &json!({ "id": ctx.param("id") }))
/// }
/// ```
#[derive(Default)]
pub struct App {
    layers: Vec<Arc<dyn Middleware>>,
    plugins: Plugins,
    router: Router,
    config: ServerConfig,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends `m` to the global middleware list. Affects only routes
    /// registered after this call.
    pub fn middleware(mut self, m: impl Middleware) -> Self {
        self.layers.push(Arc::new(m));
        self
    }

    /// Appends the plugin's middleware to the global list and makes the
    /// plugin retrievable by name from routes registered after this call.
    pub fn plugin(mut self, p: impl Plugin) -> Self {
        let layer = self.plugins.push(p);
        self.layers.push(layer);
        self
    }

    /// Registers `handler` for `pattern`, wrapped by every global middleware
    /// registered so far.
    ///
    /// # Panics
    ///
    /// Panics on a malformed or conflicting pattern.
    pub fn handle(self, pattern: &str, handler: impl Handler) -> Self {
        self.handle_with(pattern, handler, Plugins::new())
    }

    /// Like [`handle`](Self::handle), with extra plugins for this route only.
    ///
    /// Route plugins extend the global list: they sit innermost, after all
    /// global middleware, and are visible to [`Context::plugin`](crate::Context::plugin)
    /// on this route alongside the global ones.
    pub fn handle_with(mut self, pattern: &str, handler: impl Handler, plugins: Plugins) -> Self {
        let mut layers = self.layers.clone();
        layers.extend(plugins.middleware());

        let table = self.plugins.chain(&plugins).table();
        let chain = middleware::compose(&layers, Next::new(handler));

        debug!(%pattern, layers = layers.len(), plugins = table.len(), "route registered");
        self.router.insert(pattern, chain, Arc::new(table));
        self
    }

    /// Resolves the listen address, binds, and serves until SIGTERM or
    /// Ctrl-C, then drains in-flight connections.
    ///
    /// `addr` holds zero or one address. Empty means `:$PORT`, falling back
    /// to `:8080`; more than one is [`Error::TooManyAddresses`].
    pub async fn run(self, addr: &[&str]) -> Result<(), Error> {
        let address = config::resolve_address(addr)?;
        let listener = TcpListener::bind(config::bind_target(&address)).await?;
        info!(%address, "address resolved");
        self.serve(listener, server::shutdown_signal()).await
    }

    /// Serves on an existing listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        server::serve(listener, self.router, self.config, shutdown).await
    }
}
