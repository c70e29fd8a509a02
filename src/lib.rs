//! # httpkit
//!
//! A thin convenience layer over hyper. It is not a router: pattern matching
//! is [`matchit`]'s, connections are hyper's. httpkit adds three things:
//!
//! - a per-request [`Context`] with JSON, query, path-parameter and
//!   request-scoped value helpers
//! - a [`Middleware`] chain with onion ordering, first registered outermost
//! - [`Plugin`]s: named middleware a handler can look up again by name
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use httpkit::{App, Context, HttpError, Response, StatusCode, middleware};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpkit::Error> {
//!     App::new()
//!         .middleware(middleware::recover)
//!         .middleware(middleware::logging)
//!         .handle("GET /hello", hello)
//!         .handle("POST /users", create_user)
//!         .run(&[]) // :$PORT or :8080
//!         .await
//! }
//!
//! async fn hello(ctx: Context) -> Response {
//!     let name = ctx.query("name");
//!     ctx.json(StatusCode::OK, &json!({ "hello": name }))
//! }
//!
//! #[derive(Deserialize)]
//! struct NewUser { name: String }
//!
//! async fn create_user(ctx: Context) -> Result<Response, HttpError> {
//!     let user: NewUser = ctx.decode_json()?;
//!     Ok(ctx.json(StatusCode::CREATED, &json!({ "name": user.name })))
//! }
//! ```
//!
//! ## Registration happens before serving
//!
//! [`App`] is consumed by [`App::run`]; there is no way to register a route
//! or middleware once requests are flowing.

mod app;
mod config;
mod context;
mod error;
mod handler;
mod plugin;
mod response;
mod router;
mod server;

pub mod middleware;

pub use app::App;
pub use config::{DEFAULT_ADDR, PORT_ENV, ServerConfig, resolve_address};
pub use context::Context;
pub use error::{BoxError, DecodeError, Error, HttpError, PluginError};
pub use handler::{BoxFuture, Handler, Next};
pub use middleware::Middleware;
pub use plugin::{Plugin, Plugins};
pub use response::{IntoResponse, Response, ResponseBuilder};

pub use http::StatusCode;
pub use serde_json::{Value, json};
