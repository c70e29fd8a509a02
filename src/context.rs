//! Per-request context.
//!
//! One [`Context`] is built for every matched request, after routing and
//! after the body has been read, and is moved through the middleware chain
//! into the handler. It is never shared between requests.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::error::{self, BoxError, DecodeError, PluginError};
use crate::plugin::PluginTable;
use crate::response::Response;

/// The request handle passed to every handler and middleware.
pub struct Context {
    parts: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
    plugins: Arc<PluginTable>,
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub(crate) fn new(
        req: http::Request<Bytes>,
        params: HashMap<String, String>,
        plugins: Arc<PluginTable>,
    ) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body, params, plugins, values: HashMap::new() }
    }

    /// Builds a context outside the server: no path parameters, no plugins.
    /// Handy for exercising a handler directly.
    pub fn from_request(req: http::Request<Bytes>) -> Self {
        Self::new(req, HashMap::new(), Arc::default())
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header value as a string; `None` when absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name)?.to_str().ok()
    }

    // ── Request data ──────────────────────────────────────────────────────────

    /// First value of query parameter `key`, percent-decoded, or `""`.
    ///
    /// `/search?q=foo&q=bar` → `query("q") == "foo"`.
    pub fn query(&self, key: &str) -> String {
        let Some(raw) = self.parts.uri.query() else { return String::new() };
        url::form_urlencoded::parse(raw.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default()
    }

    /// Path variable captured by the route pattern, or `""` when the pattern
    /// has no variable of that name.
    ///
    /// Pattern `/users/{id}` on `/users/42` → `param("id") == "42"`.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }

    /// Decodes the JSON body into `T`.
    ///
    /// The content type is checked first, then emptiness, then the JSON
    /// itself. Every failure converts into a 4xx [`HttpError`](crate::HttpError).
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let is_json = self.header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/json"));
        if !is_json {
            return Err(DecodeError::ContentType);
        }
        if self.body.is_empty() {
            return Err(DecodeError::EmptyBody);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    // ── Request-scoped values ─────────────────────────────────────────────────

    /// Stores a value for downstream middleware and the handler.
    /// An existing value under `key` is replaced.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    pub fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)> {
        self.values.get(key).map(|v| &**v)
    }

    /// Value under `key` if it is a `T`; otherwise `T::default()`.
    ///
    /// Absence and type mismatch are deliberately indistinguishable here.
    /// Use [`get`](Self::get) when the difference matters.
    pub fn get_typed<T: Any + Clone + Default>(&self, key: &str) -> T {
        self.get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_string(&self, key: &str) -> String { self.get_typed(key) }
    pub fn get_int(&self, key: &str) -> i64 { self.get_typed(key) }
    pub fn get_uint(&self, key: &str) -> u64 { self.get_typed(key) }
    pub fn get_float(&self, key: &str) -> f64 { self.get_typed(key) }
    pub fn get_bool(&self, key: &str) -> bool { self.get_typed(key) }
    pub fn get_duration(&self, key: &str) -> Duration { self.get_typed(key) }
    pub fn get_strings(&self, key: &str) -> Vec<String> { self.get_typed(key) }

    // ── Plugins ───────────────────────────────────────────────────────────────

    /// Plugin registered under `name`, if it is a `T`.
    ///
    /// ```rust,ignore
    /// let auth = ctx.plugin::<Auth>("auth")?;
    /// ```
    pub fn plugin<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, PluginError> {
        let instance = self.plugins.get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_owned()))?;
        Arc::clone(instance)
            .downcast::<T>()
            .map_err(|_| PluginError::WrongType {
                name: name.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    // ── Responses ─────────────────────────────────────────────────────────────

    /// Serialises `value` as the `application/json` body with status `code`.
    ///
    /// A value that fails to serialise yields the plain-text 500.
    pub fn json<T: Serialize + ?Sized>(&self, code: StatusCode, value: &T) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => Response::builder().status(code).json(body),
            Err(e) => {
                error!(error = %e, path = %self.path(), "failed to serialise response");
                error::internal_error()
            }
        }
    }

    /// Translates `err` into an error response.
    ///
    /// [`HttpError`](crate::HttpError) keeps its code and message as JSON.
    /// Decode errors become their 4xx. Anything else is a plain-text `500 Internal Server Error`;
    /// details are logged, never sent.
    pub fn error(&self, err: impl Into<BoxError>) -> Response {
        error::render(err.into())
    }
}
