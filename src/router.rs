//! Route table.
//!
//! Pattern matching belongs to [`matchit`]: one radix tree per method plus
//! one for method-less patterns. This module only picks the tree and turns
//! a match into a [`Context`].
//!
//! | Pattern             | Matches                                  |
//! |---------------------|------------------------------------------|
//! | `/users`            | any method, exactly `/users`             |
//! | `GET /users/{id}`   | `GET` only, `{id}` captured              |
//! | `/static/{*path}`   | any method, rest of the path captured    |
//!
//! `HEAD` falls back to the `GET` routes when nothing is registered for it.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::handler::Next;
use crate::plugin::PluginTable;
use crate::response::Response;

#[derive(Clone)]
struct Route {
    handler: Next,
    plugins: Arc<PluginTable>,
}

#[derive(Default)]
pub(crate) struct Router {
    by_method: HashMap<Method, MatchitRouter<Route>>,
    any: MatchitRouter<Route>,
}

enum Lookup {
    Found(Route, HashMap<String, String>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Router {
    /// Registers an already-wrapped handler.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern or a pattern that conflicts with one
    /// registered earlier. Both are programmer errors caught at startup.
    pub(crate) fn insert(&mut self, pattern: &str, handler: Next, plugins: Arc<PluginTable>) {
        let (method, path) = split_pattern(pattern);
        let tree = match method {
            Some(m) => self.by_method.entry(m).or_default(),
            None => &mut self.any,
        };
        tree.insert(path, Route { handler, plugins })
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
    }

    fn lookup(&self, method: &Method, path: &str) -> Lookup {
        let matched = self.by_method.get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())
            .or_else(|| {
                if *method != Method::HEAD {
                    return None;
                }
                self.by_method.get(&Method::GET)?.at(path).ok()
            });

        if let Some(m) = matched {
            let params = m.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(m.value.clone(), params);
        }

        let mut allowed: Vec<Method> = self.by_method.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return Lookup::NotFound;
        }
        if allowed.contains(&Method::GET) && !allowed.contains(&Method::HEAD) {
            allowed.push(Method::HEAD);
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Lookup::MethodNotAllowed(allowed)
    }

    /// Routes one request and runs its chain. A fresh [`Context`] is built
    /// for every matched request.
    pub(crate) async fn dispatch(&self, req: http::Request<Bytes>) -> Response {
        match self.lookup(req.method(), req.uri().path()) {
            Lookup::Found(route, params) => {
                route.handler.run(Context::new(req, params, route.plugins)).await
            }
            Lookup::MethodNotAllowed(allowed) => {
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                Response::builder()
                    .status(StatusCode::METHOD_NOT_ALLOWED)
                    .header("allow", &allow)
                    .text("Method Not Allowed")
            }
            Lookup::NotFound => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .text("404 page not found"),
        }
    }
}

/// `"GET /users"` → `(Some(GET), "/users")`, `"/users"` → `(None, "/users")`.
///
/// # Panics
///
/// Panics when the leading token is not a valid method name.
fn split_pattern(pattern: &str) -> (Option<Method>, &str) {
    match pattern.split_once(' ') {
        Some((method, path)) if !method.is_empty() => {
            let method = Method::from_bytes(method.as_bytes())
                .unwrap_or_else(|_| panic!("invalid route `{pattern}`: bad method"));
            (Some(method), path.trim_start())
        }
        _ => (None, pattern),
    }
}
