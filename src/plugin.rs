//! Named, retrievable middleware.
//!
//! A [`Plugin`] is a middleware with a name. Registering one does two
//! things: its middleware joins the chain, and the plugin value itself
//! becomes retrievable from every request handled by that chain via
//! [`Context::plugin`](crate::Context::plugin).
//!
//! Name → instance tables are built once per route at registration time, so
//! a request never pays for more than a hash lookup and a downcast.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::middleware::Middleware;

/// A named capability exposing one middleware.
///
/// ```rust
/// use httpkit::{Middleware, Next, Plugin};
///
/// struct Greeter { greeting: String }
///
/// impl Middleware for Greeter {
///     fn wrap(&self, next: Next) -> Next { next }
/// }
///
/// impl Plugin for Greeter {
///     fn name(&self) -> &str { "greeter" }
/// }
/// ```
pub trait Plugin: Middleware {
    fn name(&self) -> &str;
}

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Name → plugin instance, shared by every request on one route.
pub(crate) type PluginTable = HashMap<String, Instance>;

#[derive(Clone)]
struct Entry {
    name: String,
    middleware: Arc<dyn Middleware>,
    instance: Instance,
}

/// An ordered set of plugins.
///
/// Used for per-route plugins with
/// [`App::handle_with`](crate::App::handle_with):
///
/// ```rust,ignore
/// app.handle_with("GET /admin", dashboard, Plugins::new().with(Auth::new()));
/// ```
#[derive(Clone, Default)]
pub struct Plugins {
    entries: Vec<Entry>,
}

impl Plugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, plugin: impl Plugin) -> Self {
        self.push(plugin);
        self
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Adds `plugin` and returns its middleware.
    ///
    /// A duplicate name keeps both middleware in the chain; lookup resolves
    /// to the one added last.
    pub(crate) fn push<P: Plugin>(&mut self, plugin: P) -> Arc<dyn Middleware> {
        let name = plugin.name().to_owned();
        if self.entries.iter().any(|e| e.name == name) {
            warn!(plugin = %name, "duplicate plugin name, lookup resolves to the latest");
        }
        let plugin = Arc::new(plugin);
        let middleware: Arc<dyn Middleware> = plugin.clone();
        self.entries.push(Entry { name, middleware: middleware.clone(), instance: plugin });
        middleware
    }

    pub(crate) fn middleware(&self) -> impl Iterator<Item = Arc<dyn Middleware>> + '_ {
        self.entries.iter().map(|e| Arc::clone(&e.middleware))
    }

    /// `self` followed by `other`.
    pub(crate) fn chain(&self, other: &Plugins) -> Plugins {
        let mut entries = self.entries.clone();
        entries.extend(other.entries.iter().cloned());
        Plugins { entries }
    }

    pub(crate) fn table(&self) -> PluginTable {
        self.entries.iter()
            .map(|e| (e.name.clone(), Arc::clone(&e.instance)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Next;

    struct Named(&'static str, u32);

    impl Middleware for Named {
        fn wrap(&self, next: Next) -> Next { next }
    }

    impl Plugin for Named {
        fn name(&self) -> &str { self.0 }
    }

    #[test]
    fn last_registered_wins_lookup() {
        let plugins = Plugins::new().with(Named("auth", 1)).with(Named("auth", 2));

        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins.middleware().count(), 2);

        let table = plugins.table();
        assert_eq!(table.len(), 1);
        assert_eq!(table["auth"].downcast_ref::<Named>().map(|p| p.1), Some(2));
    }

    #[test]
    fn chain_keeps_order() {
        let global = Plugins::new().with(Named("a", 0));
        let route = Plugins::new().with(Named("b", 0));
        let all = global.chain(&route);

        let names: Vec<_> = all.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(global.len() == 1 && route.len() == 1);
    }
}
