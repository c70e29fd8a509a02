//! Listen address resolution and connection settings.

use std::time::Duration;

use crate::error::Error;

/// Listen address used when neither an argument nor `$PORT` is given.
pub const DEFAULT_ADDR: &str = ":8080";

/// Environment variable consulted for the port when no address is passed.
pub const PORT_ENV: &str = "PORT";

/// Resolves the address [`App::run`](crate::App::run) listens on.
///
/// - no argument: `:$PORT` when `PORT` is set and non-empty, else `:8080`
/// - one argument: used verbatim
/// - more: [`Error::TooManyAddresses`]
pub fn resolve_address(args: &[&str]) -> Result<String, Error> {
    resolve_with(args, std::env::var(PORT_ENV).ok())
}

fn resolve_with(args: &[&str], port: Option<String>) -> Result<String, Error> {
    match args {
        [] => Ok(match port {
            Some(p) if !p.is_empty() => format!(":{p}"),
            _ => DEFAULT_ADDR.to_owned(),
        }),
        [addr] => Ok((*addr).to_owned()),
        _ => Err(Error::TooManyAddresses(args.len())),
    }
}

/// `:8080` means every interface; anything else is passed to the resolver
/// unchanged.
pub(crate) fn bind_target(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_owned()
    }
}

/// Per-connection settings handed to hyper.
#[derive(Clone, Copy, Debug)]
pub struct ServerConfig {
    /// How long a client may take to send the request head.
    pub header_read_timeout: Duration,
    /// HTTP/1.1 keep-alive.
    pub keep_alive: bool,
    /// How long a connection may sit with no request in flight before it
    /// is closed gracefully.
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            header_read_timeout: Duration::from_secs(5),
            keep_alive: true,
            idle_timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_argument_uses_port_or_default() {
        assert_eq!(resolve_with(&[], None).unwrap(), ":8080");
        assert_eq!(resolve_with(&[], Some(String::new())).unwrap(), ":8080");
        assert_eq!(resolve_with(&[], Some("9090".into())).unwrap(), ":9090");
    }

    #[test]
    fn one_argument_is_verbatim() {
        assert_eq!(resolve_with(&["127.0.0.1:3000"], Some("9090".into())).unwrap(), "127.0.0.1:3000");
    }

    #[test]
    fn two_arguments_fail() {
        assert!(matches!(
            resolve_with(&[":1", ":2"], None),
            Err(Error::TooManyAddresses(2)),
        ));
    }

    #[test]
    fn default_timeouts() {
        let config = ServerConfig::default();
        assert_eq!(config.header_read_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(120));
        assert!(config.keep_alive);
    }

    #[test]
    fn bare_port_binds_everywhere() {
        assert_eq!(bind_target(":8080"), "0.0.0.0:8080");
        assert_eq!(bind_target("localhost:8080"), "localhost:8080");
    }
}
