//! Error types.
//!
//! Two families live here. [`Error`] covers infrastructure failures: binding
//! a port, resolving the listen address. Everything else is about turning a
//! failed request into a response: [`HttpError`] is surfaced to the client
//! verbatim, [`DecodeError`] becomes a 4xx, and any other error collapses
//! into a plain-text 500 that leaks nothing.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::response::{IntoResponse, Response};

/// Boxed error accepted from handlers returning `Result<_, E>`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Infrastructure errors returned by [`App::run`](crate::App::run) and
/// [`App::serve`](crate::App::serve).
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// More than one listen address was passed to `run`.
    #[error("too many listen addresses: expected at most 1, got {0}")]
    TooManyAddresses(usize),
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// An error with an explicit status code, written to the client as
/// `{"code": <int>, "message": <string>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct HttpError {
    pub code: u16,
    pub message: String,
}

impl HttpError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self { code: code.as_u16(), message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// A structured 500 with a fixed message.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }

    /// Status code, falling back to 500 for values outside `100..=999`.
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self) {
            Ok(body) => Response::builder().status(self.status()).json(body),
            Err(_) => Response::status(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

// ── DecodeError ───────────────────────────────────────────────────────────────

/// Failure reading a JSON request body with
/// [`Context::decode_json`](crate::Context::decode_json).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("content-type is not application/json")]
    ContentType,

    #[error("empty request body")]
    EmptyBody,

    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DecodeError> for HttpError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::ContentType => Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string()),
            DecodeError::EmptyBody | DecodeError::Json(_) => Self::bad_request(e.to_string()),
        }
    }
}

// ── PluginError ───────────────────────────────────────────────────────────────

/// Failure looking up a plugin with [`Context::plugin`](crate::Context::plugin).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("plugin {0:?} not found")]
    NotFound(String),

    #[error("plugin {name:?} is not a {expected}")]
    WrongType { name: String, expected: &'static str },
}

/// A missing plugin is a wiring mistake, not something the client did.
impl From<PluginError> for HttpError {
    fn from(e: PluginError) -> Self {
        error!(error = %e, "plugin lookup failed");
        Self::internal()
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Translates any handler error into a response.
pub(crate) fn render(err: BoxError) -> Response {
    let err = match err.downcast::<HttpError>() {
        Ok(http) => return (*http).into_response(),
        Err(other) => other,
    };
    let err = match err.downcast::<DecodeError>() {
        Ok(decode) => return HttpError::from(*decode).into_response(),
        Err(other) => other,
    };
    error!(error = %err, "handler failed");
    internal_error()
}

/// Plain-text 500 for failures that carry no status of their own.
pub(crate) fn internal_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .text("Internal Server Error")
}
