//! Minimal httpkit example — JSON endpoints, a plugin, and panic recovery.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8080/users/42
//!   curl 'http://localhost:8080/search?q=rust&q=ignored'
//!   curl -X POST http://localhost:8080/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -H 'x-api-key: secret' http://localhost:8080/admin
//!   curl http://localhost:8080/panic

use httpkit::{
    App, Context, HttpError, Middleware, Next, Plugin, Plugins, Response, StatusCode, json,
    middleware,
};
use serde::{Deserialize, Serialize};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = App::new()
        .middleware(middleware::recover)
        .middleware(middleware::logging)
        .handle("GET /users/{id}", get_user)
        .handle("POST /users", create_user)
        .handle("GET /search", search)
        .handle("GET /panic", boom)
        .handle_with("GET /admin", admin, Plugins::new().with(ApiKey::new("secret")));

    if let Err(e) = app.run(&[]).await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

#[derive(Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
}

// GET /users/{id}
async fn get_user(ctx: Context) -> Response {
    let user = User { id: ctx.param("id").to_owned(), name: "alice".into() };
    ctx.json(StatusCode::OK, &user)
}

// POST /users — decode errors come back as 400/415 JSON bodies.
async fn create_user(ctx: Context) -> Result<Response, HttpError> {
    #[derive(Deserialize)]
    struct NewUser { name: String }

    let input: NewUser = ctx.decode_json()?;
    let user = User { id: "99".into(), name: input.name };
    Ok(ctx.json(StatusCode::CREATED, &user))
}

// GET /search?q=…
async fn search(ctx: Context) -> Response {
    ctx.json(StatusCode::OK, &json!({ "q": ctx.query("q") }))
}

// GET /panic — answered with a 500 by middleware::recover.
async fn boom(_ctx: Context) -> StatusCode {
    panic!("handler exploded")
}

// GET /admin — guarded by the route-level ApiKey plugin.
async fn admin(ctx: Context) -> Result<Response, HttpError> {
    let key = ctx.plugin::<ApiKey>("api-key")?;
    Ok(ctx.json(StatusCode::OK, &json!({ "admin": true, "key_len": key.expected.len() })))
}

/// Rejects requests whose `x-api-key` header does not match.
struct ApiKey {
    expected: String,
}

impl ApiKey {
    fn new(expected: &str) -> Self {
        Self { expected: expected.to_owned() }
    }
}

impl Middleware for ApiKey {
    fn wrap(&self, next: Next) -> Next {
        let expected = self.expected.clone();
        Next::new(move |ctx: Context| {
            let next = next.clone();
            let authorised = ctx.header("x-api-key") == Some(expected.as_str());
            async move {
                if authorised {
                    next.run(ctx).await
                } else {
                    ctx.error(HttpError::new(StatusCode::UNAUTHORIZED, "missing or bad api key"))
                }
            }
        })
    }
}

impl Plugin for ApiKey {
    fn name(&self) -> &str { "api-key" }
}
