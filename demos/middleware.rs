//! Middleware example for Axpress
//!
//! This example demonstrates how to create and use middleware for:
//! - Logging requests
//! - Authentication on a mounted prefix
//! - Per-route middleware
//! - Failing a request with `next.fail`

use axpress::middleware::{Middleware, MiddlewareResult, Next};
use axpress::{middlewares, Application, CookieOptions, Request, Response};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// Logger middleware that tracks how long the rest of the chain takes
struct Logger;

impl Middleware for Logger {
    fn call(&self, req: Request, res: Response, next: Next) -> MiddlewareResult {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().clone();
            let url = req.original_url().to_string();
            next.run().await;
            tracing::info!(
                status = res.status_code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "{} {}",
                method,
                url
            );
        })
    }
}

// Simple auth middleware, mounted under /api
struct AuthMiddleware;

impl Middleware for AuthMiddleware {
    fn call(&self, req: Request, res: Response, next: Next) -> MiddlewareResult {
        Box::pin(async move {
            // Check for token in Authorization header
            match req.get("Authorization") {
                Some(token) if token.starts_with("Bearer ") => next.run().await,
                _ => {
                    res.status(401).send("Authentication required");
                }
            }
        })
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let mut app = Application::new();
    app.cookie_secret("keyboard cat");

    // Apply logger middleware globally
    app.middleware(Logger);

    // Everything under /api requires a bearer token
    app.mount("/api", AuthMiddleware);

    // Public route - no auth required
    app.get("/public", |_req, res| async move {
        res.send("This is a public endpoint");
    });

    app.get("/api/profile", |_req, res| async move {
        res.send(axpress::json!({
            "name": "User",
            "email": "user@example.com"
        }));
    });

    // Route-local middleware sets a signed session cookie before the handler
    app.get_with(
        "/login",
        middlewares![|_req: Request, res: Response, next: Next| async move {
            let options = CookieOptions {
                signed: true,
                http_only: true,
                max_age: Some(60 * 60 * 1000),
                ..Default::default()
            };
            match res.cookie("session", "user", &options) {
                Ok(_) => next.run().await,
                Err(err) => next.fail(err).await,
            }
        }],
        |_req, res| async move {
            res.send("Logged in");
        },
    );

    // Any error passed to next.fail answers 500 "Error: <message>"
    app.get_with(
        "/broken",
        middlewares![|_req: Request, _res: Response, next: Next| async move {
            next.fail("database unavailable").await
        }],
        |_req, res| async move { res.send("unreachable") },
    );

    app.listen("127.0.0.1:3000", |addr| println!("Listening at http://{}", addr))
        .expect("Server failed to start");
}
