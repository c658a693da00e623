//! # Axpress
//!
//! A small Express-style application server: routes with `:name`
//! parameters, global middleware that can be mounted under a path prefix,
//! per-route middleware, and a continuation-passing `next` between them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axpress::{json, Application};
//!
//! fn main() {
//!     let mut app = Application::new();
//!
//!     app.get("/cat/:id", |req, res| async move {
//!         res.send(json!({ "id": req.param("id") }));
//!     });
//!
//!     app.listen("127.0.0.1:3000", |addr| println!("listening on {}", addr))
//!         .unwrap();
//! }
//! ```
//!
//! ## Middleware Usage
//!
//! ```rust
//! use axpress::{Application, Next, Request, Response};
//!
//! let mut app = Application::new();
//! app.mount("/admin", |req: Request, res: Response, next: Next| async move {
//!     if req.get("Authorization").is_some() {
//!         next.run().await
//!     } else {
//!         res.status(401).send("Unauthorized");
//!     }
//! });
//! ```

pub mod app;
pub mod error;
pub mod handler;
pub mod http;
pub mod middleware;
pub mod router;
pub extern crate serde_json;

// Reexport serde_json
pub use serde_json::{json, Value};

pub use app::Application;
pub use error::{ServerError, ServerResult};
pub use crate::http::{CookieOptions, HeaderValue, Method, Payload, Request, Response};
pub use middleware::{Middleware, Next};
