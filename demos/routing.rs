//! Routing example for Axpress
//!
//! This example demonstrates different routing techniques including:
//! - Basic routes
//! - Path parameters, optional parameters and wildcards
//! - Query parameters
//! - Typed JSON bodies
//! - Redirects

use axpress::{json, Application};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct User {
    name: String,
    role: String,
}

fn main() {
    tracing_subscriber::fmt::init();

    let mut app = Application::new();

    // Basic GET route
    app.get("/", |_req, res| async move {
        res.send("Welcome to the Axpress API server!")
    });

    // Route with path parameter
    app.get("/users/:id", |req, res| async move {
        let user_id = req.param("id").unwrap_or_default();
        res.send(format!("User ID: {}", user_id));
    });

    // Optional parameter: /posts and /posts/2024 both match
    app.get("/posts/:year?", |req, res| async move {
        match req.param("year") {
            Some(year) => res.send(format!("Posts from {}", year)),
            None => res.send("All posts"),
        }
    });

    // Wildcard, captured under "0"
    app.get("/files/*", |req, res| async move {
        res.send(json!({ "file": req.param("0") }));
    });

    // Query parameters: /search?q=rust
    app.get("/search", |req, res| async move {
        let query = req.query();
        res.send(json!({ "q": query.get("q") }));
    });

    // POST request with JSON body
    app.post("/users", |req, res| async move {
        match req.body_as::<User>() {
            Some(user) => {
                if let Err(err) = res.status(201).json(&user) {
                    res.status(500).send(format!("Error: {}", err));
                }
            }
            None => {
                res.status(400).send("Invalid JSON body");
            }
        }
    });

    // Redirects
    app.get("/old", |_req, res| async move {
        if let Err(err) = res.redirect_with(301, "/") {
            res.status(500).send(format!("Error: {}", err));
        }
    });
    app.get("/back", |_req, res| async move {
        if let Err(err) = res.redirect("back") {
            res.status(500).send(format!("Error: {}", err));
        }
    });

    app.listen("127.0.0.1:3000", |addr| println!("Listening at http://{}", addr))
        .expect("Server failed to start")
}
