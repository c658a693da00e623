//! The cat server: a home page, a cat listing, a cat by id, and a POST that
//! echoes the parsed body back.
//!
//! ```text
//! curl localhost:9000/cat/42
//! curl -d 'name=tom&color=grey' localhost:9000/cat
//! curl -H 'Content-Type: application/json' -d '{"name":"tom"}' localhost:9000/cat
//! ```

use axpress::Application;
use tracing_subscriber::EnvFilter;

const PORT: u16 = 9000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut app = Application::new();

    app.get("/", |_req, res| async move { res.send("Home") })
        .get("/cat", |_req, res| async move { res.send("Cat") })
        .get("/cat/:id", |req, res| async move { res.send(req.params()) })
        .post("/cat", |req, res| async move { res.send(req.body()) });

    app.listen(("0.0.0.0", PORT), |_| {
        println!("Listening at http://localhost:{}", PORT)
    })
    .expect("Server failed to start");
}
