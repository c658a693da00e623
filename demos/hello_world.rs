//! A minimal "Hello, World!" server using Axpress
//!
//! This example demonstrates how to create a basic server that responds with
//! "Hello, World!" on `/`.

use axpress::Application;

fn main() {
    tracing_subscriber::fmt::init();

    let mut app = Application::new();

    // Add a route that handles GET (and HEAD) requests to "/"
    app.get("/", |_req, res| async move { res.send("Hello, World!") });

    app.listen("127.0.0.1:3000", |addr| println!("Listening at http://{}", addr))
        .expect("Server failed to start");
}
