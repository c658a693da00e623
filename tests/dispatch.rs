//! In-process dispatch tests: requests are built directly and run through
//! `Application::handle`, without a socket.

mod common;

use axpress::{json, Application, HeaderValue, Method, Middleware, Next, Request, Response};
use common::header_map;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

fn request(method: Method, target: &str) -> Request {
    Request::new(method, target, header_map(&[("Host", "localhost")]), Vec::new())
}

fn record(log: &Log, name: &'static str) -> impl Middleware {
    let log = log.clone();
    move |req: Request, _res: Response, next: Next| {
        let log = log.clone();
        async move {
            log.lock().push(format!("{} {}", name, req.path()));
            next.run().await;
        }
    }
}

#[tokio::test]
async fn unmatched_routes_fall_through_to_404() {
    let mut app = Application::new();
    app.get("/cat", |_req, res| async move { res.send("Cat") });
    app.post("/cat", |_req, res| async move { res.send("created") });

    for (method, target, expected) in [
        (Method::GET, "/dog", "Cannot GET /dog"),
        (Method::PUT, "/cat", "Cannot PUT /cat"),
        (Method::DELETE, "/cat/1?force=1", "Cannot DELETE /cat/1"),
    ] {
        let res = app.handle(request(method, target)).await;
        assert_eq!(res.status_code(), 404);
        assert_eq!(res.body_string(), expected);
    }
}

#[tokio::test]
async fn global_middleware_runs_on_404() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.middleware(record(&log, "global"));

    let res = app.handle(request(Method::GET, "/missing")).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(*log.lock(), vec!["global /missing".to_string()]);
}

#[tokio::test]
async fn params_are_extracted() {
    let mut app = Application::new();
    app.get("/cat/:id", |req, res| async move { res.send(req.params()) });

    let res = app.handle(request(Method::GET, "/cat/42")).await;
    assert_eq!(res.body_string(), r#"{"id":"42"}"#);

    let res = app.handle(request(Method::GET, "/cat")).await;
    assert_eq!(res.status_code(), 404);
}

#[tokio::test]
async fn middleware_runs_in_registration_order() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.middleware(record(&log, "m1"))
        .middleware(record(&log, "m2"))
        .middleware(record(&log, "m3"));

    let handler_log = log.clone();
    app.get("/cat", move |req, res| {
        let log = handler_log.clone();
        async move {
            log.lock().push(format!("handler {}", req.path()));
            res.send("Cat");
        }
    });

    let res = app.handle(request(Method::GET, "/cat")).await;
    assert_eq!(res.body_string(), "Cat");
    assert_eq!(
        *log.lock(),
        vec!["m1 /cat", "m2 /cat", "m3 /cat", "handler /cat"]
    );
}

#[tokio::test]
async fn head_is_answered_by_get_routes() {
    let mut app = Application::new();
    app.get("/cat", |_req, res| async move { res.send("Cat") });
    app.post("/dog", |_req, res| async move { res.send("Dog") });

    let res = app.handle(request(Method::HEAD, "/cat")).await;
    assert_eq!(res.status_code(), 200);

    let res = app.handle(request(Method::HEAD, "/dog")).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(res.body_string(), "Cannot HEAD /dog");
}

#[tokio::test]
async fn mounted_middleware_only_runs_under_its_prefix() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.mount("/cat", record(&log, "cats"));
    app.get("/cat/:id", |req, res| async move {
        res.send(format!("{} {}", req.path(), req.original_url()));
    });
    app.get("/dog", |req, res| async move { res.send(req.path()) });

    let res = app.handle(request(Method::GET, "/dog")).await;
    assert_eq!(res.body_string(), "/dog");
    assert!(log.lock().is_empty());

    let res = app.handle(request(Method::GET, "/cat/42?x=1")).await;
    assert_eq!(*log.lock(), vec!["cats /42".to_string()]);
    assert_eq!(res.body_string(), "/cat/42 /cat/42?x=1");
}

#[tokio::test]
async fn mounted_middleware_can_answer_on_its_own() {
    let mut app = Application::new();
    app.mount("/admin", |req: Request, res: Response, next: Next| async move {
        if req.get("authorization").is_some() {
            next.run().await
        } else {
            res.status(401).send(format!("denied {}", req.url()));
        }
    });
    app.get("/admin", |_req, res| async move { res.send("welcome") });

    let res = app.handle(request(Method::GET, "/admin")).await;
    assert_eq!(res.status_code(), 401);
    assert_eq!(res.body_string(), "denied /");

    let authorized = Request::new(
        Method::GET,
        "/admin",
        header_map(&[("Authorization", "Bearer token")]),
        Vec::new(),
    );
    let res = app.handle(authorized).await;
    assert_eq!(res.body_string(), "welcome");
}

#[tokio::test]
async fn next_with_error_answers_500() {
    let mut app = Application::new();
    app.middleware(|_req: Request, _res: Response, next: Next| async move {
        next.fail(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
            .await
    });
    app.get("/cat", |_req, res| async move { res.send("Cat") });

    for target in ["/cat", "/nowhere"] {
        let res = app.handle(request(Method::GET, target)).await;
        assert_eq!(res.status_code(), 500);
        assert_eq!(res.body_string(), "Error: boom");
    }
}

#[tokio::test]
async fn dropping_next_stops_the_chain() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.middleware(|_req: Request, res: Response, _next: Next| async move {
        res.status(204).end();
    });
    app.middleware(record(&log, "never"));
    app.get("/cat", |_req, res| async move { res.send("Cat") });

    let res = app.handle(request(Method::GET, "/cat")).await;
    assert_eq!(res.status_code(), 204);
    assert!(res.body().is_empty());
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn every_matching_route_is_dispatched() {
    let log: Log = Arc::default();
    let mut app = Application::new();
    app.middleware(record(&log, "global"));

    let first = log.clone();
    app.get("/cat/:id", move |req, res| {
        let log = first.clone();
        async move {
            log.lock().push(format!("by id {:?}", req.param("id")));
            res.send("first");
        }
    });
    let second = log.clone();
    app.get("/:animal/:id", move |req, res| {
        let log = second.clone();
        async move {
            log.lock().push(format!("by animal {:?}", req.param("animal")));
            res.status(201).send("second");
        }
    });

    let res = app.handle(request(Method::GET, "/cat/42")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.body_string(), "first");
    assert_eq!(
        *log.lock(),
        vec![
            "global /cat/42",
            "by id Some(\"42\")",
            "global /cat/42",
            "by animal Some(\"cat\")",
        ]
    );
}

#[tokio::test]
async fn body_is_parsed_by_content_type() {
    let mut app = Application::new();
    app.post("/cat", |req, res| async move { res.send(req.body()) });

    let form = Request::new(
        Method::POST,
        "/cat",
        header_map(&[("Content-Type", "application/x-www-form-urlencoded")]),
        b"a=1&b=2".to_vec(),
    );
    let res = app.handle(form).await;
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&res.body_string()).unwrap(),
        json!({ "a": "1", "b": "2" })
    );

    let body = Request::new(
        Method::POST,
        "/cat",
        header_map(&[("Content-Type", "application/json")]),
        br#"{"x":1}"#.to_vec(),
    );
    let res = app.handle(body).await;
    assert_eq!(res.body_string(), r#"{"x":1}"#);

    let broken = Request::new(
        Method::POST,
        "/cat",
        header_map(&[("Content-Type", "application/json")]),
        b"{not json".to_vec(),
    );
    let res = app.handle(broken).await;
    assert_eq!(res.body_string(), "{}");
}

#[tokio::test]
async fn redirect_sets_location_and_body() {
    let mut app = Application::new();
    app.get("/old", |_req, res| async move {
        res.redirect_with(301, "http://x").unwrap();
    });

    let res = app.handle(request(Method::GET, "/old")).await;
    assert_eq!(res.status_code(), 301);
    assert_eq!(res.get("Location"), Some(HeaderValue::One("http://x".into())));
    assert!(!res.body().is_empty());

    let res = app.handle(request(Method::HEAD, "/old")).await;
    assert_eq!(res.status_code(), 301);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn late_failure_does_not_change_sent_status() {
    let mut app = Application::new();
    app.get("/cat", |_req, res| async move { res.send("ok") });
    app.get_with(
        "/cat",
        axpress::middlewares![|_req: Request, _res: Response, next: Next| async move {
            next.fail("late").await
        }],
        |_req, res| async move { res.send("unreachable") },
    );

    let res = app.handle(request(Method::GET, "/cat")).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.body_string(), "ok");
}
