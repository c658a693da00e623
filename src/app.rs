//! Application is the entry point for building a server.
//!
//! Routes and middleware are registered up front; each incoming request is
//! then dispatched through a continuation chain made of the global
//! middleware, the matched route's own middleware, and its handler.
//!
//! # Examples
//!
//! ```rust,no_run
//! use axpress::Application;
//!
//! let mut app = Application::new();
//! app.get("/", |_req, res| async move {
//!     res.send("Hello!");
//! });
//! app.listen("127.0.0.1:3000", |addr| println!("listening on {}", addr))
//!     .unwrap();
//! ```

use crate::error::{ServerError, ServerResult};
use crate::http::{wire, Method, Request, Response};
use crate::middleware::chain::{self, Link};
use crate::middleware::{BoxedMiddleware, Middleware, MiddlewareStack};
use crate::router::{Route, RouteTable};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

macro_rules! verb_registrars {
    ($(($verb:literal, $name:ident, $name_with:ident)),+ $(,)?) => {
        $(
            #[doc = concat!("Registers a `", $verb, "` route.")]
            ///
            /// # Panics
            ///
            /// Panics if `pattern` is not a valid route pattern.
            pub fn $name<F, Fut>(&mut self, pattern: &str, handler: F) -> &mut Self
            where
                F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = ()> + Send + 'static,
            {
                self.route_with($verb, pattern, Vec::new(), handler)
            }

            #[doc = concat!("Registers a `", $verb, "` route with its own middleware, run after the global ones.")]
            ///
            /// # Panics
            ///
            /// Panics if `pattern` is not a valid route pattern.
            pub fn $name_with<F, Fut>(
                &mut self,
                pattern: &str,
                middlewares: Vec<BoxedMiddleware>,
                handler: F,
            ) -> &mut Self
            where
                F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
                Fut: Future<Output = ()> + Send + 'static,
            {
                self.route_with($verb, pattern, middlewares, handler)
            }
        )+
    };
}

#[derive(Clone)]
pub struct Application {
    pub max_connections: usize,
    cookie_secret: Option<String>,
    routes: RouteTable,
    middlewares: MiddlewareStack,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self {
            max_connections: 256,
            cookie_secret: None,
            routes: RouteTable::new(),
            middlewares: MiddlewareStack::new(),
        }
    }

    pub fn max_connections(&mut self, max_connections: usize) -> &mut Self {
        self.max_connections = max_connections;
        self
    }

    /// Secret used to sign cookies set with `CookieOptions::signed`.
    pub fn cookie_secret(&mut self, secret: &str) -> &mut Self {
        self.cookie_secret = Some(secret.to_string());
        self
    }

    verb_registrars! {
        ("GET", get, get_with),
        ("POST", post, post_with),
        ("PUT", put, put_with),
        ("DELETE", delete, delete_with),
        ("PATCH", patch, patch_with),
        ("HEAD", head, head_with),
        ("OPTIONS", options, options_with),
        ("CONNECT", connect, connect_with),
        ("TRACE", trace, trace_with),
    }

    /// Registers a route for an arbitrary method. The method is upper-cased.
    ///
    /// # Panics
    ///
    /// Panics if `pattern` is not a valid route pattern.
    pub fn route<F, Fut>(&mut self, method: &str, pattern: &str, handler: F) -> &mut Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.route_with(method, pattern, Vec::new(), handler)
    }

    /// # Panics
    ///
    /// Panics if `pattern` is not a valid route pattern. Use
    /// [`Application::try_route_with`] to handle the error instead.
    pub fn route_with<F, Fut>(
        &mut self,
        method: &str,
        pattern: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Err(err) = self.try_route_with(method, pattern, middlewares, handler) {
            panic!("{}", err);
        }
        self
    }

    pub fn try_route_with<F, Fut>(
        &mut self,
        method: &str,
        pattern: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: F,
    ) -> ServerResult<&mut Self>
    where
        F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.routes
            .register(method, pattern, middlewares, Arc::new(handler))?;
        Ok(self)
    }

    /// Adds a global middleware, run for every request.
    pub fn middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middlewares.add(Arc::new(middleware));
        self
    }

    /// Adds a global middleware that only runs for paths starting with
    /// `prefix`. While it runs, `url` is relative to the prefix.
    pub fn mount(&mut self, prefix: &str, middleware: impl Middleware) -> &mut Self {
        self.middlewares.mount(prefix, Arc::new(middleware));
        self
    }

    /// Runs `request` through every matching route, or through the global
    /// middleware and the 404 fallback when nothing matches.
    pub async fn dispatch(&self, request: Request, response: Response) {
        let path = request.path();
        let matched = self.routes.matching(request.method(), &path);
        tracing::debug!(
            method = %request.method(),
            path = %path,
            routes = matched.len(),
            "dispatching request"
        );

        if matched.is_empty() {
            let entries = self.middlewares.entries().to_vec();
            let head = chain::build(&request, &response, entries, not_found(&request, &response));
            head().await;
            return;
        }

        for (route, params) in matched {
            request.set_params(params);
            let mut entries = self.middlewares.entries().to_vec();
            entries.extend(route.middlewares.iter().cloned());
            let terminal = route_terminal(route, &request, &response);
            let head = chain::build(&request, &response, entries, terminal);
            head().await;
        }
    }

    /// Dispatches one request and returns its response. A panic while
    /// dispatching answers `500` unless a response was already written.
    pub async fn handle(&self, request: Request) -> Response {
        request.set_secret(self.cookie_secret.clone());
        let response = Response::new(request.clone());

        let outcome = AssertUnwindSafe(self.dispatch(request.clone(), response.clone()))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic);
            tracing::error!(
                method = %request.method(),
                url = %request.original_url(),
                error = %ServerError::PanicError(message.clone()),
                "handler panicked"
            );
            if !response.is_finished() {
                response.status(500).send(format!("Error: {}", message));
            }
        }
        response
    }

    /// Starts the server on its own runtime and blocks. `on_ready` is called
    /// with the bound address once the socket is listening.
    pub fn listen<A, F>(self, addr: A, on_ready: F) -> ServerResult<()>
    where
        A: ToSocketAddrs,
        F: FnOnce(SocketAddr),
    {
        let runtime = Runtime::new()?;
        runtime.block_on(async move {
            let listener = TcpListener::bind(addr).await?;
            on_ready(listener.local_addr()?);
            self.serve(listener).await
        })
    }

    /// Accepts connections on `listener` until an accept error occurs.
    pub async fn serve(self, listener: TcpListener) -> ServerResult<()> {
        let app = Arc::new(self);
        let permits = Arc::new(Semaphore::new(app.max_connections.max(1)));
        tracing::info!(addr = %listener.local_addr()?, "server listening");

        loop {
            let permit = match Arc::clone(&permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Ok(()),
            };

            match listener.accept().await {
                Ok((stream, peer)) => {
                    let app = Arc::clone(&app);
                    tokio::spawn(async move {
                        if let Err(err) = app.handle_connection(stream).await {
                            tracing::error!(peer = %peer, error = %err, "connection error");
                        }
                        drop(permit);
                    });
                }
                Err(err) => tracing::error!(error = %err, "accept failed"),
            }
        }
    }

    async fn handle_connection<S>(&self, mut stream: S) -> ServerResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(&mut stream);
        let parsed = wire::read_request(&mut reader).await;
        drop(reader);

        let request = match parsed {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(ServerError::ParseError(message)) => {
                tracing::debug!(reason = %message, "rejecting malformed request");
                stream.write_all(&wire::bad_request(&message)).await?;
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let head = *request.method() == Method::HEAD;
        let response = self.handle(request).await;
        response.finished().await;

        stream.write_all(&wire::encode_response(&response, head)).await?;
        stream.flush().await?;
        Ok(())
    }
}

fn route_terminal(route: Arc<Route>, request: &Request, response: &Response) -> Link {
    let request = request.clone();
    let response = response.clone();
    Box::new(move || route.handler.call(request, response))
}

fn not_found(request: &Request, response: &Response) -> Link {
    let request = request.clone();
    let response = response.clone();
    Box::new(move || {
        async move {
            let message = format!("Cannot {} {}", request.method(), request.path());
            response.status(404).send(message);
        }
        .boxed()
    })
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic".to_string()
    }
}
