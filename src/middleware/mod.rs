pub(crate) mod chain;

pub use chain::Next;

use crate::http::{Request, Response};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

pub type MiddlewareResult = BoxFuture<'static, ()>;

/// A link in the request chain. Call [`Next::run`] to continue, [`Next::fail`]
/// to answer with an error, or drop `next` to stop the chain.
///
/// Implemented for any `Fn(Request, Response, Next) -> impl Future<Output = ()>`.
///
/// ```rust
/// use axpress::middleware::{Middleware, MiddlewareResult, Next};
/// use axpress::{Request, Response};
///
/// struct PoweredBy;
///
/// impl Middleware for PoweredBy {
///     fn call(&self, _req: Request, res: Response, next: Next) -> MiddlewareResult {
///         Box::pin(async move {
///             match res.set("X-Powered-By", "axpress") {
///                 Ok(_) => next.run().await,
///                 Err(err) => next.fail(err).await,
///             }
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response, next: Next) -> MiddlewareResult;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Next) -> MiddlewareResult {
        Box::pin((self)(req, res, next))
    }
}

pub type BoxedMiddleware = Arc<dyn Middleware>;

pub fn boxed<M: Middleware>(middleware: M) -> BoxedMiddleware {
    Arc::new(middleware)
}

/// Like [`boxed`], but lets closure arguments be inferred.
pub fn from_fn<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(Request, Response, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(f)
}

/// A middleware scoped under a literal path prefix.
#[derive(Clone)]
pub struct MiddlewareEntry {
    pub(crate) prefix: String,
    pub(crate) handler: BoxedMiddleware,
}

impl MiddlewareEntry {
    pub fn new(prefix: &str, handler: BoxedMiddleware) -> Self {
        Self {
            prefix: prefix.to_string(),
            handler,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Global middleware in registration order.
#[derive(Clone, Default)]
pub(crate) struct MiddlewareStack {
    pub(crate) entries: Vec<MiddlewareEntry>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, middleware: BoxedMiddleware) {
        self.mount("/", middleware);
    }

    pub fn mount(&mut self, prefix: &str, middleware: BoxedMiddleware) {
        self.entries.push(MiddlewareEntry::new(prefix, middleware));
    }

    pub fn entries(&self) -> &[MiddlewareEntry] {
        &self.entries
    }
}

/// Normalizes one or more middleware into the list taken by the `*_with`
/// route registrars.
///
/// ```rust,ignore
/// app.get_with("/admin", middlewares![auth, audit], handler);
/// ```
#[macro_export]
macro_rules! middlewares {
    ($($middleware:expr),+ $(,)?) => {
        vec![$($crate::middleware::boxed($middleware)),+]
    };

    () => {
        compile_error!("The middlewares! macro requires at least one middleware")
    };
}
