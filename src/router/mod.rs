mod pattern;

pub use pattern::{Params, PathPattern};

use crate::error::ServerResult;
use crate::handler::BoxedHandler;
use crate::http::Method;
use crate::middleware::{BoxedMiddleware, MiddlewareEntry};
use std::sync::Arc;

pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) pattern: PathPattern,
    pub(crate) handler: BoxedHandler,
    pub(crate) middlewares: Vec<MiddlewareEntry>,
}

/// Registered routes, in registration order.
#[derive(Clone, Default)]
pub(crate) struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        method: &str,
        pattern: &str,
        middlewares: Vec<BoxedMiddleware>,
        handler: BoxedHandler,
    ) -> ServerResult<()> {
        let pattern = PathPattern::compile(pattern)?;
        // local middleware only ever sees requests its route matched
        let middlewares = middlewares
            .into_iter()
            .map(|middleware| MiddlewareEntry::new("/", middleware))
            .collect();

        self.routes.push(Arc::new(Route {
            method: Method::normalize(method),
            pattern,
            handler,
            middlewares,
        }));
        Ok(())
    }

    /// Every route accepting `method` whose pattern matches `path`, each with
    /// its own extracted parameters.
    pub fn matching(&self, method: &Method, path: &str) -> Vec<(Arc<Route>, Params)> {
        self.routes
            .iter()
            .filter(|route| route.method.accepts(method))
            .filter_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| (Arc::clone(route), params))
            })
            .collect()
    }
}
