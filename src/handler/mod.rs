use crate::http::{Request, Response};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

pub type HandlerResult = BoxFuture<'static, ()>;

/// Terminal link of a chain: receives the request and response, and is
/// expected to finish the response.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response) -> HandlerResult;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, req: Request, res: Response) -> HandlerResult {
        Box::pin((self)(req, res))
    }
}

pub type BoxedHandler = Arc<dyn Handler>;
