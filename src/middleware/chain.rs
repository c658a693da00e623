//! Per-request continuation chains.
//!
//! A chain is built back to front: the terminal link first, then every
//! middleware entry from last to first wraps the link built so far. An entry
//! whose prefix does not match the request path is skipped, so its slot passes
//! straight through to the following link.

use crate::error::BoxError;
use crate::http::{Request, Response};
use crate::middleware::MiddlewareEntry;
use futures::future::{BoxFuture, FutureExt};

pub(crate) type Link = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Continuation handed to a middleware.
pub struct Next {
    request: Request,
    response: Response,
    link: Link,
    restore: Option<String>,
}

impl Next {
    /// Continues with the following link.
    pub async fn run(self) {
        if let Some(url) = self.restore {
            self.request.set_url(url);
        }
        (self.link)().await
    }

    /// Stops the chain and answers `500` with `Error: <message>`, unless a
    /// response was already sent.
    pub async fn fail<E: Into<BoxError>>(self, err: E) {
        let err = err.into();
        if let Some(url) = self.restore {
            self.request.set_url(url);
        }
        tracing::error!(
            method = %self.request.method(),
            path = %self.request.path(),
            error = %err,
            "request failed"
        );
        if !self.response.is_finished() {
            self.response.status(500).send(format!("Error: {}", err));
        }
    }
}

/// Mount-relative path for `path` under `prefix`, or `None` when the prefix is
/// the root or does not apply.
pub(crate) fn mount_relative(path: &str, prefix: &str) -> Option<String> {
    if prefix.is_empty() || prefix == "/" {
        return None;
    }
    let rest = path.strip_prefix(prefix)?;
    Some(format!("/{}", rest.trim_start_matches('/')))
}

/// Rewrites the request url for a mounted middleware, returning the url to
/// restore afterwards.
fn enter_mount(request: &Request, prefix: &str) -> Option<String> {
    let rewritten = mount_relative(&request.path(), prefix)?;
    let original = request.url();
    let search = original.find('?').map(|at| &original[at..]).unwrap_or("");
    request.set_url(format!("{}{}", rewritten, search));
    Some(original)
}

pub(crate) fn build(
    request: &Request,
    response: &Response,
    entries: Vec<MiddlewareEntry>,
    terminal: Link,
) -> Link {
    let path = request.path();
    let mut next = terminal;

    for entry in entries.into_iter().rev() {
        if !path.starts_with(entry.prefix.as_str()) {
            continue;
        }

        let following = next;
        let request = request.clone();
        let response = response.clone();
        next = Box::new(move || {
            let restore = enter_mount(&request, &entry.prefix);
            let original = restore.clone();
            let chained = Next {
                request: request.clone(),
                response: response.clone(),
                link: following,
                restore,
            };
            let running = entry.handler.call(request.clone(), response, chained);
            async move {
                running.await;
                if let Some(url) = original {
                    request.set_url(url);
                }
            }
            .boxed()
        });
    }

    next
}
