pub mod cookie;
pub mod headers;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod wire;

pub use cookie::{CookieOptions, CookieValue, SameSite};
pub use headers::{HeaderValue, Headers};
pub use request::{Body, Method, Request};
pub use response::{Payload, Response};
