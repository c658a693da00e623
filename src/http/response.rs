use crate::error::{ServerError, ServerResult};
use crate::http::cookie::{self, CookieOptions, CookieValue};
use crate::http::headers::{HeaderValue, Headers};
use crate::http::request::{Method, Request};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Notify;

lazy_static! {
    static ref CHARSET: Regex = Regex::new(r"(?i);\s*charset\s*=").unwrap();
}

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Body accepted by [`Response::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
    Empty,
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<HashMap<String, String>> for Payload {
    fn from(map: HashMap<String, String>) -> Self {
        Payload::Json(Value::Object(
            map.into_iter().map(|(k, v)| (k, Value::String(v))).collect(),
        ))
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

#[derive(Debug)]
struct ResponseState {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    finished: bool,
}

/// Write-side handle for one outbound message.
///
/// Only the first terminal write (`send`, `json`, `end`, `redirect`) takes
/// effect; later ones are logged and dropped.
#[derive(Clone)]
pub struct Response {
    state: Arc<Mutex<ResponseState>>,
    done: Arc<Notify>,
    request: Request,
}

impl Response {
    pub fn new(request: Request) -> Response {
        Response {
            state: Arc::new(Mutex::new(ResponseState {
                status: 200,
                headers: Headers::new(),
                body: Vec::new(),
                finished: false,
            })),
            done: Arc::new(Notify::new()),
            request,
        }
    }

    /// Chainable status setter. Ignored once the response is finished.
    pub fn status(&self, status: u16) -> &Self {
        let mut state = self.state.lock();
        if state.finished {
            tracing::warn!(
                method = %self.request.method(),
                url = %self.request.url(),
                status,
                "response already finished, ignoring status"
            );
        } else {
            state.status = status;
        }
        drop(state);
        self
    }

    pub fn status_code(&self) -> u16 {
        self.state.lock().status
    }

    /// Sets a header, replacing any previous value. A charset is added to
    /// `Content-Type` when the type has a known one and none was given.
    pub fn set<V: Into<HeaderValue>>(&self, field: &str, value: V) -> ServerResult<&Self> {
        ::http::HeaderName::from_bytes(field.as_bytes())
            .map_err(|_| ServerError::InvalidHeader(format!("Invalid header name: {}", field)))?;

        let value = match value.into() {
            HeaderValue::Many(_) if field.eq_ignore_ascii_case("content-type") => {
                return Err(ServerError::InvalidHeader(
                    "Content-Type cannot be set to an Array".to_string(),
                ));
            }
            HeaderValue::One(value) if field.eq_ignore_ascii_case("content-type") => {
                HeaderValue::One(with_charset(value))
            }
            value => value,
        };

        for v in value.values() {
            ::http::HeaderValue::from_str(v).map_err(|_| {
                ServerError::InvalidHeader(format!("Invalid value for header {}", field))
            })?;
        }

        let mut state = self.state.lock();
        if state.finished {
            return Err(ServerError::InvalidHeader(
                "Cannot set headers after they are sent to the client".to_string(),
            ));
        }
        state.headers.insert(field, value);
        Ok(self)
    }

    pub fn header<V: Into<HeaderValue>>(&self, field: &str, value: V) -> ServerResult<&Self> {
        self.set(field, value)
    }

    // Set multiple headers at once
    pub fn set_all<I, K, V>(&self, fields: I) -> ServerResult<&Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<HeaderValue>,
    {
        for (field, value) in fields {
            self.set(field.as_ref(), value)?;
        }
        Ok(self)
    }

    pub fn get(&self, field: &str) -> Option<HeaderValue> {
        self.state.lock().headers.get(field).cloned()
    }

    pub fn headers(&self) -> Headers {
        self.state.lock().headers.clone()
    }

    /// Adds `value` to an existing header, turning it into a list.
    pub fn append<V: Into<HeaderValue>>(&self, field: &str, value: V) -> ServerResult<&Self> {
        let value = value.into();
        let value = match self.get(field) {
            Some(previous) => previous.concat(value),
            None => value,
        };
        self.set(field, value)
    }

    pub fn cookie<V: Into<CookieValue>>(
        &self,
        name: &str,
        value: V,
        options: &CookieOptions,
    ) -> ServerResult<&Self> {
        let secret = self.request.secret();
        let field = cookie::set_cookie(name, &value.into(), options, secret.as_deref())?;
        self.append("Set-Cookie", field)
    }

    pub fn clear_cookie(&self, name: &str, options: &CookieOptions) -> ServerResult<&Self> {
        let options = CookieOptions {
            expires: options
                .expires
                .or_else(|| Some(SystemTime::UNIX_EPOCH + Duration::from_millis(1))),
            path: options.path.clone().or_else(|| Some("/".to_string())),
            ..options.clone()
        };
        self.cookie(name, "", &options)
    }

    /// Sets `Location`. `"back"` resolves to the referrer, or `/`.
    pub fn location(&self, url: &str) -> ServerResult<&Self> {
        let location = if url == "back" {
            self.request.get("Referrer").unwrap_or("/").to_string()
        } else {
            url.to_string()
        };
        self.set("Location", encode_url(&location))
    }

    pub fn redirect(&self, url: &str) -> ServerResult<()> {
        self.redirect_with(302, url)
    }

    pub fn redirect_with(&self, status: u16, url: &str) -> ServerResult<()> {
        self.location(url)?;
        let address = self
            .get("Location")
            .map(|location| location.to_string())
            .unwrap_or_default();
        let reason = ::http::StatusCode::from_u16(status)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("");
        let body = format!("{}. Redirecting to {}", reason, address);

        self.status(status);
        self.set("Content-Length", body.len().to_string())?;

        if *self.request.method() == Method::HEAD {
            self.end();
        } else {
            self.send(body);
        }
        Ok(())
    }

    /// Finishes the response. Text is written as is, JSON values are
    /// serialized, and an empty payload ends the message without a body.
    pub fn send<P: Into<Payload>>(&self, payload: P) {
        match payload.into() {
            Payload::Text(text) => self.finish(text.into_bytes(), None),
            Payload::Json(value) => self.finish(value.to_string().into_bytes(), Some(JSON_CONTENT_TYPE)),
            Payload::Empty => self.finish(Vec::new(), None),
        }
    }

    pub fn json<T: Serialize>(&self, value: &T) -> ServerResult<()> {
        let body = serde_json::to_vec(value)?;
        self.finish(body, Some(JSON_CONTENT_TYPE));
        Ok(())
    }

    pub fn end(&self) {
        self.finish(Vec::new(), None);
    }

    fn finish(&self, body: Vec<u8>, content_type: Option<&str>) {
        {
            let mut state = self.state.lock();
            if state.finished {
                tracing::warn!(
                    method = %self.request.method(),
                    url = %self.request.url(),
                    "response already finished, ignoring write"
                );
                return;
            }
            if let Some(content_type) = content_type {
                if !state.headers.contains("content-type") {
                    state.headers.insert("Content-Type", content_type.into());
                }
            }
            state.body = body;
            state.finished = true;
        }
        self.done.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Resolves once a terminal write has happened. There is no timeout.
    pub async fn finished(&self) {
        loop {
            if self.is_finished() {
                return;
            }
            self.done.notified().await;
        }
    }

    pub fn body(&self) -> Vec<u8> {
        self.state.lock().body.clone()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body()).to_string()
    }

    pub(crate) fn snapshot(&self) -> (u16, Headers, Vec<u8>) {
        let state = self.state.lock();
        (state.status, state.headers.clone(), state.body.clone())
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Response")
            .field("status", &state.status)
            .field("headers", &state.headers)
            .field("finished", &state.finished)
            .finish()
    }
}

fn with_charset(value: String) -> String {
    if CHARSET.is_match(&value) {
        return value;
    }
    let mime = value
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if mime.starts_with("text/") || mime == "application/json" || mime == "application/javascript" {
        format!("{}; charset=utf-8", value)
    } else {
        value
    }
}

/// Percent-encodes characters that may not appear in a URL, leaving existing
/// escape sequences alone.
fn encode_url(url: &str) -> String {
    let bytes = url.as_bytes();
    let mut encoded = String::with_capacity(url.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let escaped = i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            encoded.push_str(if escaped { "%" } else { "%25" });
        } else if matches!(b, 0x21 | 0x26..=0x3B | 0x3D | 0x3F..=0x5B | 0x5D | 0x5F | 0x61..=0x7A | 0x7E) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
        i += 1;
    }
    encoded
}
