use crate::router::Params;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

#[derive(Eq, Hash, PartialEq, Clone, Debug)]
pub enum Method {
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
    CONNECT,
    OPTIONS,
    TRACE,
    PATCH,
    Extension(String),
}

impl Method {
    /// Parses a method token exactly as it appears on the wire.
    pub fn from_string(s: &str) -> Method {
        match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "CONNECT" => Method::CONNECT,
            "OPTIONS" => Method::OPTIONS,
            "TRACE" => Method::TRACE,
            "PATCH" => Method::PATCH,
            other => Method::Extension(other.to_string()),
        }
    }

    /// Canonical upper-case form, used for route registration.
    pub fn normalize(s: &str) -> Method {
        Self::from_string(&s.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::CONNECT => "CONNECT",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::PATCH => "PATCH",
            Method::Extension(other) => other,
        }
    }

    /// Whether a route registered with `self` answers a request made with
    /// `requested`. HEAD requests are served by GET routes.
    pub fn accepts(&self, requested: &Method) -> bool {
        self == requested || (*self == Method::GET && *requested == Method::HEAD)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Body {
    pub(crate) content_type: String,
    pub(crate) data: Vec<u8>,
}

impl Body {
    pub fn new(content_type: &str, data: Vec<u8>) -> Body {
        Body {
            content_type: content_type.to_string(),
            data,
        }
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.data).to_string()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase()
    }

    /// Parses the raw bytes according to the content type. Anything that
    /// cannot be parsed yields an empty object.
    pub fn parse(&self) -> Value {
        match self.media_type().as_str() {
            "application/x-www-form-urlencoded" => {
                Value::Object(Self::parse_urlencoded(&self.data))
            }
            "application/json" => serde_json::from_slice(&self.data)
                .unwrap_or_else(|_| Value::Object(Map::new())),
            _ => Value::Object(Map::new()),
        }
    }

    fn parse_urlencoded(data: &[u8]) -> Map<String, Value> {
        let data_str = String::from_utf8_lossy(data);
        let mut fields = Map::new();

        for pair in data_str.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            fields.insert(decode_component(key), Value::String(decode_component(value)));
        }

        fields
    }
}

fn decode_component(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.clone())
}

struct RequestInner {
    method: Method,
    headers: HashMap<String, String>,
    original_url: String,
    url: Mutex<String>,
    params: Mutex<Params>,
    secret: Mutex<Option<String>>,
    body: Body,
}

/// Read view over one inbound message.
///
/// Cloning is cheap and every clone observes the same `url` and `params`, so
/// a rewrite made while entering a mounted middleware is visible to it.
#[derive(Clone)]
pub struct Request {
    inner: Arc<RequestInner>,
}

impl Request {
    /// Builds a request from its parts. Header names are lower-cased.
    pub fn new<T: Into<String>>(
        method: Method,
        target: T,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    ) -> Request {
        let headers: HashMap<String, String> = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        let content_type = headers.get("content-type").cloned().unwrap_or_default();
        let target = target.into();

        Request {
            inner: Arc::new(RequestInner {
                method,
                headers,
                original_url: target.clone(),
                url: Mutex::new(target),
                params: Mutex::new(Params::new()),
                secret: Mutex::new(None),
                body: Body::new(&content_type, body),
            }),
        }
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.inner.headers
    }

    /// Case-insensitive header lookup. `Referer` and `Referrer` are
    /// interchangeable.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "referer" | "referrer" => self
                .inner
                .headers
                .get("referrer")
                .or_else(|| self.inner.headers.get("referer"))
                .map(String::as_str),
            _ => self.inner.headers.get(&name).map(String::as_str),
        }
    }

    pub fn protocol(&self) -> &'static str {
        "http"
    }

    /// Value of the `Host` header.
    pub fn hostname(&self) -> Option<&str> {
        self.get("host")
    }

    /// The request target as received; never rewritten.
    pub fn original_url(&self) -> &str {
        &self.inner.original_url
    }

    pub fn url(&self) -> String {
        self.inner.url.lock().clone()
    }

    pub fn set_url<T: Into<String>>(&self, url: T) {
        *self.inner.url.lock() = url.into();
    }

    fn parsed_url(&self) -> Option<Url> {
        let base = format!(
            "{}://{}",
            self.protocol(),
            self.hostname().unwrap_or("localhost")
        );
        Url::parse(&base).ok()?.join(&self.url()).ok()
    }

    /// Path component of the current `url`.
    pub fn path(&self) -> String {
        match self.parsed_url() {
            Some(url) => url.path().to_string(),
            None => {
                let url = self.url();
                let path = url.split('?').next().unwrap_or("");
                if path.is_empty() {
                    "/".to_string()
                } else {
                    path.to_string()
                }
            }
        }
    }

    /// Query string parameters; the first occurrence of a key wins.
    pub fn query(&self) -> HashMap<String, String> {
        let mut query = HashMap::new();
        if let Some(url) = self.parsed_url() {
            for (key, value) in url.query_pairs() {
                query
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }
        query
    }

    pub fn params(&self) -> Params {
        self.inner.params.lock().clone()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.inner.params.lock().get(name).cloned()
    }

    pub fn set_params(&self, params: Params) {
        *self.inner.params.lock() = params;
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn raw_body(&self) -> String {
        self.inner.body.as_string()
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.inner.body.as_bytes()
    }

    /// Parses the raw body on every call; see [`Body::parse`].
    pub fn body(&self) -> Value {
        self.inner.body.parse()
    }

    pub fn body_as<T>(&self) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.body()).ok()
    }

    pub fn secret(&self) -> Option<String> {
        self.inner.secret.lock().clone()
    }

    pub(crate) fn set_secret(&self, secret: Option<String>) {
        *self.inner.secret.lock() = secret;
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.inner.method)
            .field("url", &self.url())
            .field("headers", &self.inner.headers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: Method, target: &str, headers: &[(&str, &str)], body: &str) -> Request {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Request::new(method, target, headers, body.as_bytes().to_vec())
    }

    #[test]
    fn test_method_normalization() {
        assert_eq!(Method::normalize("get"), Method::GET);
        assert_eq!(Method::normalize("Patch"), Method::PATCH);
        assert_eq!(
            Method::normalize("purge"),
            Method::Extension("PURGE".to_string())
        );
        assert_eq!(Method::from_string("get"), Method::Extension("get".into()));
    }

    #[test]
    fn test_head_is_served_by_get() {
        assert!(Method::GET.accepts(&Method::HEAD));
        assert!(Method::GET.accepts(&Method::GET));
        assert!(!Method::POST.accepts(&Method::HEAD));
        assert!(!Method::HEAD.accepts(&Method::GET));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = request(Method::GET, "/", &[("Content-Type", "text/plain")], "");
        assert_eq!(req.get("content-type"), Some("text/plain"));
        assert_eq!(req.get("CONTENT-TYPE"), Some("text/plain"));
        assert_eq!(req.get("x-missing"), None);
    }

    #[test]
    fn test_referrer_alias() {
        let req = request(Method::GET, "/", &[("Referer", "http://a/")], "");
        assert_eq!(req.get("Referrer"), Some("http://a/"));
        assert_eq!(req.get("referer"), Some("http://a/"));
    }

    #[test]
    fn test_path_and_query() {
        let req = request(
            Method::GET,
            "/search?q=cats&page=2&q=dogs",
            &[("Host", "example.com:9000")],
            "",
        );
        assert_eq!(req.path(), "/search");
        assert_eq!(req.hostname(), Some("example.com:9000"));
        let query = req.query();
        assert_eq!(query.get("q").map(String::as_str), Some("cats"));
        assert_eq!(query.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_url_rewrite_keeps_original() {
        let req = request(Method::GET, "/cat/42?x=1", &[], "");
        req.set_url("/42?x=1");
        assert_eq!(req.path(), "/42");
        assert_eq!(req.url(), "/42?x=1");
        assert_eq!(req.original_url(), "/cat/42?x=1");
    }

    #[test]
    fn test_urlencoded_body() {
        let req = request(
            Method::POST,
            "/cat",
            &[("Content-Type", "application/x-www-form-urlencoded")],
            "a=1&b=2",
        );
        assert_eq!(req.body(), json!({ "a": "1", "b": "2" }));

        let req = request(
            Method::POST,
            "/cat",
            &[("Content-Type", "application/x-www-form-urlencoded")],
            "name=Tom+Cat&note=a%26b&flag",
        );
        assert_eq!(
            req.body(),
            json!({ "name": "Tom Cat", "note": "a&b", "flag": "" })
        );
    }

    #[test]
    fn test_json_body() {
        let req = request(
            Method::POST,
            "/cat",
            &[("Content-Type", "application/json")],
            r#"{"x":1}"#,
        );
        assert_eq!(req.body(), json!({ "x": 1 }));

        let req = request(
            Method::POST,
            "/cat",
            &[("Content-Type", "application/json; charset=utf-8")],
            r#"{"x":1}"#,
        );
        assert_eq!(req.body(), json!({ "x": 1 }));
    }

    #[test]
    fn test_invalid_json_body_is_empty() {
        let req = request(
            Method::POST,
            "/cat",
            &[("Content-Type", "application/json")],
            "{not json",
        );
        assert_eq!(req.body(), json!({}));
    }

    #[test]
    fn test_other_content_types_are_empty() {
        let req = request(Method::POST, "/cat", &[("Content-Type", "text/plain")], "hi");
        assert_eq!(req.body(), json!({}));
        assert_eq!(req.raw_body(), "hi");

        let req = request(Method::POST, "/cat", &[], "a=1");
        assert_eq!(req.body(), json!({}));
    }

    #[test]
    fn test_typed_body() {
        #[derive(serde::Deserialize)]
        struct Cat {
            name: String,
        }

        let req = request(
            Method::POST,
            "/cat",
            &[("Content-Type", "application/json")],
            r#"{"name":"Tom"}"#,
        );
        let cat: Cat = req.body_as().unwrap();
        assert_eq!(cat.name, "Tom");
    }

    #[test]
    fn test_params_are_shared_between_clones() {
        let req = request(Method::GET, "/cat/42", &[], "");
        let clone = req.clone();
        clone.set_params(Params::from([("id".to_string(), "42".to_string())]));
        assert_eq!(req.param("id").as_deref(), Some("42"));
    }
}
