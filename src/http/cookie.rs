use crate::error::{ServerError, ServerResult};
use base64::Engine;
use serde_json::Value;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    /// Lifetime in milliseconds; converted to `Expires` and a `Max-Age` in seconds.
    pub max_age: Option<i64>,
    pub expires: Option<SystemTime>,
    /// Defaults to `/`.
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub signed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CookieValue {
    Text(String),
    Json(Value),
}

impl CookieValue {
    /// Objects are stored as `j:` followed by their JSON encoding.
    pub(crate) fn encode(&self) -> String {
        match self {
            CookieValue::Text(text) => text.clone(),
            CookieValue::Json(value) => format!("j:{}", value),
        }
    }
}

impl From<&str> for CookieValue {
    fn from(value: &str) -> Self {
        CookieValue::Text(value.to_string())
    }
}

impl From<String> for CookieValue {
    fn from(value: String) -> Self {
        CookieValue::Text(value)
    }
}

impl From<Value> for CookieValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => CookieValue::Text(text),
            other => CookieValue::Json(other),
        }
    }
}

/// Builds a `Set-Cookie` field value.
pub(crate) fn set_cookie(
    name: &str,
    value: &CookieValue,
    options: &CookieOptions,
    secret: Option<&str>,
) -> ServerResult<String> {
    let mut val = value.encode();
    if options.signed {
        let secret = secret.ok_or(ServerError::MissingCookieSecret)?;
        val = format!("s:{}", sign(&val, secret)?);
    }

    let mut expires = options.expires;
    let mut max_age_secs = None;
    if let Some(max_age) = options.max_age {
        let now = SystemTime::now();
        expires = Some(if max_age >= 0 {
            now + Duration::from_millis(max_age as u64)
        } else {
            now.checked_sub(Duration::from_millis(max_age.unsigned_abs()))
                .unwrap_or(SystemTime::UNIX_EPOCH)
        });
        max_age_secs = Some(max_age.div_euclid(1000));
    }

    serialize(
        name,
        &val,
        &SerializeOptions {
            max_age: max_age_secs,
            domain: options.domain.as_deref(),
            path: Some(options.path.as_deref().unwrap_or("/")),
            expires,
            http_only: options.http_only,
            secure: options.secure,
            same_site: options.same_site,
        },
    )
}

struct SerializeOptions<'a> {
    max_age: Option<i64>,
    domain: Option<&'a str>,
    path: Option<&'a str>,
    expires: Option<SystemTime>,
    http_only: bool,
    secure: bool,
    same_site: Option<SameSite>,
}

fn is_field_content(s: &str) -> bool {
    s.chars()
        .all(|c| c == '\t' || (' '..='~').contains(&c) || ('\u{80}'..='\u{ff}').contains(&c))
}

fn serialize(name: &str, value: &str, options: &SerializeOptions<'_>) -> ServerResult<String> {
    if name.is_empty() || !is_field_content(name) || name.contains(|c| c == '=' || c == ';') {
        return Err(ServerError::InvalidHeader(format!("argument name is invalid: {}", name)));
    }

    let mut cookie = format!("{}={}", name, urlencoding::encode(value));

    if let Some(max_age) = options.max_age {
        cookie.push_str(&format!("; Max-Age={}", max_age));
    }
    if let Some(domain) = options.domain {
        if !is_field_content(domain) {
            return Err(ServerError::InvalidHeader(format!("option domain is invalid: {}", domain)));
        }
        cookie.push_str(&format!("; Domain={}", domain));
    }
    if let Some(path) = options.path {
        if !is_field_content(path) {
            return Err(ServerError::InvalidHeader(format!("option path is invalid: {}", path)));
        }
        cookie.push_str(&format!("; Path={}", path));
    }
    if let Some(expires) = options.expires {
        cookie.push_str(&format!("; Expires={}", httpdate::fmt_http_date(expires)));
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        cookie.push_str(match same_site {
            SameSite::Strict => "; SameSite=Strict",
            SameSite::Lax => "; SameSite=Lax",
            SameSite::None => "; SameSite=None",
        });
    }

    Ok(cookie)
}

type HmacSha256 = Hmac<Sha256>;

/// Signs `value` as `<value>.<base64 HMAC-SHA256>` with the padding stripped.
pub fn sign(value: &str, secret: &str) -> ServerResult<String> {
    let mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServerError::InvalidCookieSecret(e.to_string()))?
        .chain_update(value.as_bytes())
        .finalize()
        .into_bytes();
    Ok(format!(
        "{}.{}",
        value,
        base64::engine::general_purpose::STANDARD_NO_PAD.encode(mac)
    ))
}
