use std::fmt;

/// A response header value: a single field or a list appended over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderValue::One(value) => vec![value.as_str()],
            HeaderValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Joins `self` and `other` into a list, `self` first.
    pub fn concat(self, other: HeaderValue) -> HeaderValue {
        let mut values = self.into_vec();
        values.extend(other.into_vec());
        HeaderValue::Many(values)
    }

    fn into_vec(self) -> Vec<String> {
        match self {
            HeaderValue::One(value) => vec![value],
            HeaderValue::Many(values) => values,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.values().join(", "))
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::One(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::One(value)
    }
}

impl From<&String> for HeaderValue {
    fn from(value: &String) -> Self {
        HeaderValue::One(value.clone())
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        HeaderValue::Many(values)
    }
}

impl From<Vec<&str>> for HeaderValue {
    fn from(values: Vec<&str>) -> Self {
        HeaderValue::Many(values.into_iter().map(str::to_string).collect())
    }
}

/// Ordered header map with case-insensitive names. The first spelling a name
/// was set with is kept and written back on the wire, which
/// `http::HeaderMap` cannot do since it lower-cases every name. Names and
/// values are still validated with the `http` types in `Response::set`.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, HeaderValue)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn insert(&mut self, name: &str, value: HeaderValue) {
        match self.position(name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        self.position(name).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_replace() {
        let mut headers = Headers::new();
        headers.insert("X-Token", "a".into());
        headers.insert("x-token", "b".into());
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-TOKEN"), Some(&HeaderValue::One("b".into())));
        assert_eq!(headers.iter().next().map(|(name, _)| name), Some("X-Token"));
    }

    #[test]
    fn test_concat() {
        let value = HeaderValue::from("a").concat(vec!["b", "c"].into());
        assert_eq!(value, HeaderValue::Many(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(value.to_string(), "a, b, c");
    }

    #[test]
    fn test_remove() {
        let mut headers = Headers::new();
        headers.insert("Location", "/".into());
        assert!(headers.remove("location").is_some());
        assert!(headers.is_empty());
    }
}
