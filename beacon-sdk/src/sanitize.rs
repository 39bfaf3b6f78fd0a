//! Privacy scrubbing and size bounding for event detail data.

use beacon_types::{Data, Value};

/// Broad terms stripped from detail keys (lowercased substring match).
pub const DEFAULT_DENYLIST: &[&str] = &[
    "password",
    "token",
    "authorization",
    "auth",
    "secret",
    "key",
    "email",
    "name",
];

/// Maximum length, in characters, of a string detail value.
pub const MAX_VALUE_LEN: usize = 256;

/// Removes denylisted keys and truncates oversized strings.
///
/// Sanitization is total: every input produces a (possibly empty) map.
///
/// # Example
///
/// ```rust
/// use beacon_sdk::Sanitizer;
/// use beacon_types::{Data, Value};
///
/// let mut raw = Data::new();
/// raw.insert("userEmail".into(), Value::from("a@b.c"));
/// raw.insert("note".into(), Value::from("x".repeat(500)));
///
/// let clean = Sanitizer::default().sanitize(raw);
/// assert!(!clean.contains_key("userEmail"));
/// assert_eq!(clean["note"].as_str().unwrap().len(), 256);
/// ```
#[derive(Debug, Clone)]
pub struct Sanitizer {
    denylist: Vec<String>,
    max_len: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_DENYLIST.iter().copied())
    }
}

impl Sanitizer {
    /// Create a sanitizer with a custom denylist and the default length cap.
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            denylist: denylist
                .into_iter()
                .map(|term| term.as_ref().to_lowercase())
                .filter(|term| !term.is_empty())
                .collect(),
            max_len: MAX_VALUE_LEN,
        }
    }

    /// Override the string length cap.
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    /// The lowercased denylist terms.
    pub fn denylist(&self) -> &[String] {
        &self.denylist
    }

    /// Whether a key would be stripped.
    pub fn is_denied(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.denylist.iter().any(|term| lower.contains(term.as_str()))
    }

    /// Sanitize a typed detail map.
    pub fn sanitize(&self, data: Data) -> Data {
        data.into_iter()
            .filter(|(key, _)| !self.is_denied(key))
            .map(|(key, value)| (key, self.bound(value)))
            .collect()
    }

    /// Sanitize untrusted JSON detail.
    ///
    /// Anything other than an object yields an empty map. Nested arrays and
    /// objects are flattened to their JSON text, then length-capped.
    pub fn sanitize_json(&self, raw: &serde_json::Value) -> Data {
        self.sanitize(data_from_json(raw))
    }

    fn bound(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(truncate_chars(s, self.max_len)),
            other => other,
        }
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}

/// Coerce untrusted JSON into a detail map without sanitizing it.
///
/// Non-objects yield an empty map; nested values become their JSON text.
pub fn data_from_json(raw: &serde_json::Value) -> Data {
    match raw.as_object() {
        Some(object) => object
            .iter()
            .map(|(key, value)| (key.clone(), scalar_from_json(value)))
            .collect(),
        None => Data::new(),
    }
}

fn scalar_from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        nested => Value::String(nested.to_string()),
    }
}
