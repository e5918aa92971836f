//! Cache key generation.

use crate::endpoint::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// SHA-256 over method, URL and the canonical JSON of the body.
    ///
    /// Correlation ids and other per-attempt headers never take part.
    pub fn derive(method: HttpMethod, url: &str, body: Option<&Value>) -> Self {
        let canonical = body.map(canonical_json).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical.as_bytes());
        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Self::new(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Serialize with object keys sorted at every depth, so logically equal
/// bodies always produce the same text.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let a: Value =
            serde_json::from_str(r#"{"b":1,"a":{"y":[{"q":1,"p":2}],"x":null}}"#).unwrap();
        assert_eq!(
            canonical_json(&a),
            r#"{"a":{"x":null,"y":[{"p":2,"q":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_canonical_json_escapes_keys_and_strings() {
        let v = json!({"quo\"te": "line\nbreak"});
        assert_eq!(canonical_json(&v), r#"{"quo\"te":"line\nbreak"}"#);
    }

    #[test]
    fn test_key_ignores_body_key_order() {
        let url = "https://api.example.com/api/v1/zones";
        let a: Value = serde_json::from_str(r#"{"lat":1.5,"lng":2.5}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"lng":2.5,"lat":1.5}"#).unwrap();
        assert_eq!(
            CacheKey::derive(HttpMethod::Get, url, Some(&a)),
            CacheKey::derive(HttpMethod::Get, url, Some(&b))
        );
    }

    #[test]
    fn test_key_distinguishes_method_url_and_body() {
        let url = "https://api.example.com/api/v1/zones";
        let base = CacheKey::derive(HttpMethod::Get, url, None);
        assert_eq!(base.as_str().len(), 64);
        assert_ne!(base, CacheKey::derive(HttpMethod::Post, url, None));
        assert_ne!(base, CacheKey::derive(HttpMethod::Get, "https://api.example.com/x", None));
        assert_ne!(
            base,
            CacheKey::derive(HttpMethod::Get, url, Some(&json!({"page": 2})))
        );
        assert_eq!(base, CacheKey::derive(HttpMethod::Get, url, None));
    }
}
