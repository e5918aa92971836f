//! 响应缓存模块：按 TTL 与容量约束保存成功的 GET 响应，避免重复网络请求。
//!
//! # Response Caching Module
//!
//! Successful (HTTP 200) GET responses that the caller explicitly marked as
//! cacheable are kept for a fixed TTL and replayed verbatim for identical
//! requests.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | TTL- and capacity-bounded store with hit/miss statistics |
//! | [`CacheKey`] | Stable key derived from method, URL and canonical body |
//! | [`CacheStats`] | Counters exposed through client signals |
//!
//! ## Example
//!
//! ```rust
//! use guardlink::cache::{CacheKey, ResponseCache};
//! use guardlink::clock::SystemClock;
//! use guardlink::endpoint::HttpMethod;
//! use guardlink::transport::HttpResponse;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let cache = ResponseCache::new(Duration::from_secs(300), 100, Arc::new(SystemClock));
//! let key = CacheKey::derive(HttpMethod::Get, "https://api.example.com/api/v1/zones", None);
//! cache.store(key.clone(), HttpResponse::new(200, "[]"));
//! assert!(cache.lookup(&key).is_some());
//! ```

mod key;
mod store;

pub use key::{canonical_json, CacheKey};
pub use store::{CacheStats, ResponseCache, SweepReport};
