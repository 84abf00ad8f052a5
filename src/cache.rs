//! Advisory parse-cache abstraction (§6.3): a miss always means "reparse".

use std::collections::HashMap;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::source::{ParseError, SourceMap};
use crate::element::Element;

/// Cache key: a filename plus the modification time observed when it was read.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub filename: String,
    pub last_modified: Option<SystemTime>,
}

/// The result a parser produces for one blueprint buffer (§6.1), cached
/// verbatim so a hit skips parsing entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseResult {
    pub elements: Vec<Element>,
    pub source_map: SourceMap,
    pub errors: Vec<ParseError>,
}

#[async_trait]
pub trait ParseCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<ParseResult>;
    async fn put(&self, key: CacheKey, value: ParseResult);
}

/// In-memory cache; the on-disk cache format is out of scope.
#[derive(Default)]
pub struct InMemoryParseCache {
    entries: Mutex<HashMap<CacheKey, ParseResult>>,
}

impl InMemoryParseCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParseCache for InMemoryParseCache {
    async fn get(&self, key: &CacheKey) -> Option<ParseResult> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn put(&self, key: CacheKey, value: ParseResult) {
        self.entries.lock().await.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> CacheKey {
        CacheKey { filename: name.to_string(), last_modified: None }
    }

    fn empty_result() -> ParseResult {
        ParseResult { elements: Vec::new(), source_map: SourceMap::new(), errors: Vec::new() }
    }

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = InMemoryParseCache::new();
        assert!(cache.get(&key("a.bp")).await.is_none());
    }

    #[tokio::test]
    async fn put_then_get_is_a_hit() {
        let cache = InMemoryParseCache::new();
        cache.put(key("a.bp"), empty_result()).await;
        assert!(cache.get(&key("a.bp")).await.is_some());
    }

    #[tokio::test]
    async fn distinct_modification_times_are_distinct_keys() {
        let cache = InMemoryParseCache::new();
        cache.put(key("a.bp"), empty_result()).await;
        let other = CacheKey { filename: "a.bp".to_string(), last_modified: Some(SystemTime::now()) };
        assert!(cache.get(&other).await.is_none());
    }
}
