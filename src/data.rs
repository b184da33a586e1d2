//! Data envelopes that flow between the crawl stages.
//!
//! A [`Request`] travels from the admission filter to a downloader, the
//! resulting [`Response`] to an analyzer, and every extracted [`Item`] to a
//! pipeline. Each envelope carries the hop depth from the seed request so
//! the scheduler can enforce its depth bound.

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::collections::HashMap;
use url::Url;

/// An HTTP request scheduled for download, together with its crawl depth.
///
/// Immutable after construction; derived requests are built fresh via
/// [`Request::at_depth`].
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    depth: u32,
}

impl Request {
    /// Creates a request with the given method and URL at depth zero.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            depth: 0,
        }
    }

    /// Creates a `GET` request at depth zero.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Returns a copy of this request placed at `depth`.
    pub fn at_depth(&self, depth: u32) -> Self {
        Self {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            depth,
        }
    }

    /// Replaces the header map.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Hop count from the seed request; the seed itself is zero.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// A request is usable only when its URL names a host.
    pub fn valid(&self) -> bool {
        self.url.has_host()
    }
}

/// A downloaded HTTP response at the depth of the request that produced it.
///
/// The body is an owned byte snapshot; ownership passes to the analyzer
/// stage along with the envelope.
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    depth: u32,
}

impl Response {
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Bytes, depth: u32) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            depth,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn valid(&self) -> bool {
        self.url.has_host()
    }
}

/// An extracted item: string keys mapped to arbitrary JSON values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Item(HashMap<String, serde_json::Value>);

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field, returning the previous value if the key existed.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// An item is meaningful only when it carries at least one field.
    pub fn valid(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, serde_json::Value)> for Item {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Item(iter.into_iter().collect())
    }
}

/// A datum emitted by an analyzer: either a follow-up request or an
/// extracted item.
#[derive(Debug, Clone)]
pub enum Data {
    Request(Request),
    Item(Item),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_validity_requires_a_host() {
        let req = Request::get(Url::parse("http://example.org/").unwrap());
        assert!(req.valid());
        assert_eq!(req.depth(), 0);

        let req = Request::get(Url::parse("data:text/plain,hi").unwrap());
        assert!(!req.valid());
    }

    #[test]
    fn at_depth_keeps_the_payload() {
        let req = Request::get(Url::parse("http://example.org/a").unwrap());
        let hopped = req.at_depth(3);
        assert_eq!(hopped.depth(), 3);
        assert_eq!(hopped.url(), req.url());
        assert_eq!(hopped.method(), req.method());
    }

    #[test]
    fn item_validity_requires_a_field() {
        let mut item = Item::new();
        assert!(!item.valid());
        item.insert("title", "hello");
        assert!(item.valid());
        assert_eq!(item.get("title"), Some(&serde_json::json!("hello")));
    }
}
