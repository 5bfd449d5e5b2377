// src/services/network.rs
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, info};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Headers that describe a single connection and must not be forwarded or stored.
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::HOST,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    pub fn get(url: Url) -> Self {
        FetchRequest {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: &'static str) -> Self {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn accepts(&self, mime: &str) -> bool {
        self.headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|value| value.contains(mime))
    }

    /// Cache key: the absolute URL without its fragment.
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Response {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }
}

/// A transport-level failure. HTTP error statuses are not failures.
#[derive(Debug, Clone, Error)]
#[error("fetch of {url} failed: {reason}")]
pub struct NetworkError {
    pub url: String,
    pub reason: String,
}

#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, NetworkError>;
}

/// Fetches site resources from the upstream storefront.
pub struct UpstreamNetwork {
    client: Client,
    site_origin: Url,
    upstream_origin: Url,
}

impl UpstreamNetwork {
    pub fn new(site_origin: Url, upstream_origin: Url) -> Self {
        info!("Upstream network: {} -> {}", site_origin, upstream_origin);
        UpstreamNetwork {
            client: Client::new(),
            site_origin,
            upstream_origin,
        }
    }

    /// Site URLs are re-addressed to the upstream origin; anything else is fetched as-is.
    fn upstream_url(&self, url: &Url) -> Url {
        if url.origin() != self.site_origin.origin() {
            return url.clone();
        }
        let mut target = self.upstream_origin.clone();
        target.set_path(url.path());
        target.set_query(url.query());
        target
    }
}

#[async_trait]
impl Network for UpstreamNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, NetworkError> {
        let url = self.upstream_url(&request.url);
        debug!("{} {}", request.method, url);

        let failed = |e: reqwest::Error| NetworkError {
            url: request.url.to_string(),
            reason: e.to_string(),
        };

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);

        let upstream = self.client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(failed)?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);
        let body = upstream.bytes().await.map_err(failed)?;

        Ok(Response { status, headers, body })
    }
}

/// A scripted origin held in memory. Can be switched offline to simulate
/// lost connectivity; counts every fetch attempt.
#[derive(Debug, Default)]
pub struct InMemoryNetwork {
    resources: Mutex<HashMap<String, Response>>,
    offline: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, response: Response) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for InMemoryNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, NetworkError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(NetworkError {
                url: request.url.to_string(),
                reason: "offline".into(),
            });
        }
        let resources = self.resources.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(resources
            .get(&request.cache_key())
            .cloned()
            .unwrap_or_else(|| Response::new(StatusCode::NOT_FOUND, "Not Found")))
    }
}
