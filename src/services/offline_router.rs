// src/services/offline_router.rs
use futures::future::try_join_all;
use log::{error, info, warn};
use regex::Regex;
use reqwest::{Method, Url};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::RwLock;

use super::cache_storage::{CacheNames, CacheStorage};
use super::lifecycle::WorkerState;
use super::network::{cache_key, FetchRequest, Network, NetworkError, Response};

/// Resources precached at install time.
pub const DEFAULT_PRECACHE_MANIFEST: &[&str] = &[
    "/",
    "/index.php",
    "/css/framework.css",
    "/css/style.css",
    "/css/notifications.css",
    "/js/main.js",
    "/js/auth.js",
    "/js/notifications.js",
    "/js/config.js",
    "/img/logo.png",
    "/img/placeholder-product.png",
    "/offline.html",
];

pub const OFFLINE_PAGE: &str = "/offline.html";
pub const PLACEHOLDER_IMAGE: &str = "/img/placeholder-product.png";

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("precache of {url} failed: {reason}")]
    InstallFailed { url: String, reason: String },
    #[error("no network connection and no cached response for {url}")]
    Offline { url: String },
    #[error("fallback resource {0} is not cached")]
    MissingFallback(String),
    #[error("cannot {action} while the worker is {state}")]
    InvalidState { action: &'static str, state: WorkerState },
    #[error("invalid resource path {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    NetworkFirstWithOfflinePage,
    CacheFirst,
    StaleWhileRevalidate,
    /// Not intercepted: cross-origin or non-GET
    Passthrough,
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub site_origin: Url,
    pub names: CacheNames,
    pub manifest: Vec<String>,
    pub offline_page: String,
    pub placeholder_image: String,
}

impl RouterConfig {
    pub fn new(site_origin: Url, names: CacheNames) -> Self {
        RouterConfig {
            site_origin,
            names,
            manifest: DEFAULT_PRECACHE_MANIFEST.iter().map(|p| p.to_string()).collect(),
            offline_page: OFFLINE_PAGE.to_string(),
            placeholder_image: PLACEHOLDER_IMAGE.to_string(),
        }
    }

    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }
}

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\.(jpg|jpeg|png|gif|svg|webp)$").expect("image pattern is valid")
    })
}

fn asset_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.(css|js)$").expect("asset pattern is valid"))
}

pub fn is_image(path: &str) -> bool {
    image_pattern().is_match(path) || path.contains("/img/")
}

pub fn is_style_or_script(path: &str) -> bool {
    asset_pattern().is_match(path) || path.contains("/css/") || path.contains("/js/")
}

/// Serves site requests from the network and the versioned caches.
#[derive(Clone)]
pub struct OfflineRouter {
    network: Arc<dyn Network>,
    caches: CacheStorage,
    config: Arc<RouterConfig>,
    state: Arc<RwLock<WorkerState>>,
}

impl OfflineRouter {
    pub fn new(network: Arc<dyn Network>, caches: CacheStorage, config: RouterConfig) -> Self {
        OfflineRouter {
            network,
            caches,
            config: Arc::new(config),
            state: Arc::new(RwLock::new(WorkerState::Parsed)),
        }
    }

    pub fn caches(&self) -> &CacheStorage {
        &self.caches
    }

    pub fn names(&self) -> &CacheNames {
        &self.config.names
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn transition(&self, action: &'static str, allowed: fn(&WorkerState) -> bool, next: WorkerState) -> Result<(), RouterError> {
        let mut state = self.state.write().await;
        if !allowed(&state) {
            return Err(RouterError::InvalidState { action, state: *state });
        }
        *state = next;
        Ok(())
    }

    async fn set_state(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Install then activate straight away, without waiting for clients to reload.
    pub async fn start(&self) -> Result<(), RouterError> {
        self.install().await?;
        self.activate().await?;
        Ok(())
    }

    /// Starts a worker that never got going or whose install failed.
    /// Returns whether the worker is active afterwards; an install or
    /// activation already in flight is left alone.
    pub async fn ensure_started(&self) -> Result<bool, RouterError> {
        match self.state().await {
            WorkerState::Activated => Ok(true),
            WorkerState::Parsed | WorkerState::Redundant => {
                self.start().await?;
                Ok(true)
            }
            WorkerState::Installing | WorkerState::Installed | WorkerState::Activating => Ok(false),
        }
    }

    /// Precaches the whole manifest. Any unreachable or non-2xx resource fails
    /// the install and nothing is written.
    pub async fn install(&self) -> Result<usize, RouterError> {
        self.transition("install", WorkerState::can_install, WorkerState::Installing).await?;
        let precache = &self.config.names.precache;
        info!(
            "Installing: precaching {} resources into {}",
            self.config.manifest.len(),
            precache
        );

        let fetches = self.config.manifest.iter().map(|path| self.precache_one(path));
        match try_join_all(fetches).await {
            Ok(entries) => {
                let count = entries.len();
                self.caches.put_all(precache, entries).await;
                self.set_state(WorkerState::Installed).await;
                info!("Installed {} precache entries", count);
                Ok(count)
            }
            Err(e) => {
                error!("Install failed: {}", e);
                self.set_state(WorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    async fn precache_one(&self, path: &str) -> Result<(String, Response), RouterError> {
        let url = self.site_url(path)?;
        let request = FetchRequest::get(url);
        let response = self.network.fetch(&request).await.map_err(|e| {
            RouterError::InstallFailed { url: path.to_string(), reason: e.reason }
        })?;
        if !response.ok() {
            return Err(RouterError::InstallFailed {
                url: path.to_string(),
                reason: format!("HTTP {}", response.status),
            });
        }
        Ok((request.cache_key(), response))
    }

    /// Deletes every cache outside the current version's allow-list and
    /// takes control of requests. Returns the deleted cache names.
    pub async fn activate(&self) -> Result<Vec<String>, RouterError> {
        self.transition("activate", WorkerState::can_activate, WorkerState::Activating).await?;

        let mut deleted = Vec::new();
        for name in self.caches.keys().await {
            if !self.config.names.contains(&name) && self.caches.delete(&name).await {
                info!("Deleted stale cache {}", name);
                deleted.push(name);
            }
        }
        self.caches.open(&self.config.names.runtime).await;

        self.set_state(WorkerState::Activated).await;
        info!("Activated; now controlling all clients");
        Ok(deleted)
    }

    pub fn classify(&self, request: &FetchRequest) -> Strategy {
        if request.url.origin() != self.config.site_origin.origin() || request.method != Method::GET {
            return Strategy::Passthrough;
        }

        let path = request.url.path();
        if path.contains("/api/") {
            Strategy::NetworkFirst
        } else if request.accepts("text/html") {
            Strategy::NetworkFirstWithOfflinePage
        } else if is_image(path) {
            Strategy::CacheFirst
        } else if is_style_or_script(path) {
            Strategy::StaleWhileRevalidate
        } else {
            Strategy::NetworkFirst
        }
    }

    pub async fn handle(&self, request: FetchRequest) -> Result<Response, RouterError> {
        if !self.state().await.is_active() {
            return self.passthrough(&request).await;
        }

        match self.classify(&request) {
            Strategy::NetworkFirst => self.network_first(&request, false).await,
            Strategy::NetworkFirstWithOfflinePage => self.network_first(&request, true).await,
            Strategy::CacheFirst => self.cache_first(&request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&request).await,
            Strategy::Passthrough => self.passthrough(&request).await,
        }
    }

    async fn passthrough(&self, request: &FetchRequest) -> Result<Response, RouterError> {
        Ok(self.network.fetch(request).await?)
    }

    async fn network_first(&self, request: &FetchRequest, offline_page: bool) -> Result<Response, RouterError> {
        let runtime = &self.config.names.runtime;
        let key = request.cache_key();

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    self.caches.put(runtime, key, response.clone()).await;
                }
                Ok(response)
            }
            Err(e) => {
                warn!("Network unavailable, trying cache: {}", e);
                if let Some(cached) = self.caches.match_in(runtime, &key).await {
                    return Ok(cached);
                }
                if offline_page {
                    return self.fallback(&self.config.offline_page).await;
                }
                Err(RouterError::Offline { url: request.url.to_string() })
            }
        }
    }

    async fn cache_first(&self, request: &FetchRequest) -> Result<Response, RouterError> {
        let precache = &self.config.names.precache;
        let key = request.cache_key();
        if let Some(cached) = self.caches.match_in(precache, &key).await {
            return Ok(cached);
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    self.caches.put(precache, key, response.clone()).await;
                }
                Ok(response)
            }
            Err(e) => {
                warn!("Not cached and network unavailable: {}", e);
                if is_image(request.url.path()) {
                    return self.fallback(&self.config.placeholder_image).await;
                }
                Err(RouterError::Offline { url: request.url.to_string() })
            }
        }
    }

    async fn stale_while_revalidate(&self, request: &FetchRequest) -> Result<Response, RouterError> {
        let cached = self.caches
            .match_in(&self.config.names.precache, &request.cache_key())
            .await;

        match cached {
            Some(response) => {
                let router = self.clone();
                let request = request.clone();
                tokio::spawn(async move {
                    if let Err(e) = router.revalidate(&request).await {
                        warn!("Background refresh failed: {}", e);
                    }
                });
                Ok(response)
            }
            None => self.revalidate(request).await.map_err(|e| {
                warn!("Not cached and network unavailable: {}", e);
                RouterError::Offline { url: request.url.to_string() }
            }),
        }
    }

    async fn revalidate(&self, request: &FetchRequest) -> Result<Response, NetworkError> {
        let response = self.network.fetch(request).await?;
        if response.ok() {
            self.caches
                .put(&self.config.names.precache, request.cache_key(), response.clone())
                .await;
        }
        Ok(response)
    }

    async fn fallback(&self, path: &str) -> Result<Response, RouterError> {
        let key = cache_key(&self.site_url(path)?);
        self.caches
            .match_any(&key)
            .await
            .ok_or_else(|| RouterError::MissingFallback(path.to_string()))
    }

    fn site_url(&self, path: &str) -> Result<Url, RouterError> {
        self.config
            .site_origin
            .join(path)
            .map_err(|_| RouterError::InvalidUrl(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::network::InMemoryNetwork;
    use reqwest::header::ACCEPT;
    use reqwest::StatusCode;
    use std::time::Duration;

    const SITE: &str = "https://shop.test";

    fn ok(body: &'static str) -> Response {
        Response::new(StatusCode::OK, body)
    }

    fn url(path: &str) -> Url {
        Url::parse(SITE).unwrap().join(path).unwrap()
    }

    fn get(path: &str) -> FetchRequest {
        FetchRequest::get(url(path))
    }

    fn page(path: &str) -> FetchRequest {
        get(path).with_header(ACCEPT, "text/html,application/xhtml+xml")
    }

    fn manifest() -> Vec<String> {
        ["/", "/offline.html", "/img/placeholder-product.png", "/css/style.css"]
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    fn origin() -> Arc<InMemoryNetwork> {
        let network = InMemoryNetwork::new();
        network.serve(&format!("{}/", SITE), ok("home"));
        network.serve(&format!("{}/offline.html", SITE), ok("offline page"));
        network.serve(&format!("{}/img/placeholder-product.png", SITE), ok("placeholder"));
        network.serve(&format!("{}/css/style.css", SITE), ok("body{}"));
        Arc::new(network)
    }

    fn router_with(network: Arc<InMemoryNetwork>, caches: CacheStorage, version: &str) -> OfflineRouter {
        let config = RouterConfig::new(Url::parse(SITE).unwrap(), CacheNames::new("giggatek", version))
            .with_manifest(manifest());
        OfflineRouter::new(network, caches, config)
    }

    async fn active_router() -> (OfflineRouter, Arc<InMemoryNetwork>) {
        let network = origin();
        let router = router_with(network.clone(), CacheStorage::new(), "v1");
        router.start().await.unwrap();
        (router, network)
    }

    #[tokio::test]
    async fn install_precaches_manifest() {
        let network = origin();
        let router = router_with(network, CacheStorage::new(), "v1");
        assert_eq!(router.state().await, WorkerState::Parsed);

        assert_eq!(router.install().await.unwrap(), 4);
        assert_eq!(router.state().await, WorkerState::Installed);
        assert_eq!(router.caches().entry_count("giggatek-cache-v1").await, 4);

        router.activate().await.unwrap();
        assert_eq!(router.state().await, WorkerState::Activated);
        assert!(router.caches().has("giggatek-runtime-v1").await);
    }

    #[tokio::test]
    async fn install_is_all_or_nothing() {
        let network = origin();
        let config = RouterConfig::new(Url::parse(SITE).unwrap(), CacheNames::new("giggatek", "v1"))
            .with_manifest(vec!["/".into(), "/missing.css".into()]);
        let router = OfflineRouter::new(network, CacheStorage::new(), config);

        let err = router.install().await.unwrap_err();
        assert!(matches!(err, RouterError::InstallFailed { ref url, .. } if url == "/missing.css"));
        assert_eq!(router.caches().entry_count("giggatek-cache-v1").await, 0);
        assert_eq!(router.state().await, WorkerState::Redundant);
        assert!(matches!(router.activate().await, Err(RouterError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn install_fails_when_offline() {
        let network = origin();
        network.set_offline(true);
        let router = router_with(network.clone(), CacheStorage::new(), "v1");
        assert!(router.install().await.is_err());

        // A failed worker may try again once the origin is back.
        network.set_offline(false);
        assert_eq!(router.install().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn failed_start_recovers_on_retry() {
        let network = origin();
        network.set_offline(true);
        let router = router_with(network.clone(), CacheStorage::new(), "v1");
        assert!(router.start().await.is_err());
        assert_eq!(router.state().await, WorkerState::Redundant);
        assert!(router.ensure_started().await.is_err());
        assert_eq!(router.state().await, WorkerState::Redundant);

        network.set_offline(false);
        assert!(router.ensure_started().await.unwrap());
        assert_eq!(router.state().await, WorkerState::Activated);
        assert_eq!(router.caches().entry_count("giggatek-cache-v1").await, 4);

        let fetches = network.fetch_count();
        assert!(router.ensure_started().await.unwrap());
        assert_eq!(network.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn activation_removes_previous_versions() {
        let network = origin();
        let caches = CacheStorage::new();
        let v1 = router_with(network.clone(), caches.clone(), "v1");
        v1.start().await.unwrap();
        v1.handle(get("/api/products")).await.unwrap();
        caches.put("unrelated-cache", "k".into(), ok("x")).await;

        let v2 = router_with(network, caches.clone(), "v2");
        v2.install().await.unwrap();
        let mut deleted = v2.activate().await.unwrap();
        deleted.sort();

        assert_eq!(
            deleted,
            vec!["giggatek-cache-v1", "giggatek-runtime-v1", "unrelated-cache"]
        );
        assert_eq!(caches.keys().await, vec!["giggatek-cache-v2", "giggatek-runtime-v2"]);
        assert_eq!(caches.entry_count("giggatek-cache-v2").await, 4);
    }

    #[tokio::test]
    async fn classification_priority() {
        let (router, _) = active_router().await;
        assert_eq!(router.classify(&page("/api/orders")), Strategy::NetworkFirst);
        assert_eq!(router.classify(&page("/products.php")), Strategy::NetworkFirstWithOfflinePage);
        assert_eq!(router.classify(&get("/img/banner")), Strategy::CacheFirst);
        assert_eq!(router.classify(&get("/uploads/laptop.webp")), Strategy::CacheFirst);
        assert_eq!(router.classify(&get("/css/style.css")), Strategy::StaleWhileRevalidate);
        assert_eq!(router.classify(&get("/bundle.js")), Strategy::StaleWhileRevalidate);
        assert_eq!(router.classify(&get("/manifest.json")), Strategy::NetworkFirst);

        let foreign = FetchRequest::get(Url::parse("https://js.stripe.com/v3/").unwrap());
        assert_eq!(router.classify(&foreign), Strategy::Passthrough);

        let mut post = get("/api/cart");
        post.method = Method::POST;
        assert_eq!(router.classify(&post), Strategy::Passthrough);
    }

    #[tokio::test]
    async fn cached_image_survives_going_offline() {
        let (router, network) = active_router().await;
        network.serve(&format!("{}/img/laptop.jpg", SITE), ok("jpeg bytes"));

        let online = router.handle(get("/img/laptop.jpg")).await.unwrap();
        network.set_offline(true);
        let fetches = network.fetch_count();

        let first = router.handle(get("/img/laptop.jpg")).await.unwrap();
        let second = router.handle(get("/img/laptop.jpg")).await.unwrap();
        assert_eq!(first.body, online.body);
        assert_eq!(second.body, online.body);
        assert_eq!(network.fetch_count(), fetches);
    }

    #[tokio::test]
    async fn uncached_image_offline_gets_placeholder() {
        let (router, network) = active_router().await;
        network.set_offline(true);
        let response = router.handle(get("/img/unknown.png")).await.unwrap();
        assert_eq!(response.body, "placeholder");
    }

    #[tokio::test]
    async fn offline_page_for_unvisited_html() {
        let (router, network) = active_router().await;
        network.set_offline(true);
        let response = router.handle(page("/cart.php")).await.unwrap();
        assert_eq!(response.body, "offline page");
    }

    #[tokio::test]
    async fn visited_html_served_from_runtime_cache() {
        let (router, network) = active_router().await;
        network.serve(&format!("{}/cart.php", SITE), ok("cart"));
        router.handle(page("/cart.php")).await.unwrap();

        network.set_offline(true);
        let response = router.handle(page("/cart.php")).await.unwrap();
        assert_eq!(response.body, "cart");
    }

    #[tokio::test]
    async fn api_offline_rejects_without_cache() {
        let (router, network) = active_router().await;
        network.serve(&format!("{}/api/products", SITE), ok("[1,2]"));
        router.handle(get("/api/products")).await.unwrap();

        network.set_offline(true);
        let cached = router.handle(get("/api/products")).await.unwrap();
        assert_eq!(cached.body, "[1,2]");

        let err = router.handle(get("/api/rentals")).await.unwrap_err();
        assert!(matches!(err, RouterError::Offline { .. }));
    }

    #[tokio::test]
    async fn error_responses_are_not_cached() {
        let (router, network) = active_router().await;
        network.serve(
            &format!("{}/api/flaky", SITE),
            Response::new(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        );
        let response = router.handle(get("/api/flaky")).await.unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);

        network.set_offline(true);
        assert!(router.handle(get("/api/flaky")).await.is_err());
    }

    #[tokio::test]
    async fn stale_asset_served_then_refreshed() {
        let (router, network) = active_router().await;
        network.serve(&format!("{}/css/style.css", SITE), ok("body{color:red}"));

        let stale = router.handle(get("/css/style.css")).await.unwrap();
        assert_eq!(stale.body, "body{}");

        let key = format!("{}/css/style.css", SITE);
        let mut refreshed = None;
        for _ in 0..100 {
            let current = router.caches().match_in("giggatek-cache-v1", &key).await;
            if current.as_ref().map(|r| r.body.clone()) == Some("body{color:red}".into()) {
                refreshed = current;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(refreshed.is_some(), "background refresh never landed");

        let fresh = router.handle(get("/css/style.css")).await.unwrap();
        assert_eq!(fresh.body, "body{color:red}");
    }

    #[tokio::test]
    async fn stale_asset_survives_failed_refresh() {
        let (router, network) = active_router().await;
        network.set_offline(true);
        let response = router.handle(get("/css/style.css")).await.unwrap();
        assert_eq!(response.body, "body{}");

        let err = router.handle(get("/js/never-seen.js")).await.unwrap_err();
        assert!(matches!(err, RouterError::Offline { .. }));
    }

    #[tokio::test]
    async fn uncached_asset_waits_for_network() {
        let (router, network) = active_router().await;
        network.serve(&format!("{}/js/cart.js", SITE), ok("cart()"));
        let response = router.handle(get("/js/cart.js")).await.unwrap();
        assert_eq!(response.body, "cart()");
        assert!(router
            .caches()
            .match_in("giggatek-cache-v1", &format!("{}/js/cart.js", SITE))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn inactive_worker_passes_requests_through() {
        let network = origin();
        let router = router_with(network.clone(), CacheStorage::new(), "v1");
        let response = router.handle(page("/")).await.unwrap();
        assert_eq!(response.body, "home");
        assert!(router.caches().keys().await.is_empty());

        network.set_offline(true);
        assert!(matches!(router.handle(page("/")).await, Err(RouterError::Network(_))));
    }

    #[tokio::test]
    async fn cross_origin_is_never_cached() {
        let (router, network) = active_router().await;
        network.serve("https://cdn.test/lib.js", ok("lib"));
        let foreign = FetchRequest::get(Url::parse("https://cdn.test/lib.js").unwrap());

        let response = router.handle(foreign.clone()).await.unwrap();
        assert_eq!(response.body, "lib");
        assert!(router.caches().match_any("https://cdn.test/lib.js").await.is_none());
    }
}
