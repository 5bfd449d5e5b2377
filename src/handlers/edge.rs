// src/handlers/edge.rs
use bytes::Bytes;
use log::{debug, error};
use reqwest::Url;
use std::sync::Arc;
use warp::http::{HeaderMap, Method};
use warp::path::FullPath;
use warp::reply::{Json, Response as Reply};
use warp::Rejection;

use super::error::ApiError;
use crate::models::{CacheSummary, EdgeStatus};
use crate::services::network::{strip_hop_by_hop, FetchRequest, Response};
use crate::services::offline_router::OfflineRouter;

/// Re-addresses an incoming request to the site origin and routes it
/// through the offline caches.
pub async fn proxy(
    method: Method,
    path: FullPath,
    query: String,
    mut headers: HeaderMap,
    body: Bytes,
    router: OfflineRouter,
    site_origin: Arc<Url>,
) -> Result<Reply, Rejection> {
    let url = site_request_url(&site_origin, path.as_str(), &query);

    strip_hop_by_hop(&mut headers);
    let request = FetchRequest { method, url, headers, body };
    let strategy = router.classify(&request);
    debug!("{} {} via {:?}", request.method, request.url, strategy);

    match router.handle(request).await {
        Ok(response) => Ok(into_reply(response)),
        Err(e) => {
            error!("Failed to serve {}: {}", path.as_str(), e);
            Err(warp::reject::custom(ApiError::from(e)))
        }
    }
}

/// Inbound paths only ever address the site origin. `//host/...` stays a path
/// instead of becoming a scheme-relative reference to another host.
fn site_request_url(site_origin: &Url, path: &str, query: &str) -> Url {
    let mut url = site_origin.clone();
    url.set_path(path);
    url.set_query(if query.is_empty() { None } else { Some(query) });
    url
}

fn into_reply(response: Response) -> Reply {
    let mut reply = Reply::new(response.body.into());
    *reply.status_mut() = response.status;
    *reply.headers_mut() = response.headers;
    reply
}

pub async fn get_status(router: OfflineRouter) -> Result<Json, Rejection> {
    let names = router.names().clone();
    let mut caches = Vec::new();
    for name in router.caches().keys().await {
        let entries = router.caches().entry_count(&name).await;
        let last_updated = router.caches().last_updated(&name).await;
        caches.push(CacheSummary { name, entries, last_updated });
    }

    Ok(warp::reply::json(&EdgeStatus {
        state: router.state().await.to_string(),
        precache: names.precache,
        runtime: names.runtime,
        caches,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_urls_stay_on_the_site_origin() {
        let site = Url::parse("https://shop.test").unwrap();

        let url = site_request_url(&site, "/checkout.php", "step=2");
        assert_eq!(url.as_str(), "https://shop.test/checkout.php?step=2");

        let url = site_request_url(&site, "//internal.test/secret", "");
        assert_eq!(url.origin(), site.origin());
        assert_eq!(url.path(), "//internal.test/secret");
        assert_eq!(url.query(), None);
    }
}
