// src/routes.rs
use log::info;
use reqwest::Url;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::path::FullPath;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::edge::{get_status, proxy};
use crate::handlers::error::ApiError;
use crate::handlers::push::{post_click, post_push};
use crate::handlers::rent_to_own::{get_quote, get_schedule, get_terms};
use crate::models::{QuoteQuery, ScheduleQuery};
use crate::services::offline_router::OfflineRouter;
use crate::services::rent_to_own::RentToOwnCalculator;

/// Paths under this prefix are served by the edge itself, never proxied.
pub const EDGE_PREFIX: &str = "/edge/";

const MAX_PUSH_BYTES: u64 = 16 * 1024;

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if let Some(api_error) = err.find::<ApiError>() {
        (api_error.status, api_error.message.clone())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large".to_string())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(
    calculator: Arc<RentToOwnCalculator>,
    router: OfflineRouter,
    site_origin: Arc<Url>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let calculator_filter = warp::any().map(move || calculator.clone());
    let router_filter = warp::any().map(move || router.clone());
    let origin_filter = warp::any().map(move || site_origin.clone());

    let quote_route = warp::path!("edge" / "rent-to-own" / "quote")
        .and(warp::get())
        .and(warp::query::<QuoteQuery>())
        .and(calculator_filter.clone())
        .and_then(get_quote);

    let terms_route = warp::path!("edge" / "rent-to-own" / "terms")
        .and(warp::get())
        .and(calculator_filter.clone())
        .and_then(get_terms);

    let schedule_route = warp::path!("edge" / "rent-to-own" / "schedule")
        .and(warp::get())
        .and(warp::query::<ScheduleQuery>())
        .and(calculator_filter.clone())
        .and_then(get_schedule);

    let push_route = warp::path!("edge" / "push")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_PUSH_BYTES))
        .and(warp::body::bytes())
        .and_then(post_push);

    let click_route = warp::path!("edge" / "push" / "click")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_PUSH_BYTES))
        .and(warp::body::json())
        .and(origin_filter.clone())
        .and_then(post_click);

    let status_route = warp::path!("edge" / "status")
        .and(warp::get())
        .and(router_filter.clone())
        .and_then(get_status);

    let site_path = warp::path::full().and_then(|path: FullPath| async move {
        if path.as_str().starts_with(EDGE_PREFIX) {
            Err(warp::reject::not_found())
        } else {
            Ok::<_, Rejection>(path)
        }
    });
    let raw_query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();

    let proxy_route = warp::method()
        .and(site_path)
        .and(raw_query)
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(router_filter)
        .and(origin_filter)
        .and_then(proxy);

    info!("All routes configured successfully.");

    quote_route
        .or(terms_route)
        .or(schedule_route)
        .or(push_route)
        .or(click_route)
        .or(status_route)
        .or(proxy_route)
        .recover(handle_rejection)
}
