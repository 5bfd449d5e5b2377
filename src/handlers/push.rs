// src/handlers/push.rs
use bytes::Bytes;
use log::{error, info};
use reqwest::Url;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::ClickRequest;
use crate::services::push::{notification_from_push, resolve_click};

pub async fn post_push(body: Bytes) -> Result<Json, Rejection> {
    let notification = notification_from_push(&body).map_err(|e| {
        error!("Failed to handle push message: {}", e);
        warp::reject::custom(ApiError::from(e))
    })?;
    Ok(warp::reply::json(&notification))
}

pub async fn post_click(request: ClickRequest, site_origin: Arc<Url>) -> Result<Json, Rejection> {
    info!("Handling notification click for {:?}", request.url);
    let action = resolve_click(request.url.as_deref(), &site_origin, &request.open_clients)
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;
    Ok(warp::reply::json(&action))
}
