// src/services/push.rs
use log::{debug, info};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NOTIFICATION_ICON: &str = "/img/logo-192.png";
pub const NOTIFICATION_BADGE: &str = "/img/badge-72.png";

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push event carried no data")]
    Empty,
    #[error("malformed push payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("notification target {0} is not a valid URL")]
    InvalidTarget(String),
    #[error("notification target {0} is not on this site")]
    ForeignTarget(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "url", rename_all = "lowercase")]
pub enum ClientAction {
    Focus(String),
    Open(String),
}

/// Builds the notification to display for a push message.
pub fn notification_from_push(data: &[u8]) -> Result<Notification, PushError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(PushError::Empty);
    }
    let payload: PushPayload = serde_json::from_slice(data)?;
    info!("Push received: {}", payload.title);

    Ok(Notification {
        title: payload.title,
        body: payload.body,
        icon: NOTIFICATION_ICON.to_string(),
        badge: NOTIFICATION_BADGE.to_string(),
        data: NotificationData {
            url: payload.url.filter(|u| !u.is_empty()).unwrap_or_else(|| "/".to_string()),
        },
    })
}

/// Focuses an open window already showing the target, otherwise opens one.
pub fn resolve_click(
    target: Option<&str>,
    site_origin: &Url,
    open_clients: &[String],
) -> Result<ClientAction, PushError> {
    let target = target.filter(|t| !t.is_empty()).unwrap_or("/");
    let url = site_origin
        .join(target)
        .map_err(|_| PushError::InvalidTarget(target.to_string()))?;
    if url.origin() != site_origin.origin() {
        return Err(PushError::ForeignTarget(target.to_string()));
    }

    let already_open = open_clients
        .iter()
        .filter_map(|client| site_origin.join(client).ok())
        .any(|client| client == url);

    debug!("Notification click -> {} (open: {})", url, already_open);
    Ok(if already_open {
        ClientAction::Focus(url.to_string())
    } else {
        ClientAction::Open(url.to_string())
    })
}
