// src/config.rs
use anyhow::{Context, Result};
use log::{info, warn};
use reqwest::Url;
use std::fs;
use std::time::Duration;

use crate::services::cache_storage::CacheNames;
use crate::services::offline_router::{RouterConfig, DEFAULT_PRECACHE_MANIFEST};
use crate::services::rent_to_own::PricingConfig;

const DEFAULT_PORT: u16 = 3030;
const DEFAULT_SITE_ORIGIN: &str = "http://localhost:3030";
const DEFAULT_UPSTREAM_ORIGIN: &str = "http://localhost:8080";
const DEFAULT_INSTALL_RETRY_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub port: u16,
    pub site_origin: Url,
    pub upstream_origin: Url,
    pub cache_prefix: String,
    pub cache_version: String,
    pub precache_manifest: Vec<String>,
    pub pricing: PricingConfig,
    /// Delay between install attempts after a failed start; `None` disables retries.
    pub install_retry: Option<Duration>,
}

impl EdgeConfig {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match var("PORT") {
            Some(port) => port.parse().with_context(|| format!("PORT must be a number, got {:?}", port))?,
            None => {
                warn!("$PORT not set, defaulting to {}", DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        let site_origin = parse_origin("SITE_ORIGIN", var("SITE_ORIGIN"), DEFAULT_SITE_ORIGIN)?;
        let upstream_origin = parse_origin("UPSTREAM_ORIGIN", var("UPSTREAM_ORIGIN"), DEFAULT_UPSTREAM_ORIGIN)?;

        let cache_prefix = var("CACHE_PREFIX").unwrap_or_else(|| "giggatek".to_string());
        let cache_version = var("CACHE_VERSION").unwrap_or_else(|| "v1".to_string());

        let precache_manifest = match var("PRECACHE_MANIFEST") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|path| !path.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_PRECACHE_MANIFEST.iter().map(|p| p.to_string()).collect(),
        };

        let pricing = match var("RENT_TO_OWN_PRICING") {
            Some(path) => load_pricing(&path)?,
            None => PricingConfig::default(),
        };

        let install_retry = match var("INSTALL_RETRY_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .with_context(|| format!("INSTALL_RETRY_SECS must be a number, got {:?}", secs))?,
            None => DEFAULT_INSTALL_RETRY_SECS,
        };
        let install_retry = (install_retry > 0).then(|| Duration::from_secs(install_retry));

        Ok(EdgeConfig {
            port,
            site_origin,
            upstream_origin,
            cache_prefix,
            cache_version,
            precache_manifest,
            pricing,
            install_retry,
        })
    }

    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.cache_prefix, &self.cache_version)
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig::new(self.site_origin.clone(), self.cache_names())
            .with_manifest(self.precache_manifest.clone())
    }
}

fn parse_origin(key: &str, value: Option<String>, default: &str) -> Result<Url> {
    let raw = value.unwrap_or_else(|| default.to_string());
    let url = Url::parse(&raw).with_context(|| format!("{} is not a valid URL: {}", key, raw))?;
    if url.cannot_be_a_base() {
        anyhow::bail!("{} must be an origin such as https://example.com, got {}", key, raw);
    }
    Ok(url)
}

pub fn load_pricing(path: &str) -> Result<PricingConfig> {
    info!("Loading rent-to-own pricing from {}", path);
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pricing file {}", path))?;
    let pricing: PricingConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse pricing file {}", path))?;
    pricing.validate()?;
    Ok(pricing)
}
