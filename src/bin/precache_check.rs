// src/bin/precache_check.rs
use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;

use giggatek_edge::config::EdgeConfig;
use giggatek_edge::services::cache_storage::CacheStorage;
use giggatek_edge::services::network::UpstreamNetwork;
use giggatek_edge::services::offline_router::OfflineRouter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = EdgeConfig::from_env()?;
    println!("Checking precache manifest against {}", config.upstream_origin);

    let network = Arc::new(UpstreamNetwork::new(
        config.site_origin.clone(),
        config.upstream_origin.clone(),
    ));
    let caches = CacheStorage::new();
    let router = OfflineRouter::new(network, caches.clone(), config.router_config());

    match router.install().await {
        Ok(count) => {
            println!("✓ Install succeeded: {} resources precached", count);
            for name in caches.keys().await {
                println!("  {} ({} entries)", name, caches.entry_count(&name).await);
            }
            Ok(())
        }
        Err(e) => {
            println!("✗ Install failed: {}", e);
            Err(e.into())
        }
    }
}
