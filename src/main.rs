use anyhow::{Context, Result};
use dotenv::dotenv;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use warp::Filter;

use giggatek_edge::config::EdgeConfig;
use giggatek_edge::routes;
use giggatek_edge::services::cache_storage::CacheStorage;
use giggatek_edge::services::network::UpstreamNetwork;
use giggatek_edge::services::offline_router::OfflineRouter;
use giggatek_edge::services::rent_to_own::RentToOwnCalculator;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the edge service...");

    let config = EdgeConfig::from_env().context("Failed to load configuration")?;
    info!("Serving {} from upstream {}", config.site_origin, config.upstream_origin);

    let calculator = Arc::new(
        RentToOwnCalculator::new(config.pricing.clone()).context("Invalid rent-to-own pricing")?,
    );

    let network = Arc::new(UpstreamNetwork::new(
        config.site_origin.clone(),
        config.upstream_origin.clone(),
    ));
    let router = OfflineRouter::new(network, CacheStorage::new(), config.router_config());

    // Without a complete precache the worker stays inactive and requests pass straight through.
    match router.start().await {
        Ok(()) => info!("Offline router active with caches {:?}", router.names()),
        Err(e) => {
            error!("Offline router not activated, passing requests through: {}", e);
            match config.install_retry {
                Some(every) => spawn_install_retry(router.clone(), every),
                None => warn!("Install retries disabled; restart the service to activate the offline router"),
            }
        }
    }

    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let api = routes::routes(calculator, router, Arc::new(config.site_origin.clone())).with(cors);
    info!("Routes configured successfully with CORS.");

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;

    Ok(())
}

/// Keeps retrying the install in the background until the router activates.
fn spawn_install_retry(router: OfflineRouter, every: Duration) {
    info!("Retrying install every {:?}", every);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match router.ensure_started().await {
                Ok(true) => {
                    info!("Offline router active with caches {:?}", router.names());
                    break;
                }
                Ok(false) => {}
                Err(e) => warn!("Install retry failed: {}", e),
            }
        }
    });
}
