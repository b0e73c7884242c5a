mod config;

use std::sync::Arc;

use tracing::{info, warn};

use redona_api::routes::router;
use redona_api::state::AppStateInner;
use redona_db::Database;
use redona_geo::{Geocoder, HttpGeocoder, NoopGeocoder};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "redona=debug,redona_api=debug,redona_db=info,redona_geo=info,tower_http=debug".into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    let db = Database::open(&config.db_path)?;

    let geocoder: Box<dyn Geocoder> = match config.geocoder {
        Some(geo) => {
            info!("Geocoding via {} (fallback {})", geo.nominatim_url, geo.photon_url);
            Box::new(HttpGeocoder::new(geo)?)
        }
        None => {
            warn!("Geocoding disabled; shipping quotes will have no distance for new addresses");
            Box::new(NoopGeocoder)
        }
    };

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        geocoder,
    });

    let app = router(state);

    info!("Redona server listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Could not install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
