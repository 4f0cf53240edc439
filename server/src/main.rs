// polypong/server/src/main.rs
use polypong_server_core::core::config::ServerConfig;
use polypong_server_core::network::routes::routes;
use polypong_server_core::server::instance::PolyPongServer;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};
use warp::Filter;

fn init_logging() -> anyhow::Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "polypong_server_core=info,polypong_server=info,warp=info".into()
        }))
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default tracing subscriber: {}", e))?;
    info!("Tracing subscriber initialized.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Room tasks catch their own panics; this only reports them.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Some(location) = panic_info.location() {
            eprintln!("Location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {:?}", e);
        return Err(e);
    }

    info!("PolyPong server starting up...");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };
    info!(
        "Server configuration loaded. Port: {}, tick rate: {} Hz, instance: {}",
        config.port, config.tick_rate, config.instance_id
    );

    let server = Arc::new(PolyPongServer::new(config));
    let address = SocketAddr::from(([0, 0, 0, 0], server.config.port));

    let routes = routes(server.clone()).with(
        warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "OPTIONS"])
            .allow_headers(vec!["Content-Type", "Upgrade", "Connection", "x-fly-instance"]),
    );

    let (bound, serving) = warp::serve(routes).try_bind_with_graceful_shutdown(address, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received.");
    })?;

    info!("Listening on ws://{}/ws", bound);
    serving.await;

    info!("PolyPong server shut down with {} rooms open.", server.room_count());
    Ok(())
}
