use goplay::backend::Backend;
use goplay::build::{BuildSettings, Builder};
use goplay::server::{self, AppState};
use goplay::{MemoryCache, NoopCache, PlayConfig, Playground, ResponseCache};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::runtime;
use tracing::{info, warn};

fn setup_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{fmt, EnvFilter};

    tracing_subscriber::fmt()
        .event_format(fmt::format::Format::default().pretty())
        .with_env_filter(EnvFilter::from_default_env())
        .with_timer(fmt::time::ChronoLocal::rfc_3339())
        .finish()
        .with(ErrorLayer::default())
        .init();
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let config = PlayConfig::parse();

    let runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))
}

async fn serve(config: PlayConfig) -> Result<()> {
    let builder = Builder::new(BuildSettings::from_config(&config));

    let version = match config.toolchain_version.clone() {
        Some(version) => version,
        None => builder
            .toolchain_version()
            .await
            .context("failed to query the toolchain version")?,
    };
    info!(%version, go_bin = %config.go_bin.display(), "toolchain ready");

    let client = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;
    let backend = Backend::new(
        client,
        config.backend_url.clone(),
        config.run_timeout(),
        config.backend_retries,
    );

    let cache: Arc<dyn ResponseCache> = if config.cache_entries == 0 {
        warn!("response cache disabled");
        Arc::new(NoopCache)
    } else {
        Arc::new(MemoryCache::new(config.cache_entries))
    };

    let state = AppState {
        playground: Arc::new(Playground::new(builder, backend)),
        cache,
        version: version.into(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {}", addr))?;
    info!(%addr, backend = %config.backend_url, "listening");

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
