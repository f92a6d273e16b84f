use binance_txs::{api, config};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();

    info!("Binance transaction API starting...");

    let cfg = config::load()?;
    info!("  Explorer URL: {}", cfg.explorer_url);
    info!("  RPC URL: {}", cfg.rpc_url);
    info!("  Listen: {}:{}", cfg.host, cfg.port);
    info!("  Request timeout: {}s", cfg.request_timeout_secs);
    info!("  Receipt concurrency: {}", cfg.receipt_concurrency);
    info!("  Page size: {}", cfg.tx_per_page);

    let api_handle = tokio::spawn(api::serve(cfg));

    // Graceful shutdown
    tokio::select! {
        res = api_handle => match res {
            Ok(Ok(_)) => info!("API exited cleanly"),
            Ok(Err(e)) => error!("API error: {:?}", e),
            Err(e) => error!("API task panicked: {:?}", e),
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping...");
        }
    }

    info!("Binance transaction API stopped.");
    Ok(())
}
