use dotenvy::dotenv;
use eyre::{eyre, Result};
use std::{env, time::Duration};
use tracing::info;

/// Default number of transactions returned per page.
pub const TX_PER_PAGE: usize = 25;

#[derive(Debug, Clone)]
pub struct Config {
    pub explorer_url: String, // Binance explorer API (transaction lists)
    pub rpc_url: String,      // Binance node RPC (multisend receipts)
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub receipt_concurrency: usize,
    pub tx_per_page: usize,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            explorer_url: "https://explorer.binance.org".to_string(),
            rpc_url: "https://dex.binance.org".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8420,
            request_timeout_secs: 10,
            receipt_concurrency: 1,
            tx_per_page: TX_PER_PAGE,
        }
    }
}

pub fn load() -> Result<Config> {
    dotenv().ok();

    let defaults = Config::default();

    // Both endpoints are required upstreams; fall back to the public ones
    let explorer_url = env::var("BINANCE_API")
        .or_else(|_| env::var("EXPLORER_URL"))
        .unwrap_or(defaults.explorer_url);
    let rpc_url = env::var("BINANCE_RPC")
        .or_else(|_| env::var("RPC_URL"))
        .unwrap_or(defaults.rpc_url);

    let host = env::var("HOST").unwrap_or(defaults.host);

    let port = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.port);

    let request_timeout_secs = env::var("REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.request_timeout_secs);

    let receipt_concurrency = env::var("RECEIPT_CONCURRENCY")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(defaults.receipt_concurrency)
        .max(1);

    let tx_per_page = env::var("TX_PER_PAGE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(defaults.tx_per_page);

    let cfg = Config {
        explorer_url: trim_base(explorer_url),
        rpc_url: trim_base(rpc_url),
        host,
        port,
        request_timeout_secs,
        receipt_concurrency,
        tx_per_page,
    };
    validate(&cfg)?;

    info!("Loaded config: {:?}", cfg);

    Ok(cfg)
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

fn validate(cfg: &Config) -> Result<()> {
    for (name, url) in [("BINANCE_API", &cfg.explorer_url), ("BINANCE_RPC", &cfg.rpc_url)] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(eyre!("{} must be an http(s) URL, got {:?}", name, url));
        }
    }
    if cfg.tx_per_page == 0 {
        return Err(eyre!("TX_PER_PAGE must be greater than zero"));
    }
    Ok(())
}
