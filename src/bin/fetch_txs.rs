// Prints the normalized page for one address, bypassing the HTTP server.
//
// usage: fetch_txs <address> [token]
use anyhow::{bail, Context};
use binance_txs::{aggregator, config, normalizer::Normalizer, rpc::{BinanceClient, TransactionFetcher}};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else {
        bail!("usage: fetch_txs <address> [token]");
    };
    let token = args.next().unwrap_or_default();

    let cfg = config::load().map_err(|e| anyhow::anyhow!("{e}"))?;
    let client = Arc::new(BinanceClient::new(&cfg).context("building HTTP client")?);

    let txs = client
        .get_transactions(&address, &token)
        .await
        .with_context(|| format!("fetching transactions of {}", address))?;
    println!("Explorer returned {} of {} transactions", txs.txs.len(), txs.nums);

    let normalizer = Normalizer::new(client);
    let page = aggregator::normalize_page(
        &normalizer,
        &txs.txs,
        &token,
        &address,
        cfg.tx_per_page,
        cfg.receipt_concurrency,
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
