use futures_util::{future, stream, StreamExt};
use tracing::info;

use crate::models::{Page, Tx};
use crate::normalizer::Normalizer;
use crate::rpc::RawTx;

/// Caps accepted transactions at `page_size`, keeping upstream order, then sorts.
pub fn assemble_page(mut txs: Vec<Tx>, page_size: usize) -> Page {
    txs.truncate(page_size);
    let mut page = Page::new(txs);
    page.sort();
    page
}

/// Normalizes `raw` in upstream order until `page_size` transactions are accepted.
///
/// Up to `concurrency` transactions are normalized ahead of the consumer; the
/// acceptance order does not depend on it. Nothing past the page cap is
/// normalized, so no receipts are fetched for transactions that cannot appear.
pub async fn normalize_page(
    normalizer: &Normalizer,
    raw: &[RawTx],
    token: &str,
    address: &str,
    page_size: usize,
    concurrency: usize,
) -> Page {
    // Futures are inert until polled, so building them all up front is free
    let pending: Vec<_> = raw
        .iter()
        .map(|tx| normalizer.normalize(tx, token, address))
        .collect();

    let accepted: Vec<Tx> = stream::iter(pending)
        .buffered(concurrency.max(1))
        .filter_map(future::ready)
        .take(page_size)
        .collect()
        .await;

    info!(
        "Normalized {} of {} transactions for {}",
        accepted.len(),
        raw.len(),
        address
    );

    assemble_page(accepted, page_size)
}
