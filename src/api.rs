use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::aggregator;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::Page;
use crate::normalizer::Normalizer;
use crate::rpc::{BinanceClient, ReceiptResolver, TransactionFetcher};

#[derive(Deserialize)]
pub struct TxQuery {
    #[serde(default)]
    pub token: String,
}

#[derive(Clone)]
pub struct AppState {
    fetcher: Arc<dyn TransactionFetcher>,
    normalizer: Arc<Normalizer>,
    tx_per_page: usize,
    receipt_concurrency: usize,
}

impl AppState {
    pub fn new(
        cfg: &Config,
        fetcher: Arc<dyn TransactionFetcher>,
        receipts: Arc<dyn ReceiptResolver>,
    ) -> Self {
        Self {
            fetcher,
            normalizer: Arc::new(Normalizer::new(receipts)),
            tx_per_page: cfg.tx_per_page,
            receipt_concurrency: cfg.receipt_concurrency,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "Binance transaction API running" }))
        .route("/:address", get(get_transactions))
        .with_state(state)
        .layer(cors)
}

pub async fn serve(cfg: Config) -> eyre::Result<()> {
    let client = Arc::new(BinanceClient::new(&cfg)?);
    let state = AppState::new(&cfg, client.clone(), client);
    let app = router(state);

    let addr = format!("{}:{}", cfg.host, cfg.port);
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn get_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Query(q): Query<TxQuery>,
) -> Result<Json<Page>, ApiError> {
    let txs = state.fetcher.get_transactions(&address, &q.token).await?;

    let page = aggregator::normalize_page(
        &state.normalizer,
        &txs.txs,
        &q.token,
        &address,
        state.tx_per_page,
        state.receipt_concurrency,
    )
    .await;

    Ok(Json(page))
}
