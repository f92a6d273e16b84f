// src/rpc.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ApiError;

/// Explorer tag of plain transfers, the only type the normalizer handles
pub const TRANSFER: &str = "TRANSFER";

/// Decimal amount as the Binance APIs send it: a JSON string or a bare number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Number(pub String);

impl Default for Number {
    fn default() -> Self {
        Number("0".to_string())
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Str(String),
            Num(serde_json::Number),
        }

        Ok(match Option::<Repr>::deserialize(d)? {
            Some(Repr::Str(s)) => Number(s),
            Some(Repr::Num(n)) => Number(n.to_string()),
            None => Number::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TxType {
    Transfer,
    Other(String),
}

impl Default for TxType {
    fn default() -> Self {
        TxType::Other(String::new())
    }
}

impl From<String> for TxType {
    fn from(s: String) -> Self {
        if s == TRANSFER {
            TxType::Transfer
        } else {
            TxType::Other(s)
        }
    }
}

fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// One transaction as reported by the explorer
#[derive(Debug, Clone, Deserialize)]
pub struct RawTx {
    #[serde(rename = "txHash")]
    pub hash: String,

    #[serde(rename = "blockHeight", default, deserialize_with = "null_default")]
    pub block_height: u64,

    #[serde(rename = "timeStamp", default, deserialize_with = "null_default")]
    pub timestamp: i64, // milliseconds

    #[serde(rename = "fromAddr", default, deserialize_with = "null_default")]
    pub from_addr: String,

    #[serde(rename = "toAddr", default, deserialize_with = "null_default")]
    pub to_addr: String,

    #[serde(default)]
    pub value: Number,

    #[serde(rename = "txFee", default)]
    pub fee: Number,

    #[serde(rename = "txAsset", default, deserialize_with = "null_default")]
    pub asset: String,

    #[serde(rename = "mappedTxAsset", default, deserialize_with = "null_default")]
    pub mapped_asset: String,

    // Missing or null tags never match a rule
    #[serde(rename = "txType", default, deserialize_with = "null_default")]
    pub tx_type: TxType,

    #[serde(default, deserialize_with = "null_default")]
    pub memo: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxPage {
    #[serde(rename = "txNums", default, deserialize_with = "null_default")]
    pub nums: u64,

    #[serde(rename = "txArray", default, deserialize_with = "null_default")]
    pub txs: Vec<RawTx>,
}

/// Detailed multisend record served by the node RPC
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    #[serde(default)]
    pub hash: String,

    #[serde(rename = "tx")]
    pub tx_receipts: ReceiptTx,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptTx {
    pub value: ReceiptValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiptValue {
    #[serde(default, deserialize_with = "null_default")]
    pub msg: Vec<Msg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Msg {
    #[serde(rename = "value", default)]
    pub msg_value: MsgValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MsgValue {
    #[serde(default, deserialize_with = "null_default")]
    pub inputs: Vec<Input>,

    #[serde(default, deserialize_with = "null_default")]
    pub outputs: Vec<Output>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Input {
    pub address: String,
    #[serde(default, deserialize_with = "null_default")]
    pub coins: Vec<Coin>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Output {
    pub address: String,
    #[serde(default, deserialize_with = "null_default")]
    pub coins: Vec<Coin>,
}

/// Zero value is `{denom: "", amount: "0"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Coin {
    #[serde(default)]
    pub denom: String,
    #[serde(default)]
    pub amount: Number,
}

/// Error body both Binance APIs return on failure
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// Lists the transactions of an address, optionally narrowed to one asset
#[async_trait]
pub trait TransactionFetcher: Send + Sync {
    async fn get_transactions(&self, address: &str, token: &str) -> Result<TxPage, ApiError>;
}

/// Looks up the multisend receipt of a transaction hash
#[async_trait]
pub trait ReceiptResolver: Send + Sync {
    async fn get_receipt(&self, hash: &str) -> Result<Receipt, ApiError>;
}

/// HTTP client for the Binance explorer and node RPC.
///
/// Endpoints are fixed at construction and never change afterwards.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    explorer_url: String,
    rpc_url: String,
    rows: usize,
}

impl BinanceClient {
    pub fn new(cfg: &Config) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(cfg.request_timeout()).build()?;
        Ok(Self {
            http,
            explorer_url: cfg.explorer_url.clone(),
            rpc_url: cfg.rpc_url.clone(),
            rows: cfg.tx_per_page,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        debug!("📡 GET {} {:?}", url, query);

        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(ApiError::SourceConnection)?;

        let status = resp.status();
        let text = resp.text().await.map_err(ApiError::SourceConnection)?;

        if !status.is_success() {
            return Err(error_from_response(status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            warn!("Undecodable response from {}: {}", url, e);
            ApiError::Decode(e.to_string())
        })
    }
}

fn error_from_response(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound;
    }

    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let (code, message) = match parsed {
        Some(err) => (
            if err.code == 0 { i64::from(status.as_u16()) } else { err.code },
            err.message,
        ),
        None => (i64::from(status.as_u16()), body.to_string()),
    };

    if (status == StatusCode::BAD_REQUEST || code == 400) && message.to_lowercase().contains("address") {
        return ApiError::InvalidAddress;
    }

    warn!("Binance API returned HTTP {} (code {}): {}", status, code, message);
    ApiError::Upstream { code, message }
}

#[async_trait]
impl TransactionFetcher for BinanceClient {
    async fn get_transactions(&self, address: &str, token: &str) -> Result<TxPage, ApiError> {
        let url = format!("{}/api/v1/txs", self.explorer_url);
        let mut query = vec![
            ("address", address.to_string()),
            ("rows", self.rows.to_string()),
            ("page", "1".to_string()),
        ];
        if !token.is_empty() {
            query.push(("txAsset", token.to_string()));
        }

        let page: TxPage = self.get_json(&url, &query).await?;
        debug!("📩 {} transactions for {}", page.txs.len(), address);
        Ok(page)
    }
}

#[async_trait]
impl ReceiptResolver for BinanceClient {
    async fn get_receipt(&self, hash: &str) -> Result<Receipt, ApiError> {
        let url = format!("{}/api/v1/tx/{}", self.rpc_url, hash);
        self.get_json(&url, &[("format", "json".to_string())]).await
    }
}
