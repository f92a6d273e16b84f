// src/models.rs
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::error::AmountError;

/// SLIP-44 index of BNB Chain, the only coin this service reports
pub const BNB_COIN: u32 = 714;

/// Fixed-point exponent of every amount the Binance APIs report
pub const BNB_DECIMALS: u32 = 8;

/// Human-readable decimal amount, kept as a string for the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scales a fixed-point integer string by 10^-exp: "100000000" -> "1", "1" -> "0.00000001".
///
/// Inputs that already carry a fractional part are shifted as well, and the
/// result never has trailing zeros.
pub fn decimal_exp(raw: &str, exp: u32) -> Result<Amount, AmountError> {
    let raw = raw.trim();
    let mut value =
        Decimal::from_str(raw).map_err(|source| AmountError::Invalid { raw: raw.to_string(), source })?;

    let scale = value.scale() + exp;
    value
        .set_scale(scale)
        .map_err(|source| AmountError::Invalid { raw: raw.to_string(), source })?;

    let value = value.normalize();
    if value.is_zero() {
        // normalize() keeps the sign of -0
        return Ok(Amount("0".to_string()));
    }
    Ok(Amount(value.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Completed,
}

/// Canonical transaction consumed by the aggregation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tx {
    pub id: String,
    pub coin: u32,
    pub from: String,
    pub to: String,
    pub fee: Amount,
    pub date: i64,  // seconds since epoch
    pub block: u64,
    pub status: TxStatus,
    pub memo: String,
    #[serde(flatten)]
    pub meta: TxMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "metadata", rename_all = "snake_case")]
pub enum TxMeta {
    Transfer(Transfer),
    NativeTokenTransfer(NativeTokenTransfer),
    TokenTransfer(TokenTransfer),
}

/// Movement of the chain's base coin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transfer {
    pub value: Amount,
}

/// Movement of a first-class (BEP-2) token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeTokenTransfer {
    pub token_id: String,
    pub symbol: String,
    pub value: Amount,
    pub decimals: u32,
    pub from: String,
    pub to: String,
}

/// Token movement reconstructed from a multisend receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenTransfer {
    pub name: String,
    pub symbol: String,
    pub token_id: String,
    pub decimals: u32,
    pub from: String,
    pub to: String,
    pub value: Amount,
}

/// One page of normalized transactions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub total: usize,
    pub docs: Vec<Tx>,
    pub status: bool,
}

impl Page {
    pub fn new(docs: Vec<Tx>) -> Self {
        Self {
            total: docs.len(),
            docs,
            status: true,
        }
    }

    /// Newest first; equal dates fall back to the hash so the order is stable.
    pub fn sort(&mut self) {
        self.docs
            .sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
    }
}
