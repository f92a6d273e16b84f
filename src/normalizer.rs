// src/normalizer.rs
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Rejection;
use crate::models::{
    decimal_exp, Amount, NativeTokenTransfer, TokenTransfer, Transfer, Tx, TxMeta, TxStatus,
    BNB_COIN, BNB_DECIMALS,
};
use crate::rpc::{Coin, Number, Output, RawTx, Receipt, ReceiptResolver, TxType};

/// Symbol of the chain's base coin
pub const NATIVE_ASSET: &str = "BNB";

/// Transaction shapes the normalizer knows how to map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    NativeTransfer,
    NativeTokenTransfer,
    Multisend,
}

type Predicate = fn(&RawTx, &str) -> bool;

/// Evaluated top to bottom, first match wins
const RULES: [(Rule, Predicate); 3] = [
    (Rule::NativeTransfer, is_native_transfer),
    (Rule::NativeTokenTransfer, is_native_token_transfer),
    (Rule::Multisend, is_multisend),
];

fn is_native_transfer(raw: &RawTx, token: &str) -> bool {
    raw.asset == NATIVE_ASSET && raw.tx_type == TxType::Transfer && token.is_empty()
}

fn is_native_token_transfer(raw: &RawTx, token: &str) -> bool {
    !raw.asset.is_empty() && raw.asset == token && raw.tx_type == TxType::Transfer
}

// The explorer leaves sender or recipient blank for multisend transactions
fn is_multisend(raw: &RawTx, _token: &str) -> bool {
    (raw.from_addr.is_empty() || raw.to_addr.is_empty()) && raw.tx_type == TxType::Transfer
}

/// Returns the first rule matching `raw`, `None` when it is unclassifiable.
pub fn match_rule(raw: &RawTx, token: &str) -> Option<Rule> {
    RULES
        .iter()
        .find(|(_, applies)| applies(raw, token))
        .map(|(rule, _)| *rule)
}

/// Counterparties and metadata of a classified transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub from: String,
    pub to: String,
    pub meta: TxMeta,
}

fn scale(amount: &Number) -> Result<Amount, Rejection> {
    Ok(decimal_exp(&amount.0, BNB_DECIMALS)?)
}

/// Maps explorer transactions into canonical [`Tx`] records.
pub struct Normalizer {
    receipts: Arc<dyn ReceiptResolver>,
}

impl Normalizer {
    pub fn new(receipts: Arc<dyn ReceiptResolver>) -> Self {
        Self { receipts }
    }

    /// `Some` when the transaction was accepted. Rejections are logged and dropped.
    pub async fn normalize(&self, raw: &RawTx, token: &str, address: &str) -> Option<Tx> {
        match self.classify(raw, token, address).await {
            Ok(tx) => Some(tx),
            Err(Rejection::Unclassified) => {
                debug!("Skipping {} ({:?}): unclassified", raw.hash, raw.tx_type);
                None
            }
            Err(e) => {
                warn!("Skipping {}: {}", raw.hash, e);
                None
            }
        }
    }

    pub async fn classify(&self, raw: &RawTx, token: &str, address: &str) -> Result<Tx, Rejection> {
        let rule = match_rule(raw, token).ok_or(Rejection::Unclassified)?;
        let fee = scale(&raw.fee)?;

        let Classified { from, to, meta } = match rule {
            Rule::NativeTransfer => Classified {
                from: raw.from_addr.clone(),
                to: raw.to_addr.clone(),
                meta: TxMeta::Transfer(Transfer {
                    value: scale(&raw.value)?,
                }),
            },
            Rule::NativeTokenTransfer => Classified {
                from: raw.from_addr.clone(),
                to: raw.to_addr.clone(),
                meta: TxMeta::NativeTokenTransfer(NativeTokenTransfer {
                    token_id: raw.asset.clone(),
                    symbol: raw.mapped_asset.clone(),
                    value: scale(&raw.value)?,
                    decimals: BNB_DECIMALS,
                    from: raw.from_addr.clone(),
                    to: raw.to_addr.clone(),
                }),
            },
            Rule::Multisend => {
                let receipt = self
                    .receipts
                    .get_receipt(&raw.hash)
                    .await
                    .map_err(Rejection::ReceiptUnavailable)?;
                interpret_receipt(&receipt, address)?
            }
        };

        Ok(Tx {
            id: raw.hash.clone(),
            coin: BNB_COIN,
            from,
            to,
            fee,
            date: raw.timestamp / 1000,
            block: raw.block_height,
            status: TxStatus::Completed,
            memo: raw.memo.clone(),
            meta,
        })
    }
}

/// Reconstructs sender, recipient and amount of a multisend from its receipt.
///
/// Only the first message, its first input and that input's first coin are
/// read. The first output stands in for the counterparty, so this is only
/// accurate when one recipient dominates.
pub fn interpret_receipt(receipt: &Receipt, address: &str) -> Result<Classified, Rejection> {
    let msg = receipt
        .tx_receipts
        .value
        .msg
        .first()
        .ok_or(Rejection::MalformedReceipt("no messages"))?;
    let input = msg
        .msg_value
        .inputs
        .first()
        .ok_or(Rejection::MalformedReceipt("no inputs"))?;
    let input_coin = input
        .coins
        .first()
        .ok_or(Rejection::MalformedReceipt("input without coins"))?;
    let outputs = &msg.msg_value.outputs;
    let first_output = outputs
        .first()
        .ok_or(Rejection::MalformedReceipt("no outputs"))?;

    let (from, to, coin) = if input.address == address {
        (address.to_string(), first_output.address.clone(), input_coin.clone())
    } else {
        (
            first_output.address.clone(),
            address.to_string(),
            pick_output_coin(outputs, address),
        )
    };
    let value = scale(&coin.amount)?;

    let meta = if input_coin.denom == NATIVE_ASSET {
        TxMeta::Transfer(Transfer { value })
    } else {
        // Receipts carry no token metadata beyond the denom
        TxMeta::TokenTransfer(TokenTransfer {
            name: String::new(),
            symbol: input_coin.denom.clone(),
            token_id: String::new(),
            decimals: BNB_DECIMALS,
            from: from.clone(),
            to: to.clone(),
            value,
        })
    };

    Ok(Classified { from, to, meta })
}

/// Coin paid to `address` among multisend outputs.
///
/// Every output is scanned and the last match wins; no match yields the zero coin.
pub fn pick_output_coin(outputs: &[Output], address: &str) -> Coin {
    outputs
        .iter()
        .filter(|out| out.address == address)
        .filter_map(|out| out.coins.first())
        .last()
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ME: &str = "bnb1queried";

    struct FakeReceipts {
        receipt: Option<Receipt>,
        calls: AtomicUsize,
    }

    impl FakeReceipts {
        fn with(receipt: Option<Receipt>) -> Arc<Self> {
            Arc::new(Self {
                receipt,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReceiptResolver for FakeReceipts {
        async fn get_receipt(&self, _hash: &str) -> Result<Receipt, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.receipt.clone().ok_or(ApiError::NotFound)
        }
    }

    fn raw(asset: &str, tx_type: &str, from: &str, to: &str) -> RawTx {
        serde_json::from_value(json!({
            "txHash": "HASH",
            "blockHeight": 7761368,
            "timeStamp": 1555049867345i64,
            "fromAddr": from,
            "toAddr": to,
            "txAsset": asset,
            "mappedTxAsset": asset.split('-').next().unwrap_or_default(),
            "txFee": "37500",
            "txType": tx_type,
            "value": "100000000",
            "memo": "hi"
        }))
        .unwrap()
    }

    fn coin(denom: &str, amount: &str) -> serde_json::Value {
        json!({ "denom": denom, "amount": amount })
    }

    fn receipt(input_addr: &str, denom: &str, outputs: serde_json::Value) -> Receipt {
        serde_json::from_value(json!({
            "hash": "HASH",
            "tx": { "value": { "msg": [{ "value": {
                "inputs": [{ "address": input_addr, "coins": [coin(denom, "300000000")] }],
                "outputs": outputs
            }}]}}
        }))
        .unwrap()
    }

    fn output(address: &str, denom: &str, amount: &str) -> Output {
        serde_json::from_value(json!({ "address": address, "coins": [coin(denom, amount)] })).unwrap()
    }

    fn no_receipts() -> Normalizer {
        Normalizer::new(FakeReceipts::with(None))
    }

    #[tokio::test]
    async fn native_transfer() {
        let tx = no_receipts()
            .normalize(&raw("BNB", "TRANSFER", "A", "B"), "", ME)
            .await
            .unwrap();

        assert_eq!(tx.from, "A");
        assert_eq!(tx.to, "B");
        assert_eq!(tx.id, "HASH");
        assert_eq!(tx.coin, BNB_COIN);
        assert_eq!(tx.date, 1555049867);
        assert_eq!(tx.block, 7761368);
        assert_eq!(tx.fee.as_str(), "0.000375");
        assert_eq!(tx.memo, "hi");
        match tx.meta {
            TxMeta::Transfer(t) => assert_eq!(t.value.as_str(), "1"),
            other => panic!("unexpected meta {:?}", other),
        }
    }

    #[tokio::test]
    async fn native_token_transfer() {
        let tx = no_receipts()
            .normalize(&raw("YLC-D8B", "TRANSFER", "A", "B"), "YLC-D8B", ME)
            .await
            .unwrap();

        assert_eq!(tx.from, "A");
        assert_eq!(tx.to, "B");
        match tx.meta {
            TxMeta::NativeTokenTransfer(t) => {
                assert_eq!(t.token_id, "YLC-D8B");
                assert_eq!(t.symbol, "YLC");
                assert_eq!(t.decimals, 8);
                assert_eq!(t.value.as_str(), "1");
                assert_eq!((t.from.as_str(), t.to.as_str()), ("A", "B"));
            }
            other => panic!("unexpected meta {:?}", other),
        }
    }

    #[tokio::test]
    async fn bnb_with_token_filter_is_native_token_transfer() {
        let tx = no_receipts()
            .normalize(&raw("BNB", "TRANSFER", "A", "B"), "BNB", ME)
            .await
            .unwrap();
        assert!(matches!(tx.meta, TxMeta::NativeTokenTransfer(_)));
    }

    #[test]
    fn rule_order() {
        assert_eq!(match_rule(&raw("BNB", "TRANSFER", "A", "B"), ""), Some(Rule::NativeTransfer));
        assert_eq!(match_rule(&raw("BNB", "TRANSFER", "", ""), ""), Some(Rule::NativeTransfer));
        assert_eq!(match_rule(&raw("ABC-123", "TRANSFER", "", ""), "ABC-123"), Some(Rule::NativeTokenTransfer));
        assert_eq!(match_rule(&raw("ABC-123", "TRANSFER", "", ""), ""), Some(Rule::Multisend));
        assert_eq!(match_rule(&raw("ABC-123", "TRANSFER", "A", "B"), ""), None);
        assert_eq!(match_rule(&raw("BNB", "NEW_ORDER", "", ""), ""), None);
    }

    #[tokio::test]
    async fn multisend_as_sender() {
        let outputs = json!([
            { "address": "bnb1first", "coins": [coin("BNB", "100000000")] },
            { "address": "bnb1second", "coins": [coin("BNB", "200000000")] }
        ]);
        let receipts = FakeReceipts::with(Some(receipt(ME, "BNB", outputs)));
        let normalizer = Normalizer::new(receipts.clone());

        let tx = normalizer
            .normalize(&raw("", "TRANSFER", "", ""), "", ME)
            .await
            .unwrap();

        assert_eq!(receipts.calls.load(Ordering::SeqCst), 1);
        assert_eq!(tx.from, ME);
        assert_eq!(tx.to, "bnb1first");
        match tx.meta {
            TxMeta::Transfer(t) => assert_eq!(t.value.as_str(), "3"),
            other => panic!("unexpected meta {:?}", other),
        }
    }

    #[tokio::test]
    async fn multisend_as_recipient() {
        let outputs = json!([
            { "address": "bnb1first", "coins": [coin("BNB", "100000000")] },
            { "address": ME, "coins": [coin("BNB", "250000000")] }
        ]);
        let normalizer = Normalizer::new(FakeReceipts::with(Some(receipt("bnb1sender", "BNB", outputs))));

        let tx = normalizer
            .normalize(&raw("", "TRANSFER", "", ""), "", ME)
            .await
            .unwrap();

        assert_eq!(tx.from, "bnb1first");
        assert_eq!(tx.to, ME);
        match tx.meta {
            TxMeta::Transfer(t) => assert_eq!(t.value.as_str(), "2.5"),
            other => panic!("unexpected meta {:?}", other),
        }
    }

    #[tokio::test]
    async fn multisend_token_as_sender() {
        let outputs = json!([{ "address": "bnb1first", "coins": [coin("ANKR-E97", "300000000")] }]);
        let normalizer = Normalizer::new(FakeReceipts::with(Some(receipt(ME, "ANKR-E97", outputs))));

        let tx = normalizer
            .normalize(&raw("ANKR-E97", "TRANSFER", "", ""), "", ME)
            .await
            .unwrap();

        match tx.meta {
            TxMeta::TokenTransfer(t) => {
                assert_eq!(t.symbol, "ANKR-E97");
                assert_eq!(t.name, "");
                assert_eq!(t.token_id, "");
                assert_eq!(t.decimals, 8);
                assert_eq!(t.from, ME);
                assert_eq!(t.to, "bnb1first");
                assert_eq!(t.value.as_str(), "3");
            }
            other => panic!("unexpected meta {:?}", other),
        }
    }

    #[tokio::test]
    async fn multisend_recipient_missing_from_outputs_gets_zero() {
        let outputs = json!([{ "address": "bnb1first", "coins": [coin("ANKR-E97", "300000000")] }]);
        let normalizer = Normalizer::new(FakeReceipts::with(Some(receipt("bnb1sender", "ANKR-E97", outputs))));

        let tx = normalizer
            .normalize(&raw("ANKR-E97", "TRANSFER", "", ""), "", ME)
            .await
            .unwrap();

        assert_eq!(tx.from, "bnb1first");
        assert_eq!(tx.to, ME);
        match tx.meta {
            TxMeta::TokenTransfer(t) => {
                assert_eq!(t.value.as_str(), "0");
                assert_eq!((t.from.as_str(), t.to.as_str()), ("bnb1first", ME));
            }
            other => panic!("unexpected meta {:?}", other),
        }
    }

    #[tokio::test]
    async fn receipt_failure_rejects() {
        let normalizer = no_receipts();
        let result = normalizer
            .classify(&raw("", "TRANSFER", "", ""), "", ME)
            .await;
        assert!(matches!(result, Err(Rejection::ReceiptUnavailable(ApiError::NotFound))));
    }

    #[tokio::test]
    async fn empty_receipt_rejects() {
        let empty: Receipt = serde_json::from_value(json!({ "tx": { "value": { "msg": [] } } })).unwrap();
        let normalizer = Normalizer::new(FakeReceipts::with(Some(empty)));
        let result = normalizer
            .classify(&raw("", "TRANSFER", "", ""), "", ME)
            .await;
        assert!(matches!(result, Err(Rejection::MalformedReceipt("no messages"))));
    }

    #[test]
    fn receipt_without_outputs_rejects() {
        let r = receipt(ME, "BNB", json!([]));
        assert!(matches!(interpret_receipt(&r, ME), Err(Rejection::MalformedReceipt("no outputs"))));
    }

    #[test]
    fn receipt_without_inputs_rejects() {
        let r: Receipt = serde_json::from_value(json!({
            "tx": { "value": { "msg": [{ "value": {
                "inputs": [],
                "outputs": [{ "address": "bnb1first", "coins": [coin("BNB", "1")] }]
            }}]}}
        }))
        .unwrap();
        assert!(matches!(interpret_receipt(&r, ME), Err(Rejection::MalformedReceipt("no inputs"))));
    }

    #[test]
    fn receipt_input_without_coins_rejects() {
        let r: Receipt = serde_json::from_value(json!({
            "tx": { "value": { "msg": [{ "value": {
                "inputs": [{ "address": ME, "coins": null }],
                "outputs": [{ "address": "bnb1first", "coins": [coin("BNB", "1")] }]
            }}]}}
        }))
        .unwrap();
        assert!(matches!(
            interpret_receipt(&r, ME),
            Err(Rejection::MalformedReceipt("input without coins"))
        ));
    }

    #[tokio::test]
    async fn unclassified_is_rejected_without_lookup() {
        let receipts = FakeReceipts::with(None);
        let normalizer = Normalizer::new(receipts.clone());

        let result = normalizer
            .classify(&raw("BNB", "NEW_ORDER", "", ""), "", ME)
            .await;

        assert!(matches!(result, Err(Rejection::Unclassified)));
        assert_eq!(receipts.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_value_rejects() {
        let mut tx = raw("BNB", "TRANSFER", "A", "B");
        tx.value = Number("not-a-number".to_string());
        let result = no_receipts().classify(&tx, "", ME).await;
        assert!(matches!(result, Err(Rejection::MalformedAmount(_))));
    }

    #[tokio::test]
    async fn normalizing_twice_is_identical() {
        let outputs = json!([{ "address": ME, "coins": [coin("BNB", "1")] }]);
        let normalizer = Normalizer::new(FakeReceipts::with(Some(receipt("bnb1sender", "BNB", outputs))));
        let source = raw("", "TRANSFER", "", "");

        let first = normalizer.normalize(&source, "", ME).await;
        let second = normalizer.normalize(&source, "", ME).await;
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn picker_returns_zero_coin_without_match() {
        let outputs = vec![output("bnb1a", "BNB", "5")];
        let coin = pick_output_coin(&outputs, ME);
        assert_eq!(coin, Coin::default());
        assert_eq!(coin.amount.0, "0");
        assert_eq!(coin.denom, "");
    }

    #[test]
    fn picker_last_match_wins() {
        let outputs = vec![
            output(ME, "BNB", "1"),
            output("bnb1a", "BNB", "2"),
            output(ME, "BNB", "3"),
        ];
        assert_eq!(pick_output_coin(&outputs, ME).amount.0, "3");
    }

    #[test]
    fn picker_skips_outputs_without_coins() {
        let mut outputs = vec![output(ME, "BNB", "1")];
        outputs.push(Output {
            address: ME.to_string(),
            coins: vec![],
        });
        assert_eq!(pick_output_coin(&outputs, ME).amount.0, "1");
    }
}
