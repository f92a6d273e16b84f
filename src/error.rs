use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures talking to the Binance explorer or node RPC
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,

    #[error("invalid address")]
    InvalidAddress,

    #[error("connection to Binance API failed: {0}")]
    SourceConnection(#[source] reqwest::Error),

    /// The API answered, but with an error body
    #[error("Binance API error {code}: {message}")]
    Upstream { code: i64, message: String },

    #[error("failed to decode Binance API response: {0}")]
    Decode(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()).into_response(),
            ApiError::InvalidAddress => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            ApiError::SourceConnection(_) => {
                (StatusCode::BAD_GATEWAY, "connection to Binance API failed").into_response()
            }
            ApiError::Upstream { .. } => {
                (StatusCode::BAD_GATEWAY, "Binance API returned an error").into_response()
            }
            ApiError::Decode(_) | ApiError::Internal(_) => {
                error!("Unhandled error: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("invalid amount {raw:?}: {source}")]
    Invalid {
        raw: String,
        #[source]
        source: rust_decimal::Error,
    },
}

/// Why a raw transaction was left out of the result page
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("transaction does not match any transfer shape")]
    Unclassified,

    #[error("receipt lookup failed: {0}")]
    ReceiptUnavailable(#[source] ApiError),

    #[error("malformed receipt: {0}")]
    MalformedReceipt(&'static str),

    #[error(transparent)]
    MalformedAmount(#[from] AmountError),
}
