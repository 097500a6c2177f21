use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotspin_core::{Classification, FairnessProof, SpinError, SpinReport};

pub mod store;

pub use slotspin_core::Snapshot as StateResponse;
pub use store::{SpinStore, StoreError};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SpinRequest {
    pub wager: String, // raw, validated by the machine
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SpinResponse {
    pub spin: u64,
    pub wager: u64,
    pub reels: Vec<String>, // symbol names
    pub classification: Classification,
    pub payout: u64,
    pub message: String,
    pub balance: u64,
    pub proof: Option<FairnessProof>,
}

impl From<&SpinReport> for SpinResponse {
    fn from(report: &SpinReport) -> Self {
        Self {
            spin: report.spin,
            wager: report.wager,
            reels: report.symbols.iter().map(|s| s.name.clone()).collect(),
            classification: report.outcome.classification,
            payout: report.outcome.payout,
            message: report.outcome.message.clone(),
            balance: report.balance_after,
            proof: report.proof.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyResponse {
    pub server_seed_hash: String,
    pub client_seed: String,
    pub nonce: u64, // nonce of the latest spin
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SpinLogEntry {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub spin: i64,
    pub wager: i64,
    pub reels: Vec<String>,
    pub classification: Classification,
    pub payout: i64,
    pub balance_after: i64,
    pub nonce: Option<i64>,
    pub server_seed_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("a spin is already in progress")]
    Busy,
    #[error("internal server error")]
    Internal,
}

impl From<SpinError> for ApiError {
    fn from(e: SpinError) -> Self {
        match e {
            SpinError::InvalidWager(_) | SpinError::InsufficientBalance { .. } => {
                ApiError::Invalid(e.user_message())
            }
            SpinError::SpinInProgress => ApiError::Busy,
            SpinError::Interrupted => ApiError::Internal,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spin_errors_map_to_api_errors() {
        let e: ApiError = SpinError::InsufficientBalance { wager: 1000, balance: 500 }.into();
        assert_eq!(e.to_string(), "invalid request: Not enough balance! You have $500.");
        assert!(matches!(ApiError::from(SpinError::SpinInProgress), ApiError::Busy));
        assert!(matches!(ApiError::from(SpinError::Interrupted), ApiError::Internal));
    }
}
