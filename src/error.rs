// 1.1: typed failures surfaced to callers. each carries enough numeric detail for the
// caller to build its own user-facing message.

use crate::types::Quote;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Unsupported asset {symbol}")]
    UnsupportedAsset { symbol: String },

    #[error("Unsupported asset class {asset_class}")]
    UnsupportedAssetClass { asset_class: String },

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Quote, available: Quote },

    #[error("Unsafe pricing for {symbol}: {reason}")]
    UnsafePricing { symbol: String, reason: String },

    #[error("Partial execution: {closed} closed, {failed} failed")]
    PartialExecution { closed: usize, failed: usize },

    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },
}

impl EngineError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Business-rule rejections are expected traffic, not system faults.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientMargin { .. } | EngineError::InsufficientBalance { .. }
        )
    }
}
