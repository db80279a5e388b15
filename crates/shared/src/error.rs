use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ProductId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    InsufficientStock,
    NotFound,
    RemoteWrite,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("remote write failed: {0}")]
    RemoteWrite(String),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Validation(_) => ErrorCode::Validation,
            StoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            StoreError::ProductNotFound(_) => ErrorCode::NotFound,
            StoreError::RemoteWrite(_) => ErrorCode::RemoteWrite,
        }
    }
}

/// Serialisable error body, used by the command line `--json` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&StoreError> for ErrorReport {
    fn from(value: &StoreError) -> Self {
        Self {
            code: value.code(),
            message: value.to_string(),
        }
    }
}
