use cuentas_core::RecordError;
use thiserror::Error;

/// Why an email did not yield a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The issuer refused the card transaction. The message is handled, not failed.
    #[error("transaction denied: {0}")]
    Denied(String),

    /// No strategy recognised a transaction in the content.
    #[error("could not extract transaction: {0}")]
    ParseFailure(String),
}

impl From<RecordError> for ExtractError {
    fn from(e: RecordError) -> Self {
        ExtractError::ParseFailure(format!("invalid record: {e}"))
    }
}
