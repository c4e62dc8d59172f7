//! cuentas-ingest: bank notification emails → validated transactions.
//!
//! The subject and body pick an [`EmailShape`]; each shape has exactly one
//! parser. Denied card transactions surface as [`ExtractError::Denied`],
//! anything unrecognised as [`ExtractError::ParseFailure`].

pub mod classify;
pub mod error;
pub mod normalize;
pub mod parsers;
pub mod types;

pub use classify::{EmailShape, detect_shape};
pub use error::ExtractError;
pub use types::MailMessage;

use cuentas_core::Transaction;
use tracing::{debug, info};

use crate::parsers::{Direction, parse_card_email, parse_transfer_email};

/// Extract a transaction from a notification body and subject.
pub fn extract_transaction(body: &str, subject: &str) -> Result<Transaction, ExtractError> {
    if body.trim().is_empty() {
        return Err(ExtractError::ParseFailure("email body is empty".to_string()));
    }

    let shape = detect_shape(subject, body);
    debug!(?shape, "detected email shape");

    let tx = match shape {
        EmailShape::Card => parse_card_email(body)?,
        EmailShape::TransferOut => parse_transfer_email(body, Direction::Outbound)?,
        EmailShape::TransferIn => parse_transfer_email(body, Direction::Inbound)?,
    };

    info!(kind = %tx.kind(), detail = tx.display_text(), "parsed transaction");
    Ok(tx)
}

/// Convenience wrapper over [`extract_transaction`] for a mailbox message.
pub fn extract_message(message: &MailMessage) -> Result<Transaction, ExtractError> {
    extract_transaction(&message.html, &message.subject)
}
