//! Decide which transaction-shape parser applies to an email.

use serde::Serialize;

/// Subject marker of mobile-transfer notifications (matched case-insensitively).
pub const TRANSFER_SUBJECT_MARKER: &str = "SINPE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailShape {
    Card,
    TransferOut,
    TransferIn,
}

/// Classify by subject first, then body markers.
///
/// A transfer-looking subject whose body carries none of the direction
/// markers is treated as a card notification.
pub fn detect_shape(subject: &str, body: &str) -> EmailShape {
    if !subject.to_uppercase().contains(TRANSFER_SUBJECT_MARKER) {
        return EmailShape::Card;
    }

    let lower = body.to_lowercase();
    if lower.contains("debitado") {
        return EmailShape::TransferOut;
    }
    if lower.contains("acreditado") {
        return EmailShape::TransferIn;
    }
    if body.contains("Destino") {
        return EmailShape::TransferOut;
    }
    if lower.contains("origen") {
        return EmailShape::TransferIn;
    }
    EmailShape::Card
}
