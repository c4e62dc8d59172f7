//! Transaction record produced from a bank notification email.
//!
//! A `Transaction` can only be obtained through [`Transaction::new`], which
//! validates every required field. Once built it is never mutated.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::time::{parse_occurred_at, partition_key};

/// Column header of every monthly ledger partition.
pub const LEDGER_HEADER: [&str; 7] = [
    "Dia",
    "Valor",
    "Concepto",
    "Detalle",
    "Referencia",
    "Moneda",
    "Tarjeta",
];

/// Shape of money movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Card purchase (always an outflow)
    Card,
    /// Mobile transfer debited from the account
    TransferOut,
    /// Mobile transfer credited to the account
    TransferIn,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Card => "card",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
        }
    }

    /// Card purchases and outbound transfers carry a negative amount.
    pub fn is_outflow(&self) -> bool {
        !matches!(self, TransactionKind::TransferIn)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("transaction date cannot be empty")]
    EmptyDate,
    #[error("invalid date '{0}': expected DD/MM/YYYY or DD/MM/YYYY HH:MM:SS")]
    InvalidDate(String),
    #[error("transaction amount cannot be empty")]
    EmptyAmount,
    #[error("invalid amount '{0}': expected a value like -15,000.00")]
    InvalidAmount(String),
    #[error("amount '{amount}' has the wrong sign for a {kind} transaction")]
    WrongSign { kind: TransactionKind, amount: String },
    #[error("reference number cannot be empty")]
    EmptyReference,
}

/// Raw field values handed to [`Transaction::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFields {
    pub kind: TransactionKind,
    pub occurred_at: String,
    pub amount: String,
    pub category_source_text: String,
    pub display_text: String,
    pub reference_id: String,
    pub currency_label: String,
    pub instrument_label: String,
}

/// A validated, immutable transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    kind: TransactionKind,
    occurred_at: String,
    amount: String,
    category_source_text: String,
    display_text: String,
    reference_id: String,
    currency_label: String,
    instrument_label: String,
    #[serde(skip)]
    timestamp: NaiveDateTime,
    #[serde(skip)]
    amount_value: Decimal,
}

fn date_shape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{1,2}/\d{2}/\d{4}(\s+\d{1,2}:\d{2}:\d{2})?$").expect("invalid date regex")
    })
}

/// Parse a display amount such as "-15,000.00" into a decimal.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

impl Transaction {
    /// Validate and build a transaction.
    pub fn new(fields: TransactionFields) -> Result<Self, RecordError> {
        let occurred_at = fields.occurred_at.trim().to_string();
        if occurred_at.is_empty() {
            return Err(RecordError::EmptyDate);
        }
        if !date_shape_re().is_match(&occurred_at) {
            return Err(RecordError::InvalidDate(occurred_at));
        }
        let timestamp = parse_occurred_at(&occurred_at)
            .ok_or_else(|| RecordError::InvalidDate(occurred_at.clone()))?;

        let amount = fields.amount.trim().to_string();
        if amount.is_empty() {
            return Err(RecordError::EmptyAmount);
        }
        let amount_value =
            parse_amount(&amount).ok_or_else(|| RecordError::InvalidAmount(amount.clone()))?;
        if amount.starts_with('-') != fields.kind.is_outflow() {
            return Err(RecordError::WrongSign {
                kind: fields.kind,
                amount,
            });
        }

        let reference_id = fields.reference_id.trim().to_string();
        if reference_id.is_empty() {
            return Err(RecordError::EmptyReference);
        }

        Ok(Self {
            kind: fields.kind,
            occurred_at,
            amount,
            category_source_text: fields.category_source_text,
            display_text: fields.display_text,
            reference_id,
            currency_label: fields.currency_label,
            instrument_label: fields.instrument_label,
            timestamp,
            amount_value,
        })
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn occurred_at(&self) -> &str {
        &self.occurred_at
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn category_source_text(&self) -> &str {
        &self.category_source_text
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn currency_label(&self) -> &str {
        &self.currency_label
    }

    pub fn instrument_label(&self) -> &str {
        &self.instrument_label
    }

    /// Returns true if money left the account
    pub fn is_expense(&self) -> bool {
        self.amount.starts_with('-')
    }

    /// Returns true if money entered the account
    pub fn is_income(&self) -> bool {
        !self.is_expense()
    }

    /// Signed amount as an exact decimal
    pub fn amount_decimal(&self) -> Decimal {
        self.amount_value
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Monthly partition ("MM/YYYY") this record belongs to.
    pub fn partition_key(&self) -> String {
        partition_key(self.date())
    }

    /// Ledger row in [`LEDGER_HEADER`] column order.
    pub fn to_row(&self, category: &str) -> [String; 7] {
        [
            self.occurred_at.clone(),
            self.amount.clone(),
            category.to_string(),
            self.display_text.clone(),
            self.reference_id.clone(),
            self.currency_label.clone(),
            self.instrument_label.clone(),
        ]
    }
}
