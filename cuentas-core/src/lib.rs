//! cuentas-core: the validated transaction record shared by the ingest,
//! finance and cli crates.

pub mod time;
pub mod transaction;

pub use transaction::{
    LEDGER_HEADER, RecordError, Transaction, TransactionFields, TransactionKind, parse_amount,
};

/// Sentinel category for anything the rules and the model could not place.
pub const UNCATEGORIZED: &str = "Uncategorized";
