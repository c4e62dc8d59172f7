//! Ledger assembly: categorized records grouped into monthly partitions.

use cuentas_core::{Transaction, UNCATEGORIZED};
use std::collections::BTreeMap;

use crate::categorizer::{Categorizer, CategoryAssignments, ModelClient};

/// A transaction paired with its resolved category
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub transaction: Transaction,
    pub category: String,
}

impl LedgerEntry {
    /// Look up the record's source text in `assignments`; missing texts
    /// fall back to [`UNCATEGORIZED`].
    pub fn resolve(transaction: Transaction, assignments: &CategoryAssignments) -> Self {
        let category = assignments
            .get(transaction.category_source_text())
            .cloned()
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        Self {
            transaction,
            category,
        }
    }

    pub fn partition_key(&self) -> String {
        self.transaction.partition_key()
    }

    pub fn row(&self) -> [String; 7] {
        self.transaction.to_row(&self.category)
    }
}

/// Categorize a batch of records with a single `classify_batch` call.
pub fn categorize_transactions<C: ModelClient>(
    categorizer: &Categorizer<C>,
    transactions: Vec<Transaction>,
) -> Vec<LedgerEntry> {
    let texts = transactions
        .iter()
        .map(|t| t.category_source_text())
        .collect::<Vec<_>>();
    let assignments = categorizer.classify_batch(&texts);
    transactions
        .into_iter()
        .map(|t| LedgerEntry::resolve(t, &assignments))
        .collect()
}

/// Group entries by "MM/YYYY" partition, keeping input order within each.
pub fn group_by_partition(entries: &[LedgerEntry]) -> BTreeMap<String, Vec<&LedgerEntry>> {
    let mut groups: BTreeMap<String, Vec<&LedgerEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.partition_key()).or_default().push(entry);
    }
    groups
}
