//! cuentas-finance: category rules, batch categorizer, and ledger assembly

pub mod categorizer;
pub mod category_rules;
pub mod ledger;
pub mod response;

pub use categorizer::{
    CategoryAssignments, Categorizer, GenerationConfig, ModelClient, ModelResponse,
};
pub use category_rules::{BUNDLED_RULES, CategoryRuleset, KeywordRule, RulesetError};
pub use ledger::{LedgerEntry, categorize_transactions, group_by_partition};
