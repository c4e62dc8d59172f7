//! BCR card notification parser
//!
//! The HTML body carries one table whose data row is, positionally:
//!   Fecha | Autorización | No.Referencia | Monto | Moneda | Comercio | Estado
//!   16/01/2026 22:31:15 | 00918804 | 11721252 | 4,000.00 | COLON COSTA RICA | LA CALI SAN JOSE CR | Aprobada
//!
//! When no such row group exists the flattened text is scanned with regexes.

use cuentas_core::{Transaction, TransactionFields, TransactionKind};
use regex::Regex;
use scraper::{Html, Node, Selector};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::error::ExtractError;
use crate::normalize::{clean_text, strip_markup};

const MIN_ROW_VALUES: usize = 7;
const DENIED_STATUS: &str = "negada";

fn tbody_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("tbody").expect("invalid tbody selector"))
}

fn td_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("td").expect("invalid td selector"))
}

fn card_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*{4}-\*{4}-\*{4}-(\d{4})").expect("invalid card regex"))
}

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2}").expect("invalid timestamp regex")
    })
}

fn row_timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d{2}/\d{2}/\d{4}\s+\d{2}:\d{2}:\d{2}$").expect("invalid row timestamp regex")
    })
}

fn denied_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bnegada\b").expect("invalid denied regex"))
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:\d{1,3}(?:,\d{3})+|\d+)\.\d{2}\b").expect("invalid amount regex")
    })
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{6,8}\b").expect("invalid reference regex"))
}

/// Last four digits of a masked card number ("****-****-****-9282"), or "".
pub fn card_suffix(raw: &str) -> String {
    card_suffix_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Card amounts are always outflows.
fn negate(amount: &str) -> String {
    format!("-{}", amount.trim().trim_start_matches(['-', '+']))
}

/// Parse a card email: tabular strategy first, plain text only when the
/// table yields no qualifying row group. A denial in the table is final.
pub fn parse_card_email(html: &str) -> Result<Transaction, ExtractError> {
    if let Some(tx) = parse_card_table(html)? {
        return Ok(tx);
    }
    parse_card_plain_text(html)?.ok_or_else(|| {
        ExtractError::ParseFailure("no card transaction found in email".to_string())
    })
}

fn is_table(node: &Node) -> bool {
    node.as_element().is_some_and(|e| e.name() == "table")
}

/// Tabular strategy. `Ok(None)` means no row group qualified: a group needs
/// seven non-empty cells of its own table, the first being a full timestamp.
pub fn parse_card_table(html: &str) -> Result<Option<Transaction>, ExtractError> {
    let doc = Html::parse_document(html);
    let instrument = card_suffix(html);

    for tbody in doc.select(tbody_selector()) {
        // the parser adds a tbody to every table, layout wrappers included;
        // cells of nested tables belong to their own group
        let table = tbody.ancestors().find(|n| is_table(n.value())).map(|n| n.id());
        let values = tbody
            .select(td_selector())
            .filter(|td| td.ancestors().find(|n| is_table(n.value())).map(|n| n.id()) == table)
            .map(|td| clean_text(&td.text().collect::<Vec<_>>().join(" ")))
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>();

        if values.len() < MIN_ROW_VALUES || !row_timestamp_re().is_match(&values[0]) {
            continue;
        }

        // values[1] is the authorization code, not carried into the record
        let occurred_at = &values[0];
        let reference = &values[2];
        let amount = &values[3];
        let currency = &values[4];
        let merchant = &values[5];
        let status = &values[6];

        if status.to_lowercase() == DENIED_STATUS {
            info!(merchant = %merchant, amount = %amount, "skipping denied card transaction");
            return Err(ExtractError::Denied(merchant.clone()));
        }

        let tx = Transaction::new(TransactionFields {
            kind: TransactionKind::Card,
            occurred_at: occurred_at.clone(),
            amount: negate(amount),
            category_source_text: merchant.clone(),
            display_text: merchant.clone(),
            reference_id: reference.clone(),
            currency_label: currency.clone(),
            instrument_label: instrument.clone(),
        })?;
        return Ok(Some(tx));
    }

    Ok(None)
}

/// Regex fallback over the flattened text. Merchant and currency are not
/// recoverable here and stay empty.
pub fn parse_card_plain_text(html: &str) -> Result<Option<Transaction>, ExtractError> {
    let text = strip_markup(html);

    let Some(occurred_at) = timestamp_re().find(&text).map(|m| clean_text(m.as_str())) else {
        warn!("no timestamp found in card email text");
        return Ok(None);
    };

    if denied_re().is_match(&text) {
        info!("skipping denied card transaction (plain text)");
        return Err(ExtractError::Denied("detected in plain text".to_string()));
    }

    let Some(amount) = amount_re().find(&text).map(|m| m.as_str().to_string()) else {
        warn!("no amount found in card email text");
        return Ok(None);
    };

    let refs = reference_re()
        .find_iter(&text)
        .map(|m| m.as_str())
        .collect::<Vec<_>>();
    let reference = refs.get(1).or(refs.first()).copied().unwrap_or_default();

    let tx = Transaction::new(TransactionFields {
        kind: TransactionKind::Card,
        occurred_at,
        amount: negate(&amount),
        category_source_text: String::new(),
        display_text: String::new(),
        reference_id: reference.to_string(),
        currency_label: String::new(),
        instrument_label: card_suffix(html),
    })?;
    Ok(Some(tx))
}
