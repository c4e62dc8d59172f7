//! SINPE Móvil transfer notification parser
//!
//! Expected flattened text (outbound):
//!   Número de referencia: 2025122512345678 Nombre cliente Destino: Juan Perez
//!   Entidad: BCR Teléfono: 8888-8888 Monto: 50,000.00 Motivo: Pago alquiler
//!   Esta transacción fue realizada el 25/12/2025 a las 2:30 PM
//!
//! Inbound notifications use "Nombre cliente origen:" instead. Each field is
//! pulled by its own function over normalized text.

use cuentas_core::time::{clock_to_24h, pad_day};
use cuentas_core::{Transaction, TransactionFields, TransactionKind};
use regex::Regex;
use std::sync::OnceLock;

use crate::error::ExtractError;
use crate::normalize::{clean_text, strip_markup};

/// SINPE transfers always settle in colones.
pub const SINPE_CURRENCY: &str = "COLON COSTA RICA";
pub const SINPE_INSTRUMENT: &str = "SINPEMOVIL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    fn kind(&self) -> TransactionKind {
        match self {
            Direction::Outbound => TransactionKind::TransferOut,
            Direction::Inbound => TransactionKind::TransferIn,
        }
    }
}

fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)N[úu]mero de referencia:\s*(\d+)").expect("invalid reference regex")
    })
}

fn destination_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)Nombre cliente Destino:\s*(.+?)\s*(?:\b(?:Entidad|Tel[eé]fono|Monto|Motivo)\b|$)",
        )
        .expect("invalid destination regex")
    })
}

fn origin_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)Nombre cliente origen:\s*(.+?)\s*(?:\b(?:Entidad|Tel[eé]fono|Monto|Motivo)\b|$)",
        )
        .expect("invalid origin regex")
    })
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Monto:\s*(?:₡|CRC|\$)?\s*(\d[\d,]*(?:\.\d+)?)").expect("invalid amount regex")
    })
}

fn reason_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Motivo:\s*(.*?)\s*(?:Esta transacci[óo]n|$)").expect("invalid motivo regex")
    })
}

fn performed_at_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)Esta transacci[óo]n fue realizada el\s*(?P<date>\d{1,2}/\d{2}/\d{4})",
            r"\s*a las\s*(?P<clock>\d{1,2}:\d{2})",
            r"(?:\s*\b(?P<meridiem>[ap]\.?\s?m\.?)(?:[^\p{L}]|$))?"
        ))
        .expect("invalid timestamp regex")
    })
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|s| !s.is_empty())
}

pub fn reference_number(text: &str) -> Option<String> {
    first_capture(reference_re(), text)
}

/// Destination name for outbound transfers, origin name for inbound ones.
pub fn counterparty(text: &str, direction: Direction) -> Option<String> {
    match direction {
        Direction::Outbound => first_capture(destination_name_re(), text),
        Direction::Inbound => first_capture(origin_name_re(), text),
    }
}

pub fn amount(text: &str) -> Option<String> {
    first_capture(amount_re(), text)
}

/// Stated purpose ("motivo"), cut before the trailing boilerplate sentence.
pub fn reason(text: &str) -> Option<String> {
    first_capture(reason_re(), text)
}

/// "Esta transacción fue realizada el 25/12/2025 a las 2:30 PM" → "25/12/2025 14:30:00".
pub fn performed_at(text: &str) -> Option<String> {
    let caps = performed_at_re().captures(text)?;
    let date = pad_day(&caps["date"]);
    let meridiem = caps.name("meridiem").map(|m| {
        m.as_str()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
    });
    let clock = clock_to_24h(&caps["clock"], meridiem.as_deref())?;
    Some(format!("{date} {clock}"))
}

/// Parse a SINPE Móvil notification in the given direction.
pub fn parse_transfer_email(html: &str, direction: Direction) -> Result<Transaction, ExtractError> {
    let text = strip_markup(html);

    let monto = amount(&text).unwrap_or_default();
    let signed_amount = match (direction, monto.is_empty()) {
        (_, true) => String::new(),
        (Direction::Outbound, false) => format!("-{monto}"),
        (Direction::Inbound, false) => monto,
    };

    let cliente = counterparty(&text, direction).unwrap_or_default();
    let motivo = reason(&text).unwrap_or_default();
    let display_text = if motivo.is_empty() {
        cliente
    } else {
        format!("{cliente} / {motivo}")
    };

    let tx = Transaction::new(TransactionFields {
        kind: direction.kind(),
        occurred_at: performed_at(&text).unwrap_or_default(),
        amount: signed_amount,
        category_source_text: motivo,
        display_text,
        reference_id: reference_number(&text).unwrap_or_default(),
        currency_label: SINPE_CURRENCY.to_string(),
        instrument_label: SINPE_INSTRUMENT.to_string(),
    })?;
    Ok(tx)
}
