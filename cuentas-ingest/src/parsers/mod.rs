//! Per-shape notification parsers.

pub mod card;
pub mod sinpe;

pub use card::parse_card_email;
pub use sinpe::{Direction, parse_transfer_email};
