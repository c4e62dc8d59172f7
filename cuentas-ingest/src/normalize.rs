//! Text normalization shared by every parser.

use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;

const NBSP_VARIANTS: [char; 3] = ['\u{00a0}', '\u{202f}', '\u{2007}'];

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("invalid ws regex"))
}

/// Replace non-breaking spaces, collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = text.replace(&NBSP_VARIANTS[..], " ").replace("&nbsp;", " ");
    ws_re().replace_all(&text, " ").trim().to_string()
}

/// Flatten an HTML document into normalized plain text.
pub fn strip_markup(html: &str) -> String {
    let doc = Html::parse_document(html);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");
    clean_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  LA CALI \n\t SAN JOSE  "), "LA CALI SAN JOSE");
    }

    #[test]
    fn test_clean_text_nbsp() {
        assert_eq!(clean_text("4,000.00\u{a0}CRC"), "4,000.00 CRC");
        assert_eq!(clean_text("Monto:&nbsp;50.00"), "Monto: 50.00");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text(" \n "), "");
    }

    #[test]
    fn test_strip_markup() {
        let html = "<html><body><p>Monto:</p>\n<b>50,000.00</b><br/>Motivo: <i>Pago</i></body></html>";
        assert_eq!(strip_markup(html), "Monto: 50,000.00 Motivo: Pago");
    }
}
