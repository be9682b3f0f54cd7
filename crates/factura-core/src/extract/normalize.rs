//! Value normalizers declared by template rules.

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::result::TaxLine;

/// Date formats tried in order; the first that parses wins.
pub const DATE_FORMATS: [&str; 4] = ["%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y", "%d-%m-%y"];

/// Normalize a matched date to ISO `%Y-%m-%d`.
///
/// Returns `None` when no format in [`DATE_FORMATS`] accepts the input,
/// which downgrades the field to null rather than passing through an
/// unparsed value.
pub fn normalize_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Normalize an amount to a dot decimal separator, e.g. `"1.234,56"`
/// to `"1234.56"`.
///
/// When both separators appear, the rightmost one is the decimal
/// separator and the other marks thousands.
pub fn normalize_amount(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => {
            cleaned.replace('.', "").replace(',', ".")
        }
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok().map(|d| d.to_string())
}

/// Collect all non-overlapping `{rate, amount}` pairs in document order.
///
/// Capture group 1 is the rate label, group 2 the amount. Pairs whose
/// amount does not normalize are dropped.
pub fn collect_repeated(regex: &Regex, text: &str) -> Vec<TaxLine> {
    regex
        .captures_iter(text)
        .filter_map(|caps| {
            let kind = caps.get(1)?.as_str().trim().to_string();
            let amount = normalize_amount(caps.get(2)?.as_str())?;
            Some(TaxLine { kind, amount })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_date_format_priority() {
        assert_eq!(normalize_date("03/05/2024").unwrap(), "2024-05-03");
        assert_eq!(normalize_date("03-05-2024").unwrap(), "2024-05-03");
        assert_eq!(normalize_date("03/05/24").unwrap(), "2024-05-03");
        assert_eq!(normalize_date(" 15/01/2024 ").unwrap(), "2024-01-15");
    }

    #[test]
    fn test_normalize_date_rejects_invalid() {
        assert_eq!(normalize_date("31/02/2024"), None);
        assert_eq!(normalize_date("2024-05-03"), None);
        assert_eq!(normalize_date("pronto"), None);
    }

    #[test]
    fn test_normalize_amount_comma_decimal() {
        assert_eq!(normalize_amount("100,00").unwrap(), "100.00");
        assert_eq!(normalize_amount("1234,56").unwrap(), "1234.56");
        assert_eq!(normalize_amount("1.234,56").unwrap(), "1234.56");
    }

    #[test]
    fn test_normalize_amount_dot_decimal_kept() {
        assert_eq!(normalize_amount("1234.56").unwrap(), "1234.56");
        assert_eq!(normalize_amount("1,234.56").unwrap(), "1234.56");
    }

    #[test]
    fn test_normalize_amount_rejects_garbage() {
        assert_eq!(normalize_amount("unos euros"), None);
    }

    #[test]
    fn test_collect_repeated_in_document_order() {
        let regex = Regex::new(r"(\d{1,2}%)\s*(\d+[,.]\d{2})").unwrap();
        let text = "IVA 21% 100,00\nIVA reducido 10% 50,00";

        let lines = collect_repeated(&regex, text);
        assert_eq!(
            lines,
            vec![
                TaxLine {
                    kind: "21%".to_string(),
                    amount: "100.00".to_string()
                },
                TaxLine {
                    kind: "10%".to_string(),
                    amount: "50.00".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_collect_repeated_empty_when_no_match() {
        let regex = Regex::new(r"(\d{1,2}%)\s*(\d+[,.]\d{2})").unwrap();
        assert!(collect_repeated(&regex, "sin impuestos").is_empty());
    }
}
