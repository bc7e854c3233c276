//! Price text parsing for both `1.234,56` and `1,234.56` style formatting.

use regex::Regex;
use std::sync::LazyLock;

// First numeric token; NBSP and narrow NBSP may group thousands.
static NUMBER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d(?:[\d.,\u{00a0}\u{202f}]*\d)?").expect("valid number token regex")
});

/// Parse the first number in `text` as a price.
///
/// With both separators present, whichever comes last is the decimal point.
/// A lone comma is a decimal point. A lone dot is a decimal point unless
/// exactly three digits follow it (`1.299 TL`), in which case it groups
/// thousands. Repeated commas or dots are thousands separators. Returns `None`
/// unless the result is finite and positive. The value is rounded to cents.
pub fn parse_price(text: &str) -> Option<f64> {
    let token = NUMBER_TOKEN.find(text)?.as_str();
    let raw: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();

    let normalized = match (raw.rfind('.'), raw.rfind(',')) {
        (Some(dot), Some(comma)) => {
            let (thousands, decimal) = if dot > comma { (',', '.') } else { ('.', ',') };
            raw.replace(thousands, "").replace(decimal, ".")
        }
        (None, Some(_)) => {
            if raw.matches(',').count() == 1 {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (Some(dot), None) => {
            let groups_thousands = raw.len() - dot - 1 == 3;
            if raw.matches('.').count() == 1 && !groups_thousands {
                raw
            } else {
                raw.replace('.', "")
            }
        }
        (None, None) => raw,
    };

    normalized.parse::<f64>().ok().and_then(valid_price)
}

/// Keep finite positive values, rounded to cents.
pub fn valid_price(value: f64) -> Option<f64> {
    if value.is_finite() && value > 0.0 {
        let rounded = (value * 100.0).round() / 100.0;
        (rounded > 0.0).then_some(rounded)
    } else {
        None
    }
}

/// Price in whole cents, for equality checks that must ignore float noise.
pub fn to_cents(price: f64) -> i64 {
    (price * 100.0).round() as i64
}
