//! Best-effort price for search/listing pages: the median of every
//! currency-tagged number in the visible text.

use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;

use super::price_text::{parse_price, valid_price};

static CURRENCY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z])(?:TL|TRY)\b|₺|\$|€|£").expect("valid currency marker regex")
});

const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Prices parsed from text nodes that carry a currency marker, in document order.
pub fn currency_candidates(document: &Html) -> Vec<f64> {
    document
        .tree
        .root()
        .descendants()
        .filter_map(|node| node.value().as_text().map(|text| (node, text)))
        .filter(|(node, _)| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map_or(false, |el| NON_CONTENT_TAGS.contains(&el.name()))
            })
        })
        .filter(|(_, text)| CURRENCY_MARKER.is_match(text))
        .filter_map(|(_, text)| parse_price(text))
        .collect()
}

/// Median of the candidate prices; the mean of the middle pair for even counts.
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    valid_price(median)
}

pub fn listing_median_price(document: &Html) -> Option<f64> {
    median(currency_candidates(document))
}
