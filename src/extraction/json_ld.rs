//! JSON-LD (Schema.org) product offers.
//!
//! Listing pages often embed several `Product` objects, either directly, in an
//! `@graph`, or wrapped in an `ItemList`. Every offer found on the page is a
//! candidate and the lowest one wins.

use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::price_text::{parse_price, valid_price};

/// Lowest Product offer price across all structured-data blocks, if any.
pub fn json_ld_price(document: &Html) -> Option<f64> {
    let selector = Selector::parse("script[type='application/ld+json']").ok()?;

    document
        .select(&selector)
        // Malformed blocks are common; skip them and keep folding.
        .filter_map(|el| serde_json::from_str::<Value>(&el.text().collect::<String>()).ok())
        .fold(None, |best: Option<f64>, block| {
            let mut prices = Vec::new();
            collect_product_prices(&block, &mut prices);
            prices.into_iter().fold(best, |acc, p| Some(acc.map_or(p, |a| a.min(p))))
        })
}

fn collect_product_prices(value: &Value, out: &mut Vec<f64>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_product_prices(item, out);
            }
        }
        Value::Object(map) => {
            if has_type(map, "Product") {
                if let Some(price) = map.get("offers").and_then(offer_price) {
                    out.push(price);
                }
            }
            if has_type(map, "ItemList") {
                if let Some(Value::Array(elements)) = map.get("itemListElement") {
                    for element in elements {
                        collect_product_prices(element, out);
                        if let Some(item) = element.get("item") {
                            collect_product_prices(item, out);
                        }
                    }
                }
            }
            if let Some(graph) = map.get("@graph") {
                collect_product_prices(graph, out);
            }
        }
        _ => {}
    }
}

fn has_type(map: &Map<String, Value>, wanted: &str) -> bool {
    let matches = |t: &str| t == wanted || t.ends_with(&format!("/{}", wanted)) || t.ends_with(&format!(":{}", wanted));
    match map.get("@type") {
        Some(Value::String(t)) => matches(t.as_str()),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// `lowPrice` when a range is given, otherwise `price`. Arrays yield their minimum.
fn offer_price(offers: &Value) -> Option<f64> {
    match offers {
        Value::Array(items) => items
            .iter()
            .filter_map(offer_price)
            .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |a| a.min(p)))),
        Value::Object(offer) => offer
            .get("lowPrice")
            .and_then(number_value)
            .or_else(|| offer.get("price").and_then(number_value))
            .or_else(|| offer.get("priceSpecification").and_then(offer_price))
            .or_else(|| offer.get("offers").and_then(offer_price)),
        _ => None,
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(valid_price),
        Value::String(s) => parse_price(s),
        _ => None,
    }
}
