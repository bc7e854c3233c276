//! Price extraction cascade.
//!
//! Strategies run in a fixed priority order and the first one that yields a
//! finite positive price wins:
//!
//! 1. **JSON-LD**: Schema.org `Product` offers, lowest price on the page
//! 2. **Meta tags**: `product:price:amount` and friends
//! 3. **Site selectors**: the registry's CSS selectors for the site
//! 4. **Listing median**: median of currency-tagged text, listing pages only
//!
//! "No price" is an ordinary `None`, never an error.

pub mod heuristic;
pub mod json_ld;
pub mod meta_tags;
pub mod price_text;

use scraper::{ElementRef, Html, Selector};
use std::fmt;

use crate::sites::{selectors_for, PageKind, SiteKey};

pub use price_text::{parse_price, to_cents};

/// Which strategy produced a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    JsonLd,
    MetaTag,
    SiteSelector,
    ListingMedian,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::JsonLd => "json-ld",
            Strategy::MetaTag => "meta-tag",
            Strategy::SiteSelector => "site-selector",
            Strategy::ListingMedian => "listing-median",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceMatch {
    pub price: f64,
    pub strategy: Strategy,
}

/// Best-guess price for a page, or `None` when no strategy finds one.
pub fn extract_price(html: &str, site: SiteKey, kind: PageKind) -> Option<f64> {
    extract_price_match(html, site, kind).map(|m| m.price)
}

/// Same as [`extract_price`] but also reports the winning strategy.
pub fn extract_price_match(html: &str, site: SiteKey, kind: PageKind) -> Option<PriceMatch> {
    let document = Html::parse_document(html);
    let tagged = |strategy: Strategy| move |price: f64| PriceMatch { price, strategy };

    json_ld::json_ld_price(&document)
        .map(tagged(Strategy::JsonLd))
        .or_else(|| meta_tags::meta_price(&document).map(tagged(Strategy::MetaTag)))
        .or_else(|| selector_price(&document, selectors_for(site)).map(tagged(Strategy::SiteSelector)))
        .or_else(|| match kind {
            PageKind::Listing => heuristic::listing_median_price(&document).map(tagged(Strategy::ListingMedian)),
            PageKind::Product => None,
        })
}

/// First selector, in list order, with a matching element that parses to a price.
pub fn selector_price(document: &Html, selectors: &[&str]) -> Option<f64> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::debug!(selector = %s, error = %e, "Skipping invalid price selector");
                None
            }
        })
        .find_map(|selector| document.select(&selector).find_map(element_price))
}

fn element_price(element: ElementRef<'_>) -> Option<f64> {
    let text = element.text().collect::<String>();
    parse_price(text.trim()).or_else(|| element.value().attr("content").and_then(parse_price))
}
