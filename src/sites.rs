//! Site strategy registry.
//!
//! Every supported retail site is a row in [`SITES`]: its display label, the
//! hosts it answers on, how to build a search URL from a free-text query, which
//! URL shapes are product pages, and the ordered CSS selectors that locate the
//! price. Adding a site is a table edit; the extraction cascade and the
//! scheduler only ever go through the lookups below.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Identifies which strategy set to use for a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SiteKey {
    Trendyol,
    Hepsiburada,
    Amazon,
    N11,
    Akakce,
    /// Any site without a dedicated row; uses the default selectors.
    #[default]
    Other,
}

/// Whether a URL points at a single product or at a search/listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Product,
    Listing,
}

struct SiteProfile {
    key: SiteKey,
    id: &'static str,
    label: &'static str,
    hosts: &'static [&'static str],
    search_url: &'static str,
    product_markers: &'static [&'static str],
    selectors: &'static [&'static str],
}

static SITES: &[SiteProfile] = &[
    SiteProfile {
        key: SiteKey::Trendyol,
        id: "trendyol",
        label: "Trendyol",
        hosts: &["trendyol.com"],
        search_url: "https://www.trendyol.com/sr?q={query}",
        product_markers: &["-p-"],
        selectors: &[
            ".product-price-container .prc-dsc",
            ".prc-dsc",
            ".prc-box-dscntd",
            ".prc-box-sllng",
            ".prc-slg",
        ],
    },
    SiteProfile {
        key: SiteKey::Hepsiburada,
        id: "hepsiburada",
        label: "Hepsiburada",
        hosts: &["hepsiburada.com"],
        search_url: "https://www.hepsiburada.com/ara?q={query}",
        product_markers: &["-p-", "-pm-"],
        selectors: &[
            "[data-test-id='price-current-price']",
            "[data-test-id='default-price'] span",
            "#offering-price",
            ".product-price",
            "[data-test-id='final-price-1']",
        ],
    },
    SiteProfile {
        key: SiteKey::Amazon,
        id: "amazon",
        label: "Amazon",
        hosts: &["amazon.com.tr", "amazon.com"],
        search_url: "https://www.amazon.com.tr/s?k={query}",
        product_markers: &["/dp/", "/gp/product/"],
        selectors: &[
            "#corePrice_feature_div .a-offscreen",
            "#corePriceDisplay_desktop_feature_div .a-offscreen",
            "#priceblock_dealprice",
            "#priceblock_ourprice",
            ".a-price:not([data-a-strike]) .a-offscreen",
        ],
    },
    SiteProfile {
        key: SiteKey::N11,
        id: "n11",
        label: "n11",
        hosts: &["n11.com"],
        search_url: "https://www.n11.com/arama?q={query}",
        product_markers: &["/urun/"],
        selectors: &[
            ".unf-p-summary-price",
            ".newPrice ins",
            ".priceContainer ins",
            ".price ins",
        ],
    },
    SiteProfile {
        key: SiteKey::Akakce,
        id: "akakce",
        label: "Akakçe",
        hosts: &["akakce.com"],
        search_url: "https://www.akakce.com/arama/?q={query}",
        product_markers: &["-fiyati,"],
        selectors: &[".pd_v8 .pt_v8", "span.pt_v8", ".pt_v8"],
    },
];

static DEFAULT_SELECTORS: &[&str] = &[
    "[itemprop='price']",
    ".product-price",
    ".current-price",
    ".sale-price",
    ".price",
];

fn profile(site: SiteKey) -> Option<&'static SiteProfile> {
    SITES.iter().find(|p| p.key == site)
}

/// Ordered price selectors for `site`; unrecognized sites get the defaults.
pub fn selectors_for(site: SiteKey) -> &'static [&'static str] {
    match profile(site) {
        Some(p) if !p.selectors.is_empty() => p.selectors,
        _ => DEFAULT_SELECTORS,
    }
}

/// Generic selector list used when no site-specific list exists.
pub fn default_selectors() -> &'static [&'static str] {
    DEFAULT_SELECTORS
}

/// Classify `url` for `site`. Unknown sites are always treated as listings.
pub fn page_kind(site: SiteKey, url: &str) -> PageKind {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());

    match profile(site) {
        Some(p) if p.product_markers.iter().any(|m| path.contains(m)) => PageKind::Product,
        _ => PageKind::Listing,
    }
}

impl SiteKey {
    pub fn as_str(&self) -> &'static str {
        profile(*self).map(|p| p.id).unwrap_or("other")
    }

    /// Human-readable site name used in notifications.
    pub fn label(&self) -> &'static str {
        profile(*self).map(|p| p.label).unwrap_or("Store")
    }

    /// Search page for a free-text query, or `None` for unknown sites and blank queries.
    pub fn search_url(&self, query: &str) -> Option<String> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        let p = profile(*self)?;
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        Some(p.search_url.replace("{query}", &encoded))
    }

    /// Detect the site from a URL's host.
    pub fn from_url(url: &str) -> SiteKey {
        let host = match url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
            Some(h) => h,
            None => return SiteKey::Other,
        };
        SITES
            .iter()
            .find(|p| {
                p.hosts
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{}", h)))
            })
            .map(|p| p.key)
            .unwrap_or(SiteKey::Other)
    }

    pub fn all() -> impl Iterator<Item = SiteKey> {
        SITES.iter().map(|p| p.key)
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteKey {
    type Err = std::convert::Infallible;

    /// Never fails: anything unrecognized becomes [`SiteKey::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Ok(SITES
            .iter()
            .find(|p| p.id == needle)
            .map(|p| p.key)
            .unwrap_or(SiteKey::Other))
    }
}

impl Serialize for SiteKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SiteKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}
