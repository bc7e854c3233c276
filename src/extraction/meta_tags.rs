use scraper::{Html, Selector};

use super::price_text::parse_price;

/// Known price meta tags, most specific first.
pub const META_PRICE_SELECTORS: &[&str] = &[
    "meta[property='product:price:amount']",
    "meta[property='og:price:amount']",
    "meta[itemprop='price']",
    "meta[name='twitter:data1']",
];

/// First meta tag, in list order, whose `content` parses to a positive price.
pub fn meta_price(document: &Html) -> Option<f64> {
    META_PRICE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            document
                .select(&selector)
                .filter_map(|el| el.value().attr("content"))
                .find_map(parse_price)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_price_amount() {
        let html = r#"<html><head>
            <meta property="product:price:amount" content="249.00">
            <meta property="product:price:currency" content="TRY">
        </head></html>"#;
        assert_eq!(meta_price(&Html::parse_document(html)), Some(249.0));
    }

    #[test]
    fn test_order_wins_over_document_position() {
        let html = r#"<html><head>
            <meta itemprop="price" content="300">
            <meta property="og:price:amount" content="280,50">
        </head></html>"#;
        assert_eq!(meta_price(&Html::parse_document(html)), Some(280.5));
    }

    #[test]
    fn test_skips_unparsable_content() {
        let html = r#"<html><head>
            <meta property="product:price:amount" content="">
            <meta name="twitter:data1" content="1.099,00 TL">
        </head></html>"#;
        assert_eq!(meta_price(&Html::parse_document(html)), Some(1099.0));
    }

    #[test]
    fn test_no_meta() {
        assert_eq!(meta_price(&Html::parse_document("<p>nothing</p>")), None);
    }
}
