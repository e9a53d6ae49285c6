// Product extraction from catalog page HTML.
//
// Each field is located through an ordered list of strategies, one per known
// page template. The first strategy that yields non-empty text wins; when none
// do, the field falls back to its sentinel. Supporting a new template means
// adding a selector to the relevant list.

use crate::models::{PRICE_SENTINEL, ProductRecord, TITLE_SENTINEL};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

/// One way of locating a field inside a product container.
pub struct Strategy {
    pub template: &'static str,
    selector: Selector,
}

impl Strategy {
    fn new(template: &'static str, css: &str) -> Self {
        Self {
            template,
            // Selectors below are static literals; a parse failure is a programming error
            selector: Selector::parse(css)
                .unwrap_or_else(|e| panic!("invalid selector '{css}': {e:?}")),
        }
    }

    fn apply(&self, product: &ElementRef<'_>) -> Option<String> {
        product
            .select(&self.selector)
            .next()
            .map(|el| stripped_text(&el))
            .filter(|text| !text.is_empty())
    }
}

static PRODUCT: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "li.product, li.product-item, li.product-grid-item, \
         div.product, div.product-item, div.product-grid-item",
    )
    .unwrap_or_else(|e| panic!("invalid product selector: {e:?}"))
});

static PAGINATION_LINK: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("ul.page-numbers a.page-numbers")
        .unwrap_or_else(|e| panic!("invalid pagination selector: {e:?}"))
});

pub static TITLE_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    vec![
        Strategy::new("woodmart h3", "h3.wd-entities-title, h3.product-title"),
        Strategy::new("woodmart h2", "h2.wd-entities-title, h2.product-title"),
        Strategy::new("title link", "a.product-title"),
    ]
});

pub static PRICE_STRATEGIES: Lazy<Vec<Strategy>> = Lazy::new(|| {
    vec![
        Strategy::new("woocommerce amount", "span.woocommerce-Price-amount"),
        Strategy::new("price span", "span.price"),
        Strategy::new("price div", "div.price"),
    ]
});

// Text nodes trimmed individually and concatenated
fn stripped_text(el: &ElementRef<'_>) -> String {
    el.text().map(str::trim).filter(|t| !t.is_empty()).collect()
}

fn first_match(strategies: &[Strategy], product: &ElementRef<'_>) -> Option<String> {
    strategies.iter().find_map(|strategy| {
        let found = strategy.apply(product);
        if found.is_some() {
            tracing::trace!(template = strategy.template, "Field matched");
        }
        found
    })
}

// Placeholder some templates render instead of a price
const PRICE_PLACEHOLDER: &str = "N/A";

/// Maps a missing, blank or "N/A" price to the sentinel.
pub fn clean_price(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") | Some(PRICE_PLACEHOLDER) => PRICE_SENTINEL.to_string(),
        Some(price) => price.to_string(),
    }
}

/// Extracts every product on the page, stamping each with `observed_at`.
pub fn extract_products(html: &str, observed_at: NaiveDateTime) -> Vec<ProductRecord> {
    let document = Html::parse_document(html);

    let products: Vec<ProductRecord> = document
        .select(&PRODUCT)
        .map(|product| {
            let title = first_match(&TITLE_STRATEGIES, &product);
            let price = first_match(&PRICE_STRATEGIES, &product);
            if title.is_none() {
                tracing::debug!("Product without a recognizable title; using sentinel");
            }
            ProductRecord::new(
                title.unwrap_or_else(|| TITLE_SENTINEL.to_string()),
                clean_price(price.as_deref()),
                observed_at,
            )
        })
        .collect();

    tracing::debug!(count = products.len(), "Extracted products from page");
    products
}

// ASCII value of a Western, Arabic-Indic (U+0660..) or Persian (U+06F0..) digit
fn decimal_digit(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        '\u{0660}'..='\u{0669}' => Some(c as u32 - 0x0660),
        '\u{06F0}'..='\u{06F9}' => Some(c as u32 - 0x06F0),
        _ => None,
    }
}

/// Parses a page label written in any of the supported digit scripts.
pub fn parse_page_number(text: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }
    text.chars().try_fold(0u32, |acc, c| {
        let digit = decimal_digit(c)?;
        acc.checked_mul(10)?.checked_add(digit)
    })
}

/// Highest page number linked from the pagination bar, or 1 when the page
/// has no pagination controls.
pub fn total_pages(html: &str) -> u32 {
    let document = Html::parse_document(html);
    document
        .select(&PAGINATION_LINK)
        .filter_map(|link| parse_page_number(&stripped_text(&link)))
        .max()
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_timestamp;

    fn now() -> NaiveDateTime {
        parse_timestamp("2024-02-01 00:00:00").unwrap()
    }

    const WOODMART_PAGE: &str = r#"
        <html><body>
          <div class="products">
            <div class="product-grid-item">
              <h3 class="wd-entities-title"><a href="/p/1">  Widget  </a></h3>
              <span class="price">
                <span class="woocommerce-Price-amount amount">
                  <bdi>120,000 <span>تومان</span></bdi>
                </span>
              </span>
            </div>
            <div class="product-grid-item">
              <h3 class="wd-entities-title"><a href="/p/2">Gadget</a></h3>
            </div>
          </div>
          <ul class="page-numbers">
            <li><span class="page-numbers current">1</span></li>
            <li><a class="page-numbers" href="/shop/page/2/">2</a></li>
            <li><a class="page-numbers" href="/shop/page/7/">7</a></li>
            <li><a class="next page-numbers" href="/shop/page/2/">→</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn extracts_title_and_nested_price() {
        let products = extract_products(WOODMART_PAGE, now());

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Widget");
        assert_eq!(products[0].price, "120,000تومان");
        assert_eq!(products[0].observed_at, now());
        assert_eq!(products[1].name, "Gadget");
        assert_eq!(products[1].price, PRICE_SENTINEL);
    }

    #[test]
    fn falls_through_title_templates_in_order() {
        let html = r#"
            <ul>
              <li class="product">
                <h2 class="product-title">From H2</h2><div class="price">$3</div>
              </li>
              <li class="product-item">
                <a class="product-title">From Link</a><span class="price">$4</span>
              </li>
              <li class="product">
                <h3 class="product-title"></h3><h2 class="wd-entities-title">Empty H3</h2>
              </li>
              <li class="product"><p>nothing here</p></li>
            </ul>
        "#;

        let products = extract_products(html, now());
        let names: Vec<&str> = products.iter().map(|p| p.name.as_str()).collect();
        let prices: Vec<&str> = products.iter().map(|p| p.price.as_str()).collect();

        assert_eq!(names, vec!["From H2", "From Link", "Empty H3", TITLE_SENTINEL]);
        assert_eq!(prices, vec!["$3", "$4", PRICE_SENTINEL, PRICE_SENTINEL]);
    }

    #[test]
    fn clean_price_normalizes_placeholders() {
        assert_eq!(clean_price(None), PRICE_SENTINEL);
        assert_eq!(clean_price(Some("   ")), PRICE_SENTINEL);
        assert_eq!(clean_price(Some("N/A")), PRICE_SENTINEL);
        assert_eq!(clean_price(Some(" $7 ")), "$7");
    }

    #[test]
    fn page_without_products_yields_nothing() {
        let html = "<html><body><p>Maintenance</p></body></html>";
        assert!(extract_products(html, now()).is_empty());
    }

    #[test]
    fn total_pages_uses_highest_numeric_link() {
        assert_eq!(total_pages(WOODMART_PAGE), 7);
    }

    #[test]
    fn total_pages_reads_persian_and_arabic_indic_digits() {
        let persian = r#"<ul class="page-numbers">
            <li><a class="page-numbers">۲</a></li>
            <li><a class="page-numbers">۷</a></li>
        </ul>"#;
        assert_eq!(total_pages(persian), 7);

        let arabic_indic = r#"<ul class="page-numbers">
            <li><a class="page-numbers">٩</a></li>
            <li><a class="page-numbers">١٢</a></li>
        </ul>"#;
        assert_eq!(total_pages(arabic_indic), 12);
    }

    #[test]
    fn parse_page_number_rejects_non_digits() {
        assert_eq!(parse_page_number("۱۰"), Some(10));
        assert_eq!(parse_page_number("42"), Some(42));
        assert_eq!(parse_page_number(""), None);
        assert_eq!(parse_page_number("→"), None);
        assert_eq!(parse_page_number("2a"), None);
        assert_eq!(parse_page_number("99999999999"), None);
    }

    #[test]
    fn total_pages_defaults_to_one() {
        assert_eq!(total_pages("<html><body></body></html>"), 1);
        let only_arrows =
            r#"<ul class="page-numbers"><li><a class="page-numbers">next</a></li></ul>"#;
        assert_eq!(total_pages(only_arrows), 1);
    }

    #[test]
    fn pagination_links_outside_the_bar_are_ignored() {
        let html = r#"<div><a class="page-numbers">40</a></div>"#;
        assert_eq!(total_pages(html), 1);
    }
}
