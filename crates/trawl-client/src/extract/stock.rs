use scraper::{ElementRef, Html, Selector};
use trawl_core::error::AppError;
use trawl_core::models::Stock;
use trawl_core::traits::ListingExtractor;

use super::{selector, text_of};

/// Category of the first, unlabelled block.
pub const FIRST_BLOCK_CATEGORY: &str = "中国";
/// Category of a later block that has no label.
pub const UNKNOWN_CATEGORY: &str = "未知";

const LISTED_MARKER: &str = "家在美上市";
const NOTABLE_MARKER: &str = "家在美知名";

/// Extracts [`Stock`] rows from the Sina US stock overview page.
#[derive(Clone)]
pub struct StockListingExtractor {
    block: Selector,
    label: Selector,
    anchor: Selector,
}

impl StockListingExtractor {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            block: selector("div.col_div")?,
            label: selector("label")?,
            anchor: selector("a[href]")?,
        })
    }

    fn block_category(&self, block: ElementRef<'_>) -> String {
        block
            .select(&self.label)
            .next()
            .map(|label| category_from_label(&text_of(label)))
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
    }
}

impl ListingExtractor for StockListingExtractor {
    type Record = Stock;

    fn extract_listing(&self, body: &str) -> Vec<Stock> {
        let document = Html::parse_document(body);
        let mut stocks = Vec::new();

        for (index, block) in document.select(&self.block).enumerate() {
            let category = if index == 0 {
                FIRST_BLOCK_CATEGORY.to_string()
            } else {
                self.block_category(block)
            };

            for anchor in block.select(&self.anchor) {
                let Some(title) = anchor.value().attr("title") else {
                    continue;
                };
                if let Some((symbol, name)) = parse_anchor(title, &text_of(anchor)) {
                    stocks.push(Stock::new(symbol, name, category.clone()));
                }
            }
        }

        stocks
    }
}

/// Map a block label to its category.
///
/// `111家在美上市科技类知名公司:` → `科技`, `7家在美知名ETF:` → `ETF`,
/// `a:b` → `b`, anything else is used as-is.
fn category_from_label(label: &str) -> String {
    let label = label.trim();

    if let Some((_, rest)) = label.split_once(LISTED_MARKER) {
        let rest = rest.trim();
        let rest = rest.strip_suffix(':').unwrap_or(rest);
        return rest.split('类').next().unwrap_or(rest).to_string();
    }
    if let Some((_, rest)) = label.split_once(NOTABLE_MARKER) {
        let rest = rest.trim();
        return rest.strip_suffix(':').unwrap_or(rest).to_string();
    }
    if let Some(part) = label.split(':').nth(1) {
        return part.trim().to_string();
    }
    label.to_string()
}

/// Symbol and name from an anchor's `title` attribute and link text.
///
/// Titles with fewer than three comma-separated parts are not stock links.
fn parse_anchor(title: &str, text: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = title.split(',').collect();
    if parts.len() < 3 {
        return None;
    }

    if text.contains('(') && text.contains(')') {
        let after_last_open = text.rsplit('(').next().unwrap_or_default();
        let symbol = after_last_open.split(')').next().unwrap_or_default();
        let name = text.split('(').next().unwrap_or_default();
        return Some((symbol.trim().to_string(), name.trim().to_string()));
    }

    let mut name = parts[2];
    if name.contains('(') && name.contains(')') {
        name = name.split('(').next().unwrap_or_default();
    }
    Some((parts[0].trim().to_string(), name.trim().to_string()))
}
