//! Site-specific HTML extractors built on `scraper`.

mod movie;
mod stock;

pub use movie::MovieExtractor;
pub use stock::StockListingExtractor;

use scraper::{ElementRef, Selector};
use trawl_core::error::AppError;

fn selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::ParseError(format!("Invalid selector '{css}': {e}")))
}

/// Concatenated, trimmed text of an element.
fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
