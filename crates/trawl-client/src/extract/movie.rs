use scraper::{Html, Selector};
use trawl_core::error::AppError;
use trawl_core::models::{Movie, WorkItem};
use trawl_core::traits::{Extraction, Extractor};

use super::{selector, text_of};

/// Extracts a [`Movie`] from a Douban subject page.
///
/// `id` comes from the work item's key and `url` is its locator; the other
/// fields are read from the page. Rating is optional.
#[derive(Clone)]
pub struct MovieExtractor {
    title: Selector,
    year: Selector,
    director: Selector,
    rating: Selector,
}

impl MovieExtractor {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            title: selector(r#"span[property="v:itemreviewed"]"#)?,
            year: selector("span.year")?,
            director: selector(r#"a[rel="v:directedBy"]"#)?,
            rating: selector(r#"strong.rating_num[property="v:average"]"#)?,
        })
    }

    fn first_text(document: &Html, selector: &Selector) -> Option<String> {
        document
            .select(selector)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    }
}

impl Extractor for MovieExtractor {
    type Record = Movie;

    fn extract(&self, body: &str, item: &WorkItem) -> Extraction<Movie> {
        let document = Html::parse_document(body);

        let title = Self::first_text(&document, &self.title);
        let year = Self::first_text(&document, &self.year)
            .map(|y| y.trim_matches(|c| c == '(' || c == ')' || c == ' ').to_string())
            .filter(|y| !y.is_empty());
        let director = Self::first_text(&document, &self.director);
        let rating = Self::first_text(&document, &self.rating).and_then(|r| r.parse::<f64>().ok());

        let mut missing = Vec::new();
        if item.key.is_none() {
            missing.push("id");
        }
        if title.is_none() {
            missing.push("title");
        }
        if year.is_none() {
            missing.push("year");
        }
        if director.is_none() {
            missing.push("director");
        }

        match (item.key, title, year, director) {
            (Some(id), Some(title), Some(year), Some(director)) => Extraction::Complete(Movie {
                id,
                title,
                year,
                director,
                rating,
                url: item.locator.clone(),
            }),
            _ => Extraction::Incomplete { missing },
        }
    }
}
