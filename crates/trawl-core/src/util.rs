use std::sync::LazyLock;

use regex::Regex;

static SUBJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"subject/(\d+)(/|$)").unwrap_or_else(|e| panic!("invalid subject pattern: {e}"))
});

/// Base for sequentially generated movie locators.
pub const MOVIE_SUBJECT_BASE: &str = "https://movie.douban.com/subject";

/// Parse the numeric subject id out of a locator.
///
/// Example: `"https://movie.douban.com/subject/1291543/"` → `Some(1291543)`
pub fn subject_id(locator: &str) -> Option<i64> {
    SUBJECT_ID
        .captures(locator)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// The next `count` subject locators after `max_id`.
pub fn sequential_locators(max_id: i64, count: usize) -> Vec<String> {
    (1..=count as i64)
        .map(|i| format!("{MOVIE_SUBJECT_BASE}/{}/", max_id + i))
        .collect()
}

/// First `max_chars` characters of a response body, for diagnostic logs.
pub fn excerpt(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
