//! Answer text cleanup

use regex_lite::Regex;
use std::sync::LazyLock;

static SEARCH_QUERIES_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)### Search Queries.*").unwrap());

/// Drop a trailing `### Search Queries` section (and everything after it)
/// that some models append, then trim trailing whitespace.
pub fn strip_search_queries(answer: &str) -> String {
    SEARCH_QUERIES_SECTION
        .replace(answer, "")
        .trim_end()
        .to_string()
}
