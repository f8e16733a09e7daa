//! Normalised search titles and the search URL built from them.

use marquee_config::RelevanceBias;

/// Token that stands in for a space inside URL query components.
pub const SPACE_TOKEN: char = '+';

/// A requested title in its received and URL-ready forms.
///
/// Only spaces are encoded; every other character passes through unchanged.
///
/// ```
/// use marquee_scrape::query::Query;
///
/// let q = Query::new("The Wire");
/// assert_eq!(q.raw_title(), "The Wire");
/// assert_eq!(q.encoded_title(), "The+Wire");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    raw_title: String,
    encoded_title: String,
}

impl Query {
    pub fn new(raw_title: impl Into<String>) -> Self {
        let raw_title = raw_title.into();
        let encoded_title = raw_title.replace(' ', &SPACE_TOKEN.to_string());
        Self {
            raw_title,
            encoded_title,
        }
    }

    pub fn raw_title(&self) -> &str {
        &self.raw_title
    }

    pub fn encoded_title(&self) -> &str {
        &self.encoded_title
    }

    /// True when the title has nothing to search for.
    pub fn is_blank(&self) -> bool {
        self.raw_title.trim().is_empty()
    }
}

/// `<base><bias>+<title>`, concatenated without further escaping.
pub fn search_url(base: &str, bias: &RelevanceBias, query: &Query) -> String {
    format!(
        "{base}{}{SPACE_TOKEN}{}",
        bias.query_form(),
        query.encoded_title()
    )
}
