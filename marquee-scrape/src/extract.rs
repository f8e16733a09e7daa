//! HTML extraction for the two scraped pages.
//!
//! - Search results: anchors whose `href` contains the bias match token,
//!   with the engine's redirect prefix and tracking parameters removed
//! - Candidate page: `img` sources whose class list is exactly the target class,
//!   unwrapped from the resizing proxy when present
//!
//! Both walk the parsed tree in document order, so "first" means first on the page.

use marquee_config::ExtractionRules;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parse a fetched page. Lenient: malformed markup still yields a tree.
pub fn parse_page(body: &str) -> Html {
    Html::parse_document(body)
}

fn select<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => doc.select(&selector).collect(),
        Err(err) => {
            tracing::warn!(css, error = ?err, "extract.selector_invalid");
            Vec::new()
        }
    }
}

/// Candidate links in page order.
pub fn candidate_links(doc: &Html, match_token: &str, rules: &ExtractionRules) -> Vec<String> {
    select(doc, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains(match_token))
        .filter_map(|href| trim_link(href, rules.link_prefix_len))
        .collect()
}

/// Drop `prefix_len` leading characters and cut at the first `&`.
///
/// Returns `None` when nothing is left.
///
/// ```
/// use marquee_scrape::extract::trim_link;
///
/// let href = "/url?q=https://www.rottentomatoes.com/tv/the_wire&sa=U&ved=0";
/// assert_eq!(
///     trim_link(href, 7).as_deref(),
///     Some("https://www.rottentomatoes.com/tv/the_wire")
/// );
/// ```
pub fn trim_link(href: &str, prefix_len: usize) -> Option<String> {
    let start = href.char_indices().nth(prefix_len).map(|(i, _)| i)?;
    let rest = &href[start..];
    let link = match rest.find('&') {
        Some(end) => &rest[..end],
        None => rest,
    };
    (!link.is_empty()).then(|| link.to_string())
}

/// Raw `src` values of qualifying images, in page order.
///
/// A qualifying image without `src` ends the list there: the first match is
/// the one the page designates, so later images are not promoted in its place.
pub fn image_sources(doc: &Html, rules: &ExtractionRules) -> Vec<String> {
    let target = rules.target_image_class.as_str();
    select(doc, "img[class]")
        .into_iter()
        .filter(|img| {
            let mut classes = img
                .value()
                .attr("class")
                .unwrap_or("")
                .split_ascii_whitespace();
            classes.next() == Some(target) && classes.next().is_none()
        })
        .map_while(|img| img.value().attr("src"))
        .map(str::to_string)
        .collect()
}

/// Unwrap a resizing-proxy source; other sources come back unchanged.
///
/// ```
/// use marquee_config::ExtractionRules;
/// use marquee_scrape::extract::normalize_image_source;
///
/// let rules = ExtractionRules::default();
/// assert_eq!(
///     normalize_image_source("https://img.example/resiz/v2/abc.jpg", &rules),
///     "abc.jpg"
/// );
/// assert_eq!(
///     normalize_image_source("https://img.example/abc.jpg", &rules),
///     "https://img.example/abc.jpg"
/// );
/// ```
pub fn normalize_image_source(src: &str, rules: &ExtractionRules) -> String {
    if !src.contains(rules.resize_indicator.as_str()) {
        return src.to_string();
    }
    let Some(pos) = src.find(rules.resize_marker.as_str()) else {
        tracing::warn!(
            src,
            marker = %rules.resize_marker,
            "extract.image.resize_marker_missing"
        );
        return src.to_string();
    };
    match pos
        .checked_add(rules.resize_marker_offset)
        .and_then(|start| src.get(start..))
    {
        Some(tail) => tail.to_string(),
        None => {
            tracing::warn!(
                src,
                offset = rules.resize_marker_offset,
                "extract.image.resize_offset_out_of_range"
            );
            src.to_string()
        }
    }
}

/// Resolve `link` against the page it was found on when it is not absolute.
pub fn absolutize(page_url: &str, link: &str) -> String {
    if Url::parse(link).is_ok() {
        return link.to_string();
    }
    Url::parse(page_url)
        .and_then(|base| base.join(link))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| link.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> ExtractionRules {
        ExtractionRules::default()
    }

    const SEARCH_FIXTURE: &str = r#"
<html><body>
  <a href="/search?q=rotten+tomatoes+The+Wire&tbm=isch">Images</a>
  <a href="/url?q=https://en.wikipedia.org/wiki/The_Wire&sa=U">Wikipedia</a>
  <a href="/url?q=https://www.rottentomatoes.com/tv/the_wire&tracking=1">Rotten</a>
  <a>no href</a>
</body></html>"#;

    #[test]
    fn extracts_single_matching_link() {
        let doc = parse_page(SEARCH_FIXTURE);
        let links = candidate_links(&doc, "rottentomatoes", &rules());
        assert_eq!(links, vec!["https://www.rottentomatoes.com/tv/the_wire"]);
    }

    #[test]
    fn extracted_link_is_offset_seven_up_to_ampersand() {
        let href = "/url?q=https://www.rottentomatoes.com/tv/the_wire&tracking=1";
        let start = 7;
        let end = href.find('&').unwrap();
        let html = format!(r#"<p>lead-in text</p><a href="{href}">x</a>"#);
        let links = candidate_links(&parse_page(&html), "rottentomatoes", &rules());
        assert_eq!(links, vec![href[start..end].to_string()]);
    }

    #[test]
    fn entity_encoded_ampersand_is_a_cut_point() {
        let html = r#"<a href="/url?q=https://rottentomatoes.com/m/x&amp;sa=U">x</a>"#;
        let links = candidate_links(&parse_page(html), "rottentomatoes", &rules());
        assert_eq!(links, vec!["https://rottentomatoes.com/m/x"]);
    }

    #[test]
    fn links_keep_page_order() {
        let html = r#"
<a href="/url?q=https://rottentomatoes.com/tv/first&x=1">1</a>
<div><a href="/url?q=https://rottentomatoes.com/tv/second">2</a></div>"#;
        let links = candidate_links(&parse_page(html), "rottentomatoes", &rules());
        assert_eq!(
            links,
            vec![
                "https://rottentomatoes.com/tv/first",
                "https://rottentomatoes.com/tv/second"
            ]
        );
    }

    #[test]
    fn no_matching_anchor_yields_nothing() {
        let links = candidate_links(&parse_page(SEARCH_FIXTURE), "imdb", &rules());
        assert!(links.is_empty());
    }

    #[test]
    fn trim_link_handles_short_and_prefix_only_hrefs() {
        assert_eq!(trim_link("/url?q=", 7), None);
        assert_eq!(trim_link("/url", 7), None);
        assert_eq!(trim_link("/url?q=&sa=U", 7), None);
        assert_eq!(trim_link("abc", 0).as_deref(), Some("abc"));
    }

    const CANDIDATE_FIXTURE: &str = r#"
<html><body>
  <img class="PhotosCarousel__image extra" src="https://img.example/wrong-multi.jpg">
  <img class="Other" src="https://img.example/wrong-class.jpg">
  <img class="PhotosCarousel__image" src="https://img.example/first.jpg">
  <img class="PhotosCarousel__image" src="https://img.example/second.jpg">
</body></html>"#;

    #[test]
    fn image_class_must_match_exactly() {
        let srcs = image_sources(&parse_page(CANDIDATE_FIXTURE), &rules());
        assert_eq!(
            srcs,
            vec!["https://img.example/first.jpg", "https://img.example/second.jpg"]
        );
    }

    #[test]
    fn first_match_without_src_yields_nothing() {
        let html = r#"<img class="PhotosCarousel__image"><img class="PhotosCarousel__image" src="b.jpg">"#;
        assert!(image_sources(&parse_page(html), &rules()).is_empty());
    }

    #[test]
    fn unrelated_image_without_src_does_not_block() {
        let html = r#"<img class="Other"><img class="PhotosCarousel__image" src="b.jpg">"#;
        assert_eq!(image_sources(&parse_page(html), &rules()), vec!["b.jpg"]);
    }

    #[test]
    fn uppercase_tags_are_matched() {
        let html = r#"<A HREF="/url?q=https://rottentomatoes.com/tv/x&y=1">x</A>"#;
        let links = candidate_links(&parse_page(html), "rottentomatoes", &rules());
        assert_eq!(links, vec!["https://rottentomatoes.com/tv/x"]);
    }

    #[test]
    fn resize_rule_slices_after_marker() {
        let src = "https://resizing.flixster.com/abc=/300x300/v2/https://resizing.flixster.com/p.jpg";
        let p = src.find("v2/").unwrap();
        assert_eq!(normalize_image_source(src, &rules()), &src[p + 3..]);
    }

    #[test]
    fn resize_indicator_without_marker_is_unchanged() {
        let src = "https://img.example/resized/abc.jpg";
        assert_eq!(normalize_image_source(src, &rules()), src);
    }

    #[test]
    fn oversized_resize_offset_leaves_source_unchanged() {
        let src = "https://x/resiz/v2/a.jpg";
        let mut rules = rules();
        rules.resize_marker_offset = usize::MAX;
        assert_eq!(normalize_image_source(src, &rules), src);

        rules.resize_marker_offset = src.len();
        assert_eq!(normalize_image_source(src, &rules), src);
    }

    #[test]
    fn absolutize_resolves_relative_and_protocol_relative() {
        let page = "https://www.rottentomatoes.com/tv/the_wire";
        assert_eq!(
            absolutize(page, "//img.example/a.jpg"),
            "https://img.example/a.jpg"
        );
        assert_eq!(
            absolutize(page, "abc.jpg"),
            "https://www.rottentomatoes.com/tv/abc.jpg"
        );
        assert_eq!(
            absolutize(page, "https://cdn.example/x.jpg"),
            "https://cdn.example/x.jpg"
        );
    }
}
