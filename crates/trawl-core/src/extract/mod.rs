//! Format extractors: raw response bodies in, normalized records out.
//!
//! Every extractor is a pure function of the body, the source, the keyword
//! list and the fetch instant. Fetching, caching and rate limiting are the
//! orchestrator's job.

pub mod ats;
pub mod html;
pub mod json;
pub mod rss;
pub mod title;

use scraper::{ElementRef, Selector};

use crate::models::{JobSource, SourceType};
use crate::text::{clean_company_name, collapse_whitespace};

pub use ats::parse_ats;
pub use html::parse_html;
pub use json::parse_json;
pub use rss::parse_rss;
pub use title::{TitleParts, split_title_company};

/// Bodies shorter than this are not treated as a real HTML page.
pub const MIN_HTML_BODY_LEN: usize = 500;

/// Cheap sanity check that a probed body plausibly has the declared format.
pub fn looks_like(source_type: SourceType, body: &str) -> bool {
    match source_type {
        SourceType::Rss => {
            let head = body.to_ascii_lowercase();
            head.contains("<rss") || head.contains("<feed") || head.contains("<channel")
        }
        SourceType::Json | SourceType::Api => matches!(
            serde_json::from_str::<serde_json::Value>(body),
            Ok(serde_json::Value::Object(_) | serde_json::Value::Array(_))
        ),
        SourceType::Html => body.len() > MIN_HTML_BODY_LEN,
    }
}

/// Employer for single-company pages: the explicit name, else the source
/// name without its trailing parenthetical.
pub(crate) fn page_company(source: &JobSource) -> String {
    source
        .company_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| clean_company_name(&source.name))
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first descendant matching `selector` that has any text.
pub(crate) fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// `href` of the element itself when it matches, else of its first
/// matching descendant.
pub(crate) fn first_href<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<&'a str> {
    if selector.matches(&element)
        && let Some(href) = element.value().attr("href")
    {
        return Some(href);
    }
    element
        .select(selector)
        .find_map(|link| link.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
}
