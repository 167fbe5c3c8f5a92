//! Generic career pages, scraped heuristically.
//!
//! A page is probed with an ordered list of container selectors; the first
//! one matching a plausible number of elements (1..=99) is taken as the
//! list of postings. Anything matching nothing, or matching a hundred or
//! more elements, is either the wrong element or a page-wide wrapper.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::error::AppError;
use crate::extract::{element_text, first_href, first_text, page_company};
use crate::models::{JobSource, NormalizedJob};
use crate::text::{clean_description, matches_keywords, parse_date, resolve_url};

const MAX_CONTAINER_MATCHES: usize = 99;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Invalid built-in CSS selector")
}

static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [
        r#"[class*="job-listing"]"#,
        r#"[class*="job-item"]"#,
        r#"[class*="job-card"]"#,
        r#"[class*="job-post"]"#,
        r#"[class*="job"]"#,
        r#"[class*="position"]"#,
        r#"[class*="opening"]"#,
        r#"[class*="vacanc"]"#,
        "article",
        ".listing",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"h1, h2, h3, h4, [class*="title"]"#));
static TITLE_FALLBACK: LazyLock<Selector> = LazyLock::new(|| selector("a"));
static DESCRIPTION: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"[class*="description"], [class*="summary"], [class*="excerpt"], p"#)
});
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static LOCATION: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[class*="location"], [class*="place"]"#));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("time[datetime]"));

/// Scrape a careers page into records for `source`.
///
/// Keywords are matched against title and description. Relative links are
/// resolved against the source URL; a posting without a link gets it too.
pub fn parse_html(
    body: &str,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let document = Html::parse_document(body);

    let Some((index, containers)) = CONTAINERS.iter().enumerate().find_map(|(i, sel)| {
        let found: Vec<_> = document.select(sel).collect();
        (1..=MAX_CONTAINER_MATCHES)
            .contains(&found.len())
            .then_some((i, found))
    }) else {
        tracing::debug!(source_id = %source.id, "No job containers found on page");
        return Ok(Vec::new());
    };
    tracing::debug!(
        source_id = %source.id,
        selector = index,
        containers = containers.len(),
        "Selected job container heuristic"
    );

    let company = page_company(source);
    let mut seen = HashSet::new();
    let mut jobs = Vec::new();

    for container in containers {
        let Some(title) =
            first_text(container, &TITLE).or_else(|| first_text(container, &TITLE_FALLBACK))
        else {
            continue;
        };
        let description = first_text(container, &DESCRIPTION)
            .filter(|d| *d != title)
            .map(|d| clean_description(&d))
            .unwrap_or_default();

        if !matches_keywords(keywords, &[title.as_str(), description.as_str()]) {
            continue;
        }

        let url = first_href(container, &LINK)
            .map(|href| resolve_url(&source.url, href))
            .unwrap_or_else(|| source.url.clone());
        if !seen.insert((title.to_lowercase(), url.clone())) {
            continue;
        }

        let posted_at = container
            .select(&TIME)
            .find_map(|t| t.value().attr("datetime").and_then(parse_date))
            .unwrap_or(fetched_at);

        let mut job = NormalizedJob::new(source, title, company.clone(), url, posted_at);
        job.description = description;
        if let Some(location) = container.select(&LOCATION).map(element_text).find(|l| !l.is_empty()) {
            job.location = location;
        }
        jobs.push(job);
    }

    Ok(jobs)
}
