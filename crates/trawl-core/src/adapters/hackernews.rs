//! Hacker News jobs: an HTML table, not an API.
//!
//! Each posting is a `tr.athing` row followed by a subtext row whose
//! `span.age` carries relative time ("3 hours ago").

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::error::AppError;
use crate::extract::{element_text, split_title_company};
use crate::models::{JobSource, NormalizedJob};
use crate::text::{matches_keywords, parse_relative_age, resolve_url};

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr.athing").expect("Invalid row selector"));
static TITLE_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("span.titleline > a, td.title > a").expect("Invalid title selector")
});
static AGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.age").expect("Invalid age selector"));

pub fn parse(
    body: &str,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let document = Html::parse_document(body);
    let mut jobs = Vec::new();
    for row in document.select(&ROW) {
        let Some(link) = row.select(&TITLE_LINK).next() else {
            continue;
        };
        let headline = element_text(link);
        if headline.is_empty() {
            continue;
        }

        let parts = split_title_company(&headline);
        if !matches_keywords(keywords, &[parts.title.as_str(), parts.company.as_str()]) {
            continue;
        }

        let url = link
            .value()
            .attr("href")
            .map(|href| resolve_url(&source.url, href))
            .unwrap_or_else(|| source.url.clone());
        let posted_at = row_age(row)
            .map(|age| parse_relative_age(&age, fetched_at))
            .unwrap_or(fetched_at);

        let mut job = NormalizedJob::new(source, parts.title, parts.company, url, posted_at);
        job.description = headline;
        jobs.push(job);
    }

    if jobs.is_empty() && !keywords.is_empty() {
        tracing::debug!(source_id = %source.id, "No Hacker News postings matched keywords");
    }
    Ok(jobs)
}

/// Age text from the subtext row directly after `row`, if it has one.
fn row_age(row: ElementRef<'_>) -> Option<String> {
    let subtext = row.next_siblings().find_map(ElementRef::wrap)?;
    if subtext.value().classes().any(|class| class == "athing") {
        return None;
    }
    subtext.select(&AGE).next().map(element_text)
}
