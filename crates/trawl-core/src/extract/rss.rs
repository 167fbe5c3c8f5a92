//! RSS 2.0 feeds: one record per `<item>`.

use std::borrow::Cow;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use regex::{Captures, Regex};
use scraper::Html;
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::title::split_title_company;
use crate::models::{JobSource, NormalizedJob};
use crate::text::{clean_description, matches_keywords, parse_date, strip_html};

static CDATA_OR_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!\[CDATA\[.*?\]\]>|&([A-Za-z][A-Za-z0-9]*);").expect("Invalid entity regex")
});

const XML_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot", "apos"];

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "category", default)]
    categories: Vec<Text>,
    /// We Work Remotely style region hint.
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse an RSS document into records, keeping items whose title or
/// description matches any keyword.
pub fn parse_rss(
    body: &str,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let xml = html_entities_to_xml(body);
    let rss: Rss = from_str(&xml).map_err(|e| AppError::ParseError(format!("RSS: {e}")))?;

    let mut jobs = Vec::with_capacity(rss.channel.items.len());
    for item in rss.channel.items {
        let raw_title = strip_html(item.title.as_deref().unwrap_or_default());
        if raw_title.is_empty() {
            continue;
        }
        let raw_description = item.description.as_deref().unwrap_or_default();
        let description = clean_description(raw_description);

        if !matches_keywords(keywords, &[raw_title.as_str(), description.as_str()]) {
            continue;
        }

        let parts = split_title_company(&raw_title);
        let url = item
            .link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| source.url.clone());
        let posted_at = item
            .pub_date
            .as_deref()
            .and_then(parse_date)
            .unwrap_or(fetched_at);

        let mut job = NormalizedJob::new(source, parts.title, parts.company, url, posted_at);
        job.description = description;
        job.tags = item
            .categories
            .into_iter()
            .map(|c| c.value.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(region) = item.region.map(|r| strip_html(&r)).filter(|r| !r.is_empty()) {
            job.location = region;
        }
        jobs.push(job);
    }

    Ok(jobs)
}

/// Rewrite HTML named entities (`&eacute;`, `&nbsp;`) outside CDATA as
/// XML-safe text. The five XML entities pass through untouched.
fn html_entities_to_xml(body: &str) -> Cow<'_, str> {
    CDATA_OR_ENTITY.replace_all(body, |caps: &Captures<'_>| match caps.get(1) {
        Some(name) if !XML_ENTITIES.contains(&name.as_str()) => {
            xml_escape(&decode_html_entity(&caps[0]))
        }
        _ => caps[0].to_string(),
    })
}

/// Unknown names come back verbatim and end up escaped as literal text.
fn decode_html_entity(entity: &str) -> String {
    Html::parse_fragment(entity).root_element().text().collect()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;")
}
