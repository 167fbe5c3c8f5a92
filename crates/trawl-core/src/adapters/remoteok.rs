//! RemoteOK: a JSON array whose first element is a legal notice.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::adapters::{normalized_keywords, with_query};
use crate::error::AppError;
use crate::models::{JobSource, NormalizedJob, UNKNOWN_COMPANY};
use crate::text::{clean_description, from_epoch, parse_date};

#[derive(Debug, Deserialize)]
struct Posting {
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    company_logo: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    salary_min: Option<u64>,
    #[serde(default)]
    salary_max: Option<u64>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    epoch: Option<i64>,
}

/// The API filters by tag itself: `?tags=a,b`.
pub fn request_url(base: &str, keywords: &[String]) -> Result<String, AppError> {
    let tags = normalized_keywords(keywords);
    if tags.is_empty() {
        return Ok(base.to_string());
    }
    with_query(base, &[("tags", &tags.join(","))])
}

pub fn parse(
    body: &str,
    source: &JobSource,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let items: Vec<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("RemoteOK: {e}")))?;

    let jobs = items
        .into_iter()
        .skip(1)
        .filter_map(|item| serde_json::from_value::<Posting>(item).ok())
        .filter_map(|posting| map_posting(posting, source, fetched_at))
        .collect();
    Ok(jobs)
}

fn map_posting(
    posting: Posting,
    source: &JobSource,
    fetched_at: DateTime<Utc>,
) -> Option<NormalizedJob> {
    let title = posting.position.filter(|t| !t.trim().is_empty())?;
    let company = posting
        .company
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let url = posting.url.unwrap_or_else(|| source.url.clone());
    let posted_at = posting
        .date
        .as_deref()
        .and_then(parse_date)
        .or_else(|| posting.epoch.and_then(from_epoch))
        .unwrap_or(fetched_at);

    let mut job = NormalizedJob::new(source, title.trim(), company.trim(), url, posted_at);
    job.company_logo = posting.company_logo.filter(|l| !l.is_empty());
    if let Some(location) = posting.location.filter(|l| !l.trim().is_empty()) {
        job.location = location.trim().to_string();
    }
    job.salary = salary_range(posting.salary_min, posting.salary_max);
    job.description = clean_description(posting.description.as_deref().unwrap_or_default());
    job.tags = posting.tags;
    Some(job)
}

fn salary_range(min: Option<u64>, max: Option<u64>) -> Option<String> {
    match (min.filter(|v| *v > 0), max.filter(|v| *v > 0)) {
        (Some(min), Some(max)) => Some(format!("${min} - ${max}")),
        (Some(min), None) => Some(format!("From ${min}")),
        (None, Some(max)) => Some(format!("Up to ${max}")),
        (None, None) => None,
    }
}
