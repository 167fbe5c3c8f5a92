//! Generic JSON feeds of unknown shape.
//!
//! The job array and each record field are located through prioritized
//! candidate tables: the first populated candidate wins.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::models::{JobSource, NormalizedJob, UNKNOWN_COMPANY};
use crate::text::{clean_description, collapse_whitespace, from_epoch, matches_keywords, parse_date};

const ARRAY_FIELDS: &[&str] = &["jobs", "data", "results", "items"];

const TITLE: &[&str] = &["title", "position", "name", "job_title", "jobTitle"];
const COMPANY: &[&str] = &["company", "company_name", "companyName", "employer", "organization"];
const URL: &[&str] = &["url", "link", "job_url", "apply_url", "applyUrl", "href"];
const LOCATION: &[&str] = &["location", "candidate_required_location", "city", "region"];
const DESCRIPTION: &[&str] = &["description", "summary", "content", "body"];
const SALARY: &[&str] = &["salary", "salary_range", "compensation"];
const JOB_TYPE: &[&str] = &["job_type", "type", "employment_type", "jobType"];
const POSTED_AT: &[&str] = &[
    "date",
    "posted_at",
    "created_at",
    "publication_date",
    "pubDate",
    "postedAt",
    "published_at",
];
const TAGS: &[&str] = &["tags", "skills", "categories"];
const LOGO: &[&str] = &["company_logo", "logo", "companyLogo"];

/// Parse a JSON document of unknown shape into records.
///
/// Items without a title are dropped. Keywords are matched against title,
/// description and company.
pub fn parse_json(
    body: &str,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| AppError::ParseError(format!("JSON: {e}")))?;

    let Some(items) = locate_job_array(&root) else {
        tracing::debug!(source_id = %source.id, "No job array found in JSON body");
        return Ok(Vec::new());
    };

    let jobs = items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| map_item(item, source, fetched_at))
        .filter(|job| {
            matches_keywords(
                keywords,
                &[job.title.as_str(), job.description.as_str(), job.company.as_str()],
            )
        })
        .collect();
    Ok(jobs)
}

/// Root array, then a well-known field, then the first non-empty array field.
pub(crate) fn locate_job_array(root: &Value) -> Option<&Vec<Value>> {
    match root {
        Value::Array(items) => Some(items),
        Value::Object(map) => ARRAY_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_array))
            .or_else(|| {
                map.values()
                    .filter_map(Value::as_array)
                    .find(|items| !items.is_empty())
            }),
        _ => None,
    }
}

fn map_item(
    item: &Map<String, Value>,
    source: &JobSource,
    fetched_at: DateTime<Utc>,
) -> Option<NormalizedJob> {
    let title = first_string(item, TITLE)?;
    let company = first_company(item).unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let url = first_string(item, URL).unwrap_or_else(|| source.url.clone());
    let posted_at = first_date(item, POSTED_AT).unwrap_or(fetched_at);

    let mut job = NormalizedJob::new(source, title, company, url, posted_at);
    if let Some(location) = first_string(item, LOCATION) {
        job.location = location;
    }
    if let Some(description) = first_string(item, DESCRIPTION) {
        job.description = clean_description(&description);
    }
    job.salary = first_string(item, SALARY);
    if let Some(job_type) = first_string(item, JOB_TYPE) {
        job.job_type = job_type;
    }
    job.tags = first_string_list(item, TAGS);
    job.company_logo = first_string(item, LOGO);
    Some(job)
}

/// First candidate holding a non-blank scalar, rendered as text.
pub(crate) fn first_string(item: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|key| item.get(*key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => collapse_whitespace(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Company may be a plain string or an object carrying a `name`.
fn first_company(item: &Map<String, Value>) -> Option<String> {
    COMPANY.iter().filter_map(|key| item.get(*key)).find_map(|value| match value {
        Value::Object(company) => company.get("name").and_then(scalar_text),
        other => scalar_text(other),
    })
}

pub(crate) fn first_date(item: &Map<String, Value>, candidates: &[&str]) -> Option<DateTime<Utc>> {
    candidates
        .iter()
        .filter_map(|key| item.get(*key))
        .find_map(|value| match value {
            Value::String(s) => parse_date(s),
            Value::Number(n) => n.as_i64().and_then(from_epoch),
            _ => None,
        })
}

/// Tags from an array of strings (or of objects with a `name`), or a
/// comma-separated string.
pub(crate) fn first_string_list(item: &Map<String, Value>, candidates: &[&str]) -> Vec<String> {
    for value in candidates.iter().filter_map(|key| item.get(*key)) {
        let tags: Vec<String> = match value {
            Value::Array(values) => values
                .iter()
                .filter_map(|v| match v {
                    Value::Object(obj) => obj.get("name").and_then(scalar_text),
                    other => scalar_text(other),
                })
                .collect(),
            Value::String(s) => s
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        if !tags.is_empty() {
            return tags;
        }
    }
    Vec::new()
}
