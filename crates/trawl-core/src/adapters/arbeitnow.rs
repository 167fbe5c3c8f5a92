//! Arbeitnow: a `data` array mixing on-site and remote postings.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::null_as_default;
use crate::error::AppError;
use crate::models::{JobSource, NormalizedJob, UNKNOWN_COMPANY};
use crate::text::{clean_description, from_epoch, matches_keywords};

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default, deserialize_with = "null_as_default")]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Posting {
    title: Option<String>,
    company_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    remote: bool,
    url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    job_types: Vec<String>,
    location: Option<String>,
    created_at: Option<i64>,
}

/// Remote postings only; keywords over title, tags and description.
pub fn parse(
    body: &str,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let response: Response =
        serde_json::from_str(body).map_err(|e| AppError::ParseError(format!("Arbeitnow: {e}")))?;

    let jobs = response
        .data
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Posting>(item) {
            Ok(posting) => Some(posting),
            Err(e) => {
                tracing::debug!(source_id = %source.id, error = %e, "Skipping malformed Arbeitnow posting");
                None
            }
        })
        .filter(|p| p.remote)
        .filter_map(|posting| {
            let title = posting.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
            let description = clean_description(&posting.description);
            let tags = posting.tags.join(" ");
            if !matches_keywords(keywords, &[title, tags.as_str(), description.as_str()]) {
                return None;
            }

            let company = posting
                .company_name
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNKNOWN_COMPANY);
            let url = posting.url.clone().unwrap_or_else(|| source.url.clone());
            let posted_at = posting.created_at.and_then(from_epoch).unwrap_or(fetched_at);

            let mut job = NormalizedJob::new(source, title, company, url, posted_at);
            job.description = description;
            if let Some(location) = posting.location.as_deref().filter(|l| !l.trim().is_empty()) {
                job.location = format!("{} (Remote)", location.trim());
            }
            if let Some(kind) = posting.job_types.first() {
                job.job_type = kind.clone();
            }
            job.tags = posting.tags;
            Some(job)
        })
        .collect();
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use crate::testutil::{fetched_at, test_source};

    const BODY: &str = r#"{
      "data": [
        {"slug": "a", "company_name": "Kraut GmbH", "title": "Rust Developer",
         "description": "<p>Async services</p>", "remote": true,
         "url": "https://www.arbeitnow.com/jobs/a", "tags": ["Software Development"],
         "job_types": ["full time"], "location": "Berlin", "created_at": 1717407000},
        {"slug": "b", "company_name": "Office AG", "title": "Rust Developer (Onsite)",
         "description": "In office", "remote": false, "url": "https://www.arbeitnow.com/jobs/b",
         "tags": [], "job_types": [], "location": "Munich", "created_at": 1717407000},
        {"slug": "c", "company_name": "Remote Co", "title": "Sales Lead",
         "description": "Grow revenue", "remote": true, "url": "https://www.arbeitnow.com/jobs/c",
         "tags": ["Sales"], "job_types": [], "location": "", "created_at": null}
      ],
      "links": {}, "meta": {}
    }"#;

    fn source() -> JobSource {
        test_source("arbeitnow", SourceType::Api, "General")
    }

    #[test]
    fn keeps_only_remote_postings() {
        let jobs = parse(BODY, &source(), &[], fetched_at()).unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.company != "Office AG"));

        let rust = &jobs[0];
        assert_eq!(rust.location, "Berlin (Remote)");
        assert_eq!(rust.job_type, "full time");
        assert_eq!(rust.description, "Async services");
        assert_eq!(rust.posted_at.to_rfc3339(), "2024-06-03T09:30:00+00:00");

        assert_eq!(jobs[1].location, "Remote");
        assert_eq!(jobs[1].posted_at, fetched_at());
    }

    #[test]
    fn malformed_posting_is_skipped_alone() {
        let body = r#"{"data": [
            {"company_name": "Good GmbH", "title": "Backend Engineer", "remote": true,
             "url": "https://www.arbeitnow.com/jobs/good", "tags": ["Go"], "created_at": 1717407000},
            {"company_name": "Nulls AG", "title": "Platform Engineer", "remote": true,
             "url": "https://www.arbeitnow.com/jobs/nulls", "tags": null, "job_types": null,
             "description": null},
            {"company_name": "Broken", "title": "Bad", "remote": "yes", "created_at": "soon"}
        ]}"#;

        let jobs = parse(body, &source(), &[], fetched_at()).unwrap();

        let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Backend Engineer", "Platform Engineer"]);
        assert!(jobs[1].tags.is_empty());
    }

    #[test]
    fn keywords_match_tags_and_description() {
        let by_tag = parse(BODY, &source(), &["software".into()], fetched_at()).unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].title, "Rust Developer");

        let by_description = parse(BODY, &source(), &["revenue".into()], fetched_at()).unwrap();
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].title, "Sales Lead");
    }
}
