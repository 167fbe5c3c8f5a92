//! Himalayas: offset-paginated, no server-side search.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::{DirectClient, null_as_default, with_query};
use crate::error::AppError;
use crate::models::{JobSource, NormalizedJob, UNKNOWN_COMPANY};
use crate::text::{clean_description, from_epoch, matches_keywords};
use crate::traits::Fetcher;

pub const PAGE_SIZE: usize = 20;
pub const MAX_PAGES: usize = 5;

/// Postings stay raw here so one malformed entry cannot sink the page.
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default, deserialize_with = "null_as_default")]
    jobs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Posting {
    title: Option<String>,
    company_name: Option<String>,
    company_logo: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    location_restrictions: Vec<String>,
    min_salary: Option<f64>,
    max_salary: Option<f64>,
    currency: Option<String>,
    employment_type: Option<String>,
    excerpt: Option<String>,
    description: Option<String>,
    application_link: Option<String>,
    guid: Option<String>,
    pub_date: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    categories: Vec<String>,
}

pub fn page_url(base: &str, page: usize) -> Result<String, AppError> {
    let limit = PAGE_SIZE.to_string();
    let offset = (page * PAGE_SIZE).to_string();
    with_query(base, &[("limit", &limit), ("offset", &offset)])
}

/// Walk pages until one comes back short, at most [`MAX_PAGES`].
pub async fn fetch<F: Fetcher>(
    client: &DirectClient<'_, F>,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let mut jobs = Vec::new();
    for page in 0..MAX_PAGES {
        let url = page_url(&source.url, page)?;
        let body = if page == 0 {
            client.body(&url).await?
        } else {
            client.paced_body(&url).await?
        };
        let (mut page_jobs, raw_count) = parse_page(&body, source, keywords, fetched_at)?;
        jobs.append(&mut page_jobs);
        if raw_count < PAGE_SIZE {
            break;
        }
    }
    Ok(jobs)
}

/// One page of records plus how many postings the page held before filtering.
pub fn parse_page(
    body: &str,
    source: &JobSource,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<(Vec<NormalizedJob>, usize), AppError> {
    let page: Page =
        serde_json::from_str(body).map_err(|e| AppError::ParseError(format!("Himalayas: {e}")))?;
    let raw_count = page.jobs.len();

    let jobs = page
        .jobs
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Posting>(item) {
            Ok(posting) => Some(posting),
            Err(e) => {
                tracing::debug!(source_id = %source.id, error = %e, "Skipping malformed Himalayas posting");
                None
            }
        })
        .filter(|posting| {
            let title = posting.title.as_deref().unwrap_or_default();
            let categories = posting.categories.join(" ");
            matches_keywords(keywords, &[title, categories.as_str()])
        })
        .filter_map(|posting| map_posting(posting, source, fetched_at))
        .collect();
    Ok((jobs, raw_count))
}

fn map_posting(
    posting: Posting,
    source: &JobSource,
    fetched_at: DateTime<Utc>,
) -> Option<NormalizedJob> {
    let title = posting.title.filter(|t| !t.trim().is_empty())?;
    let company = posting
        .company_name
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());
    let url = posting
        .application_link
        .or(posting.guid)
        .unwrap_or_else(|| source.url.clone());
    let posted_at = posting.pub_date.and_then(from_epoch).unwrap_or(fetched_at);

    let mut job = NormalizedJob::new(source, title.trim(), company, url, posted_at);
    job.company_logo = posting.company_logo;
    if !posting.location_restrictions.is_empty() {
        job.location = posting.location_restrictions.join(", ");
    }
    job.salary = match (posting.min_salary, posting.max_salary) {
        (Some(min), Some(max)) if max > 0.0 => {
            let currency = posting.currency.as_deref().unwrap_or("USD");
            Some(format!("{min} - {max} {currency}"))
        }
        _ => None,
    };
    if let Some(kind) = posting.employment_type.filter(|k| !k.is_empty()) {
        job.job_type = kind;
    }
    let description = posting.excerpt.or(posting.description).unwrap_or_default();
    job.description = clean_description(&description);
    job.tags = posting.categories;
    Some(job)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::models::SourceType;
    use crate::retry::RetryPolicy;
    use crate::testutil::{MockFetcher, fetched_at, test_source};
    use crate::throttle::RateLimiter;
    use crate::traits::RequestOptions;

    fn source() -> JobSource {
        test_source("himalayas", SourceType::Api, "Remote Specialists")
    }

    fn page_of(count: usize, offset: usize) -> String {
        let jobs: Vec<_> = (0..count)
            .map(|i| {
                json!({
                    "title": format!("Engineer {}", offset + i),
                    "companyName": "Orbit",
                    "applicationLink": format!("https://himalayas.app/jobs/{}", offset + i),
                    "categories": ["Software Engineering"],
                    "pubDate": 1717407000
                })
            })
            .collect();
        json!({ "jobs": jobs, "totalCount": 999 }).to_string()
    }

    async fn run(fetcher: &MockFetcher, keywords: &[String]) -> Vec<NormalizedJob> {
        let options = RequestOptions::new(Duration::from_secs(1));
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let limiter = RateLimiter::new(Duration::ZERO);
        let client = DirectClient::new(fetcher, &options, &policy, &limiter);
        fetch(&client, &source(), keywords, fetched_at()).await.unwrap()
    }

    #[test]
    fn page_url_carries_limit_and_offset() {
        assert_eq!(
            page_url("https://himalayas.app/jobs/api", 2).unwrap(),
            "https://himalayas.app/jobs/api?limit=20&offset=40"
        );
    }

    #[tokio::test]
    async fn stops_on_short_page() {
        let fetcher = MockFetcher::new()
            .route("offset=0", &page_of(20, 0))
            .route("offset=20", &page_of(7, 20));

        let jobs = run(&fetcher, &[]).await;

        assert_eq!(jobs.len(), 27);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn pagination_is_capped() {
        let fetcher = MockFetcher::new().route("himalayas.example.com", &page_of(20, 0));

        let jobs = run(&fetcher, &[]).await;

        assert_eq!(fetcher.calls().len(), MAX_PAGES);
        assert_eq!(jobs.len(), 20 * MAX_PAGES);
    }

    #[tokio::test]
    async fn filter_is_client_side_over_title_and_categories() {
        let fetcher = MockFetcher::new().route("himalayas.example.com", &page_of(3, 0));

        assert_eq!(run(&fetcher, &["software".into()]).await.len(), 3);
        assert_eq!(run(&fetcher, &["engineer 1".into()]).await.len(), 1);
        assert!(run(&fetcher, &["marketing".into()]).await.is_empty());
    }

    #[test]
    fn maps_fields() {
        let body = json!({ "jobs": [{
            "title": "Staff Engineer",
            "companyName": "Orbit",
            "locationRestrictions": ["Germany", "France"],
            "minSalary": 90000, "maxSalary": 120000, "currency": "EUR",
            "employmentType": "Contractor",
            "excerpt": "Short pitch",
            "guid": "https://himalayas.app/jobs/staff",
            "categories": ["Backend"]
        }]})
        .to_string();

        let (jobs, raw) = parse_page(&body, &source(), &[], fetched_at()).unwrap();

        assert_eq!(raw, 1);
        let job = &jobs[0];
        assert_eq!(job.location, "Germany, France");
        assert_eq!(job.salary.as_deref(), Some("90000 - 120000 EUR"));
        assert_eq!(job.job_type, "Contractor");
        assert_eq!(job.url, "https://himalayas.app/jobs/staff");
        assert_eq!(job.posted_at, fetched_at());
    }

    #[test]
    fn malformed_posting_does_not_sink_the_page() {
        let body = json!({ "jobs": [
            { "title": "Good One", "companyName": "Orbit", "categories": ["Backend"] },
            { "title": "Null Lists", "companyName": "Nebula", "categories": null,
              "locationRestrictions": null, "minSalary": 90000.5, "maxSalary": 120000 },
            { "title": ["not", "a", "string"] },
            "garbage"
        ]})
        .to_string();

        let (jobs, raw) = parse_page(&body, &source(), &[], fetched_at()).unwrap();

        assert_eq!(raw, 4);
        let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Good One", "Null Lists"]);
        assert!(jobs[1].tags.is_empty());
        assert_eq!(jobs[1].salary.as_deref(), Some("90000.5 - 120000 USD"));
    }
}
