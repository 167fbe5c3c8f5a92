//! Built-in sources and ATS vendor selector tables.

use std::collections::HashMap;

use crate::config::DEFAULT_REMOTE_FIRST_CATEGORY;
use crate::models::{AtsSelectors, AtsVendor, JobSource, SourceType};

pub const CATEGORY_PROGRAMMING: &str = "Programming";
pub const CATEGORY_GENERAL: &str = "General";
pub const CATEGORY_COMPANIES: &str = "Companies";

/// The sources shipped with the binary. Ids are stable and never reused.
pub fn builtin_sources() -> Vec<JobSource> {
    vec![
        JobSource::new(
            "remoteok",
            "RemoteOK",
            "https://remoteok.com/api",
            SourceType::Api,
            DEFAULT_REMOTE_FIRST_CATEGORY,
        )
        .with_description("Remote jobs across tech, design and marketing"),
        JobSource::new(
            "himalayas",
            "Himalayas",
            "https://himalayas.app/jobs/api",
            SourceType::Api,
            DEFAULT_REMOTE_FIRST_CATEGORY,
        )
        .with_description("Remote-only job board with company profiles"),
        JobSource::new(
            "weworkremotely",
            "We Work Remotely",
            "https://weworkremotely.com/categories/remote-programming-jobs.rss",
            SourceType::Rss,
            DEFAULT_REMOTE_FIRST_CATEGORY,
        )
        .with_description("Programming category feed"),
        JobSource::new(
            "remotive",
            "Remotive",
            "https://remotive.com/api/remote-jobs",
            SourceType::Json,
            DEFAULT_REMOTE_FIRST_CATEGORY,
        )
        .with_description("Curated remote jobs"),
        JobSource::new(
            "jobicy",
            "Jobicy",
            "https://jobicy.com/?feed=job_feed",
            SourceType::Rss,
            DEFAULT_REMOTE_FIRST_CATEGORY,
        )
        .with_description("Remote jobs feed"),
        JobSource::new(
            "arbeitnow",
            "Arbeitnow",
            "https://www.arbeitnow.com/api/job-board-api",
            SourceType::Api,
            CATEGORY_GENERAL,
        )
        .with_description("European job board, remote postings only"),
        JobSource::new(
            "hackernews",
            "Hacker News Jobs",
            "https://news.ycombinator.com/jobs",
            SourceType::Api,
            CATEGORY_PROGRAMMING,
        )
        .with_description("YC startup hiring posts"),
        JobSource::new(
            "golangcafe",
            "Golang Cafe",
            "https://golang.cafe/rss",
            SourceType::Rss,
            CATEGORY_PROGRAMMING,
        )
        .with_description("Go developer jobs"),
        JobSource::new(
            "pythonorg",
            "Python.org Jobs",
            "https://www.python.org/jobs/feed/rss/",
            SourceType::Rss,
            CATEGORY_PROGRAMMING,
        )
        .with_description("Python Software Foundation job board"),
        JobSource::new(
            "rustjobs",
            "Rust Jobs",
            "https://rustjobs.dev/",
            SourceType::Html,
            CATEGORY_PROGRAMMING,
        )
        .with_description("Rust job listings page"),
        JobSource::new(
            "gitlab-greenhouse",
            "GitLab (Greenhouse)",
            "https://boards.greenhouse.io/gitlab",
            SourceType::Html,
            CATEGORY_COMPANIES,
        )
        .with_ats("greenhouse")
        .disabled(),
        JobSource::new(
            "netlify-lever",
            "Netlify (Lever)",
            "https://jobs.lever.co/netlify",
            SourceType::Html,
            CATEGORY_COMPANIES,
        )
        .with_ats("lever")
        .disabled(),
    ]
}

fn vendor(
    name: &str,
    job_container: &str,
    title: &str,
    location: &str,
    link: &str,
    department: Option<&str>,
) -> AtsVendor {
    AtsVendor {
        name: name.to_string(),
        selectors: AtsSelectors {
            job_container: job_container.to_string(),
            title: title.to_string(),
            location: location.to_string(),
            link: link.to_string(),
            department: department.map(str::to_string),
        },
    }
}

/// Selector tables keyed by the `ats` value carried on a source.
pub fn default_ats_vendors() -> HashMap<String, AtsVendor> {
    [
        (
            "greenhouse",
            vendor("Greenhouse", "div.opening", "a", "span.location", "a", None),
        ),
        (
            "lever",
            vendor(
                "Lever",
                "div.posting",
                r#"h5[data-qa="posting-name"], h5"#,
                ".sort-by-location",
                "a.posting-title",
                Some(".sort-by-team"),
            ),
        ),
        (
            "breezy",
            vendor(
                "Breezy HR",
                "li.position",
                "h2",
                ".location",
                "a",
                Some(".department"),
            ),
        ),
        (
            "workable",
            vendor(
                "Workable",
                r#"li[data-ui="job"]"#,
                r#"[data-ui="job-title"]"#,
                r#"[data-ui="job-location"]"#,
                "a",
                Some(r#"[data-ui="job-department"]"#),
            ),
        ),
    ]
    .into_iter()
    .map(|(key, vendor)| (key.to_string(), vendor))
    .collect()
}
