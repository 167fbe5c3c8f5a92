//! Applicant-tracking-system career pages, driven by per-vendor selectors.

use chrono::{DateTime, Utc};
use scraper::{Html, Selector};

use crate::error::AppError;
use crate::extract::{first_href, first_text, page_company};
use crate::models::{AtsVendor, JobSource, NormalizedJob};
use crate::text::{matches_keywords, resolve_url};

struct CompiledSelectors {
    job_container: Selector,
    title: Selector,
    location: Selector,
    link: Selector,
    department: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(vendor: &AtsVendor) -> Result<Self, AppError> {
        let s = &vendor.selectors;
        Ok(Self {
            job_container: compile(&vendor.name, "jobContainer", &s.job_container)?,
            title: compile(&vendor.name, "title", &s.title)?,
            location: compile(&vendor.name, "location", &s.location)?,
            link: compile(&vendor.name, "link", &s.link)?,
            department: s
                .department
                .as_deref()
                .map(|css| compile(&vendor.name, "department", css))
                .transpose()?,
        })
    }
}

fn compile(vendor: &str, field: &str, css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| {
        AppError::ConfigError(format!("{vendor} selector '{field}' ({css}) is invalid: {e:?}"))
    })
}

/// Scrape an ATS-hosted careers page using `vendor`'s selectors.
///
/// Keywords are matched against title, location and department. The
/// department, when the vendor exposes one, becomes a tag.
pub fn parse_ats(
    body: &str,
    source: &JobSource,
    vendor: &AtsVendor,
    keywords: &[String],
    fetched_at: DateTime<Utc>,
) -> Result<Vec<NormalizedJob>, AppError> {
    let selectors = CompiledSelectors::compile(vendor)?;
    let document = Html::parse_document(body);
    let company = page_company(source);

    let mut jobs = Vec::new();
    for container in document.select(&selectors.job_container) {
        let Some(title) = first_text(container, &selectors.title) else {
            continue;
        };
        let location = first_text(container, &selectors.location);
        let department = selectors
            .department
            .as_ref()
            .and_then(|sel| first_text(container, sel));

        let surfaces = [
            title.as_str(),
            location.as_deref().unwrap_or_default(),
            department.as_deref().unwrap_or_default(),
        ];
        if !matches_keywords(keywords, &surfaces) {
            continue;
        }

        let url = first_href(container, &selectors.link)
            .map(|href| resolve_url(&source.url, href))
            .unwrap_or_else(|| source.url.clone());

        let mut job = NormalizedJob::new(source, title, company.clone(), url, fetched_at);
        if let Some(location) = location {
            job.location = location;
        }
        job.tags = department.into_iter().collect();
        jobs.push(job);
    }

    tracing::debug!(source_id = %source.id, vendor = %vendor.name, jobs = jobs.len(), "Parsed ATS page");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_ats_vendors;
    use crate::models::{AtsSelectors, SourceType};
    use crate::testutil::{fetched_at, test_source};

    const LEVER_PAGE: &str = r#"<html><body>
<div class="postings-group">
  <div class="posting">
    <a class="posting-title" href="https://jobs.lever.co/acme/abc">
      <h5 data-qa="posting-name">Senior Backend Engineer</h5>
      <div class="posting-categories">
        <span class="sort-by-location posting-category">Remote - EU</span>
        <span class="sort-by-team posting-category">Engineering</span>
      </div>
    </a>
  </div>
  <div class="posting">
    <a class="posting-title" href="/acme/def">
      <h5 data-qa="posting-name">Account Executive</h5>
      <div class="posting-categories">
        <span class="sort-by-location posting-category">New York</span>
        <span class="sort-by-team posting-category">Sales</span>
      </div>
    </a>
  </div>
</div>
</body></html>"#;

    fn lever() -> AtsVendor {
        default_ats_vendors()
            .remove("lever")
            .expect("lever vendor is built in")
    }

    fn source() -> JobSource {
        let mut source = test_source("acme-lever", SourceType::Html, "Companies").with_ats("lever");
        source.name = "Acme (Lever)".into();
        source.url = "https://jobs.lever.co/acme".into();
        source
    }

    #[test]
    fn vendor_selectors_drive_extraction() {
        let jobs = parse_ats(LEVER_PAGE, &source(), &lever(), &[], fetched_at()).unwrap();
        assert_eq!(jobs.len(), 2);

        assert_eq!(jobs[0].title, "Senior Backend Engineer");
        assert_eq!(jobs[0].company, "Acme");
        assert_eq!(jobs[0].location, "Remote - EU");
        assert_eq!(jobs[0].tags, vec!["Engineering"]);
        assert_eq!(jobs[0].url, "https://jobs.lever.co/acme/abc");

        assert_eq!(jobs[1].url, "https://jobs.lever.co/acme/def");
    }

    #[test]
    fn keywords_match_location_and_department() {
        let by_dept = parse_ats(LEVER_PAGE, &source(), &lever(), &["sales".into()], fetched_at())
            .unwrap();
        assert_eq!(by_dept.len(), 1);
        assert_eq!(by_dept[0].title, "Account Executive");

        let by_location =
            parse_ats(LEVER_PAGE, &source(), &lever(), &["remote".into()], fetched_at()).unwrap();
        assert_eq!(by_location.len(), 1);
        assert_eq!(by_location[0].title, "Senior Backend Engineer");
    }

    #[test]
    fn explicit_company_overrides_source_name() {
        let source = source().with_company_name("Acme Robotics");
        let jobs = parse_ats(LEVER_PAGE, &source, &lever(), &[], fetched_at()).unwrap();
        assert_eq!(jobs[0].company, "Acme Robotics");
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let vendor = AtsVendor {
            name: "Broken".into(),
            selectors: AtsSelectors {
                job_container: "div[".into(),
                title: "h5".into(),
                location: ".loc".into(),
                link: "a".into(),
                department: None,
            },
        };
        let err = parse_ats(LEVER_PAGE, &source(), &vendor, &[], fetched_at()).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
