use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use super::{
    polite_delay, strip_html, truncate_chars, FetchError, HttpClient, RawRecord, RequestTally,
    Source,
};
use crate::models::{GeoHint, JobDraft, SalaryHint, SourceCategory};

const API_URL: &str = "https://jsearch.p.rapidapi.com/search";
const API_HOST: &str = "jsearch.p.rapidapi.com";

struct Query {
    text: &'static str,
    country: &'static str,
    date_posted: &'static str,
    remote_only: bool,
}

const fn q(text: &'static str, country: &'static str, date_posted: &'static str) -> Query {
    Query {
        text,
        country,
        date_posted,
        remote_only: false,
    }
}

const fn remote(text: &'static str, country: &'static str) -> Query {
    Query {
        text,
        country,
        date_posted: "week",
        remote_only: true,
    }
}

const QUERIES: &[Query] = &[
    q("software engineer in india", "in", "week"),
    q("react developer india", "in", "week"),
    q("frontend developer bangalore", "in", "week"),
    q("backend developer hyderabad OR pune", "in", "week"),
    q("fullstack developer india remote", "in", "week"),
    q("software engineer", "us", "week"),
    remote("react developer remote", "us"),
    q("frontend developer", "us", "week"),
    q("backend engineer python OR java", "us", "week"),
    q("fullstack engineer", "us", "week"),
    q("software engineer london", "gb", "month"),
    q("react developer uk", "gb", "month"),
    remote("remote software engineer", "us"),
    q("software engineer google OR amazon OR meta OR microsoft OR apple", "us", "month"),
    q("software development engineer flipkart OR swiggy OR razorpay OR meesho", "in", "month"),
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    data: Vec<JSearchJob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JSearchJob {
    pub job_title: Option<String>,
    pub employer_name: Option<String>,
    pub job_apply_link: Option<String>,
    pub job_location: Option<String>,
    pub job_city: Option<String>,
    pub job_state: Option<String>,
    pub job_country: Option<String>,
    pub job_is_remote: Option<bool>,
    pub job_min_salary: Option<f64>,
    pub job_max_salary: Option<f64>,
    pub job_salary_currency: Option<String>,
    pub job_salary_period: Option<String>,
    pub job_posted_at_datetime_utc: Option<String>,
    pub job_description: Option<String>,
    pub job_highlights: HashMap<String, Vec<String>>,
}

pub struct JSearchSource {
    api_key: Option<String>,
    delay: (f64, f64),
}

impl JSearchSource {
    pub fn new(api_key: Option<String>, delay: (f64, f64)) -> Self {
        Self { api_key, delay }
    }
}

impl Source for JSearchSource {
    fn name(&self) -> &'static str {
        "jsearch"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::ApiAggregator
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let Some(api_key) = &self.api_key else {
            return Err(FetchError::MissingCredentials("JSEARCH_API_KEY"));
        };
        let headers = [("x-rapidapi-host", API_HOST), ("x-rapidapi-key", api_key.as_str())];

        let mut records = Vec::new();
        let mut tally = RequestTally::default();
        for (i, query) in QUERIES.iter().enumerate() {
            let mut params = vec![
                ("query", query.text.to_string()),
                ("page", "1".to_string()),
                ("num_pages", "1".to_string()),
                ("country", query.country.to_string()),
                ("date_posted", query.date_posted.to_string()),
            ];
            if query.remote_only {
                params.push(("remote_jobs_only", "true".to_string()));
            }

            match http.get_json::<SearchResponse>(API_URL, &params, &headers) {
                Ok(resp) if resp.status != "OK" => {
                    let e = FetchError::Api(resp.status);
                    warn!(query = query.text, error = %e, "jsearch query rejected");
                    tally.failed(e);
                }
                Ok(resp) => {
                    tally.ok();
                    info!(
                        query = query.text,
                        results = resp.data.len(),
                        "jsearch query {}/{}",
                        i + 1,
                        QUERIES.len()
                    );
                    records.extend(resp.data.into_iter().map(RawRecord::JSearch));
                }
                Err(e) => {
                    warn!(query = query.text, error = %e, "jsearch query failed");
                    tally.failed(e);
                }
            }
            polite_delay(self.delay);
        }
        tally.finish(records)
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn to_draft(job: JSearchJob) -> Option<JobDraft> {
    let title = strip_html(job.job_title.as_deref().unwrap_or(""));
    let apply_url = non_empty(job.job_apply_link)?;
    if title.is_empty() {
        return None;
    }

    let geo = GeoHint {
        city: non_empty(job.job_city),
        state: non_empty(job.job_state),
        country: non_empty(job.job_country).map(|c| c.to_uppercase()),
    };
    let location = non_empty(job.job_location).unwrap_or_else(|| {
        [&geo.city, &geo.state, &geo.country]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    });

    let benefits = job.job_highlights.get("Benefits").cloned().unwrap_or_default();
    let mut salary = vec![SalaryHint::Amounts {
        min: job.job_min_salary,
        max: job.job_max_salary,
        currency: job.job_salary_currency,
        period: job.job_salary_period,
    }];
    salary.extend(
        benefits
            .iter()
            .filter(|b| {
                let lower = b.to_lowercase();
                b.contains('$') || lower.contains("salary") || lower.contains("lpa")
            })
            .map(|b| SalaryHint::Text(b.clone())),
    );

    let description = job.job_description.unwrap_or_default();

    let mut draft = JobDraft::new("jsearch", SourceCategory::ApiAggregator);
    draft.company = job.employer_name.unwrap_or_default().trim().to_string();
    draft.apply_url = apply_url;
    draft.posted = job.job_posted_at_datetime_utc;
    draft.remote_hint = job.job_is_remote.unwrap_or(false);
    draft.geo = geo;
    draft.salary = salary;
    draft.perks_text = format!("{} {}", truncate_chars(&description, 500), benefits.join(" "));
    draft.location = location;
    draft.title = title;
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_maps_to_draft() {
        let body = r#"{"status": "OK", "data": [{
            "job_title": "Senior Frontend Engineer",
            "employer_name": "Swiggy",
            "job_apply_link": "https://careers.swiggy.com/123",
            "job_city": "Bengaluru",
            "job_state": "Karnataka",
            "job_country": "in",
            "job_is_remote": false,
            "job_min_salary": null,
            "job_max_salary": null,
            "job_posted_at_datetime_utc": "2026-03-02T10:00:00.000Z",
            "job_description": "Join us.",
            "job_highlights": {
                "Qualifications": ["React"],
                "Benefits": ["Salary: 30 - 45 LPA", "Health insurance", "Stock options"]
            }
        }]}"#;
        let resp: SearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.status, "OK");
        let draft = to_draft(resp.data[0].clone()).unwrap();

        assert_eq!(draft.location, "Bengaluru, Karnataka, IN");
        assert_eq!(draft.geo.city.as_deref(), Some("Bengaluru"));
        assert_eq!(draft.geo.country.as_deref(), Some("IN"));
        assert!(!draft.remote_hint);
        assert_eq!(draft.salary.len(), 2);
        assert!(matches!(&draft.salary[1], SalaryHint::Text(t) if t.contains("LPA")));
        assert!(draft.perks_text.contains("Stock options"));
    }

    #[test]
    fn test_native_salary_and_remote() {
        let job = JSearchJob {
            job_title: Some("Backend Engineer".into()),
            employer_name: Some(" Stripe ".into()),
            job_apply_link: Some("https://stripe.com/jobs/1".into()),
            job_location: Some("Remote, US".into()),
            job_is_remote: Some(true),
            job_min_salary: Some(60.0),
            job_max_salary: Some(80.0),
            job_salary_currency: Some("USD".into()),
            job_salary_period: Some("HOUR".into()),
            ..Default::default()
        };
        let draft = to_draft(job).unwrap();
        assert_eq!(draft.company, "Stripe");
        assert_eq!(draft.location, "Remote, US");
        assert!(draft.remote_hint);
        match &draft.salary[0] {
            SalaryHint::Amounts { period, .. } => assert_eq!(period.as_deref(), Some("HOUR")),
            other => panic!("unexpected hint {other:?}"),
        }
    }

    #[test]
    fn test_missing_apply_link_is_dropped() {
        let job = JSearchJob {
            job_title: Some("SDE".into()),
            job_apply_link: Some("  ".into()),
            ..Default::default()
        };
        assert!(to_draft(job).is_none());
    }
}
