use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::{strip_html, truncate_chars, FetchError, HttpClient, RawRecord, Source};
use crate::models::{JobDraft, SalaryHint, SourceCategory};

const API_URL: &str = "https://remoteok.com/api";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteOkJob {
    pub position: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub slug: Option<String>,
    /// Annual USD; the feed sends numbers, numeric strings or "".
    pub salary_min: Value,
    pub salary_max: Value,
    pub date: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Default)]
pub struct RemoteOkSource;

impl RemoteOkSource {
    pub fn new() -> Self {
        Self
    }
}

impl Source for RemoteOkSource {
    fn name(&self) -> &'static str {
        "remoteok"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::ApiAggregator
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let items: Vec<Value> = http.get_json(API_URL, &[], &[])?;
        Ok(parse_feed(items))
    }
}

/// The first element of the feed is a legal notice, not a job.
fn parse_feed(items: Vec<Value>) -> Vec<RawRecord> {
    let total = items.len().saturating_sub(1);
    let records: Vec<RawRecord> = items
        .into_iter()
        .skip(1)
        .filter_map(|item| match serde_json::from_value::<RemoteOkJob>(item) {
            Ok(job) => Some(RawRecord::RemoteOk(job)),
            Err(e) => {
                debug!(error = %e, "skipping malformed remoteok item");
                None
            }
        })
        .collect();
    info!(listings = total, parsed = records.len(), "remoteok feed");
    records
}

fn positive_amount(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (n > 0.0).then_some(n)
}

pub fn to_draft(job: RemoteOkJob) -> Option<JobDraft> {
    let title = strip_html(&job.position);
    if title.is_empty() {
        return None;
    }
    let apply_url = job
        .url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| {
            job.slug
                .filter(|s| !s.trim().is_empty())
                .map(|s| format!("https://remoteok.com/remote-jobs/{s}"))
        })?;

    let description = job.description.as_deref().map(strip_html).unwrap_or_default();
    let location = job
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "Remote".to_string());

    let mut draft = JobDraft::new("remoteok", SourceCategory::ApiAggregator);
    draft.salary = vec![
        SalaryHint::Amounts {
            min: positive_amount(&job.salary_min),
            max: positive_amount(&job.salary_max),
            currency: Some("USD".to_string()),
            period: Some("year".to_string()),
        },
        SalaryHint::Text(format!("{title} {}", truncate_chars(&description, 500))),
    ];
    draft.company = strip_html(job.company.as_deref().unwrap_or(""));
    draft.apply_url = apply_url;
    draft.posted = job.date;
    draft.remote_hint = true;
    let tags = job.tags.unwrap_or_default().join(", ");
    draft.perks_text = format!("{} {}", truncate_chars(&description, 1000), tags);
    draft.location = location;
    draft.title = title;
    Some(draft)
}
