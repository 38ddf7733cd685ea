use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{
    company_from_slug, polite_delay, strip_html, truncate_chars, FetchError, HttpClient,
    RawRecord, RequestTally, Source,
};
use crate::models::{JobDraft, SalaryHint, SourceCategory};

const API_BASE: &str = "https://api.ashbyhq.com/posting-api/job-board";

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<AshbyJob>,
}

/// Ashby boards disagree on the shape of several fields, so those stay as
/// raw JSON and are read leniently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AshbyJob {
    pub id: String,
    pub title: String,
    pub organization_name: Option<String>,
    pub location: Value,
    pub is_remote: Value,
    pub job_url: Option<String>,
    pub external_link: Option<String>,
    pub published_at: Option<String>,
    pub updated_at: Option<String>,
    pub description_plain: Option<String>,
    pub description_html: Option<String>,
    pub compensation: Value,
    pub compensation_tier_summary: Value,
}

pub struct AshbySource {
    boards: Vec<String>,
    delay: (f64, f64),
}

impl AshbySource {
    pub fn new(boards: Vec<String>, delay: (f64, f64)) -> Self {
        Self { boards, delay }
    }
}

impl Source for AshbySource {
    fn name(&self) -> &'static str {
        "ashby"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::Ats
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let query = [("includeCompensation", "true".to_string())];
        let mut records = Vec::new();
        let mut tally = RequestTally::default();
        for (i, board) in self.boards.iter().enumerate() {
            let url = format!("{API_BASE}/{board}");
            match http.get_json::<BoardResponse>(&url, &query, &[]) {
                Ok(resp) => {
                    tally.ok();
                    info!(
                        board = %board,
                        postings = resp.jobs.len(),
                        "ashby board {}/{}",
                        i + 1,
                        self.boards.len()
                    );
                    records.extend(resp.jobs.into_iter().map(|job| RawRecord::Ashby {
                        board: board.clone(),
                        job,
                    }));
                }
                Err(e) => {
                    warn!(board = %board, error = %e, "ashby board failed");
                    tally.failed(e);
                }
            }
            polite_delay(self.delay);
        }
        tally.finish(records)
    }
}

pub fn to_draft(board: &str, job: AshbyJob) -> Option<JobDraft> {
    let title = strip_html(&job.title);
    if title.is_empty() {
        return None;
    }
    let apply_url = [job.job_url.as_deref(), job.external_link.as_deref()]
        .into_iter()
        .flatten()
        .find(|u| !u.trim().is_empty())
        .map(str::to_string)
        .or_else(|| (!job.id.is_empty()).then(|| format!("https://jobs.ashbyhq.com/{board}/{}", job.id)))?;

    let company = job
        .organization_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| company_from_slug(board));
    let location = match &job.location {
        Value::String(s) => s.clone(),
        Value::Object(map) => map.get("name").and_then(Value::as_str).unwrap_or("").to_string(),
        _ => String::new(),
    };
    let remote_hint = match &job.is_remote {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes"),
        _ => false,
    };

    let description = job
        .description_plain
        .clone()
        .filter(|d| !d.trim().is_empty())
        .or_else(|| job.description_html.as_deref().map(strip_html))
        .unwrap_or_default();

    let mut draft = JobDraft::new("ashby", SourceCategory::Ats);
    draft.salary = salary_hints(&job);
    draft.company = company;
    draft.apply_url = apply_url;
    draft.posted = job.published_at.or(job.updated_at);
    draft.remote_hint = remote_hint;
    draft.perks_text = format!("{} {}", truncate_chars(&description, 1000), location);
    draft.location = location;
    draft.title = title;
    Some(draft)
}

/// Structured compensation first, then any summary text.
fn salary_hints(job: &AshbyJob) -> Vec<SalaryHint> {
    let mut hints = Vec::new();

    if let Value::Object(comp) = &job.compensation {
        let salary_component = comp
            .get("summaryComponents")
            .and_then(Value::as_array)
            .and_then(|parts| {
                parts.iter().find(|p| {
                    p.get("compensationType").and_then(Value::as_str) == Some("Salary")
                })
            });
        if let Some(part) = salary_component {
            hints.push(SalaryHint::Amounts {
                min: part.get("minValue").and_then(Value::as_f64),
                max: part.get("maxValue").and_then(Value::as_f64),
                currency: part.get("currencyCode").and_then(Value::as_str).map(str::to_string),
                period: part.get("interval").and_then(Value::as_str).map(str::to_string),
            });
        }

        let first_number = |keys: &[&str]| keys.iter().find_map(|k| comp.get(*k).and_then(Value::as_f64));
        let min = first_number(&["min", "salaryMin"]);
        let max = first_number(&["max", "salaryMax"]);
        if min.is_some() || max.is_some() {
            hints.push(SalaryHint::Amounts {
                min,
                max,
                currency: comp.get("currency").and_then(Value::as_str).map(str::to_string),
                period: comp.get("period").and_then(Value::as_str).map(str::to_string),
            });
        }

        if let Some(summary) = comp.get("compensationTierSummary").and_then(Value::as_str) {
            hints.push(SalaryHint::Text(summary.to_string()));
        }
    }
    if let Value::String(s) = &job.compensation {
        hints.push(SalaryHint::Text(s.clone()));
    }
    if let Value::String(s) = &job.compensation_tier_summary {
        hints.push(SalaryHint::Text(s.clone()));
    }
    hints
}
