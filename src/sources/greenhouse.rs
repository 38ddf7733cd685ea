use serde::Deserialize;
use tracing::{info, warn};

use super::{
    company_from_slug, polite_delay, strip_html, FetchError, HttpClient, RawRecord, RequestTally,
    Source,
};
use crate::models::{JobDraft, SalaryHint, SourceCategory};

const API_BASE: &str = "https://boards-api.greenhouse.io/v1/boards";

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<GreenhouseJob>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GreenhouseJob {
    pub id: Option<u64>,
    pub title: String,
    pub absolute_url: Option<String>,
    pub updated_at: Option<String>,
    pub location: Option<GreenhouseLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GreenhouseLocation {
    pub name: String,
}

pub struct GreenhouseSource {
    boards: Vec<String>,
    delay: (f64, f64),
}

impl GreenhouseSource {
    pub fn new(boards: Vec<String>, delay: (f64, f64)) -> Self {
        Self { boards, delay }
    }
}

impl Source for GreenhouseSource {
    fn name(&self) -> &'static str {
        "greenhouse"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::Ats
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let mut records = Vec::new();
        let mut tally = RequestTally::default();
        for (i, board) in self.boards.iter().enumerate() {
            let url = format!("{API_BASE}/{board}/jobs");
            match http.get_json::<BoardResponse>(&url, &[], &[]) {
                Ok(resp) => {
                    tally.ok();
                    info!(
                        board = %board,
                        postings = resp.jobs.len(),
                        "greenhouse board {}/{}",
                        i + 1,
                        self.boards.len()
                    );
                    records.extend(resp.jobs.into_iter().map(|job| RawRecord::Greenhouse {
                        board: board.clone(),
                        job,
                    }));
                }
                Err(e) => {
                    warn!(board = %board, error = %e, "greenhouse board failed");
                    tally.failed(e);
                }
            }
            polite_delay(self.delay);
        }
        tally.finish(records)
    }
}

pub fn to_draft(board: &str, job: GreenhouseJob) -> Option<JobDraft> {
    let title = strip_html(&job.title);
    if title.is_empty() {
        return None;
    }
    let apply_url = job
        .absolute_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| job.id.map(|id| format!("https://boards.greenhouse.io/{board}/jobs/{id}")))?;
    let location = job.location.map(|l| l.name).unwrap_or_default();

    let mut draft = JobDraft::new("greenhouse", SourceCategory::Ats);
    draft.company = company_from_slug(board);
    draft.apply_url = apply_url;
    draft.posted = job.updated_at;
    draft.salary = vec![SalaryHint::Text(format!("{location} {title}"))];
    draft.perks_text = location.clone();
    draft.location = location;
    draft.title = title;
    Some(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_response_maps_to_draft() {
        let body = r#"{"jobs": [{
            "id": 4012,
            "title": "Senior Software Engineer, Payments",
            "absolute_url": "https://boards.greenhouse.io/stripe/jobs/4012",
            "updated_at": "2026-02-20T09:15:00-05:00",
            "location": {"name": "Bengaluru, India"},
            "metadata": null
        }]}"#;
        let resp: BoardResponse = serde_json::from_str(body).unwrap();
        let draft = to_draft("stripe", resp.jobs[0].clone()).unwrap();

        assert_eq!(draft.title, "Senior Software Engineer, Payments");
        assert_eq!(draft.company, "Stripe");
        assert_eq!(draft.location, "Bengaluru, India");
        assert_eq!(draft.apply_url, "https://boards.greenhouse.io/stripe/jobs/4012");
        assert_eq!(draft.posted.as_deref(), Some("2026-02-20T09:15:00-05:00"));
        assert_eq!(draft.category, SourceCategory::Ats);
    }

    #[test]
    fn test_missing_url_falls_back_to_board_link() {
        let job = GreenhouseJob {
            id: Some(7),
            title: "Backend Engineer".into(),
            ..Default::default()
        };
        let draft = to_draft("dbt-labs", job).unwrap();
        assert_eq!(draft.apply_url, "https://boards.greenhouse.io/dbt-labs/jobs/7");
        assert_eq!(draft.company, "Dbt Labs");
        assert_eq!(draft.location, "");
    }

    #[test]
    fn test_untitled_or_unlinked_jobs_are_dropped() {
        assert!(to_draft("x", GreenhouseJob { id: Some(1), ..Default::default() }).is_none());
        let job = GreenhouseJob {
            title: "SDE".into(),
            ..Default::default()
        };
        assert!(to_draft("x", job).is_none());
    }
}
