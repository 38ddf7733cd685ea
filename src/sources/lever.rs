use serde::Deserialize;
use tracing::{info, warn};

use super::{
    company_from_slug, polite_delay, strip_html, truncate_chars, FetchError, HttpClient,
    RawRecord, RequestTally, Source,
};
use crate::dates::from_epoch_millis;
use crate::models::{JobDraft, SalaryHint, SourceCategory};

const API_BASE: &str = "https://api.lever.co/v0/postings";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeverPosting {
    pub id: String,
    pub text: String,
    pub hosted_url: Option<String>,
    pub created_at: Option<i64>,
    pub categories: Option<LeverCategories>,
    pub description_plain: Option<String>,
    pub workplace_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeverCategories {
    pub location: Option<String>,
    pub commitment: Option<String>,
    pub team: Option<String>,
}

pub struct LeverSource {
    boards: Vec<String>,
    delay: (f64, f64),
}

impl LeverSource {
    pub fn new(boards: Vec<String>, delay: (f64, f64)) -> Self {
        Self { boards, delay }
    }
}

impl Source for LeverSource {
    fn name(&self) -> &'static str {
        "lever"
    }

    fn category(&self) -> SourceCategory {
        SourceCategory::Ats
    }

    fn fetch(&self, http: &HttpClient) -> Result<Vec<RawRecord>, FetchError> {
        let mut records = Vec::new();
        let mut tally = RequestTally::default();
        for (i, board) in self.boards.iter().enumerate() {
            let url = format!("{API_BASE}/{board}");
            match http.get_json::<Vec<LeverPosting>>(&url, &[("mode", "json".to_string())], &[]) {
                Ok(postings) => {
                    tally.ok();
                    info!(
                        board = %board,
                        postings = postings.len(),
                        "lever board {}/{}",
                        i + 1,
                        self.boards.len()
                    );
                    records.extend(postings.into_iter().map(|posting| RawRecord::Lever {
                        board: board.clone(),
                        posting,
                    }));
                }
                Err(e) => {
                    warn!(board = %board, error = %e, "lever board failed");
                    tally.failed(e);
                }
            }
            polite_delay(self.delay);
        }
        tally.finish(records)
    }
}

pub fn to_draft(board: &str, posting: LeverPosting) -> Option<JobDraft> {
    let title = strip_html(&posting.text);
    if title.is_empty() {
        return None;
    }
    let apply_url = posting
        .hosted_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| {
            (!posting.id.is_empty()).then(|| format!("https://jobs.lever.co/{board}/{}", posting.id))
        })?;
    let location = posting
        .categories
        .and_then(|c| c.location)
        .unwrap_or_default();
    let remote_hint = posting
        .workplace_type
        .as_deref()
        .is_some_and(|w| w.eq_ignore_ascii_case("remote"));
    let description = posting.description_plain.unwrap_or_default();

    let mut draft = JobDraft::new("lever", SourceCategory::Ats);
    draft.company = company_from_slug(board);
    draft.apply_url = apply_url;
    draft.posted = posting.created_at.and_then(from_epoch_millis);
    draft.remote_hint = remote_hint;
    draft.salary = vec![SalaryHint::Text(format!("{location} {title}"))];
    draft.perks_text = format!("{} {}", location, truncate_chars(&description, 1000));
    draft.location = location;
    draft.title = title;
    Some(draft)
}
