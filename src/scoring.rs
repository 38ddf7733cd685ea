//! Relevance scoring shared by every source. A score of 0 means the record
//! is rejected and never stored.

use serde::Deserialize;

const HIGH_MATCH: &[&str] = &[
    "react", "angular", "fullstack", "full stack", "full-stack", "frontend", "front-end",
    "backend", "back-end", "software engineer", "sde", "sde-2", "sde-3", "sde2", "sde3",
];

const MEDIUM_MATCH: &[&str] = &[
    "python", "typescript", "javascript", "node", "java", "web developer", "mobile developer",
    "ios developer", "android developer",
];

const LOW_MATCH: &[&str] = &[
    "devops", "sre", "cloud engineer", "data engineer", "ml engineer", "platform engineer",
    "infrastructure engineer", "security engineer",
];

const INCLUDE_KEYWORDS: &[&str] = &[
    "software engineer", "software developer", "sde", "frontend", "front end", "front-end",
    "backend", "back end", "back-end", "fullstack", "full stack", "full-stack", "react",
    "angular", "node", "python", "java", "typescript", "javascript", "web developer",
    "application developer", "platform engineer", "systems engineer", "devops",
    "site reliability", "sre", "cloud engineer", "data engineer", "ml engineer",
    "machine learning engineer", "applied scientist", "research engineer", "ios developer",
    "android developer", "mobile developer", "engineering manager", "tech lead",
    "staff engineer", "principal engineer", "solutions engineer", "infrastructure engineer",
    "security engineer", "production engineer", "reliability engineer", "developer advocate",
    "solutions architect",
];

const EXCLUDE_KEYWORDS: &[&str] = &[
    "unpaid", "training fee", "commission only", "commission-only", "crypto", "whatsapp",
    "telegram", "forex", "mlm", "multi-level", "pyramid", "pay to work", "no experience needed",
    "hiring immediately", "urgently hiring", "work from phone", "senior director", "vp of",
    "vice president", "chief", "head of", "staff scientist", "principal researcher",
];

const REMOTE_TERMS: &[&str] = &["remote", "work from home", "wfh", "anywhere"];

const NOTABLE_EMPLOYERS: &[&str] = &[
    // FAANG
    "google", "alphabet", "meta", "facebook", "amazon", "apple", "netflix",
    // Big tech
    "microsoft", "nvidia", "uber", "linkedin", "pinterest", "snap", "snapchat", "twitter",
    "x corp", "salesforce", "adobe", "oracle", "intuit", "vmware", "servicenow", "snowflake",
    "crowdstrike", "zscaler", "palantir", "databricks", "stripe", "spotify", "dropbox",
    "airbnb", "doordash", "coinbase", "cloudflare", "datadog", "atlassian", "shopify",
    "robinhood", "discord", "figma", "notion", "openai", "lyft", "twilio", "square", "block",
    "plaid", "rippling",
    // Hardware
    "tesla", "amd", "qualcomm", "intel", "dell", "broadcom", "arm",
    // Enterprise and finance
    "ibm", "sap", "cisco", "visa", "mastercard", "paypal", "goldman sachs", "bloomberg",
    "morgan stanley", "jpmorgan",
    // Indian tech
    "flipkart", "swiggy", "zomato", "meesho", "razorpay", "cred", "phonepe", "paytm", "ola",
    "zerodha", "groww", "dream11", "freshworks", "zoho", "browserstack", "postman",
    "thoughtspot", "myntra", "bigbasket", "nykaa", "lenskart", "sharechat", "instamojo",
    // AI labs
    "anthropic", "deepmind", "cohere", "stability ai", "hugging face", "scale ai", "anyscale",
    "together ai", "mistral",
];

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Keyword tiers, bonuses and lists. Any field can be overridden from the
/// settings file; missing fields keep their defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub high_match: Vec<String>,
    pub medium_match: Vec<String>,
    pub low_match: Vec<String>,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub remote_terms: Vec<String>,
    pub notable_employers: Vec<String>,
    pub high_score: u32,
    pub medium_score: u32,
    pub low_score: u32,
    pub include_score: u32,
    pub remote_bonus: u32,
    pub notable_bonus: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            high_match: owned(HIGH_MATCH),
            medium_match: owned(MEDIUM_MATCH),
            low_match: owned(LOW_MATCH),
            include_keywords: owned(INCLUDE_KEYWORDS),
            exclude_keywords: owned(EXCLUDE_KEYWORDS),
            remote_terms: owned(REMOTE_TERMS),
            notable_employers: owned(NOTABLE_EMPLOYERS),
            high_score: 90,
            medium_score: 70,
            low_score: 50,
            include_score: 40,
            remote_bonus: 15,
            notable_bonus: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    config: ScoringConfig,
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl RelevanceScorer {
    pub fn new(config: ScoringConfig) -> Self {
        let lower = |v: Vec<String>| -> Vec<String> {
            v.into_iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        let config = ScoringConfig {
            high_match: lower(config.high_match),
            medium_match: lower(config.medium_match),
            low_match: lower(config.low_match),
            include_keywords: lower(config.include_keywords),
            exclude_keywords: lower(config.exclude_keywords),
            remote_terms: lower(config.remote_terms),
            notable_employers: lower(config.notable_employers),
            ..config
        };
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, title: &str, location: &str, company: &str, remote_hint: bool) -> u8 {
        let c = &self.config;
        let title = title.to_lowercase();

        if any_in(&title, &c.exclude_keywords) {
            return 0;
        }

        let tiers = [
            (&c.high_match, c.high_score),
            (&c.medium_match, c.medium_score),
            (&c.low_match, c.low_score),
        ];
        let base = tiers
            .iter()
            .find(|(terms, _)| any_in(&title, terms))
            .map(|(_, score)| *score);

        let mut score = match base {
            Some(s) => s,
            None if any_in(&title, &c.include_keywords) => c.include_score,
            None => return 0,
        };

        let combined = format!("{} {}", title, location.to_lowercase());
        if remote_hint || any_in(&combined, &c.remote_terms) {
            score = score.saturating_add(c.remote_bonus);
        }
        if self.is_notable_employer(company) {
            score = score.saturating_add(c.notable_bonus);
        }

        score.min(100) as u8
    }

    /// Substring match in either direction against the curated list.
    pub fn is_notable_employer(&self, company: &str) -> bool {
        let company = company.trim().to_lowercase();
        if company.is_empty() {
            return false;
        }
        self.config
            .notable_employers
            .iter()
            .any(|n| company.contains(n.as_str()) || n.contains(company.as_str()))
    }
}

fn any_in(haystack: &str, terms: &[String]) -> bool {
    terms.iter().any(|t| haystack.contains(t.as_str()))
}
