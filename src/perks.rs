use serde::Serialize;

const VISA_TERMS: &[&str] = &[
    "visa sponsor",
    "h1b",
    "h-1b",
    "h1-b",
    "work permit",
    "sponsorship available",
    "immigration support",
    "relocation support",
    "work visa",
    "tier 2",
    "skilled worker visa",
    "visa sponsorship",
    "sponsor visa",
    "work authorization",
    "employment visa",
    "relocation assistance",
    "relocation package",
];

const EQUITY_TERMS: &[&str] = &[
    "equity",
    "stock option",
    "stock grant",
    "rsu",
    "esop",
    "espp",
    "shares",
    "vesting",
    "stock plan",
    "ownership stake",
    "stock compensation",
    "restricted stock",
    "phantom stock",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Perks {
    pub visa_sponsored: bool,
    pub has_equity: bool,
}

#[derive(Debug, Clone)]
pub struct PerkTerms {
    pub visa: Vec<String>,
    pub equity: Vec<String>,
}

impl Default for PerkTerms {
    fn default() -> Self {
        Self {
            visa: VISA_TERMS.iter().map(|s| s.to_string()).collect(),
            equity: EQUITY_TERMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PerksDetector {
    terms: PerkTerms,
}

impl PerksDetector {
    pub fn new(terms: PerkTerms) -> Self {
        Self { terms }
    }

    pub fn detect(&self, text: &str) -> Perks {
        if text.trim().is_empty() {
            return Perks::default();
        }
        let lower = text.to_lowercase();
        Perks {
            visa_sponsored: self.terms.visa.iter().any(|t| lower.contains(t.as_str())),
            has_equity: self.terms.equity.iter().any(|t| lower.contains(t.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_visa_and_equity_independently() {
        let d = PerksDetector::default();
        let p = d.detect("We offer H-1B visa sponsorship and relocation assistance");
        assert!(p.visa_sponsored);
        assert!(!p.has_equity);

        let p = d.detect("Competitive salary plus RSUs with 4-year vesting");
        assert!(!p.visa_sponsored);
        assert!(p.has_equity);
    }

    #[test]
    fn test_case_insensitive() {
        let p = PerksDetector::default().detect("EQUITY PACKAGE, WORK PERMIT PROVIDED");
        assert!(p.visa_sponsored);
        assert!(p.has_equity);
    }

    #[test]
    fn test_empty_text_is_no_perks() {
        assert_eq!(PerksDetector::default().detect(""), Perks::default());
        assert_eq!(PerksDetector::default().detect("   "), Perks::default());
    }

    #[test]
    fn test_custom_terms() {
        let d = PerksDetector::new(PerkTerms {
            visa: vec!["blue card".to_string()],
            equity: vec![],
        });
        let p = d.detect("EU Blue Card support, equity");
        assert!(p.visa_sponsored);
        assert!(!p.has_equity);
    }
}
