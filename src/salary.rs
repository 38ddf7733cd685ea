//! Salary text and structured compensation to lakhs per annum (LPA).

use std::collections::BTreeMap;

use anyhow::Result;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const LAKH: f64 = 100_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Salary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
}

impl Salary {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    fn range(min: f64, max: f64, currency: &str) -> Self {
        let (min, max) = if min > max { (max, min) } else { (min, max) };
        Self {
            min: Some(round2(min)),
            max: Some(round2(max)),
            currency: Some(currency.to_string()),
        }
    }

    fn single(value: f64, currency: &str) -> Self {
        Self::range(value, value, currency)
    }
}

/// Units of local currency (INR) per unit of each foreign currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExchangeRates(BTreeMap<String, f64>);

impl Default for ExchangeRates {
    fn default() -> Self {
        let rates = [
            ("INR", 1.0),
            ("USD", 83.5),
            ("EUR", 91.0),
            ("GBP", 106.0),
            ("CAD", 62.0),
            ("AUD", 54.5),
            ("SGD", 63.0),
        ];
        Self(rates.iter().map(|(c, r)| (c.to_string(), *r)).collect())
    }
}

impl ExchangeRates {
    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.0.get(&currency.to_ascii_uppercase()).copied()
    }

    /// Overlay `other` on top of these rates.
    pub fn merged(mut self, other: &ExchangeRates) -> Self {
        for (code, rate) in &other.0 {
            self.0.insert(code.to_ascii_uppercase(), *rate);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Period {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Annual,
}

impl Period {
    pub fn multiplier(self) -> f64 {
        match self {
            Period::Hourly => 2080.0, // 40h x 52w
            Period::Daily => 260.0,   // 5d x 52w
            Period::Weekly => 52.0,
            Period::Monthly => 12.0,
            Period::Annual => 1.0,
        }
    }

    /// Parse a source's period label ("MONTH", "hourly", "per year", ...).
    pub fn from_label(label: &str) -> Self {
        let l = label.to_lowercase();
        if l.contains("hour") {
            Period::Hourly
        } else if l.contains("day") || l.contains("daily") {
            Period::Daily
        } else if l.contains("week") {
            Period::Weekly
        } else if l.contains("month") {
            Period::Monthly
        } else {
            Period::Annual
        }
    }
}

/// The currency a country's postings are usually quoted in.
pub fn currency_for_country(code: &str) -> Option<&'static str> {
    match code {
        "IN" => Some("INR"),
        "US" => Some("USD"),
        "GB" => Some("GBP"),
        "CA" => Some("CAD"),
        "AU" => Some("AUD"),
        "SG" => Some("SGD"),
        "DE" | "FR" | "NL" | "IE" | "ES" | "IT" | "PT" => Some("EUR"),
        _ => None,
    }
}

const NUM: &str = r"([\d,]+(?:\.\d+)?)";
const RANGE_SEP: &str = r"\s*(?:to|-|–)\s*";
const FOREIGN: &str = r"(us\$|\$|€|£|\b(?:usd|eur|gbp|cad|aud|sgd)\b)";
const FOREIGN_OPT: &str = r"(?:us\$|\$|€|£|(?:usd|eur|gbp|cad|aud|sgd)\b)?";
const LOCAL: &str = r"(?:₹|\binr\b|\brs\b\.?|\brupees?\b)";

struct Patterns {
    lpa_range: Regex,
    lpa_single: Regex,
    foreign_range: Regex,
    foreign_single: Regex,
    local_range: Regex,
    local_single: Regex,
    /// Pay-period qualifier directly after an amount: "/hr", "per month",
    /// "a year", "monthly", "p.m.".
    period_after: Regex,
    /// Qualifier directly before an amount: "Monthly stipend: ".
    period_before: Regex,
}

impl Patterns {
    fn compile() -> Result<Self> {
        let lpa_unit = r"(?:lpa|l\.p\.a\.?|lakhs?(?:\s*per\s*annum)?)";
        Ok(Self {
            lpa_range: Regex::new(&format!(
                r"(?i)(\d[\d.]*?){RANGE_SEP}(\d[\d.]*?)\s*{lpa_unit}"
            ))?,
            lpa_single: Regex::new(&format!(r"(?i)(\d[\d.]*?)\s*{lpa_unit}"))?,
            foreign_range: Regex::new(&format!(
                r"(?i){FOREIGN}\s*{NUM}\s*(k\b)?{RANGE_SEP}{FOREIGN_OPT}\s*{NUM}\s*(k\b)?"
            ))?,
            foreign_single: Regex::new(&format!(r"(?i){FOREIGN}\s*{NUM}\s*(k\b)?"))?,
            local_range: Regex::new(&format!(
                r"(?i){LOCAL}\s*{NUM}{RANGE_SEP}{LOCAL}?\s*{NUM}"
            ))?,
            local_single: Regex::new(&format!(r"(?i){LOCAL}\s*{NUM}"))?,
            period_after: Regex::new(
                r"(?i)^\s*(?:(?:/|per\b|an?\b|each\b)\s*(?:hour|hr|day|week|wk|month|mo|year|yr|annum)\b|(?:hour|dai|week|month|year)ly\b|p\.\s?[ma]\.)",
            )?,
            period_before: Regex::new(
                r"(?i)\b(?:hour|dai|week|month)ly\s+(?:base\s+)?(?:rate|salary|pay|stipend|wage)s?\s*(?:of|:|-)?\s*$",
            )?,
        })
    }
}

pub struct SalaryNormalizer {
    rates: ExchangeRates,
    patterns: Patterns,
}

impl SalaryNormalizer {
    pub fn new(rates: ExchangeRates) -> Result<Self> {
        Ok(Self {
            rates,
            patterns: Patterns::compile()?,
        })
    }

    pub fn rates(&self) -> &ExchangeRates {
        &self.rates
    }

    /// Run the pattern cascade over free text. A stage that fails to parse
    /// falls through to the next one.
    pub fn normalize(&self, text: &str) -> Salary {
        let text = text.trim();
        if text.is_empty() {
            return Salary::default();
        }

        self.lpa_range(text)
            .or_else(|| self.lpa_single(text))
            .or_else(|| self.foreign_range(text))
            .or_else(|| self.foreign_single(text))
            .or_else(|| self.local_range(text))
            .or_else(|| self.local_single(text))
            .unwrap_or_default()
    }

    /// Convert amounts a source reports in structured fields. Unknown
    /// currencies are treated as USD.
    pub fn from_amounts(
        &self,
        min: Option<f64>,
        max: Option<f64>,
        currency: Option<&str>,
        period: Option<&str>,
    ) -> Salary {
        let min = min.filter(|v| v.is_finite() && *v > 0.0);
        let max = max.filter(|v| v.is_finite() && *v > 0.0);
        if min.is_none() && max.is_none() {
            return Salary::default();
        }

        let code = currency
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "USD".to_string());
        let Some(rate) = self.rates.rate(&code).or_else(|| self.rates.rate("USD")) else {
            return Salary::default();
        };
        let multiplier = period.map(Period::from_label).unwrap_or(Period::Annual).multiplier();
        let to_lpa = |v: f64| round2(v * multiplier * rate / LAKH);

        let (min, max) = match (min.map(to_lpa), max.map(to_lpa)) {
            (Some(a), Some(b)) if a > b => (Some(b), Some(a)),
            other => other,
        };
        Salary {
            min,
            max,
            currency: Some(code),
        }
    }

    /// Period of the amount matched at `caps`, read only from a qualifier
    /// attached to it. Anything else in the text is ignored.
    fn period_of(&self, text: &str, caps: &Captures) -> Period {
        let Some(whole) = caps.get(0) else {
            return Period::Annual;
        };
        let p = &self.patterns;
        if let Some(m) = p.period_after.find(&text[whole.end()..]) {
            return period_from_qualifier(m.as_str());
        }
        match p.period_before.find(&text[..whole.start()]) {
            Some(m) => period_from_qualifier(m.as_str()),
            None => Period::Annual,
        }
    }

    fn lpa_range(&self, text: &str) -> Option<Salary> {
        let caps = self.patterns.lpa_range.captures(text)?;
        let low = parse_number(caps.get(1)?.as_str())?;
        let high = parse_number(caps.get(2)?.as_str())?;
        Some(Salary::range(low, high, "INR"))
    }

    fn lpa_single(&self, text: &str) -> Option<Salary> {
        let caps = self.patterns.lpa_single.captures(text)?;
        let value = parse_number(caps.get(1)?.as_str())?;
        Some(Salary::single(value, "INR"))
    }

    fn foreign_range(&self, text: &str) -> Option<Salary> {
        let caps = self.patterns.foreign_range.captures(text)?;
        let period = self.period_of(text, &caps);
        let currency = currency_code(caps.get(1)?.as_str())?;
        let thousands = caps.get(3).is_some() || caps.get(5).is_some();
        let low = apply_k(parse_number(caps.get(2)?.as_str())?, thousands);
        let high = apply_k(parse_number(caps.get(4)?.as_str())?, thousands);
        let rate = self.rates.rate(currency)?;
        let m = period.multiplier();
        Some(Salary::range(
            low * m * rate / LAKH,
            high * m * rate / LAKH,
            currency,
        ))
    }

    fn foreign_single(&self, text: &str) -> Option<Salary> {
        let caps = self.patterns.foreign_single.captures(text)?;
        let period = self.period_of(text, &caps);
        let currency = currency_code(caps.get(1)?.as_str())?;
        let value = apply_k(parse_number(caps.get(2)?.as_str())?, caps.get(3).is_some());
        let rate = self.rates.rate(currency)?;
        Some(Salary::single(
            value * period.multiplier() * rate / LAKH,
            currency,
        ))
    }

    fn local_range(&self, text: &str) -> Option<Salary> {
        let caps = self.patterns.local_range.captures(text)?;
        let period = self.period_of(text, &caps);
        let (low, high) = (number_at(&caps, 1)?, number_at(&caps, 2)?);
        let m = period.multiplier();
        Some(Salary::range(low * m / LAKH, high * m / LAKH, "INR"))
    }

    fn local_single(&self, text: &str) -> Option<Salary> {
        let caps = self.patterns.local_single.captures(text)?;
        let period = self.period_of(text, &caps);
        let value = number_at(&caps, 1)?;
        Some(Salary::single(value * period.multiplier() / LAKH, "INR"))
    }
}

fn period_from_qualifier(q: &str) -> Period {
    let q = q.to_lowercase();
    if q.contains("hour") || q.contains("hr") {
        Period::Hourly
    } else if q.contains("day") || q.contains("daily") {
        Period::Daily
    } else if q.contains("week") || q.contains("wk") {
        Period::Weekly
    } else if q.contains("mo") || q.contains("m.") {
        Period::Monthly
    } else {
        Period::Annual
    }
}

fn currency_code(symbol: &str) -> Option<&'static str> {
    match symbol.to_lowercase().as_str() {
        "$" | "us$" | "usd" => Some("USD"),
        "€" | "eur" => Some("EUR"),
        "£" | "gbp" => Some("GBP"),
        "cad" => Some("CAD"),
        "aud" => Some("AUD"),
        "sgd" => Some("SGD"),
        _ => None,
    }
}

fn number_at(caps: &Captures, group: usize) -> Option<f64> {
    parse_number(caps.get(group)?.as_str())
}

/// Strip thousands separators and parse. Zero and garbage count as no match.
fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim().trim_end_matches('.');
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn apply_k(value: f64, thousands: bool) -> f64 {
    if thousands && value < 1000.0 {
        value * 1000.0
    } else {
        value
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> SalaryNormalizer {
        SalaryNormalizer::new(ExchangeRates::default()).unwrap()
    }

    #[test]
    fn test_lpa_range() {
        let s = normalizer().normalize("15 to 25 LPA");
        assert_eq!(s.min, Some(15.0));
        assert_eq!(s.max, Some(25.0));
        assert_eq!(s.currency.as_deref(), Some("INR"));
    }

    #[test]
    fn test_lpa_single_and_lakhs_word() {
        let s = normalizer().normalize("20 lakhs per annum");
        assert_eq!(s.min, Some(20.0));
        assert_eq!(s.max, Some(20.0));
        assert_eq!(s.currency.as_deref(), Some("INR"));

        let s = normalizer().normalize("CTC 12.5 LPA");
        assert_eq!(s.min, Some(12.5));
    }

    #[test]
    fn test_dollar_k_range() {
        let s = normalizer().normalize("$120K - $180K per year");
        assert_eq!(s.currency.as_deref(), Some("USD"));
        assert_eq!(s.min, Some(100.2));
        assert_eq!(s.max, Some(150.3));
        assert!(s.min < s.max);
    }

    #[test]
    fn test_dollar_full_single() {
        let s = normalizer().normalize("$150,000 annually");
        assert_eq!(s.min, Some(125.25));
        assert_eq!(s.max, Some(125.25));
        assert_eq!(s.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_hourly_dollar() {
        let s = normalizer().normalize("$45/hour");
        // 45 * 2080 * 83.5 / 100000
        assert_eq!(s.min, Some(78.16));
    }

    #[test]
    fn test_euro_and_pound_codes() {
        let s = normalizer().normalize("EUR 60,000 - 80,000");
        assert_eq!(s.currency.as_deref(), Some("EUR"));
        assert_eq!(s.min, Some(54.6));
        assert_eq!(s.max, Some(72.8));

        let s = normalizer().normalize("£50k");
        assert_eq!(s.currency.as_deref(), Some("GBP"));
        assert_eq!(s.min, Some(53.0));
    }

    #[test]
    fn test_rupee_range_and_monthly() {
        let s = normalizer().normalize("₹12,00,000 - ₹18,00,000");
        assert_eq!(s.min, Some(12.0));
        assert_eq!(s.max, Some(18.0));
        assert_eq!(s.currency.as_deref(), Some("INR"));

        let s = normalizer().normalize("Rs. 80000 per month");
        assert_eq!(s.min, Some(9.6));
        assert_eq!(s.max, Some(9.6));

        let s = normalizer().normalize("INR 30,00,000");
        assert_eq!(s.min, Some(30.0));
    }

    #[test]
    fn test_no_salary_text() {
        assert!(normalizer().normalize("Competitive salary").is_empty());
        assert!(normalizer().normalize("").is_empty());
        assert!(normalizer().normalize("Senior Backend Engineer").is_empty());
    }

    #[test]
    fn test_inverted_bounds_are_swapped() {
        let s = normalizer().normalize("30 - 20 LPA");
        assert_eq!(s.min, Some(20.0));
        assert_eq!(s.max, Some(30.0));
    }

    #[test]
    fn test_range_stage_falls_through_to_single() {
        let s = normalizer().normalize("$90k, equity");
        assert_eq!(s.currency.as_deref(), Some("USD"));
        assert_eq!(s.min, Some(75.15));
    }

    #[test]
    fn test_from_amounts_monthly_gbp() {
        let s = normalizer().from_amounts(Some(5000.0), Some(6000.0), Some("gbp"), Some("MONTH"));
        assert_eq!(s.currency.as_deref(), Some("GBP"));
        assert_eq!(s.min, Some(63.6));
        assert_eq!(s.max, Some(76.32));
    }

    #[test]
    fn test_from_amounts_unknown_currency_uses_usd() {
        let s = normalizer().from_amounts(Some(100_000.0), None, Some("XYZ"), None);
        assert_eq!(s.min, Some(83.5));
        assert_eq!(s.max, None);
        assert_eq!(s.currency.as_deref(), Some("XYZ"));
    }

    #[test]
    fn test_from_amounts_empty() {
        assert!(normalizer().from_amounts(None, None, Some("USD"), None).is_empty());
        assert!(normalizer().from_amounts(Some(0.0), None, None, None).is_empty());
    }

    #[test]
    fn test_substituted_rates() {
        let rates = ExchangeRates::default().merged(&ExchangeRates(
            [("USD".to_string(), 100.0)].into_iter().collect(),
        ));
        let s = SalaryNormalizer::new(rates).unwrap().normalize("$100k");
        assert_eq!(s.min, Some(100.0));
    }

    #[test]
    fn test_period_needs_attached_qualifier() {
        let n = normalizer();
        let s = n.normalize("Senior PM $150,000");
        assert_eq!(s.min, Some(125.25));

        let s = n.normalize("Backend Engineer $150k. Join our daily standups");
        assert_eq!(s.min, Some(125.25));

        let s = n.normalize("$120k - $150k. Monthly all-hands, weekly demos, paid by the hour for overtime");
        assert_eq!(s.min, Some(100.2));
        assert_eq!(s.max, Some(125.25));
    }

    #[test]
    fn test_attached_period_qualifiers() {
        let n = normalizer();
        assert_eq!(n.normalize("$40 - $60 /hr").min, Some(69.47));
        assert_eq!(n.normalize("$300 a day").min, Some(65.13));
        assert_eq!(n.normalize("£3,000 monthly").min, Some(38.16));
        assert_eq!(n.normalize("Rs. 50,000 p.m.").min, Some(6.0));
        assert_eq!(n.normalize("Monthly stipend: ₹40,000").min, Some(4.8));
        assert_eq!(n.normalize("$150k per annum").min, Some(125.25));
    }

    #[test]
    fn test_period_from_label() {
        assert_eq!(Period::from_label("HOUR"), Period::Hourly);
        assert_eq!(Period::from_label("per month"), Period::Monthly);
        assert_eq!(Period::from_label("WEEK"), Period::Weekly);
        assert_eq!(Period::from_label("DAY"), Period::Daily);
        assert_eq!(Period::from_label("YEAR"), Period::Annual);
    }
}
