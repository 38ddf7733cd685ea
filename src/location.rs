//! Free-text location strings to structured geography.
//!
//! Matching is an ordered cascade over ordered gazetteer lists, so a string
//! that names places from more than one table always resolves the same way.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub country: String,
    pub state: String,
    pub city: String,
    pub is_remote: bool,
    pub is_india: bool,
    pub location_raw: String,
}

const REMOTE_TERMS: &[&str] = &[
    "remote",
    "work from home",
    "wfh",
    "anywhere",
    "distributed",
    "fully remote",
    "remote-first",
];

const WORK_MODES: &[&str] = &["remote", "hybrid", "on-site", "onsite"];

// Full names come before abbreviations so "united states" wins over "us".
const COUNTRIES: &[(&str, &str)] = &[
    ("india", "IN"),
    ("united states", "US"),
    ("united kingdom", "GB"),
    ("new zealand", "NZ"),
    ("south korea", "KR"),
    ("netherlands", "NL"),
    ("holland", "NL"),
    ("canada", "CA"),
    ("germany", "DE"),
    ("france", "FR"),
    ("australia", "AU"),
    ("singapore", "SG"),
    ("japan", "JP"),
    ("ireland", "IE"),
    ("sweden", "SE"),
    ("brazil", "BR"),
    ("malaysia", "MY"),
    ("israel", "IL"),
    ("spain", "ES"),
    ("italy", "IT"),
    ("poland", "PL"),
    ("portugal", "PT"),
    ("switzerland", "CH"),
    ("mexico", "MX"),
    ("china", "CN"),
    ("abu dhabi", "AE"),
    ("dubai", "AE"),
    ("usa", "US"),
    ("us", "US"),
    ("uk", "GB"),
    ("nz", "NZ"),
    ("uae", "AE"),
];

const INDIA_CITIES: &[&str] = &[
    "bangalore", "bengaluru", "mumbai", "bombay", "new delhi", "delhi", "gurgaon", "gurugram",
    "noida", "hyderabad", "pune", "chennai", "kolkata", "calcutta", "ahmedabad", "jaipur",
    "kochi", "cochin", "thiruvananthapuram", "trivandrum", "lucknow", "chandigarh", "indore",
    "bhopal", "nagpur", "coimbatore", "visakhapatnam", "vizag", "mysore", "mangalore", "surat",
    "vadodara", "rajkot", "patna", "ranchi", "bhubaneswar", "panaji", "dehradun", "shimla",
    "agra", "kanpur", "varanasi",
];

const INDIA_STATES: &[&str] = &[
    "karnataka", "maharashtra", "tamil nadu", "telangana", "andhra pradesh", "kerala",
    "west bengal", "rajasthan", "gujarat", "uttar pradesh", "madhya pradesh", "haryana",
    "punjab", "bihar", "odisha", "jharkhand", "goa", "uttarakhand", "himachal pradesh", "assam",
];

const US_CITIES: &[&str] = &[
    "san francisco", "new york city", "los angeles", "seattle", "austin", "boston", "chicago",
    "denver", "atlanta", "portland", "san jose", "san diego", "dallas", "houston", "miami",
    "philadelphia", "phoenix", "minneapolis", "salt lake city", "raleigh", "charlotte",
    "nashville", "detroit", "pittsburgh", "washington dc", "palo alto", "mountain view",
    "sunnyvale", "cupertino", "menlo park", "redmond", "bellevue", "indianapolis", "columbus",
    "nyc", "sf", "dc",
];

const US_STATES: &[&str] = &[
    "california", "new york", "texas", "washington", "massachusetts", "illinois", "colorado",
    "georgia", "florida", "virginia", "oregon", "pennsylvania", "north carolina", "ohio",
    "michigan", "arizona", "minnesota", "utah", "maryland", "new jersey", "connecticut",
    "tennessee", "missouri", "indiana", "wisconsin", "iowa", "nevada", "ca", "ny", "tx", "wa",
    "ma", "il", "co", "ga", "fl", "va", "or", "pa", "nc", "oh", "mi", "az", "mn", "ut", "md",
    "nj", "ct", "tn", "mo", "wi", "ia", "nv",
];

const SECONDARY_CITIES: &[(&str, &[&str])] = &[
    ("GB", &["london", "manchester", "edinburgh", "birmingham", "bristol", "cambridge", "oxford", "leeds", "glasgow"]),
    ("CA", &["toronto", "vancouver", "montreal", "ottawa", "calgary", "edmonton", "waterloo"]),
    ("DE", &["berlin", "munich", "hamburg", "frankfurt", "cologne", "stuttgart"]),
    ("NL", &["amsterdam", "rotterdam", "the hague", "eindhoven", "utrecht", "delft", "leiden"]),
    ("IE", &["dublin", "cork", "galway", "limerick", "waterford"]),
    ("FR", &["paris", "lyon", "marseille", "toulouse", "bordeaux", "nantes", "strasbourg", "nice"]),
    ("AU", &["sydney", "melbourne", "brisbane", "perth", "adelaide", "canberra"]),
    ("NZ", &["auckland", "wellington", "christchurch", "hamilton", "dunedin"]),
    ("SG", &["singapore"]),
    ("JP", &["tokyo", "osaka", "kyoto", "yokohama", "nagoya", "fukuoka", "sapporo", "kobe"]),
    ("MY", &["kuala lumpur", "penang", "johor bahru", "cyberjaya", "putrajaya", "petaling jaya"]),
];

/// Gazetteer tables, checked in the order the fields are declared.
#[derive(Debug, Clone)]
pub struct LocationTables {
    pub remote_terms: Vec<String>,
    pub work_modes: Vec<String>,
    pub countries: Vec<(String, String)>,
    pub india_cities: Vec<String>,
    pub india_states: Vec<String>,
    pub us_cities: Vec<String>,
    pub us_states: Vec<String>,
    pub secondary_cities: Vec<(String, Vec<String>)>,
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for LocationTables {
    fn default() -> Self {
        Self {
            remote_terms: owned(REMOTE_TERMS),
            work_modes: owned(WORK_MODES),
            countries: COUNTRIES
                .iter()
                .map(|(name, code)| (name.to_string(), code.to_string()))
                .collect(),
            india_cities: owned(INDIA_CITIES),
            india_states: owned(INDIA_STATES),
            us_cities: owned(US_CITIES),
            us_states: owned(US_STATES),
            secondary_cities: SECONDARY_CITIES
                .iter()
                .map(|(code, cities)| (code.to_string(), owned(cities)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocationResolver {
    tables: LocationTables,
}

impl LocationResolver {
    pub fn new(tables: LocationTables) -> Self {
        Self { tables }
    }

    pub fn resolve(&self, text: &str) -> Location {
        let raw = text.trim();
        if raw.is_empty() {
            return Location::default();
        }

        let lower = raw.to_lowercase();
        let mut loc = Location {
            location_raw: raw.to_string(),
            ..Default::default()
        };

        loc.is_remote = first_match(&lower, &self.tables.remote_terms).is_some();

        if let Some((_, code)) = self
            .tables
            .countries
            .iter()
            .find(|(name, _)| contains_term(&lower, name))
        {
            loc.country = code.clone();
        }

        if loc.country.is_empty() {
            if let Some(city) = first_match(&lower, &self.tables.india_cities) {
                loc.country = "IN".to_string();
                loc.city = title_case(city);
            } else if let Some(state) = first_match(&lower, &self.tables.india_states) {
                loc.country = "IN".to_string();
                loc.state = title_case(state);
            }
        }
        loc.is_india = loc.country == "IN";

        if loc.country.is_empty() {
            if let Some(city) = first_match(&lower, &self.tables.us_cities) {
                loc.country = "US".to_string();
                loc.city = title_case(city);
            } else if let Some(state) = first_match(&lower, &self.tables.us_states) {
                loc.country = "US".to_string();
                loc.state = title_case(state);
            }
        }

        if loc.country.is_empty() {
            for (code, cities) in &self.tables.secondary_cities {
                if let Some(city) = first_match(&lower, cities) {
                    loc.country = code.clone();
                    loc.city = title_case(city);
                    break;
                }
            }
        }

        let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
        if loc.city.is_empty() {
            let candidate = parts[0];
            let candidate_lower = candidate.to_lowercase();
            let is_mode = self.tables.remote_terms.contains(&candidate_lower)
                || self.tables.work_modes.contains(&candidate_lower);
            if candidate.chars().count() > 1 && !is_mode {
                loc.city = candidate.to_string();
            }
        }
        if loc.state.is_empty() && parts.len() >= 2 && !parts[1].is_empty() {
            loc.state = parts[1].to_string();
        }

        loc
    }

    /// True if any India gazetteer term, or the word "india", shows up in the
    /// combined title/location/company text.
    pub fn mentions_india(&self, title: &str, location: &str, company: &str) -> bool {
        let combined = format!("{} {} {}", title, location, company).to_lowercase();
        contains_term(&combined, "india")
            || first_match(&combined, &self.tables.india_cities).is_some()
            || first_match(&combined, &self.tables.india_states).is_some()
    }
}

fn first_match<'a>(haystack: &str, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .find(|t| contains_term(haystack, t))
        .map(String::as_str)
}

/// Whole-word match: the characters on either side of the term, if any,
/// must not be alphanumeric. "india" does not match "indianapolis".
fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

pub(crate) fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(text: &str) -> Location {
        LocationResolver::default().resolve(text)
    }

    #[test]
    fn test_empty_input_is_all_empty() {
        assert_eq!(resolve(""), Location::default());
        assert_eq!(resolve("   "), Location::default());
    }

    #[test]
    fn test_bangalore_india() {
        let loc = resolve("Bangalore, India");
        assert_eq!(loc.country, "IN");
        assert_eq!(loc.city, "Bangalore");
        assert!(loc.is_india);
        assert!(!loc.is_remote);
        assert_eq!(loc.location_raw, "Bangalore, India");
    }

    #[test]
    fn test_india_city_without_country_name() {
        let loc = resolve("Hyderabad");
        assert_eq!(loc.country, "IN");
        assert_eq!(loc.city, "Hyderabad");
        assert!(loc.is_india);
    }

    #[test]
    fn test_india_state_only() {
        let loc = resolve("Gurugram, Haryana");
        assert_eq!(loc.country, "IN");
        assert_eq!(loc.city, "Gurugram");
        assert_eq!(loc.state, "Haryana");
    }

    #[test]
    fn test_us_city_and_state_abbreviation() {
        let loc = resolve("San Francisco, CA");
        assert_eq!(loc.country, "US");
        assert_eq!(loc.city, "San Francisco");
        assert_eq!(loc.state, "CA");
        assert!(!loc.is_india);
    }

    #[test]
    fn test_remote_sets_flag_but_keeps_cascade() {
        let loc = resolve("Remote - India");
        assert!(loc.is_remote);
        assert_eq!(loc.country, "IN");

        let loc = resolve("Remote");
        assert!(loc.is_remote);
        assert_eq!(loc.country, "");
        assert_eq!(loc.city, "");
    }

    #[test]
    fn test_secondary_gazetteer() {
        let loc = resolve("Berlin");
        assert_eq!(loc.country, "DE");
        assert_eq!(loc.city, "Berlin");

        let loc = resolve("London, UK");
        assert_eq!(loc.country, "GB");
        assert_eq!(loc.city, "London");
    }

    #[test]
    fn test_short_codes_need_whole_words() {
        // "us" inside "australia" and "in" inside "berlin" must not fire.
        let loc = resolve("Sydney, Australia");
        assert_eq!(loc.country, "AU");
        assert_eq!(loc.city, "Sydney");

        let loc = resolve("New York, NY, USA");
        assert_eq!(loc.country, "US");
        assert_eq!(loc.city, "New York");
        assert_eq!(loc.state, "NY");
    }

    #[test]
    fn test_country_names_need_whole_words() {
        let loc = resolve("Indianapolis, IN");
        assert_eq!(loc.country, "US");
        assert_eq!(loc.city, "Indianapolis");
        assert_eq!(loc.state, "IN");
        assert!(!loc.is_india);

        let loc = resolve("Fort Wayne, Indiana");
        assert_eq!(loc.country, "US");
        assert_eq!(loc.state, "Indiana");
        assert!(!loc.is_india);

        let loc = resolve("Chennai, Tamil Nadu, India");
        assert_eq!(loc.country, "IN");
        assert_eq!(loc.city, "Chennai");
    }

    #[test]
    fn test_fallback_city_from_first_segment() {
        let loc = resolve("Springfield, Lower Saxony");
        assert_eq!(loc.country, "");
        assert_eq!(loc.city, "Springfield");
        assert_eq!(loc.state, "Lower Saxony");
    }

    #[test]
    fn test_fallback_skips_work_mode_words() {
        let loc = resolve("Hybrid");
        assert_eq!(loc.city, "");
    }

    #[test]
    fn test_substituted_tables_are_respected() {
        let tables = LocationTables {
            secondary_cities: vec![("XX".to_string(), vec!["atlantis".to_string()])],
            ..Default::default()
        };
        let loc = LocationResolver::new(tables).resolve("Atlantis");
        assert_eq!(loc.country, "XX");
        assert_eq!(loc.city, "Atlantis");
    }

    #[test]
    fn test_mentions_india() {
        let resolver = LocationResolver::default();
        assert!(resolver.mentions_india("SDE II", "Pune", ""));
        assert!(resolver.mentions_india("Backend Engineer (India)", "", ""));
        assert!(!resolver.mentions_india("Backend Engineer", "Berlin", "Acme"));
        assert!(!resolver.mentions_india("Backend Engineer", "Indianapolis", "Indiana Tech"));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("new delhi"), "New Delhi");
        assert_eq!(title_case("sf"), "Sf");
    }
}
