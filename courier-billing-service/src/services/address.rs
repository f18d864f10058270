//! Heuristic address parsing and distance classification.
//!
//! Addresses are free text typed by booking clerks, so parsing is best-effort:
//! the state comes from a name/code alias table, then from a metro city
//! named in the address, then from the pincode's postal circle.

use crate::models::DistanceCategory;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// State aliases. Full names are tried before short codes.
const STATE_NAMES: &[(&str, &str)] = &[
    ("ANDHRA PRADESH", "AP"),
    ("ARUNACHAL PRADESH", "AR"),
    ("ASSAM", "AS"),
    ("BIHAR", "BR"),
    ("CHHATTISGARH", "CG"),
    ("CHATTISGARH", "CG"),
    ("GOA", "GA"),
    ("GUJARAT", "GJ"),
    ("HARYANA", "HR"),
    ("HIMACHAL PRADESH", "HP"),
    ("JHARKHAND", "JH"),
    ("KARNATAKA", "KA"),
    ("KERALA", "KL"),
    ("MADHYA PRADESH", "MP"),
    ("MAHARASHTRA", "MH"),
    ("MANIPUR", "MN"),
    ("MEGHALAYA", "ML"),
    ("MIZORAM", "MZ"),
    ("NAGALAND", "NL"),
    ("ODISHA", "OR"),
    ("ORISSA", "OR"),
    ("PUNJAB", "PB"),
    ("RAJASTHAN", "RJ"),
    ("SIKKIM", "SK"),
    ("TAMIL NADU", "TN"),
    ("TAMILNADU", "TN"),
    ("TELANGANA", "TG"),
    ("TRIPURA", "TR"),
    ("UTTAR PRADESH", "UP"),
    ("UTTARAKHAND", "UK"),
    ("UTTARANCHAL", "UK"),
    ("WEST BENGAL", "WB"),
    ("NCT OF DELHI", "DL"),
    ("NEW DELHI", "DL"),
    ("DELHI", "DL"),
    ("JAMMU AND KASHMIR", "JK"),
    ("JAMMU KASHMIR", "JK"),
    ("CHANDIGARH", "CH"),
    ("PUDUCHERRY", "PY"),
    ("PONDICHERRY", "PY"),
];

const STATE_CODES: &[(&str, &str)] = &[
    ("AP", "AP"),
    ("AR", "AR"),
    ("AS", "AS"),
    ("BR", "BR"),
    ("CG", "CG"),
    ("GA", "GA"),
    ("GJ", "GJ"),
    ("HR", "HR"),
    ("HP", "HP"),
    ("JH", "JH"),
    ("KA", "KA"),
    ("KL", "KL"),
    ("MP", "MP"),
    ("MH", "MH"),
    ("MN", "MN"),
    ("ML", "ML"),
    ("MZ", "MZ"),
    ("NL", "NL"),
    ("OD", "OR"),
    ("OR", "OR"),
    ("PB", "PB"),
    ("RJ", "RJ"),
    ("SK", "SK"),
    ("TN", "TN"),
    ("TG", "TG"),
    ("TS", "TG"),
    ("TR", "TR"),
    ("UP", "UP"),
    ("UK", "UK"),
    ("UA", "UK"),
    ("WB", "WB"),
    ("DL", "DL"),
    ("JK", "JK"),
    ("CH", "CH"),
    ("PY", "PY"),
];

/// Metro city spellings: (alias, canonical city, state code).
const METRO_CITY_NAMES: &[(&str, &str, &str)] = &[
    ("MUMBAI", "MUMBAI", "MH"),
    ("BOMBAY", "MUMBAI", "MH"),
    ("PUNE", "PUNE", "MH"),
    ("POONA", "PUNE", "MH"),
    ("NEW DELHI", "NEW DELHI", "DL"),
    ("DELHI", "DELHI", "DL"),
    ("KOLKATA", "KOLKATA", "WB"),
    ("CALCUTTA", "KOLKATA", "WB"),
    ("CHENNAI", "CHENNAI", "TN"),
    ("MADRAS", "CHENNAI", "TN"),
    ("BENGALURU", "BENGALURU", "KA"),
    ("BANGALORE", "BENGALURU", "KA"),
    ("HYDERABAD", "HYDERABAD", "TG"),
    ("SECUNDERABAD", "HYDERABAD", "TG"),
    ("AHMEDABAD", "AHMEDABAD", "GJ"),
    ("AMDAVAD", "AHMEDABAD", "GJ"),
];

struct Alias {
    pattern: Regex,
    alias_len: usize,
    value: &'static str,
    state: &'static str,
}

fn compile(entries: impl Iterator<Item = (&'static str, &'static str, &'static str)>) -> Vec<Alias> {
    let mut aliases: Vec<Alias> = entries
        .map(|(alias, value, state)| Alias {
            pattern: Regex::new(&format!(r"\b{}\b", regex::escape(alias)))
                .expect("alias patterns are valid"),
            alias_len: alias.len(),
            value,
            state,
        })
        .collect();
    aliases.sort_by(|a, b| b.alias_len.cmp(&a.alias_len));
    aliases
}

static STATE_NAME_ALIASES: Lazy<Vec<Alias>> =
    Lazy::new(|| compile(STATE_NAMES.iter().map(|(a, code)| (*a, *code, *code))));

static STATE_CODE_ALIASES: Lazy<Vec<Alias>> =
    Lazy::new(|| compile(STATE_CODES.iter().map(|(a, code)| (*a, *code, *code))));

static METRO_ALIASES: Lazy<Vec<Alias>> =
    Lazy::new(|| compile(METRO_CITY_NAMES.iter().copied()));

static NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]+").expect("noise pattern is valid"));

static PINCODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{6})\b").expect("pincode pattern is valid"));

/// Pick the alias whose match ends furthest right; state and city usually
/// trail the street details. Ties go to the longer alias.
fn rightmost_match<'a>(aliases: &'a [Alias], text: &str) -> Option<&'a Alias> {
    let mut best: Option<(usize, &Alias)> = None;
    for alias in aliases {
        if let Some(end) = alias.pattern.find_iter(text).map(|m| m.end()).last() {
            let better = match best {
                None => true,
                Some((best_end, best_alias)) => {
                    end > best_end || (end == best_end && alias.alias_len > best_alias.alias_len)
                }
            };
            if better {
                best = Some((end, alias));
            }
        }
    }
    best.map(|(_, alias)| alias)
}

/// State code for an Indian pincode, from its postal circle prefix.
pub fn state_from_pincode(pincode: &str) -> Option<&'static str> {
    if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let two: u32 = pincode[..2].parse().ok()?;
    let three: u32 = pincode[..3].parse().ok()?;

    let code = match three {
        160 => "CH",
        246..=249 | 262 | 263 => "UK",
        403 => "GA",
        605 => "PY",
        737 => "SK",
        790..=792 => "AR",
        793 | 794 => "ML",
        795 => "MN",
        796 => "MZ",
        797 | 798 => "NL",
        799 => "TR",
        814..=816 | 825..=835 => "JH",
        _ => match two {
            11 => "DL",
            12 | 13 => "HR",
            14..=16 => "PB",
            17 => "HP",
            18 | 19 => "JK",
            20..=28 => "UP",
            30..=34 => "RJ",
            36..=39 => "GJ",
            40..=44 => "MH",
            45..=48 => "MP",
            49 => "CG",
            50 => "TG",
            51..=53 => "AP",
            56..=59 => "KA",
            60..=64 => "TN",
            67..=69 => "KL",
            70..=74 => "WB",
            75..=77 => "OR",
            78 => "AS",
            80..=85 => "BR",
            _ => return None,
        },
    };
    Some(code)
}

/// Parsed view of one free-text address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAddress {
    pub normalized: String,
    pub city: Option<String>,
    pub state_code: Option<String>,
    pub pincode: Option<String>,
}

impl ParsedAddress {
    pub fn parse(raw: &str) -> Self {
        let upper = raw.to_uppercase();
        let normalized = NOISE.replace_all(&upper, " ").trim().to_string();

        let pincode = PINCODE
            .captures_iter(&normalized)
            .last()
            .map(|c| c[1].to_string());

        let explicit_state = rightmost_match(&STATE_NAME_ALIASES, &normalized)
            .or_else(|| rightmost_match(&STATE_CODE_ALIASES, &normalized))
            .map(|a| a.state)
            .or_else(|| pincode.as_deref().and_then(state_from_pincode));

        // A metro name inside a street or landmark ("Delhi Road") does not
        // make the address metro when the state says otherwise.
        let metro = rightmost_match(&METRO_ALIASES, &normalized)
            .filter(|m| explicit_state.map_or(true, |state| state == m.state));
        let city = metro.map(|m| m.value.to_string());

        let state_code = explicit_state
            .or_else(|| metro.map(|m| m.state))
            .map(str::to_string);

        Self {
            normalized,
            city,
            state_code,
            pincode,
        }
    }
}

/// Immutable snapshot of the metro and adjacency tables.
///
/// Either table may be unavailable when its load failed; classification then
/// treats an unknown metro answer as "not metro" and an unknown adjacency
/// answer as "adjacent".
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    metro_cities: Option<HashSet<String>>,
    adjacency: Option<HashSet<(String, String)>>,
}

impl ReferenceTables {
    pub fn new(
        metro_cities: Option<Vec<String>>,
        adjacency: Option<Vec<(String, String)>>,
    ) -> Self {
        Self {
            metro_cities: metro_cities
                .map(|cities| cities.iter().map(|c| c.trim().to_uppercase()).collect()),
            adjacency: adjacency.map(|pairs| {
                pairs
                    .iter()
                    .map(|(a, b)| ordered_pair(a, b))
                    .collect()
            }),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.metro_cities.is_some() && self.adjacency.is_some()
    }

    pub fn metro_city_count(&self) -> Option<usize> {
        self.metro_cities.as_ref().map(HashSet::len)
    }

    pub fn adjacency_count(&self) -> Option<usize> {
        self.adjacency.as_ref().map(HashSet::len)
    }

    /// `None` when the metro table is unavailable.
    pub fn is_metro(&self, city: &str) -> Option<bool> {
        self.metro_cities
            .as_ref()
            .map(|set| set.contains(&city.trim().to_uppercase()))
    }

    /// `None` when the adjacency table is unavailable.
    pub fn are_adjacent(&self, a: &str, b: &str) -> Option<bool> {
        self.adjacency
            .as_ref()
            .map(|set| set.contains(&ordered_pair(a, b)))
    }
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    let a = a.trim().to_uppercase();
    let b = b.trim().to_uppercase();
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Outcome of classifying an origin/destination pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: Option<DistanceCategory>,
    pub origin: ParsedAddress,
    pub destination: ParsedAddress,
    pub is_metro_pair: bool,
    pub is_neighbor: bool,
}

/// Decides the distance category of a shipment from its two addresses.
pub struct AddressClassifier<'a> {
    tables: &'a ReferenceTables,
}

impl<'a> AddressClassifier<'a> {
    pub fn new(tables: &'a ReferenceTables) -> Self {
        Self { tables }
    }

    fn is_metro(&self, address: &ParsedAddress) -> bool {
        let Some(city) = address.city.as_deref() else {
            return false;
        };
        match self.tables.is_metro(city) {
            Some(is_metro) => is_metro,
            None => {
                warn!(city = %city, "Metro city table unavailable, treating city as non-metro");
                false
            }
        }
    }

    fn is_neighbor(&self, a: &str, b: &str) -> bool {
        match self.tables.are_adjacent(a, b) {
            Some(adjacent) => adjacent,
            None => {
                warn!(
                    origin_state = %a,
                    destination_state = %b,
                    "State adjacency table unavailable, treating states as adjacent"
                );
                true
            }
        }
    }

    pub fn classify(&self, origin: &str, destination: &str) -> Classification {
        let origin = ParsedAddress::parse(origin);
        let destination = ParsedAddress::parse(destination);

        let is_metro_pair = self.is_metro(&origin) && self.is_metro(&destination);

        let (category, is_neighbor) = if is_metro_pair {
            (Some(DistanceCategory::MetroCities), false)
        } else {
            match (origin.state_code.as_deref(), destination.state_code.as_deref()) {
                (Some(a), Some(b)) if a == b => (Some(DistanceCategory::WithinState), false),
                (Some(a), Some(b)) => {
                    if self.is_neighbor(a, b) {
                        (Some(DistanceCategory::OutOfState), true)
                    } else {
                        (Some(DistanceCategory::OtherState), false)
                    }
                }
                _ => (None, false),
            }
        };

        Classification {
            category,
            origin,
            destination,
            is_metro_pair,
            is_neighbor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_tables() -> ReferenceTables {
        ReferenceTables::new(
            Some(
                ["MUMBAI", "PUNE", "DELHI", "NEW DELHI", "KOLKATA", "CHENNAI", "BENGALURU"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            Some(vec![
                ("MH".to_string(), "GJ".to_string()),
                ("KA".to_string(), "TN".to_string()),
                ("UP".to_string(), "DL".to_string()),
            ]),
        )
    }

    #[test]
    fn parses_state_city_and_pincode() {
        let parsed = ParsedAddress::parse("Flat 4, Andheri (East), Mumbai - 400069, Maharashtra");
        assert_eq!(parsed.city.as_deref(), Some("MUMBAI"));
        assert_eq!(parsed.state_code.as_deref(), Some("MH"));
        assert_eq!(parsed.pincode.as_deref(), Some("400069"));
    }

    #[test]
    fn short_codes_need_word_boundaries() {
        let parsed = ParsedAddress::parse("12 Mall Road, Kanpur");
        assert_eq!(parsed.state_code, None);

        let parsed = ParsedAddress::parse("12 Mall Road, Kanpur, UP");
        assert_eq!(parsed.state_code.as_deref(), Some("UP"));
    }

    #[test]
    fn full_names_win_over_short_codes() {
        let parsed = ParsedAddress::parse("KA Towers, Coimbatore, Tamil Nadu");
        assert_eq!(parsed.state_code.as_deref(), Some("TN"));
    }

    #[test]
    fn rightmost_state_name_wins() {
        let parsed = ParsedAddress::parse("Delhi Road, Meerut, Uttar Pradesh");
        assert_eq!(parsed.state_code.as_deref(), Some("UP"));
        assert_eq!(parsed.city, None);
    }

    #[test]
    fn metro_name_in_street_of_another_state_is_not_metro() {
        let tables = seeded_tables();
        let result = AddressClassifier::new(&tables)
            .classify("Delhi Road, Meerut, Uttar Pradesh", "Andheri, Mumbai, Maharashtra");
        assert_eq!(result.origin.city, None);
        assert_eq!(result.category, Some(DistanceCategory::OtherState));
        assert!(!result.is_metro_pair);
    }

    #[test]
    fn metro_with_conflicting_pincode_keeps_pincode_state() {
        let parsed = ParsedAddress::parse("Mumbai Bazar, 302013");
        assert_eq!(parsed.city, None);
        assert_eq!(parsed.state_code.as_deref(), Some("RJ"));
    }

    #[test]
    fn metro_alias_normalizes_city_and_implies_state() {
        let parsed = ParsedAddress::parse("MG Road, Bangalore");
        assert_eq!(parsed.city.as_deref(), Some("BENGALURU"));
        assert_eq!(parsed.state_code.as_deref(), Some("KA"));
    }

    #[test]
    fn pincode_fills_missing_state() {
        let parsed = ParsedAddress::parse("Plot 7, Industrial Area, 302013");
        assert_eq!(parsed.state_code.as_deref(), Some("RJ"));
    }

    #[test]
    fn pincode_prefix_table() {
        assert_eq!(state_from_pincode("110001"), Some("DL"));
        assert_eq!(state_from_pincode("403001"), Some("GA"));
        assert_eq!(state_from_pincode("560001"), Some("KA"));
        assert_eq!(state_from_pincode("834001"), Some("JH"));
        assert_eq!(state_from_pincode("999999"), None);
        assert_eq!(state_from_pincode("4000"), None);
    }

    #[test]
    fn mumbai_to_pune_is_metro_pair() {
        let tables = seeded_tables();
        let result = AddressClassifier::new(&tables).classify("Mumbai, Maharashtra", "Pune, Maharashtra");
        assert_eq!(result.category, Some(DistanceCategory::MetroCities));
        assert!(result.is_metro_pair);
    }

    #[test]
    fn metro_pair_across_states_is_still_metro() {
        let tables = seeded_tables();
        let result = AddressClassifier::new(&tables).classify("Chennai", "Kolkata, West Bengal");
        assert_eq!(result.category, Some(DistanceCategory::MetroCities));
    }

    #[test]
    fn same_state_non_metro_is_within_state() {
        let tables = seeded_tables();
        let result =
            AddressClassifier::new(&tables).classify("Nashik, Maharashtra", "Mumbai, Maharashtra");
        assert_eq!(result.category, Some(DistanceCategory::WithinState));
        assert!(!result.is_metro_pair);
    }

    #[test]
    fn adjacent_states_are_out_of_state() {
        let tables = seeded_tables();
        let result = AddressClassifier::new(&tables).classify("Surat, Gujarat", "Nashik, Maharashtra");
        assert_eq!(result.category, Some(DistanceCategory::OutOfState));
        assert!(result.is_neighbor);
    }

    #[test]
    fn remote_states_are_other_state() {
        let tables = seeded_tables();
        let result = AddressClassifier::new(&tables).classify("Surat, Gujarat", "Guwahati, Assam");
        assert_eq!(result.category, Some(DistanceCategory::OtherState));
        assert!(!result.is_neighbor);
    }

    #[test]
    fn unresolved_state_is_unclassifiable() {
        let tables = seeded_tables();
        let result = AddressClassifier::new(&tables).classify("Near the old temple", "Surat, Gujarat");
        assert_eq!(result.category, None);
    }

    #[test]
    fn metro_table_failure_means_not_metro() {
        let tables = ReferenceTables::new(None, Some(vec![]));
        let result = AddressClassifier::new(&tables).classify("Mumbai, Maharashtra", "Pune, Maharashtra");
        assert_eq!(result.category, Some(DistanceCategory::WithinState));
        assert!(!result.is_metro_pair);
    }

    #[test]
    fn adjacency_table_failure_means_adjacent() {
        let tables = ReferenceTables::new(Some(vec![]), None);
        let result = AddressClassifier::new(&tables).classify("Surat, Gujarat", "Guwahati, Assam");
        assert_eq!(result.category, Some(DistanceCategory::OutOfState));
        assert!(result.is_neighbor);
    }

    #[test]
    fn classification_is_deterministic() {
        let tables = seeded_tables();
        let classifier = AddressClassifier::new(&tables);
        let first = classifier.classify("Indiranagar, Bengaluru 560038", "T Nagar, Chennai");
        let second = classifier.classify("Indiranagar, Bengaluru 560038", "T Nagar, Chennai");
        assert_eq!(first, second);
    }
}
