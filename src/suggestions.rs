use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::models::{
    ANONYMOUS_COMPANY, DEFAULT_SOURCES, JobApplication, PreviousEntryData, default_sources,
};

// Jaro-Winkler similarity needed for a fuzzy autocomplete hit.
const FUZZY_THRESHOLD: f64 = 0.8;
// Stricter bar for offering "did you mean".
const CLOSE_MATCH_THRESHOLD: f64 = 0.85;

/// How one field of a raw suggestions payload looks before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape<'a> {
    List(&'a [Value]),
    WrongType,
    /// Absent, `null`, or the payload itself is not an object.
    Missing,
}

pub fn classify<'a>(payload: &'a Value, key: &str) -> FieldShape<'a> {
    match payload.get(key) {
        None | Some(Value::Null) => FieldShape::Missing,
        Some(Value::Array(values)) => FieldShape::List(values),
        Some(_) => FieldShape::WrongType,
    }
}

/// Turns whatever the suggestions endpoint returned into usable lists.
///
/// Company and job title lists fall back to empty; the source list falls back
/// to [`DEFAULT_SOURCES`] whenever no valid entry survives, so it is never
/// empty. Nothing here fails; bad input is logged and replaced.
pub fn normalize_payload(payload: &Value) -> PreviousEntryData {
    if !payload.is_object() {
        warn!(kind = value_kind(payload), "suggestions payload is not an object, using defaults");
    }

    let companies = string_list(payload, "companies")
        .into_iter()
        .filter(|company| company != ANONYMOUS_COMPANY)
        .collect();
    let job_titles = string_list(payload, "jobTitles");

    let mut sources = string_list(payload, "sources");
    if sources.is_empty() {
        debug!("no usable sources in payload, using default list");
        sources = default_sources();
    }

    PreviousEntryData {
        companies,
        job_titles,
        sources,
    }
}

fn string_list(payload: &Value, key: &str) -> Vec<String> {
    match classify(payload, key) {
        FieldShape::List(values) => {
            let list = distinct(values.iter().filter_map(Value::as_str));
            if list.len() < values.len() {
                debug!(
                    field = key,
                    dropped = values.len() - list.len(),
                    "dropped blank, duplicate or non-string suggestions"
                );
            }
            list
        }
        FieldShape::WrongType => {
            warn!(field = key, "suggestion field is not a list, ignoring it");
            Vec::new()
        }
        FieldShape::Missing => {
            debug!(field = key, "suggestion field missing");
            Vec::new()
        }
    }
}

/// Non-blank values in first-seen order, duplicates removed.
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| !v.trim().is_empty())
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Builds suggestions from stored records, the way a backend answers the
/// suggestions request: sources seen so far come first, then the defaults.
pub fn derive_from_records(applications: &[JobApplication]) -> PreviousEntryData {
    let companies = distinct(
        applications
            .iter()
            .map(|app| app.company.as_str())
            .filter(|company| *company != ANONYMOUS_COMPANY),
    );
    let job_titles = distinct(applications.iter().map(|app| app.job_title.as_str()));
    let sources = distinct(
        applications
            .iter()
            .map(|app| app.source.as_str())
            .chain(DEFAULT_SOURCES),
    );

    PreviousEntryData {
        companies,
        job_titles,
        sources,
    }
}

/// Ranks `values` against partial input: prefix matches, then substring
/// matches, then fuzzy matches, each group in its original order.
pub fn autocomplete<'a>(values: &'a [String], input: &str, limit: usize) -> Vec<&'a str> {
    let query = input.trim().to_lowercase();
    if query.is_empty() {
        return values.iter().take(limit).map(String::as_str).collect();
    }

    let mut prefix = Vec::new();
    let mut contains = Vec::new();
    let mut fuzzy = Vec::new();

    for value in values {
        let lower = value.to_lowercase();
        if lower.starts_with(&query) {
            prefix.push(value.as_str());
        } else if lower.contains(&query) {
            contains.push(value.as_str());
        } else if strsim::jaro_winkler(&lower, &query) >= FUZZY_THRESHOLD {
            fuzzy.push(value.as_str());
        }
    }

    prefix
        .into_iter()
        .chain(contains)
        .chain(fuzzy)
        .take(limit)
        .collect()
}

/// The prior value `input` most likely meant, if it is close but not equal.
pub fn closest_match<'a>(values: &'a [String], input: &str) -> Option<&'a str> {
    let query = input.trim().to_lowercase();
    if query.is_empty() || values.iter().any(|v| v == input.trim()) {
        return None;
    }

    values
        .iter()
        .map(|v| (v, strsim::jaro_winkler(&v.to_lowercase(), &query)))
        .filter(|(_, score)| *score >= CLOSE_MATCH_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(v, _)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationStatus;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_sources_fall_back_to_defaults() {
        let payload = json!({"companies": ["Google"], "jobTitles": ["Dev"], "sources": []});
        let entries = normalize_payload(&payload);
        assert_eq!(entries.companies, strings(&["Google"]));
        assert_eq!(entries.job_titles, strings(&["Dev"]));
        assert_eq!(
            entries.sources,
            strings(&["LinkedIn", "Recruiter", "Job Board", "Company Website", "Other"])
        );
    }

    #[test]
    fn test_null_fields_become_safe_defaults() {
        let payload = json!({"companies": null, "sources": null});
        assert_eq!(normalize_payload(&payload), PreviousEntryData::default());
    }

    #[test]
    fn test_non_object_payloads_become_defaults() {
        for payload in [json!(null), json!("oops"), json!([1, 2]), json!(42)] {
            let entries = normalize_payload(&payload);
            assert_eq!(entries, PreviousEntryData::default());
            assert!(!entries.sources.is_empty());
        }
    }

    #[test]
    fn test_wrong_types_are_ignored() {
        let payload = json!({"companies": "Google", "jobTitles": {"a": 1}, "sources": 3});
        let entries = normalize_payload(&payload);
        assert!(entries.companies.is_empty());
        assert!(entries.job_titles.is_empty());
        assert_eq!(entries.sources, default_sources());
    }

    #[test]
    fn test_well_formed_payload_is_kept() {
        let payload = json!({
            "companies": ["Google", "Microsoft"],
            "jobTitles": ["Developer", "Engineer"],
            "sources": ["LinkedIn", "Recruiter"]
        });
        let entries = normalize_payload(&payload);
        assert_eq!(entries.companies, strings(&["Google", "Microsoft"]));
        assert_eq!(entries.job_titles, strings(&["Developer", "Engineer"]));
        assert_eq!(entries.sources, strings(&["LinkedIn", "Recruiter"]));
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let payload = json!({
            "companies": ["Google", null, 7, "", "  ", "Google", "Anonymous", "Initech"],
            "jobTitles": [false, "Dev"],
            "sources": [null, ""]
        });
        let entries = normalize_payload(&payload);
        assert_eq!(entries.companies, strings(&["Google", "Initech"]));
        assert_eq!(entries.job_titles, strings(&["Dev"]));
        assert_eq!(entries.sources, default_sources());
    }

    #[test]
    fn test_classify() {
        let payload = json!({"a": [1], "b": "x", "c": null});
        assert!(matches!(classify(&payload, "a"), FieldShape::List(v) if v.len() == 1));
        assert_eq!(classify(&payload, "b"), FieldShape::WrongType);
        assert_eq!(classify(&payload, "c"), FieldShape::Missing);
        assert_eq!(classify(&payload, "d"), FieldShape::Missing);
    }

    fn record(company: &str, title: &str, source: &str) -> JobApplication {
        let now = Utc::now();
        JobApplication {
            id: company.to_string(),
            company: company.to_string(),
            job_title: title.to_string(),
            job_description: String::new(),
            date_applied: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            status: ApplicationStatus::Applied,
            notes: None,
            source: source.to_string(),
            recruiter: None,
            recruiting_firm: None,
            contact_email: None,
            contact_phone: None,
            application_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_derive_from_records() {
        let records = vec![
            record("Acme", "Engineer", "Referral"),
            record("Anonymous", "Analyst", "LinkedIn"),
            record("Acme", "Engineer", ""),
        ];
        let entries = derive_from_records(&records);
        assert_eq!(entries.companies, strings(&["Acme"]));
        assert_eq!(entries.job_titles, strings(&["Engineer", "Analyst"]));
        assert_eq!(
            entries.sources,
            strings(&[
                "Referral",
                "LinkedIn",
                "Recruiter",
                "Job Board",
                "Company Website",
                "Other"
            ])
        );
    }

    #[test]
    fn test_derive_from_no_records_still_has_sources() {
        let entries = derive_from_records(&[]);
        assert!(entries.companies.is_empty());
        assert_eq!(entries.sources, default_sources());
    }

    #[test]
    fn test_autocomplete_orders_prefix_then_substring_then_fuzzy() {
        let values = strings(&["Microsoft", "Google", "Globex", "Big Goo Corp", "Goodyear"]);
        assert_eq!(
            autocomplete(&values, "goo", 10),
            vec!["Google", "Goodyear", "Big Goo Corp"]
        );
        assert_eq!(autocomplete(&values, "gogle", 10), vec!["Google"]);
        assert_eq!(autocomplete(&values, "", 2), vec!["Microsoft", "Google"]);
        assert_eq!(autocomplete(&values, "goo", 1), vec!["Google"]);
    }

    #[test]
    fn test_closest_match() {
        let values = strings(&["Google", "Microsoft"]);
        assert_eq!(closest_match(&values, "Gogle"), Some("Google"));
        assert_eq!(closest_match(&values, "google"), Some("Google"));
        assert_eq!(closest_match(&values, "Google"), None);
        assert_eq!(closest_match(&values, "Initech"), None);
        assert_eq!(closest_match(&values, ""), None);
    }
}
