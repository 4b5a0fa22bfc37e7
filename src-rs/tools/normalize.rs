use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

const DESCRIPTION_LIMIT: usize = 500;

/// Canonical job listing, whichever board it came from.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NormalizedJobListing {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: String,
    pub description: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub remote: Option<bool>,
    pub employment_type: Option<String>,
    pub posted_date: Option<String>,
    pub source: String,
}

impl NormalizedJobListing {
    fn dedup_key(&self) -> (String, String) {
        (
            self.company.trim().to_lowercase(),
            self.title.trim().to_lowercase(),
        )
    }
}

/// Maps one entry of a JSearch `data` array. `None` when the entry has no
/// apply link.
pub fn from_jsearch(job: &Value) -> Option<NormalizedJobListing> {
    let url = non_empty(job.get("job_apply_link"))?;

    let location_parts: Vec<String> = ["job_city", "job_state"]
        .iter()
        .filter_map(|key| non_empty(job.get(*key)))
        .collect();
    let location = if location_parts.is_empty() {
        None
    } else {
        Some(location_parts.join(", "))
    };

    let employment_type = non_empty(job.get("job_employment_type")).map(|t| t.to_lowercase());

    Some(NormalizedJobListing {
        title: text(job.get("job_title")),
        company: text(job.get("employer_name")),
        location,
        url,
        description: truncate_chars(&text(job.get("job_description")), DESCRIPTION_LIMIT),
        salary_min: job.get("job_min_salary").and_then(Value::as_f64),
        salary_max: job.get("job_max_salary").and_then(Value::as_f64),
        remote: job.get("job_is_remote").and_then(Value::as_bool),
        employment_type,
        posted_date: date_prefix(job.get("job_posted_at_datetime_utc")),
        source: "jsearch".to_string(),
    })
}

/// Maps one entry of an Adzuna `results` array. `None` when the entry has no
/// redirect URL.
pub fn from_adzuna(job: &Value) -> Option<NormalizedJobListing> {
    let url = non_empty(job.get("redirect_url"))?;
    Some(NormalizedJobListing {
        title: text(job.get("title")),
        company: text(job.pointer("/company/display_name")),
        location: non_empty(job.pointer("/location/display_name")),
        url,
        description: truncate_chars(&text(job.get("description")), DESCRIPTION_LIMIT),
        salary_min: job.get("salary_min").and_then(Value::as_f64),
        salary_max: job.get("salary_max").and_then(Value::as_f64),
        remote: None,
        employment_type: None,
        posted_date: date_prefix(job.get("created")),
        source: "adzuna".to_string(),
    })
}

/// Drops later listings whose trimmed, lowercased (company, title) pair was
/// already seen. Input order decides which copy survives.
pub fn dedupe(listings: Vec<NormalizedJobListing>) -> Vec<NormalizedJobListing> {
    let mut seen = HashSet::new();
    listings
        .into_iter()
        .filter(|listing| seen.insert(listing.dedup_key()))
        .collect()
}

fn text(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn date_prefix(value: Option<&Value>) -> Option<String> {
    let raw = value.and_then(Value::as_str)?;
    raw.get(..10).map(str::to_string)
}

pub(crate) fn truncate_chars(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(company: &str, title: &str, source: &str) -> NormalizedJobListing {
        NormalizedJobListing {
            title: title.to_string(),
            company: company.to_string(),
            location: None,
            url: format!("https://jobs.example/{}", source),
            description: String::new(),
            salary_min: None,
            salary_max: None,
            remote: None,
            employment_type: None,
            posted_date: None,
            source: source.to_string(),
        }
    }

    #[test]
    fn jsearch_entry_is_mapped() {
        let raw = json!({
            "job_apply_link": "https://acme.example/apply",
            "job_title": "Platform Engineer",
            "employer_name": "Acme",
            "job_city": "Berlin",
            "job_state": "",
            "job_description": "d".repeat(800),
            "job_min_salary": 90000,
            "job_max_salary": null,
            "job_is_remote": true,
            "job_employment_type": "FULLTIME",
            "job_posted_at_datetime_utc": "2024-03-05T10:00:00.000Z"
        });
        let listing = from_jsearch(&raw).unwrap();
        assert_eq!(listing.location.as_deref(), Some("Berlin"));
        assert_eq!(listing.description.len(), 500);
        assert_eq!(listing.salary_min, Some(90000.0));
        assert_eq!(listing.salary_max, None);
        assert_eq!(listing.employment_type.as_deref(), Some("fulltime"));
        assert_eq!(listing.posted_date.as_deref(), Some("2024-03-05"));
        assert_eq!(listing.source, "jsearch");
    }

    #[test]
    fn entries_without_url_are_dropped() {
        assert!(from_jsearch(&json!({"job_title": "X", "job_apply_link": ""})).is_none());
        assert!(from_adzuna(&json!({"title": "X"})).is_none());
    }

    #[test]
    fn adzuna_entry_is_mapped() {
        let raw = json!({
            "redirect_url": "https://adzuna.example/r/1",
            "title": "Data Engineer",
            "company": {"display_name": "Globex"},
            "location": {"display_name": "London, UK"},
            "description": "Pipelines",
            "salary_min": 55000.5,
            "created": "2024-02-01T08:00:00Z"
        });
        let listing = from_adzuna(&raw).unwrap();
        assert_eq!(listing.company, "Globex");
        assert_eq!(listing.location.as_deref(), Some("London, UK"));
        assert_eq!(listing.remote, None);
        assert_eq!(listing.posted_date.as_deref(), Some("2024-02-01"));
        assert_eq!(listing.source, "adzuna");
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let out = dedupe(vec![
            listing("Acme", "Engineer", "jsearch"),
            listing("ACME ", " Engineer", "adzuna"),
            listing("Acme", "Senior Engineer", "adzuna"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source, "jsearch");
        assert_eq!(out[1].title, "Senior Engineer");
    }

    #[test]
    fn short_dates_are_ignored() {
        assert_eq!(date_prefix(Some(&json!("2024"))), None);
    }
}
