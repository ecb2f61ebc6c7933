use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Company name stored in place of the real one for anonymized applications.
pub const ANONYMOUS_COMPANY: &str = "Anonymous";

/// Source value that makes the recruiter fields mandatory.
pub const RECRUITER_SOURCE: &str = "Recruiter";

pub const DEFAULT_SOURCE: &str = "LinkedIn";

/// Offered as sources even before anything has been recorded.
pub const DEFAULT_SOURCES: [&str; 5] = [
    "LinkedIn",
    "Recruiter",
    "Job Board",
    "Company Website",
    "Other",
];

pub fn default_sources() -> Vec<String> {
    DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    /// Rejected and withdrawn applications are no longer in play.
    pub fn is_closed(&self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Withdrawn)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("status", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: String,
    pub company: String,
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(with = "date_applied")]
    pub date_applied: NaiveDate,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recruiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recruiting_firm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobApplication {
    pub fn is_anonymous(&self) -> bool {
        self.company == ANONYMOUS_COMPANY
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.updated_at.max(self.created_at)
    }
}

/// Client-editable fields, the body of a create or update request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApplication {
    pub company: String,
    pub job_title: String,
    pub job_description: String,
    #[serde(with = "date_applied")]
    pub date_applied: NaiveDate,
    pub status: ApplicationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recruiter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recruiting_firm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_url: Option<String>,
}

impl From<&JobApplication> for NewApplication {
    fn from(app: &JobApplication) -> Self {
        Self {
            company: app.company.clone(),
            job_title: app.job_title.clone(),
            job_description: app.job_description.clone(),
            date_applied: app.date_applied,
            status: app.status,
            notes: app.notes.clone(),
            source: app.source.clone(),
            recruiter: app.recruiter.clone(),
            recruiting_firm: app.recruiting_firm.clone(),
            contact_email: app.contact_email.clone(),
            contact_phone: app.contact_phone.clone(),
            application_url: app.application_url.clone(),
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (taken as its UTC date).
pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").or_else(|_| {
        DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

mod date_applied {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(serde::de::Error::custom)
    }
}

// --- Filter descriptor ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ApplicationStatus),
}

impl StatusFilter {
    /// Steps through "all" and then every status, wrapping around.
    pub fn next(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Only(ApplicationStatus::ALL[0]),
            StatusFilter::Only(status) => {
                let idx = ApplicationStatus::ALL
                    .iter()
                    .position(|s| *s == status)
                    .unwrap_or(0);
                ApplicationStatus::ALL
                    .get(idx + 1)
                    .map(|s| StatusFilter::Only(*s))
                    .unwrap_or(StatusFilter::All)
            }
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("all"),
            StatusFilter::Only(status) => status.fmt(f),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(StatusFilter::All);
        }
        s.parse()
            .map(StatusFilter::Only)
            .map_err(|_| ParseEnumError::new("status filter", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    DateApplied,
    Company,
    JobTitle,
    Status,
}

impl SortField {
    pub const ALL: [SortField; 4] = [
        SortField::DateApplied,
        SortField::Company,
        SortField::JobTitle,
        SortField::Status,
    ];

    /// Name used on the wire (`sortBy` query parameter).
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::DateApplied => "dateApplied",
            SortField::Company => "company",
            SortField::JobTitle => "jobTitle",
            SortField::Status => "status",
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "dateapplied" | "date" => Ok(SortField::DateApplied),
            "company" => Ok(SortField::Company),
            "jobtitle" | "title" => Ok(SortField::JobTitle),
            "status" => Ok(SortField::Status),
            _ => Err(ParseEnumError::new("sort field", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user's current search/status/sort selection. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApplicationFilter {
    pub search: String,
    pub status: StatusFilter,
    pub sort_by: SortField,
    pub sort_direction: SortDirection,
}

impl ApplicationFilter {
    /// Re-selecting the active field flips direction; a new field starts ascending.
    pub fn sort_on(&mut self, field: SortField) {
        if self.sort_by == field {
            self.sort_direction = self.sort_direction.toggled();
        } else {
            self.sort_by = field;
            self.sort_direction = SortDirection::Asc;
        }
    }
}

/// Autocomplete lists built from earlier applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousEntryData {
    pub companies: Vec<String>,
    pub job_titles: Vec<String>,
    pub sources: Vec<String>, // never empty
}

impl Default for PreviousEntryData {
    fn default() -> Self {
        Self {
            companies: Vec::new(),
            job_titles: Vec::new(),
            sources: default_sources(),
        }
    }
}
