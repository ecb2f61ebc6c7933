use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::form::FormValues;
use crate::models::ApplicationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionPolicy {
    #[default]
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Company,
    JobTitle,
    JobDescription,
    DateApplied,
    Status,
    Source,
    Recruiter,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Company => "company",
            Field::JobTitle => "jobTitle",
            Field::JobDescription => "jobDescription",
            Field::DateApplied => "dateApplied",
            Field::Status => "status",
            Field::Source => "source",
            Field::Recruiter => "recruiter",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Per-field problems that block a submission, in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} field(s) failed validation", .errors.len())]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    pub fn for_field(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn parse_status(raw: &str) -> Result<ApplicationStatus, FieldError> {
    raw.trim().parse().map_err(|_| FieldError {
        field: Field::Status,
        message: format!(
            "Status must be one of: {}",
            ApplicationStatus::ALL.map(|s| s.as_str()).join(", ")
        ),
    })
}

/// Checks whether `values` may be submitted.
///
/// `today` is the evaluation date for the not-in-the-future rule. Contact
/// email, phone and application URL are free text and never checked.
pub fn validate(
    values: &FormValues,
    policy: DescriptionPolicy,
    today: NaiveDate,
) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();
    let mut fail = |field: Field, message: &str| {
        errors.push(FieldError {
            field,
            message: message.to_string(),
        })
    };

    if is_blank(values.effective_company()) {
        fail(Field::Company, "Company name is required");
    }
    if is_blank(&values.job_title) {
        fail(Field::JobTitle, "Job title is required");
    }
    if policy == DescriptionPolicy::Strict && is_blank(&values.job_description) {
        fail(Field::JobDescription, "Job description is required");
    }
    if values.date_applied > today {
        fail(Field::DateApplied, "Date cannot be in the future");
    }
    if let Err(e) = parse_status(&values.status) {
        fail(e.field, &e.message);
    }
    if is_blank(&values.source) {
        fail(Field::Source, "Source is required");
    }
    if values.shows_recruiter_fields()
        && (is_blank(&values.recruiter) || is_blank(&values.recruiting_firm))
    {
        fail(
            Field::Recruiter,
            "Recruiter and recruiting firm are required when source is Recruiter",
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { errors })
    }
}
