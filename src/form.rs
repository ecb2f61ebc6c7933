use chrono::NaiveDate;

use crate::models::{
    ANONYMOUS_COMPANY, ApplicationStatus, DEFAULT_SOURCE, JobApplication, NewApplication,
    RECRUITER_SOURCE,
};
use crate::validation::{DescriptionPolicy, ValidationErrors, parse_status, validate};

#[derive(Debug, Clone, PartialEq)]
pub struct FormValues {
    pub company: String,
    pub job_title: String,
    pub job_description: String,
    pub date_applied: NaiveDate,
    pub status: String,
    pub notes: String,
    /// Stores the record under the Anonymous sentinel instead of `company`.
    pub is_anonymous: bool,
    pub source: String,
    pub recruiter: String,
    pub recruiting_firm: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub application_url: String,
}

impl FormValues {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            company: String::new(),
            job_title: String::new(),
            job_description: String::new(),
            date_applied: today,
            status: ApplicationStatus::Applied.to_string(),
            notes: String::new(),
            is_anonymous: false,
            source: DEFAULT_SOURCE.to_string(),
            recruiter: String::new(),
            recruiting_firm: String::new(),
            contact_email: String::new(),
            contact_phone: String::new(),
            application_url: String::new(),
        }
    }

    pub fn from_application(app: &JobApplication) -> Self {
        let source = if app.source.trim().is_empty() {
            DEFAULT_SOURCE.to_string()
        } else {
            app.source.clone()
        };

        Self {
            company: app.company.clone(),
            job_title: app.job_title.clone(),
            job_description: app.job_description.clone(),
            date_applied: app.date_applied,
            status: app.status.to_string(),
            notes: app.notes.clone().unwrap_or_default(),
            is_anonymous: app.is_anonymous(),
            source,
            recruiter: app.recruiter.clone().unwrap_or_default(),
            recruiting_firm: app.recruiting_firm.clone().unwrap_or_default(),
            contact_email: app.contact_email.clone().unwrap_or_default(),
            contact_phone: app.contact_phone.clone().unwrap_or_default(),
            application_url: app.application_url.clone().unwrap_or_default(),
        }
    }

    pub fn effective_company(&self) -> &str {
        if self.is_anonymous {
            ANONYMOUS_COMPANY
        } else {
            &self.company
        }
    }

    pub fn shows_recruiter_fields(&self) -> bool {
        self.source.trim() == RECRUITER_SOURCE
    }

    /// Validates and turns the form into the fields sent to the store.
    ///
    /// Recruiter details are only kept when the source is "Recruiter".
    pub fn submit(
        &self,
        policy: DescriptionPolicy,
        today: NaiveDate,
    ) -> Result<NewApplication, ValidationErrors> {
        validate(self, policy, today)?;
        let status = parse_status(&self.status).map_err(ValidationErrors::from)?;
        let recruiter_fields = self.shows_recruiter_fields();

        Ok(NewApplication {
            company: self.effective_company().trim().to_string(),
            job_title: self.job_title.trim().to_string(),
            job_description: self.job_description.trim().to_string(),
            date_applied: self.date_applied,
            status,
            notes: optional(&self.notes),
            source: self.source.trim().to_string(),
            recruiter: optional(&self.recruiter).filter(|_| recruiter_fields),
            recruiting_firm: optional(&self.recruiting_firm).filter(|_| recruiter_fields),
            contact_email: optional(&self.contact_email),
            contact_phone: optional(&self.contact_phone),
            application_url: optional(&self.application_url),
        })
    }
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
