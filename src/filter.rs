use std::cmp::Ordering;

use crate::models::{ApplicationFilter, JobApplication, SortDirection, SortField, StatusFilter};

/// Produces the rows a list view shows for `filter`.
///
/// A record is kept when the lower-cased search text occurs in its company,
/// job title or job description, and its status matches the status filter.
/// The sort is stable, so records that compare equal on the sort field keep
/// their relative input order in either direction.
pub fn filter_applications(
    applications: &[JobApplication],
    filter: &ApplicationFilter,
) -> Vec<JobApplication> {
    let needle = filter.search.to_lowercase();

    let mut filtered: Vec<JobApplication> = applications
        .iter()
        .filter(|app| matches_search(app, &needle) && matches_status(app, filter.status))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| {
        let ordering = compare_by(a, b, filter.sort_by);
        match filter.sort_direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    filtered
}

fn matches_search(app: &JobApplication, needle: &str) -> bool {
    needle.is_empty()
        || app.company.to_lowercase().contains(needle)
        || app.job_title.to_lowercase().contains(needle)
        || app.job_description.to_lowercase().contains(needle)
}

fn matches_status(app: &JobApplication, status: StatusFilter) -> bool {
    match status {
        StatusFilter::All => true,
        StatusFilter::Only(wanted) => app.status == wanted,
    }
}

fn compare_by(a: &JobApplication, b: &JobApplication, field: SortField) -> Ordering {
    match field {
        SortField::DateApplied => a.date_applied.cmp(&b.date_applied),
        SortField::Company => a.company.cmp(&b.company),
        SortField::JobTitle => a.job_title.cmp(&b.job_title),
        // by name, the way the stored strings compare
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}
