use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::Serialize;

use crate::models::{ApplicationStatus, JobApplication};

const ACTIVE_WINDOW_DAYS: i64 = 14;
const DORMANT_AFTER_DAYS: i64 = 30;
const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total: usize,
    /// Every status, in declaration order, including zero counts.
    pub by_status: Vec<StatusCount>,
    pub pending: usize,
    pub this_week: usize,
    pub active: usize,
    pub dormant: usize,
    pub silent: usize,
    pub recent: Vec<JobApplication>,
}

impl DashboardSummary {
    pub fn count(&self, status: ApplicationStatus) -> usize {
        self.by_status
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}

/// Midnight UTC of the most recent Sunday, today included.
pub fn start_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_since_sunday = i64::from(now.weekday().num_days_from_sunday());
    let sunday = now.date_naive() - Duration::days(days_since_sunday);
    sunday.and_time(NaiveTime::MIN).and_utc()
}

pub fn summarize(applications: &[JobApplication], now: DateTime<Utc>) -> DashboardSummary {
    let by_status: Vec<StatusCount> = ApplicationStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: applications.iter().filter(|a| a.status == status).count(),
        })
        .collect();

    let week_start = start_of_week(now);
    let active_since = now - Duration::days(ACTIVE_WINDOW_DAYS);
    let dormant_before = now - Duration::days(DORMANT_AFTER_DAYS);

    let pending = applications
        .iter()
        .filter(|a| {
            matches!(
                a.status,
                ApplicationStatus::Applied | ApplicationStatus::Interview
            )
        })
        .count();
    let this_week = applications
        .iter()
        .filter(|a| a.created_at >= week_start)
        .count();
    let active = applications
        .iter()
        .filter(|a| !a.status.is_closed())
        .filter(|a| a.created_at >= active_since || a.updated_at >= active_since)
        .count();
    let dormant = applications
        .iter()
        .filter(|a| a.last_activity() < dormant_before)
        .count();
    let silent = applications
        .iter()
        .filter(|a| a.updated_at == a.created_at)
        .count();

    let mut recent = applications.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_LIMIT);

    DashboardSummary {
        total: applications.len(),
        by_status,
        pending,
        this_week,
        active,
        dormant,
        silent,
        recent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    // Wednesday
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, 15, 30, 0).unwrap()
    }

    fn app(
        id: &str,
        status: ApplicationStatus,
        created_days_ago: i64,
        updated_days_ago: i64,
    ) -> JobApplication {
        let created_at = now() - Duration::days(created_days_ago);
        let updated_at = now() - Duration::days(updated_days_ago);
        JobApplication {
            id: id.to_string(),
            company: format!("Company {}", id),
            job_title: "Engineer".to_string(),
            job_description: String::new(),
            date_applied: created_at.date_naive(),
            status,
            notes: None,
            source: "LinkedIn".to_string(),
            recruiter: None,
            recruiting_firm: None,
            contact_email: None,
            contact_phone: None,
            application_url: None,
            created_at,
            updated_at,
        }
    }

    #[test]
    fn test_start_of_week_is_previous_sunday_midnight() {
        assert_eq!(
            start_of_week(now()),
            Utc.with_ymd_and_hms(2024, 6, 9, 0, 0, 0).unwrap()
        );

        let sunday_noon = Utc.with_ymd_and_hms(2024, 6, 9, 12, 0, 0).unwrap();
        assert_eq!(
            start_of_week(sunday_noon).date_naive(),
            NaiveDate::from_ymd_opt(2024, 6, 9).unwrap()
        );
    }

    #[test]
    fn test_empty_summary_zero_fills_statuses() {
        let summary = summarize(&[], now());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.by_status.len(), 5);
        assert!(summary.by_status.iter().all(|c| c.count == 0));
        assert!(summary.recent.is_empty());
    }

    #[test]
    fn test_counts() {
        let apps = vec![
            app("1", ApplicationStatus::Applied, 1, 1),
            app("2", ApplicationStatus::Interview, 10, 2),
            app("3", ApplicationStatus::Rejected, 3, 3),
            app("4", ApplicationStatus::Offer, 40, 35),
            app("5", ApplicationStatus::Withdrawn, 60, 60),
            app("6", ApplicationStatus::Applied, 20, 20),
        ];
        let summary = summarize(&apps, now());

        assert_eq!(summary.total, 6);
        assert_eq!(summary.count(ApplicationStatus::Applied), 2);
        assert_eq!(summary.count(ApplicationStatus::Offer), 1);
        assert_eq!(summary.pending, 3);
        // created Tuesday and Sunday
        assert_eq!(summary.this_week, 2);
        // rejected #3 is recent but closed
        assert_eq!(summary.active, 2);
        assert_eq!(summary.dormant, 2);
        assert_eq!(summary.silent, 4);
    }

    #[test]
    fn test_recent_is_newest_five() {
        let apps: Vec<JobApplication> = (0..7)
            .map(|i| app(&i.to_string(), ApplicationStatus::Applied, i, i))
            .collect();
        let summary = summarize(&apps, now());
        let ids: Vec<&str> = summary.recent.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let value = serde_json::to_value(summarize(&[], now())).unwrap();
        assert_eq!(value["thisWeek"], 0);
        assert_eq!(value["byStatus"][0]["status"], "applied");
    }
}
