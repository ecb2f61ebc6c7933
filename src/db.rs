use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, params};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::filter::filter_applications;
use crate::models::{ApplicationFilter, ApplicationStatus, JobApplication, NewApplication};
use crate::store::{ApplicationStore, StoreError, StoreResult};
use crate::suggestions::derive_from_records;

const SELECT_COLUMNS: &str = "SELECT id, company, job_title, job_description, date_applied, status,
        notes, source, recruiter, recruiting_firm, contact_email, contact_phone,
        application_url, created_at, updated_at
 FROM applications";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        debug!(path = %path.display(), "opened application database");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "apptrack") {
            proj_dirs.data_dir().join("apptrack.db")
        } else {
            PathBuf::from("apptrack.db")
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                company TEXT NOT NULL,
                job_title TEXT NOT NULL,
                job_description TEXT NOT NULL DEFAULT '',
                date_applied TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'applied' CHECK (status IN ('applied', 'interview', 'offer', 'rejected', 'withdrawn')),
                notes TEXT,
                source TEXT NOT NULL DEFAULT '',
                recruiter TEXT,
                recruiting_firm TEXT,
                contact_email TEXT,
                contact_phone TEXT,
                application_url TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);
            CREATE INDEX IF NOT EXISTS idx_applications_date ON applications(date_applied);
            "#,
        )?;
        info!(path = %self.path.display(), "database schema ready");
        Ok(())
    }

    pub fn ensure_initialized(&self) -> StoreResult<()> {
        let tables: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='applications'",
            [],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(StoreError::NotInitialized);
        }
        Ok(())
    }

    fn all_applications(conn: &Connection) -> StoreResult<Vec<JobApplication>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at", SELECT_COLUMNS))?;
        let rows = stmt.query_map([], Self::row_to_application)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn find(conn: &Connection, id: &str) -> StoreResult<Option<JobApplication>> {
        let result = conn.query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            [id],
            Self::row_to_application,
        );
        match result {
            Ok(app) => Ok(Some(app)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn row_to_application(row: &rusqlite::Row) -> rusqlite::Result<JobApplication> {
        Ok(JobApplication {
            id: row.get(0)?,
            company: row.get(1)?,
            job_title: row.get(2)?,
            job_description: row.get(3)?,
            date_applied: row.get(4)?,
            status: row.get(5)?,
            notes: row.get(6)?,
            source: row.get(7)?,
            recruiter: row.get(8)?,
            recruiting_firm: row.get(9)?,
            contact_email: row.get(10)?,
            contact_phone: row.get(11)?,
            application_url: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }
}

#[async_trait]
impl ApplicationStore for SqliteStore {
    async fn list(&self, filter: &ApplicationFilter) -> StoreResult<Vec<JobApplication>> {
        let all = Self::all_applications(&self.conn())?;
        Ok(filter_applications(&all, filter))
    }

    async fn get(&self, id: &str) -> StoreResult<Option<JobApplication>> {
        Self::find(&self.conn(), id)
    }

    async fn create(&self, fields: &NewApplication) -> StoreResult<JobApplication> {
        let now = Utc::now();
        let app = JobApplication {
            id: Uuid::new_v4().to_string(),
            company: fields.company.clone(),
            job_title: fields.job_title.clone(),
            job_description: fields.job_description.clone(),
            date_applied: fields.date_applied,
            status: fields.status,
            notes: fields.notes.clone(),
            source: fields.source.clone(),
            recruiter: fields.recruiter.clone(),
            recruiting_firm: fields.recruiting_firm.clone(),
            contact_email: fields.contact_email.clone(),
            contact_phone: fields.contact_phone.clone(),
            application_url: fields.application_url.clone(),
            created_at: now,
            updated_at: now,
        };

        self.conn().execute(
            "INSERT INTO applications (id, company, job_title, job_description, date_applied,
                status, notes, source, recruiter, recruiting_firm, contact_email, contact_phone,
                application_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                app.id,
                app.company,
                app.job_title,
                app.job_description,
                app.date_applied,
                app.status,
                app.notes,
                app.source,
                app.recruiter,
                app.recruiting_firm,
                app.contact_email,
                app.contact_phone,
                app.application_url,
                app.created_at,
                app.updated_at,
            ],
        )?;

        info!(id = %app.id, company = %app.company, "application created");
        Ok(app)
    }

    async fn update(&self, id: &str, fields: &NewApplication) -> StoreResult<JobApplication> {
        let conn = self.conn();
        let existing = Self::find(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        // clock skew must not put updated_at before created_at
        let updated_at = Utc::now().max(existing.created_at);

        conn.execute(
            "UPDATE applications SET company = ?1, job_title = ?2, job_description = ?3,
                date_applied = ?4, status = ?5, notes = ?6, source = ?7, recruiter = ?8,
                recruiting_firm = ?9, contact_email = ?10, contact_phone = ?11,
                application_url = ?12, updated_at = ?13
             WHERE id = ?14",
            params![
                fields.company,
                fields.job_title,
                fields.job_description,
                fields.date_applied,
                fields.status,
                fields.notes,
                fields.source,
                fields.recruiter,
                fields.recruiting_firm,
                fields.contact_email,
                fields.contact_phone,
                fields.application_url,
                updated_at,
                id,
            ],
        )?;

        info!(id, "application updated");
        Self::find(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM applications WHERE id = ?1", [id])?;
        if removed > 0 {
            info!(id, "application deleted");
        } else {
            debug!(id, "delete found no application");
        }
        Ok(removed > 0)
    }

    async fn suggestions(&self) -> StoreResult<Value> {
        let all = Self::all_applications(&self.conn())?;
        Ok(serde_json::to_value(derive_from_records(&all))?)
    }
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
