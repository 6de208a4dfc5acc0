use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::ReportStore;
use crate::models::{NewReport, PageCursor, Report, ReportChanges, ReportSummary};

const REPORT_COLUMNS: &str = "id, user_id, title, report_type, subject_name, subject_info, \
     notes, blob_key, blob_url, created_at, updated_at";

const SUMMARY_COLUMNS: &str = "id, title, report_type, created_at, updated_at";

#[derive(Clone)]
pub struct PgReportRepository {
    pool: PgPool,
}

impl PgReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportStore for PgReportRepository {
    #[instrument(name = "db.report.insert", skip_all, fields(report.id = %report.id))]
    async fn insert(&self, report: &NewReport<'_>) -> Result<Report, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            INSERT INTO reports
                (id, user_id, title, report_type, subject_name, subject_info, notes, blob_key, blob_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(report.id)
        .bind(report.user_id)
        .bind(report.title)
        .bind(report.report_type)
        .bind(&report.inputs.subject_name)
        .bind(&report.inputs.subject_info)
        .bind(&report.inputs.notes)
        .bind(report.blob_key)
        .bind(report.blob_url)
        .fetch_one(&self.pool)
        .await
    }

    #[instrument(name = "db.report.find_owned", skip(self))]
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Report>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(name = "db.report.update", skip(self, changes))]
    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: &ReportChanges,
    ) -> Result<Option<Report>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            UPDATE reports
            SET
                title = COALESCE($3, title),
                report_type = COALESCE($4, report_type),
                subject_name = COALESCE($5, subject_name),
                subject_info = COALESCE($6, subject_info),
                notes = COALESCE($7, notes),
                blob_url = COALESCE($8, blob_url),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(changes.title.as_deref())
        .bind(changes.report_type.as_deref())
        .bind(changes.subject_name.as_deref())
        .bind(changes.subject_info.as_deref())
        .bind(changes.notes.as_deref())
        .bind(changes.blob_url.as_deref())
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(name = "db.report.delete", skip(self))]
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<Report>, sqlx::Error> {
        sqlx::query_as::<_, Report>(&format!(
            "DELETE FROM reports WHERE id = $1 AND user_id = $2 RETURNING {REPORT_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(name = "db.report.list_by_owner", skip(self))]
    async fn list_by_owner(
        &self,
        user_id: Uuid,
        cursor: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<ReportSummary>, sqlx::Error> {
        match cursor {
            None => {
                sqlx::query_as::<_, ReportSummary>(&format!(
                    r#"
                    SELECT {SUMMARY_COLUMNS} FROM reports
                    WHERE user_id = $1
                    ORDER BY updated_at DESC, id DESC
                    LIMIT $2
                    "#
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            Some(PageCursor::After(at, id)) => {
                sqlx::query_as::<_, ReportSummary>(&format!(
                    r#"
                    SELECT {SUMMARY_COLUMNS} FROM reports
                    WHERE user_id = $1 AND (updated_at, id) < ($2, $3)
                    ORDER BY updated_at DESC, id DESC
                    LIMIT $4
                    "#
                ))
                .bind(user_id)
                .bind(at)
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            Some(PageCursor::Before(at, id)) => {
                sqlx::query_as::<_, ReportSummary>(&format!(
                    r#"
                    SELECT {SUMMARY_COLUMNS} FROM (
                        SELECT {SUMMARY_COLUMNS} FROM reports
                        WHERE user_id = $1 AND (updated_at, id) > ($2, $3)
                        ORDER BY updated_at ASC, id ASC
                        LIMIT $4
                    ) AS page
                    ORDER BY updated_at DESC, id DESC
                    "#
                ))
                .bind(user_id)
                .bind(at)
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
    }

    #[instrument(name = "db.ping", skip(self))]
    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
