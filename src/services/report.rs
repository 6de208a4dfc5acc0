use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        CreateReportInput, ListReportsQuery, PageCursor, ReportDto, ReportResponse,
        ReportsResponse, UpdateReportInput,
    },
    pipeline::ReportPipeline,
    repository::ReportStore,
    storage::BlobStore,
    telemetry::REPORTS_DELETED,
};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct ReportService {
    reports: Arc<dyn ReportStore>,
    blobs: Arc<dyn BlobStore>,
    pipeline: Arc<ReportPipeline>,
}

impl ReportService {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        blobs: Arc<dyn BlobStore>,
        pipeline: Arc<ReportPipeline>,
    ) -> Self {
        Self {
            reports,
            blobs,
            pipeline,
        }
    }

    pub async fn create(&self, user_id: Uuid, input: CreateReportInput) -> AppResult<ReportResponse> {
        let report = self.pipeline.create(user_id, input).await?;
        Ok(ReportResponse { report })
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateReportInput,
    ) -> AppResult<ReportResponse> {
        let report = self.pipeline.update(user_id, id, input).await?;
        Ok(ReportResponse { report })
    }

    /// The record plus its body. An unreadable body is logged and served as empty
    /// so the metadata stays reachable.
    #[instrument(name = "report.get", skip(self))]
    pub async fn get(&self, user_id: Uuid, id: Uuid) -> AppResult<ReportResponse> {
        let report = self
            .reports
            .find_owned(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

        let content = match self.blobs.get(&report.blob_url).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(report_id = %id, blob_url = %report.blob_url, error = %e, "Failed to fetch report content");
                String::new()
            }
        };

        Ok(ReportResponse {
            report: ReportDto::from_report(report, Some(content)),
        })
    }

    #[instrument(name = "report.list", skip(self, query), fields(limit = query.limit))]
    pub async fn list(&self, user_id: Uuid, query: ListReportsQuery) -> AppResult<ReportsResponse> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

        let cursor = match (query.starting_after, query.ending_before) {
            (Some(_), Some(_)) => {
                return Err(AppError::Validation(
                    "Only one of starting_after or ending_before may be provided".to_string(),
                ));
            }
            (Some(after), None) => {
                Some(PageCursor::After(self.cursor_time(user_id, after).await?, after))
            }
            (None, Some(before)) => {
                Some(PageCursor::Before(self.cursor_time(user_id, before).await?, before))
            }
            (None, None) => None,
        };

        let mut reports = self
            .reports
            .list_by_owner(user_id, cursor, limit + 1)
            .await?;

        let has_more = reports.len() as i64 > limit;
        if has_more {
            match cursor {
                // rows were taken nearest-first above the cursor, so the extra one is the newest
                Some(PageCursor::Before(..)) => {
                    reports.remove(0);
                }
                _ => reports.truncate(limit as usize),
            }
        }

        Ok(ReportsResponse { reports, has_more })
    }

    #[instrument(name = "report.delete", skip(self))]
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> AppResult<()> {
        let report = self
            .reports
            .delete(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

        // best effort; the record is already gone
        if let Err(e) = self.blobs.delete(&report.blob_url).await {
            tracing::warn!(report_id = %id, blob_url = %report.blob_url, error = %e, "Failed to delete report body");
        }

        REPORTS_DELETED.add(1, &[]);
        tracing::info!(report_id = %id, "Report deleted");

        Ok(())
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.reports.ping().await?;
        Ok(())
    }

    async fn cursor_time(
        &self,
        user_id: Uuid,
        cursor_id: Uuid,
    ) -> AppResult<chrono::DateTime<chrono::Utc>> {
        self.reports
            .find_owned(cursor_id, user_id)
            .await?
            .map(|report| report.updated_at)
            .ok_or_else(|| AppError::NotFound(format!("Report {cursor_id} not found")))
    }
}
