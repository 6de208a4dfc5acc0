use std::sync::Arc;

use chrono::Utc;
use opentelemetry::KeyValue;
use uuid::Uuid;

use super::dispatch::{ContentDispatcher, GenerationRequest};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateReportInput, MAX_TYPE_TAG_LEN, NewReport, Report, ReportChanges, ReportDto, ReportType,
    SubjectInputs, UpdateReportInput, normalize_type_tag,
};
use crate::repository::ReportStore;
use crate::storage::{BlobStore, PutOptions, StorageError, VerifiedWriter, blob_key};
use crate::telemetry::{REPORTS_CREATED, REPORTS_REGENERATED, REPORTS_UPDATED};

/// Sequences generation, verified blob write and the relational write for
/// report creates and updates.
///
/// The record is only written once the body has been read back from the blob
/// store; any failure before that leaves the relational state untouched.
/// Concurrent updates of the same report are not coordinated: the last
/// relational write wins, whichever blob write it belongs to.
pub struct ReportPipeline {
    reports: Arc<dyn ReportStore>,
    blobs: Arc<dyn BlobStore>,
    writer: VerifiedWriter,
    dispatcher: ContentDispatcher,
}

impl ReportPipeline {
    pub fn new(
        reports: Arc<dyn ReportStore>,
        blobs: Arc<dyn BlobStore>,
        writer: VerifiedWriter,
        dispatcher: ContentDispatcher,
    ) -> Self {
        Self {
            reports,
            blobs,
            writer,
            dispatcher,
        }
    }

    #[tracing::instrument(
        name = "report.create",
        skip(self, input),
        fields(report.id, report.type_tag = input.report_type.as_deref().unwrap_or(""))
    )]
    pub async fn create(&self, user_id: Uuid, input: CreateReportInput) -> AppResult<ReportDto> {
        let title = required_title(&input.title)?;
        let type_tag = input.report_type.unwrap_or_default();
        check_type_tag(&type_tag)?;
        require_subject_info(&type_tag, &input.inputs)?;

        let body = self
            .dispatcher
            .dispatch(&GenerationRequest {
                report_type: type_tag.clone(),
                inputs: input.inputs.clone(),
                previous_content: input.content,
            })
            .await?;
        require_body(&body)?;

        let id = Uuid::new_v4();
        tracing::Span::current().record("report.id", tracing::field::display(id));

        let key = blob_key(user_id, Utc::now(), title);
        let blob_url = self
            .writer
            .write(&key, &body, PutOptions { overwrite: false })
            .await?;

        let stored_type = normalize_type_tag(&type_tag);
        let inserted = self
            .reports
            .insert(&NewReport {
                id,
                user_id,
                title,
                report_type: &stored_type,
                inputs: &input.inputs,
                blob_key: &key,
                blob_url: &blob_url,
            })
            .await;
        let report = match inserted {
            Ok(report) => report,
            Err(e) => {
                // nothing references the new blob yet
                if let Err(cleanup) = self.blobs.delete(&blob_url).await {
                    tracing::warn!(error = %cleanup, %blob_url, "Failed to remove orphaned blob");
                }
                return Err(e.into());
            }
        };

        REPORTS_CREATED.add(1, &[KeyValue::new("report.type", stored_type)]);
        tracing::info!(report_id = %report.id, %blob_url, "Report created");

        Ok(ReportDto::from_report(report, Some(body)))
    }

    #[tracing::instrument(
        name = "report.update",
        skip(self, input),
        fields(report.regenerate = input.regenerate)
    )]
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        input: UpdateReportInput,
    ) -> AppResult<ReportDto> {
        let existing = self
            .reports
            .find_owned(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

        if let Some(tag) = &input.report_type {
            check_type_tag(tag)?;
        }

        let regenerated = input.regenerate;
        let title = input
            .title
            .as_deref()
            .map(required_title)
            .transpose()?
            .map(str::to_string);

        let (changes, body) = if regenerated {
            let (changes, body) = self.regenerate(&existing, input).await?;
            (changes, Some(body))
        } else if let Some(content) = input.content {
            require_body(&content)?;
            let blob_url = self.overwrite(&existing, &content).await?;
            let changes = ReportChanges {
                report_type: input.report_type.as_deref().map(normalize_type_tag),
                subject_name: input.subject_name,
                subject_info: input.subject_info,
                notes: input.notes,
                blob_url: Some(blob_url),
                ..ReportChanges::default()
            };
            (changes, Some(content))
        } else if title.is_some() {
            (ReportChanges::default(), None)
        } else {
            return Err(AppError::Validation(
                "Either content, regenerate or title is required".to_string(),
            ));
        };

        let changes = ReportChanges { title, ..changes };

        let report = self
            .reports
            .update(id, user_id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;

        REPORTS_UPDATED.add(1, &[KeyValue::new("report.regenerated", regenerated)]);
        tracing::info!(report_id = %report.id, "Report updated");

        Ok(ReportDto::from_report(report, body))
    }

    async fn regenerate(
        &self,
        existing: &Report,
        input: UpdateReportInput,
    ) -> AppResult<(ReportChanges, String)> {
        let type_tag = input
            .report_type
            .unwrap_or_else(|| existing.report_type.clone());
        let inputs = SubjectInputs {
            subject_name: input
                .subject_name
                .unwrap_or_else(|| existing.subject_name.clone()),
            subject_info: input
                .subject_info
                .unwrap_or_else(|| existing.subject_info.clone()),
            notes: input.notes.unwrap_or_else(|| existing.notes.clone()),
        };
        require_subject_info(&type_tag, &inputs)?;

        let previous = self
            .blobs
            .get(&existing.blob_url)
            .await
            .map_err(StorageError::Read)?;

        let body = self
            .dispatcher
            .dispatch(&GenerationRequest {
                report_type: type_tag.clone(),
                inputs: inputs.clone(),
                previous_content: Some(previous),
            })
            .await?;
        require_body(&body)?;

        let blob_url = self.overwrite(existing, &body).await?;

        let stored_type = normalize_type_tag(&type_tag);
        REPORTS_REGENERATED.add(1, &[KeyValue::new("report.type", stored_type.clone())]);

        let changes = ReportChanges {
            report_type: Some(stored_type),
            subject_name: Some(inputs.subject_name),
            subject_info: Some(inputs.subject_info),
            notes: Some(inputs.notes),
            blob_url: Some(blob_url),
            ..ReportChanges::default()
        };

        Ok((changes, body))
    }

    async fn overwrite(&self, existing: &Report, body: &str) -> Result<String, StorageError> {
        self.writer
            .write(&existing.blob_key, body, PutOptions { overwrite: true })
            .await
    }
}

fn required_title(title: &str) -> AppResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    Ok(title)
}

fn check_type_tag(type_tag: &str) -> AppResult<()> {
    if type_tag.trim().chars().count() > MAX_TYPE_TAG_LEN {
        return Err(AppError::Validation(format!(
            "Report type must be at most {MAX_TYPE_TAG_LEN} characters"
        )));
    }
    Ok(())
}

/// Known report kinds are generated from the subject info, so it must be present.
fn require_subject_info(type_tag: &str, inputs: &SubjectInputs) -> AppResult<()> {
    if ReportType::parse(type_tag).is_some() && inputs.subject_info.trim().is_empty() {
        return Err(AppError::Validation(
            "Subject information is required".to_string(),
        ));
    }
    Ok(())
}

fn require_body(body: &str) -> AppResult<()> {
    if body.trim().is_empty() {
        return Err(AppError::Validation(
            "Report content is required".to_string(),
        ));
    }
    Ok(())
}
