use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Closed set of document kinds, each backed by its own prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportType {
    Referto,
    Nota,
    Esame,
}

impl ReportType {
    /// Case-insensitive; `CHIRURGIA` is the client-side name for `ESAME`.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "REFERTO" => Some(Self::Referto),
            "NOTA" => Some(Self::Nota),
            "ESAME" | "CHIRURGIA" => Some(Self::Esame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Referto => "REFERTO",
            Self::Nota => "NOTA",
            Self::Esame => "ESAME",
        }
    }

    pub fn template_name(&self) -> &'static str {
        match self {
            Self::Referto => "generazione-referto",
            Self::Nota => "generazione-nota",
            Self::Esame => "generazione-esame",
        }
    }
}

/// Longest type tag the `reports.report_type` column holds, in characters.
pub const MAX_TYPE_TAG_LEN: usize = 64;

/// Stored form of a type tag: canonical for known kinds, trimmed verbatim otherwise.
pub fn normalize_type_tag(tag: &str) -> String {
    ReportType::parse(tag)
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| tag.trim().to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInputs {
    #[serde(default, alias = "docName")]
    pub subject_name: String,
    #[serde(default, alias = "informazioni")]
    pub subject_info: String,
    #[serde(default, alias = "note")]
    pub notes: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub report_type: String,
    pub subject_name: String,
    pub subject_info: String,
    pub notes: String,
    pub blob_key: String,
    pub blob_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: Uuid,
    pub title: String,
    pub report_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewReport<'a> {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: &'a str,
    pub report_type: &'a str,
    pub inputs: &'a SubjectInputs,
    pub blob_key: &'a str,
    pub blob_url: &'a str,
}

/// Column replacements for an update; `None` keeps the stored value.
/// `updated_at` is always bumped.
#[derive(Debug, Clone, Default)]
pub struct ReportChanges {
    pub title: Option<String>,
    pub report_type: Option<String>,
    pub subject_name: Option<String>,
    pub subject_info: Option<String>,
    pub notes: Option<String>,
    pub blob_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    /// Rows strictly older than the cursor row, ordered by `(updated_at, id)`.
    After(DateTime<Utc>, Uuid),
    /// Rows strictly newer than the cursor row.
    Before(DateTime<Utc>, Uuid),
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report: ReportDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsResponse {
    pub reports: Vec<ReportSummary>,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDto {
    pub id: Uuid,
    pub title: String,
    pub report_type: String,
    pub subject_name: String,
    pub subject_info: String,
    pub notes: String,
    pub blob_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReportDto {
    pub fn from_report(report: Report, content: Option<String>) -> Self {
        Self {
            id: report.id,
            title: report.title,
            report_type: report.report_type,
            subject_name: report.subject_name,
            subject_info: report.subject_info,
            notes: report.notes,
            blob_url: report.blob_url,
            content,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportInput {
    pub title: String,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(flatten)]
    pub inputs: SubjectInputs,
    /// Manually written body; kept verbatim when no known type tag is given.
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub regenerate: bool,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default, alias = "docName")]
    pub subject_name: Option<String>,
    #[serde(default, alias = "informazioni")]
    pub subject_info: Option<String>,
    #[serde(default, alias = "note")]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListReportsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub starting_after: Option<Uuid>,
    pub ending_before: Option<Uuid>,
}

fn default_limit() -> i64 {
    20
}
