mod report;
mod user;

pub use report::PgReportRepository;
pub use user::PgUserRepository;

use uuid::Uuid;

use crate::models::{NewReport, PageCursor, Report, ReportChanges, ReportSummary, User};

/// Relational store for report metadata. Every lookup is scoped to the owner.
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert(&self, report: &NewReport<'_>) -> Result<Report, sqlx::Error>;

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Report>, sqlx::Error>;

    /// Applies `changes` and bumps `updated_at`. `None` when no owned row matched.
    async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: &ReportChanges,
    ) -> Result<Option<Report>, sqlx::Error>;

    /// Removes the row and returns it, so the caller can clean up the body.
    async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<Option<Report>, sqlx::Error>;

    /// Up to `limit` summaries newest-first, taken from the rows adjacent to the cursor
    /// (the newest rows when there is none).
    async fn list_by_owner(
        &self,
        user_id: Uuid,
        cursor: Option<PageCursor>,
        limit: i64,
    ) -> Result<Vec<ReportSummary>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error>;

    async fn find_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;
}
