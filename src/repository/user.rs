use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::UserStore;
use crate::models::User;

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserRepository {
    #[instrument(name = "db.user.create", skip(self, password_hash))]
    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, first_name, last_name, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(first_name)
        .bind(last_name)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
    }

    #[instrument(name = "db.user.find_by_name", skip(self))]
    async fn find_by_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, password_hash, created_at
            FROM users
            WHERE first_name = $1 AND last_name = $2
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .fetch_optional(&self.pool)
        .await
    }

    #[instrument(name = "db.user.find_by_id", skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, first_name, last_name, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}
