//! Audit log repository

use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        system_log::{LogQuery, NewSystemLog},
        PageParams, SystemLog,
    },
};

#[derive(Clone)]
pub struct SystemLogsRepository {
    pool: Pool<Postgres>,
}

impl SystemLogsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, entry: &NewSystemLog) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO system_logs (user_id, action, entity_type, entity_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.action.entity_type())
        .bind(entry.entity_id)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self, query: &LogQuery, page: &PageParams) -> AppResult<(Vec<SystemLog>, i64)> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.action.is_some() {
            conditions.push(format!("action = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("user_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM system_logs {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(ref action) = query.action { count_builder = count_builder.bind(action); }
        if let Some(user_id) = query.user_id { count_builder = count_builder.bind(user_id); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM system_logs {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            where_clause,
            page.limit,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, SystemLog>(&select_q);
        if let Some(ref action) = query.action { builder = builder.bind(action); }
        if let Some(user_id) = query.user_id { builder = builder.bind(user_id); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }
}
