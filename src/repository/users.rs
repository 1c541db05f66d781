//! Users repository

use sqlx::{Pool, Postgres};

use crate::{
    error::{conflict_on_unique, AppError, AppResult},
    models::{
        user::{RoleCount, UserQuery},
        PageParams, Role, User, UserStatus,
    },
};

/// Columns of a new account
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub phone: Option<&'a str>,
    pub role: Role,
}

/// Profile fields that changed; `None` leaves the column untouched
#[derive(Default)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Which of username/email is already taken, if any
    pub async fn find_conflict(&self, username: &str, email: &str) -> AppResult<Option<&'static str>> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT username = $1 AS username_taken
            FROM users
            WHERE username = $1 OR LOWER(email) = LOWER($2)
            ORDER BY username_taken DESC
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(username_taken,)| {
            if username_taken {
                "Username already exists"
            } else {
                "Email already registered"
            }
        }))
    }

    pub async fn email_taken_by_other(&self, email: &str, user_id: i32) -> AppResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id <> $2)",
        )
        .bind(email)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    pub async fn create(&self, data: &NewUser<'_>) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, full_name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.full_name)
        .bind(data.phone)
        .bind(data.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Username or email already exists"))
    }

    /// Apply profile changes
    pub async fn update_profile(&self, id: i32, changes: &ProfileChanges) -> AppResult<User> {
        let mut sets = vec!["updated_at = NOW()".to_string()];
        let mut idx = 1;

        macro_rules! add_f {
            ($field:expr, $name:expr) => {
                if $field.is_some() { sets.push(format!("{} = ${}", $name, idx)); idx += 1; }
            };
        }

        add_f!(changes.full_name, "full_name");
        add_f!(changes.phone, "phone");
        add_f!(changes.email, "email");
        add_f!(changes.password_hash, "password");

        let query = format!("UPDATE users SET {} WHERE id = ${} RETURNING *", sets.join(", "), idx);
        let mut builder = sqlx::query_as::<_, User>(&query);

        macro_rules! bind_f {
            ($field:expr) => {
                if let Some(ref val) = $field { builder = builder.bind(val); }
            };
        }

        bind_f!(changes.full_name);
        bind_f!(changes.phone);
        bind_f!(changes.email);
        bind_f!(changes.password_hash);

        builder
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "Email already registered"))?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// List users with optional filters and pagination
    pub async fn list(&self, query: &UserQuery, page: &PageParams) -> AppResult<(Vec<User>, i64)> {
        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.role.is_some() {
            conditions.push(format!("role = ${}", idx));
            idx += 1;
        }
        if query.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        let keyword = query
            .keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", k));
        if keyword.is_some() {
            conditions.push(format!(
                "(username ILIKE ${0} OR email ILIKE ${0} OR full_name ILIKE ${0})",
                idx
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM users {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(role) = query.role { count_builder = count_builder.bind(role); }
        if let Some(status) = query.status { count_builder = count_builder.bind(status); }
        if let Some(ref kw) = keyword { count_builder = count_builder.bind(kw); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM users {} ORDER BY created_at DESC LIMIT {} OFFSET {}",
            where_clause,
            page.limit,
            page.offset()
        );
        let mut builder = sqlx::query_as::<_, User>(&select_q);
        if let Some(role) = query.role { builder = builder.bind(role); }
        if let Some(status) = query.status { builder = builder.bind(status); }
        if let Some(ref kw) = keyword { builder = builder.bind(kw); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    pub async fn update_status(&self, id: i32, status: UserStatus) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    pub async fn update_role(&self, id: i32, role: Role) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    /// Set the borrowing quota; refused below the number of books currently held
    pub async fn update_max_books(&self, id: i32, max_books: i32) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if max_books < user.borrow_count {
            return Err(AppError::BusinessRule(format!(
                "Quota cannot be lower than the {} books currently borrowed",
                user.borrow_count
            )));
        }

        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET max_books = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(max_books)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(user)
    }

    /// Delete a user that holds no books
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let active = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM borrow_records
            WHERE user_id = $1 AND return_date IS NULL
              AND status IN ('borrowed', 'renewed', 'overdue')
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Err(AppError::BusinessRule(format!(
                "User still has {} borrowed book(s)",
                active
            )));
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// (total, active, created this month)
    pub async fn counts(&self) -> AppResult<(i64, i64, i64)> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'active'),
                COUNT(*) FILTER (WHERE created_at >= date_trunc('month', NOW()))
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn role_counts(&self) -> AppResult<Vec<RoleCount>> {
        let rows = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn top_borrowers(&self, limit: i64) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE borrow_count > 0 ORDER BY borrow_count DESC, id LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
