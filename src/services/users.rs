//! User administration and dashboards

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{AdminUserStatistics, UserClaims, UserPage, UserQuery, UserStatistics},
        PageParams, Pagination, Role, User, UserStatus,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
}

/// Admins may not lock themselves out
fn ensure_not_self(claims: &UserClaims, target_id: i32, what: &str) -> AppResult<()> {
    if claims.user_id == target_id {
        return Err(AppError::BusinessRule(format!("You cannot {} your own account", what)));
    }
    Ok(())
}

impl UsersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Personal dashboard of the caller
    pub async fn statistics(&self, user_id: i32) -> AppResult<UserStatistics> {
        let borrows = self.repository.borrows.statistics(Some(user_id)).await?;
        let favorite_count = self.repository.favorites.count_for_user(user_id).await?;
        let recent_borrows = self.repository.borrows.recent_for_user(user_id, 5).await?;

        Ok(UserStatistics {
            total_borrows: borrows.total_borrows,
            active_borrows: borrows.active_borrows,
            overdue_borrows: borrows.overdue_borrows,
            favorite_count,
            recent_borrows,
        })
    }

    pub async fn list(&self, query: &UserQuery) -> AppResult<UserPage> {
        let page = PageParams::resolve(query.page, query.limit, 10);
        let (users, total) = self.repository.users.list(query, &page).await?;
        Ok(UserPage {
            users,
            pagination: Pagination::new(total, &page),
        })
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn update_status(&self, claims: &UserClaims, id: i32, status: UserStatus) -> AppResult<User> {
        ensure_not_self(claims, id, "change the status of")?;
        self.repository.users.update_status(id, status).await
    }

    pub async fn update_role(&self, claims: &UserClaims, id: i32, role: Role) -> AppResult<User> {
        ensure_not_self(claims, id, "change the role of")?;
        self.repository.users.update_role(id, role).await
    }

    pub async fn update_max_books(&self, id: i32, max_books: i32) -> AppResult<User> {
        self.repository.users.update_max_books(id, max_books).await
    }

    pub async fn delete(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        ensure_not_self(claims, id, "delete")?;
        self.repository.users.delete(id).await
    }

    pub async fn admin_statistics(&self) -> AppResult<AdminUserStatistics> {
        let (total_users, active_users, new_users_this_month) = self.repository.users.counts().await?;
        let role_stats = self.repository.users.role_counts().await?;
        let top_borrowers = self.repository.users.top_borrowers(10).await?;

        Ok(AdminUserStatistics {
            total_users,
            active_users,
            new_users_this_month,
            role_stats,
            top_borrowers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_claims(user_id: i32) -> UserClaims {
        UserClaims {
            sub: user_id.to_string(),
            user_id,
            email: "admin@example.com".to_string(),
            role: Role::Admin,
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_admin_cannot_target_self() {
        let claims = admin_claims(1);
        assert!(matches!(
            ensure_not_self(&claims, 1, "delete"),
            Err(AppError::BusinessRule(ref m)) if m == "You cannot delete your own account"
        ));
        assert!(ensure_not_self(&claims, 2, "delete").is_ok());
    }
}
