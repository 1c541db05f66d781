//! Business logic services

pub mod audit;
pub mod auth;
pub mod borrows;
pub mod catalog;
pub mod categories;
pub mod email;
pub mod users;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub categories: categories::CategoriesService,
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowsService,
    pub audit: audit::AuditService,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let email = email::EmailService::from_config(&config.email)?;
        Ok(Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            users: users::UsersService::new(repository.clone()),
            categories: categories::CategoriesService::new(repository.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            borrows: borrows::BorrowsService::new(
                repository.clone(),
                config.borrowing.clone(),
                email,
            ),
            audit: audit::AuditService::new(repository.clone()),
            repository,
        })
    }

    /// Whether the database answers
    pub async fn database_ready(&self) -> bool {
        self.repository.ping().await
    }
}
