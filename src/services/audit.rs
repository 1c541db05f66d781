//! Audit trail service

use crate::{
    error::AppResult,
    models::{
        system_log::{LogPage, LogQuery, NewSystemLog},
        PageParams, Pagination,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuditService {
    repository: Repository,
}

impl AuditService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Write an audit entry. Failures are logged and never reach the caller.
    pub async fn record(&self, entry: NewSystemLog) {
        if let Err(e) = self.repository.system_logs.insert(&entry).await {
            tracing::warn!(action = %entry.action, error = %e, "Failed to write audit log");
        }
    }

    pub async fn list(&self, query: &LogQuery) -> AppResult<LogPage> {
        let page = PageParams::resolve(query.page, query.limit, 20);
        let (logs, total) = self.repository.system_logs.list(query, &page).await?;
        Ok(LogPage {
            logs,
            pagination: Pagination::new(total, &page),
        })
    }
}
