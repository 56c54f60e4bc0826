//! SQL persistence backend (MySQL/PostgreSQL via SeaORM)
//!
//! `ExternalDbPersistService` wraps a SeaORM `DatabaseConnection` and
//! implements every persistence trait. Reconciliation batches are applied in
//! single transactions so a half-updated view is never visible.

mod catalog;
mod eureka;
mod event;
mod haproxy;
mod instance;
mod mapping;
mod server;
mod tag;
mod task;

use async_trait::async_trait;
use sea_orm::{prelude::Expr, *};

use crate::entity::server as server_entity;
use crate::traits::PersistenceService;

/// External database persistence service
pub struct ExternalDbPersistService {
    db: DatabaseConnection,
}

impl ExternalDbPersistService {
    /// Create a new service over an established connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Get a reference to the underlying database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl PersistenceService for ExternalDbPersistService {
    async fn health_check(&self) -> anyhow::Result<()> {
        server_entity::Entity::find()
            .select_only()
            .column_as(Expr::cust("1"), "health")
            .into_tuple::<i32>()
            .one(&self.db)
            .await?;
        Ok(())
    }
}

/// Escape SQL wildcard characters in user-provided search text
#[inline]
pub(crate) fn escape_sql_like_pattern(input: &str) -> String {
    input.replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_sql_like_pattern() {
        assert_eq!(escape_sql_like_pattern("plain"), "plain");
        assert_eq!(escape_sql_like_pattern("100%"), "100\\%");
        assert_eq!(escape_sql_like_pattern("a_b"), "a\\_b");
    }
}
