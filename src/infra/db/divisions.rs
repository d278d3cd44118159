use async_trait::async_trait;
use tracing::instrument;

use crate::{
    application::repos::{DivisionDirectory, RepoError},
    domain::entities::EntityId,
};

use super::{PostgresRepositories, map_sqlx_error};

/// Division identity lookups against the `divisions` table.
#[derive(Clone)]
pub struct PostgresDivisions {
    repos: PostgresRepositories,
}

impl PostgresDivisions {
    pub fn new(repos: PostgresRepositories) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl DivisionDirectory for PostgresDivisions {
    #[instrument(skip(self))]
    async fn find_slug(&self, id: EntityId) -> Result<Option<String>, RepoError> {
        sqlx::query_scalar::<_, String>("SELECT slug FROM divisions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.repos.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
