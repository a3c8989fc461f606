//! Persistence for the Argus backend.
//!
//! [`Store`] is the seam the HTTP layer depends on; [`PostgresStore`] is the
//! production implementation. Handlers never see SQL.

pub mod keys;
pub mod postgres;

pub use keys::generate_api_key;
pub use postgres::PostgresStore;

use argus_core::{AnalysisRequest, AnalysisResponse, Project, StoreError};
use async_trait::async_trait;
use uuid::Uuid;

/// Project lifecycle and threat-log persistence.
///
/// Mutations are scoped by `user_id`: touching another user's project is
/// indistinguishable from the project not existing.
#[async_trait]
pub trait Store: Send + Sync {
    /// Resolve an SDK API key to its project. Unknown key → [`StoreError::NotFound`].
    async fn get_project_id_by_key(&self, api_key: &str) -> Result<Uuid, StoreError>;

    async fn create_project(&self, user_id: Uuid, name: &str) -> Result<Project, StoreError>;

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError>;

    async fn rename_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        name: &str,
    ) -> Result<Project, StoreError>;

    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> Result<(), StoreError>;

    /// Replace the project's API key atomically; previous keys stop resolving.
    async fn rotate_api_key(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<String, StoreError>;

    /// Delete every project the user owns; threat logs cascade.
    async fn delete_account(&self, user_id: Uuid) -> Result<(), StoreError>;

    /// Persist one mediated request and its verdict. The verdict must be
    /// complete (all three fields present).
    async fn save_threat(
        &self,
        project_id: Uuid,
        request: &AnalysisRequest,
        response: &AnalysisResponse,
    ) -> Result<(), StoreError>;
}
