//! PostgreSQL store.
//!
//! Full CRUD via `sqlx`. The schema lives in `migrations/001_init.sql` and
//! is applied with [`PostgresStore::migrate`] at startup.

use argus_core::{AnalysisRequest, AnalysisResponse, Project, StoreError};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::info;
use uuid::Uuid;

use crate::keys::generate_api_key;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a bounded pool.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Storage(format!("PostgreSQL connection failed: {e}")))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create from an existing connection pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the schema migration.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let migration_sql = include_str!("../migrations/001_init.sql");

        sqlx::raw_sql(migration_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        info!("Schema migration complete");
        Ok(())
    }

    fn project_from_row(row: &PgRow) -> Result<Project, StoreError> {
        Ok(Project {
            id: row.try_get("id").map_err(storage_err)?,
            user_id: row.try_get("user_id").map_err(storage_err)?,
            name: row.try_get("name").map_err(storage_err)?,
            api_key: row.try_get("api_key").map_err(storage_err)?,
            created_at: row.try_get("created_at").map_err(storage_err)?,
        })
    }
}

fn storage_err(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// HTTP method from the synthetic header the sidecar injects.
fn request_method(request: &AnalysisRequest) -> &str {
    request
        .headers
        .get("Method")
        .map(String::as_str)
        .unwrap_or("UNKNOWN")
}

#[async_trait]
impl crate::Store for PostgresStore {
    async fn get_project_id_by_key(&self, api_key: &str) -> Result<Uuid, StoreError> {
        let row = sqlx::query("SELECT id FROM projects WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => row.try_get("id").map_err(storage_err),
            None => Err(StoreError::NotFound),
        }
    }

    async fn create_project(&self, user_id: Uuid, name: &str) -> Result<Project, StoreError> {
        let id = Uuid::new_v4();
        let api_key = generate_api_key()?;

        let row = sqlx::query(
            "INSERT INTO projects (id, user_id, name, api_key) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, name, api_key, created_at",
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(&api_key)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;

        info!(project_id = %id, "project created");
        Self::project_from_row(&row)
    }

    async fn list_projects(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, name, api_key, created_at \
             FROM projects WHERE user_id = $1 \
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(Self::project_from_row).collect()
    }

    async fn rename_project(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        name: &str,
    ) -> Result<Project, StoreError> {
        let row = sqlx::query(
            "UPDATE projects SET name = $1 \
             WHERE id = $2 AND user_id = $3 \
             RETURNING id, user_id, name, api_key, created_at",
        )
        .bind(name)
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => Self::project_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        info!(project_id = %project_id, "project deleted");
        Ok(())
    }

    async fn rotate_api_key(
        &self,
        user_id: Uuid,
        project_id: Uuid,
    ) -> Result<String, StoreError> {
        let api_key = generate_api_key()?;

        let result = sqlx::query("UPDATE projects SET api_key = $1 WHERE id = $2 AND user_id = $3")
            .bind(&api_key)
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        info!(project_id = %project_id, "api key rotated");
        Ok(api_key)
    }

    async fn delete_account(&self, user_id: Uuid) -> Result<(), StoreError> {
        // Threat logs cascade with each project row.
        sqlx::query("DELETE FROM projects WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        info!(user_id = %user_id, "account projects deleted");
        Ok(())
    }

    async fn save_threat(
        &self,
        project_id: Uuid,
        request: &AnalysisRequest,
        response: &AnalysisResponse,
    ) -> Result<(), StoreError> {
        let (Some(is_threat), Some(reason), Some(confidence)) = (
            response.is_threat,
            response.reason.as_deref(),
            response.confidence,
        ) else {
            return Err(StoreError::IncompleteVerdict);
        };

        let method = request_method(request);

        let headers_json =
            serde_json::to_value(&request.headers).map_err(|e| StoreError::Storage(e.to_string()))?;
        let metadata_json = serde_json::to_value(&request.metadata)
            .map_err(|e| StoreError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO threat_logs (\
                id, project_id, ip, route, method, headers, metadata, \
                payload, is_threat, reason, confidence, timestamp\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(&request.ip)
        .bind(&request.route)
        .bind(method)
        .bind(headers_json)
        .bind(metadata_json)
        .bind(&request.log)
        .bind(is_threat)
        .bind(reason)
        .bind(confidence)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request_with_headers(headers: HashMap<String, String>) -> AnalysisRequest {
        AnalysisRequest {
            log: String::new(),
            ip: "127.0.0.1:9".into(),
            headers,
            route: "/".into(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn method_comes_from_synthetic_header() {
        let mut headers = HashMap::new();
        headers.insert("Method".to_string(), "PATCH".to_string());
        assert_eq!(request_method(&request_with_headers(headers)), "PATCH");
    }

    #[test]
    fn missing_method_falls_back_to_unknown() {
        assert_eq!(
            request_method(&request_with_headers(HashMap::new())),
            "UNKNOWN"
        );
    }
}
