use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{AnalysisReport, Project};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for storing and retrieving projects
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn save(&self, project: Project) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Project>>;
    async fn list(&self) -> Result<Vec<Project>>;
    /// Returns whether a project was removed.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Trait for storing and retrieving analysis reports
#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    async fn save(&self, report: AnalysisReport) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<AnalysisReport>>;
    async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<AnalysisReport>>;
    /// Removes every report of a project and returns how many were removed.
    async fn delete_for_project(&self, project_id: Uuid) -> Result<u64>;
}

/// In-memory implementation of both repositories
#[derive(Default)]
pub struct InMemoryStore {
    projects: Arc<DashMap<Uuid, Project>>,
    analyses: Arc<DashMap<Uuid, AnalysisReport>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryStore {
    async fn save(&self, project: Project) -> Result<()> {
        self.projects.insert(project.id, project);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Project>> {
        Ok(self.projects.get(&id).map(|entry| entry.clone()))
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.iter().map(|entry| entry.clone()).collect();
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.projects.remove(&id).is_some())
    }
}

#[async_trait]
impl AnalysisRepository for InMemoryStore {
    async fn save(&self, report: AnalysisReport) -> Result<()> {
        self.analyses.insert(report.id, report);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisReport>> {
        Ok(self.analyses.get(&id).map(|entry| entry.clone()))
    }

    async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<AnalysisReport>> {
        let mut reports: Vec<AnalysisReport> = self
            .analyses
            .iter()
            .filter(|entry| entry.project_id == Some(project_id))
            .map(|entry| entry.clone())
            .collect();
        reports.sort_by_key(|r| r.created_at);
        Ok(reports)
    }

    async fn delete_for_project(&self, project_id: Uuid) -> Result<u64> {
        let before = self.analyses.len();
        self.analyses
            .retain(|_, report| report.project_id != Some(project_id));
        Ok((before - self.analyses.len()) as u64)
    }
}

/// PostgreSQL implementation storing each record as a JSONB document
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected to PostgreSQL project storage");
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id UUID PRIMARY KEY,
                project_id UUID,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS analyses_project_id_idx ON analyses (project_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl ProjectRepository for PostgresStore {
    async fn save(&self, project: Project) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, data) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(project.id)
        .bind(Json(&project))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Project>> {
        let row: Option<(Json<Project>,)> =
            sqlx::query_as("SELECT data FROM projects WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(project),)| project))
    }

    async fn list(&self) -> Result<Vec<Project>> {
        let rows: Vec<(Json<Project>,)> =
            sqlx::query_as("SELECT data FROM projects ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(Json(project),)| project).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AnalysisRepository for PostgresStore {
    async fn save(&self, report: AnalysisReport) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analyses (id, project_id, data) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET project_id = EXCLUDED.project_id, data = EXCLUDED.data
            "#,
        )
        .bind(report.id)
        .bind(report.project_id)
        .bind(Json(&report))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AnalysisReport>> {
        let row: Option<(Json<AnalysisReport>,)> =
            sqlx::query_as("SELECT data FROM analyses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(report),)| report))
    }

    async fn list_for_project(&self, project_id: Uuid) -> Result<Vec<AnalysisReport>> {
        let rows: Vec<(Json<AnalysisReport>,)> =
            sqlx::query_as("SELECT data FROM analyses WHERE project_id = $1 ORDER BY created_at")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(Json(report),)| report).collect())
    }

    async fn delete_for_project(&self, project_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM analyses WHERE project_id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
