use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, error, info};

use crate::{
    store::{
        NewWorkflow, StepPayload, StepRecord, Store, WorkflowRecord, DEFAULT_WORKFLOW_PROTECTED,
        LAST_WORKFLOW_PROTECTED,
    },
    workflow::{StepConfig, StepType},
    Error, Result,
};

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to SQLite database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every connection to an in-memory database sees its own copy unless
        // the pool is pinned to a single long-lived connection.
        let in_memory = database_url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            error!("Failed to connect to SQLite: {}", e);
            Error::Sqlx(e)
        })?;

        Ok(Self { pool })
    }

    fn step_from_row(r: &SqliteRow) -> Result<StepRecord> {
        let config: StepConfig = serde_json::from_str(r.get("config"))?;
        let order = u32::try_from(r.get::<i64, _>("step_order"))
            .map_err(|_| Error::Persistence("stored step order is out of range".into()))?;

        Ok(StepRecord {
            id: r.get("id"),
            name: r.get("name"),
            step_type: r.get::<String, _>("step_type").parse::<StepType>()?,
            order,
            config,
        })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRecord>> {
        debug!("Listing workflows");

        let step_rows = sqlx::query(
            r#"
            SELECT id, workflow_id, name, step_type, step_order, config
            FROM workflow_steps
            ORDER BY workflow_id, step_order, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut steps_by_workflow: HashMap<i64, Vec<StepRecord>> = HashMap::new();
        for row in &step_rows {
            steps_by_workflow
                .entry(row.get("workflow_id"))
                .or_default()
                .push(Self::step_from_row(row)?);
        }

        let rows = sqlx::query(
            r#"
            SELECT id, name, description, is_default, created_at, updated_at
            FROM workflows
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let workflows = rows
            .into_iter()
            .map(|r| {
                let id: i64 = r.get("id");
                WorkflowRecord {
                    id,
                    name: r.get("name"),
                    description: r.get("description"),
                    is_default: r.get("is_default"),
                    steps: steps_by_workflow.remove(&id).unwrap_or_default(),
                    created_at: r.get("created_at"),
                    updated_at: r.get("updated_at"),
                }
            })
            .collect();

        Ok(workflows)
    }

    async fn create_workflow(&self, workflow: NewWorkflow) -> Result<WorkflowRecord> {
        debug!("Creating workflow: {}", workflow.name);

        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO workflows (name, description, is_default, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&workflow.name)
        .bind(&workflow.description)
        .bind(false)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(WorkflowRecord {
            id,
            name: workflow.name,
            description: workflow.description,
            is_default: false,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn replace_steps(&self, workflow_id: i64, steps: Vec<StepPayload>) -> Result<()> {
        debug!("Replacing steps of workflow {} ({} steps)", workflow_id, steps.len());

        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM workflows WHERE id = ?1")
            .bind(workflow_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))?;

        sqlx::query("DELETE FROM workflow_steps WHERE workflow_id = ?1")
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?;

        for step in &steps {
            let config_json = serde_json::to_string(&step.config)?;
            sqlx::query(
                r#"
                INSERT INTO workflow_steps (workflow_id, name, step_type, step_order, config)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(workflow_id)
            .bind(&step.name)
            .bind(step.step_type.to_string())
            .bind(i64::from(step.order))
            .bind(config_json)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE workflows SET updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_default(&self, workflow_id: i64) -> Result<()> {
        debug!("Setting default workflow: {}", workflow_id);

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE workflows SET is_default = ?1 WHERE is_default = ?2")
            .bind(false)
            .bind(true)
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query("UPDATE workflows SET is_default = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(true)
            .bind(Utc::now())
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if updated == 0 {
            // Dropping the transaction rolls back the cleared flags
            return Err(Error::NotFound(format!("workflow {}", workflow_id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_workflow(&self, workflow_id: i64) -> Result<()> {
        debug!("Deleting workflow: {}", workflow_id);

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT is_default FROM workflows WHERE id = ?1")
            .bind(workflow_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("workflow {}", workflow_id)))?;
        if row.get::<bool, _>("is_default") {
            return Err(Error::Conflict(DEFAULT_WORKFLOW_PROTECTED.to_string()));
        }

        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM workflows")
            .fetch_one(&mut *tx)
            .await?
            .get("count");
        if count <= 1 {
            return Err(Error::Conflict(LAST_WORKFLOW_PROTECTED.to_string()));
        }

        sqlx::query("DELETE FROM workflow_steps WHERE workflow_id = ?1")
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM workflows WHERE id = ?1")
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
