use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::models::{
    Graph, GraphDefinition, GraphIcon, GraphId, MetadataPatch, UserDocument, UserId,
};
use crate::store::{GraphStore, missing_document, missing_graph};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_graph_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    tracing::info!(migrations = MIGRATOR.iter().count(), "graph_anything schema ready");
    Ok(())
}

#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
}

#[derive(Debug, Clone, FromRow)]
struct GraphRow {
    graph_id: String,
    title: String,
    x_label: String,
    y_label: String,
    icon: Option<Json<GraphIcon>>,
    revision: i64,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct PointRow {
    graph_id: String,
    value: f64,
}

fn hydrate_graph(row: GraphRow, data: Vec<f64>) -> Graph {
    Graph {
        graph_id: GraphId(row.graph_id),
        title: row.title,
        x_label: row.x_label,
        y_label: row.y_label,
        emoji: row.icon.map(|icon| icon.0),
        data,
        revision: row.revision.max(0) as u64,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn hydrate_graphs(rows: Vec<GraphRow>, points: Vec<PointRow>) -> Vec<Graph> {
    let mut series: HashMap<String, Vec<f64>> = HashMap::with_capacity(rows.len());
    for point in points {
        series.entry(point.graph_id).or_default().push(point.value);
    }
    rows.into_iter()
        .map(|row| {
            let data = series.remove(&row.graph_id).unwrap_or_default();
            hydrate_graph(row, data)
        })
        .collect()
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

fn write_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::write_failed(public, anyhow!(err))
}

/// Postgres-backed [`GraphStore`].
///
/// Points live in an append-only child table keyed by position; appends lock
/// the parent graph row for the duration of the insert.
#[derive(Clone)]
pub struct PgGraphStore {
    pool: Arc<PgPool>,
}

impl PgGraphStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn from_pool(pool: &PgPool) -> Self {
        Self {
            pool: Arc::new(pool.clone()),
        }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    async fn document_exists(&self, user_id: UserId) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM graph_anything.users
                WHERE id = $1
            )
            "#,
        )
        .bind(user_id.0)
        .fetch_one(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to query user document", err))?;

        Ok(exists.0)
    }

    /// Picks the error for a graph lookup that matched no row.
    async fn missing(&self, user_id: UserId, graph_id: &GraphId) -> LibError {
        match self.document_exists(user_id).await {
            Ok(true) => missing_graph(user_id, graph_id),
            Ok(false) => missing_document(user_id),
            Err(err) => err,
        }
    }

    async fn load_graphs(&self, user_id: UserId) -> Result<Vec<Graph>> {
        let rows = sqlx::query_as::<_, GraphRow>(
            r#"
            SELECT graph_id, title, x_label, y_label, icon, revision, created_at, updated_at
            FROM graph_anything.graphs
            WHERE user_id = $1
            ORDER BY created_at ASC, graph_id ASC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to fetch graphs. Please try again.", err))?;

        let points = sqlx::query_as::<_, PointRow>(
            r#"
            SELECT graph_id, value
            FROM graph_anything.graph_points
            WHERE user_id = $1
            ORDER BY graph_id ASC, position ASC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to fetch graphs. Please try again.", err))?;

        Ok(hydrate_graphs(rows, points))
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn upsert_user_document(
        &self,
        user_id: UserId,
        email: &str,
        display_name: &str,
    ) -> Result<UserDocument> {
        sqlx::query(
            r#"
            INSERT INTO graph_anything.users (id, email, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                display_name = EXCLUDED.display_name,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id.0)
        .bind(email)
        .bind(display_name)
        .execute(&*self.pool)
        .await
        .map_err(|err| write_err("Failed to save user profile", err))?;

        self.fetch_user_document(user_id).await
    }

    async fn fetch_user_document(&self, user_id: UserId) -> Result<UserDocument> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, display_name
            FROM graph_anything.users
            WHERE id = $1
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to query user document", err))?
        .ok_or_else(|| missing_document(user_id))?;

        let graphs = self.load_graphs(user_id).await?;
        Ok(UserDocument {
            user_id: UserId(row.id),
            email: row.email,
            display_name: row.display_name,
            graphs,
        })
    }

    async fn fetch_graphs(&self, user_id: UserId) -> Result<Vec<Graph>> {
        if !self.document_exists(user_id).await? {
            return Err(missing_document(user_id));
        }
        self.load_graphs(user_id).await
    }

    async fn fetch_graph(&self, user_id: UserId, graph_id: &GraphId) -> Result<Graph> {
        let row = sqlx::query_as::<_, GraphRow>(
            r#"
            SELECT graph_id, title, x_label, y_label, icon, revision, created_at, updated_at
            FROM graph_anything.graphs
            WHERE user_id = $1
              AND graph_id = $2
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to fetch graph. Please try again.", err))?;

        let Some(row) = row else {
            return Err(self.missing(user_id, graph_id).await);
        };

        let data: Vec<(f64,)> = sqlx::query_as(
            r#"
            SELECT value
            FROM graph_anything.graph_points
            WHERE user_id = $1
              AND graph_id = $2
            ORDER BY position ASC
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to fetch graph. Please try again.", err))?;

        Ok(hydrate_graph(
            row,
            data.into_iter().map(|(value,)| value).collect(),
        ))
    }

    async fn create_graph(&self, user_id: UserId, definition: GraphDefinition) -> Result<Graph> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| write_err("Failed to start transaction", err))?;

        // Serializes id assignment for this user.
        let owner: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM graph_anything.users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to query user document", err))?;
        if owner.is_none() {
            return Err(missing_document(user_id));
        }

        let taken: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT graph_id
            FROM graph_anything.graphs
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to query graphs", err))?;
        let taken: Vec<GraphId> = taken.into_iter().map(|(id,)| GraphId(id)).collect();
        let graph_id = GraphId::generate(taken.iter());

        let row = sqlx::query_as::<_, GraphRow>(
            r#"
            INSERT INTO graph_anything.graphs (user_id, graph_id, title, x_label, y_label, icon)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING graph_id, title, x_label, y_label, icon, revision, created_at, updated_at
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .bind(&definition.title)
        .bind(&definition.x_label)
        .bind(&definition.y_label)
        .bind(definition.emoji.map(Json))
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| write_err("Failed to create graph", err))?;

        tx.commit()
            .await
            .map_err(|err| write_err("Failed to commit transaction", err))?;

        Ok(hydrate_graph(row, Vec::new()))
    }

    async fn append_point(
        &self,
        user_id: UserId,
        graph_id: &GraphId,
        value: f64,
    ) -> Result<Graph> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| write_err("Failed to start transaction", err))?;

        let locked: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT revision
            FROM graph_anything.graphs
            WHERE user_id = $1
              AND graph_id = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| db_err("Failed to query graph", err))?;
        if locked.is_none() {
            drop(tx);
            return Err(self.missing(user_id, graph_id).await);
        }

        sqlx::query(
            r#"
            INSERT INTO graph_anything.graph_points (user_id, graph_id, position, value)
            SELECT $1, $2, COALESCE(MAX(position), 0) + 1, $3
            FROM graph_anything.graph_points
            WHERE user_id = $1
              AND graph_id = $2
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .bind(value)
        .execute(&mut *tx)
        .await
        .map_err(|err| write_err("Failed to add point. Please try again.", err))?;

        sqlx::query(
            r#"
            UPDATE graph_anything.graphs
            SET revision = revision + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1
              AND graph_id = $2
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|err| write_err("Failed to add point. Please try again.", err))?;

        tx.commit()
            .await
            .map_err(|err| write_err("Failed to commit transaction", err))?;

        self.fetch_graph(user_id, graph_id).await
    }

    async fn update_metadata(
        &self,
        user_id: UserId,
        graph_id: &GraphId,
        patch: MetadataPatch,
    ) -> Result<Graph> {
        let expected_revision = patch
            .expected_revision
            .map(|revision| i64::try_from(revision).unwrap_or(i64::MAX));
        let replace_icon = patch.emoji.is_some();
        let icon = patch.emoji.clone().flatten().map(Json);

        let updated: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE graph_anything.graphs
            SET title = COALESCE($3, title),
                x_label = COALESCE($4, x_label),
                y_label = COALESCE($5, y_label),
                icon = CASE WHEN $6 THEN $7 ELSE icon END,
                revision = revision + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1
              AND graph_id = $2
              AND ($8::BIGINT IS NULL OR revision = $8)
            RETURNING graph_id
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .bind(&patch.title)
        .bind(&patch.x_label)
        .bind(&patch.y_label)
        .bind(replace_icon)
        .bind(icon)
        .bind(expected_revision)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| write_err("Failed to update graph", err))?;

        if updated.is_some() {
            return self.fetch_graph(user_id, graph_id).await;
        }

        // No row matched: either the graph is gone or the revision moved on.
        let current = self.fetch_graph(user_id, graph_id).await?;
        tracing::debug!(
            %user_id,
            %graph_id,
            revision = current.revision,
            expected = ?patch.expected_revision,
            "metadata update rejected"
        );
        Err(LibError::conflict(anyhow!(
            "graph {} is at revision {}, update expected {:?}",
            graph_id,
            current.revision,
            patch.expected_revision
        )))
    }

    async fn delete_graph(&self, user_id: UserId, graph_id: &GraphId) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM graph_anything.graphs
            WHERE user_id = $1
              AND graph_id = $2
            "#,
        )
        .bind(user_id.0)
        .bind(graph_id.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|err| write_err("Failed to delete graph", err))?;

        if result.rows_affected() == 0 {
            return Err(self.missing(user_id, graph_id).await);
        }
        Ok(())
    }
}
