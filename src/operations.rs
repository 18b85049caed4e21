use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::chart::{ChartSeries, chart_series};
use crate::error::{LibError, Result};
use crate::memory::MemoryGraphStore;
use crate::models::{
    AppendPointPayload, CreateGraphPayload, Graph, GraphId, UpdateMetadataPayload,
    UpsertUserPayload, UserDocument, UserId,
};
use crate::store::GraphStore;

/// High-level graph actions, addressable as tagged JSON.
///
/// Callers must provide a trusted `actor` sourced from validated session state,
/// not from request arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GraphOperation {
    Create {
        payload: CreateGraphPayload,
    },
    List,
    Get {
        graph_id: GraphId,
    },
    AppendPoint {
        graph_id: GraphId,
        payload: AppendPointPayload,
    },
    UpdateMetadata {
        graph_id: GraphId,
        payload: UpdateMetadataPayload,
    },
    Delete {
        graph_id: GraphId,
    },
    Chart {
        graph_id: GraphId,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GraphOperationResult {
    Graph { graph: Graph },
    Graphs { items: Vec<Graph> },
    Chart { chart: ChartSeries },
    Deleted,
}

/// Validating front door to a [`GraphStore`].
#[derive(Clone)]
pub struct GraphRepository {
    store: Arc<dyn GraphStore>,
}

impl GraphRepository {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryGraphStore::new()))
    }

    pub fn store(&self) -> Arc<dyn GraphStore> {
        Arc::clone(&self.store)
    }

    pub async fn execute(
        &self,
        actor: UserId,
        operation: GraphOperation,
    ) -> Result<GraphOperationResult> {
        match operation {
            GraphOperation::Create { payload } => {
                let graph = self.create_graph(actor, payload).await?;
                Ok(GraphOperationResult::Graph { graph })
            }
            GraphOperation::List => {
                let items = self.fetch_graphs(actor).await?;
                Ok(GraphOperationResult::Graphs { items })
            }
            GraphOperation::Get { graph_id } => {
                let graph = self.fetch_graph(actor, &graph_id).await?;
                Ok(GraphOperationResult::Graph { graph })
            }
            GraphOperation::AppendPoint { graph_id, payload } => {
                let graph = self
                    .append_point(actor, &graph_id, payload.normalize()?)
                    .await?;
                Ok(GraphOperationResult::Graph { graph })
            }
            GraphOperation::UpdateMetadata { graph_id, payload } => {
                let graph = self.update_metadata(actor, &graph_id, payload).await?;
                Ok(GraphOperationResult::Graph { graph })
            }
            GraphOperation::Delete { graph_id } => {
                self.delete_graph(actor, &graph_id).await?;
                Ok(GraphOperationResult::Deleted)
            }
            GraphOperation::Chart { graph_id } => {
                let chart = self.chart(actor, &graph_id).await?;
                Ok(GraphOperationResult::Chart { chart })
            }
        }
    }

    /// Writes the profile on sign-up. The display name falls back to the
    /// local part of the email address.
    pub async fn create_user_document(
        &self,
        actor: UserId,
        payload: UpsertUserPayload,
    ) -> Result<UserDocument> {
        let email = payload.email.trim().to_string();
        if email.is_empty() {
            return Err(LibError::invalid(
                "Email is required",
                anyhow!("empty email for user {}", actor),
            ));
        }
        let display_name = payload
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        let document = self
            .store
            .upsert_user_document(actor, &email, &display_name)
            .await?;
        tracing::info!(user = %actor, "user document written");
        Ok(document)
    }

    pub async fn fetch_user_document(&self, actor: UserId) -> Result<UserDocument> {
        self.store.fetch_user_document(actor).await
    }

    pub async fn fetch_graphs(&self, actor: UserId) -> Result<Vec<Graph>> {
        self.store.fetch_graphs(actor).await
    }

    pub async fn fetch_graph(&self, actor: UserId, graph_id: &GraphId) -> Result<Graph> {
        self.store.fetch_graph(actor, graph_id).await
    }

    pub async fn create_graph(&self, actor: UserId, payload: CreateGraphPayload) -> Result<Graph> {
        let definition = payload.normalize()?;
        let graph = self.store.create_graph(actor, definition).await?;
        tracing::info!(user = %actor, graph_id = %graph.graph_id, "graph created");
        Ok(graph)
    }

    pub async fn append_point(
        &self,
        actor: UserId,
        graph_id: &GraphId,
        value: f64,
    ) -> Result<Graph> {
        let value = crate::models::validate_point(value)?;
        let graph = self.store.append_point(actor, graph_id, value).await?;
        tracing::debug!(
            user = %actor,
            graph_id = %graph_id,
            points = graph.data.len(),
            "point appended"
        );
        Ok(graph)
    }

    pub async fn update_metadata(
        &self,
        actor: UserId,
        graph_id: &GraphId,
        payload: UpdateMetadataPayload,
    ) -> Result<Graph> {
        let patch = payload.normalize()?;
        let graph = self.store.update_metadata(actor, graph_id, patch).await?;
        tracing::info!(
            user = %actor,
            graph_id = %graph_id,
            revision = graph.revision,
            "graph metadata updated"
        );
        Ok(graph)
    }

    pub async fn delete_graph(&self, actor: UserId, graph_id: &GraphId) -> Result<()> {
        self.store.delete_graph(actor, graph_id).await?;
        tracing::info!(user = %actor, graph_id = %graph_id, "graph deleted");
        Ok(())
    }

    pub async fn chart(&self, actor: UserId, graph_id: &GraphId) -> Result<ChartSeries> {
        let graph = self.fetch_graph(actor, graph_id).await?;
        Ok(chart_series(&graph))
    }
}
