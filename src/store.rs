use anyhow::anyhow;
use async_trait::async_trait;

use crate::error::{LibError, Result};
use crate::models::{Graph, GraphDefinition, GraphId, MetadataPatch, UserDocument, UserId};

/// Persistence seam for user documents and their graphs.
///
/// Every graph is addressed individually: a mutation touches exactly one graph
/// and is atomic with respect to other mutations of that graph. Appends are
/// never lost to a concurrent writer; metadata updates replace only the fields
/// they carry, and honour `MetadataPatch::expected_revision` when present.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Writes the profile fields, creating the document with no graphs if it
    /// does not exist yet. Existing graphs are kept.
    async fn upsert_user_document(
        &self,
        user_id: UserId,
        email: &str,
        display_name: &str,
    ) -> Result<UserDocument>;

    async fn fetch_user_document(&self, user_id: UserId) -> Result<UserDocument>;

    async fn fetch_graphs(&self, user_id: UserId) -> Result<Vec<Graph>>;

    async fn fetch_graph(&self, user_id: UserId, graph_id: &GraphId) -> Result<Graph> {
        self.fetch_graphs(user_id)
            .await?
            .into_iter()
            .find(|graph| &graph.graph_id == graph_id)
            .ok_or_else(|| missing_graph(user_id, graph_id))
    }

    async fn create_graph(&self, user_id: UserId, definition: GraphDefinition) -> Result<Graph>;

    async fn append_point(&self, user_id: UserId, graph_id: &GraphId, value: f64)
    -> Result<Graph>;

    async fn update_metadata(
        &self,
        user_id: UserId,
        graph_id: &GraphId,
        patch: MetadataPatch,
    ) -> Result<Graph>;

    async fn delete_graph(&self, user_id: UserId, graph_id: &GraphId) -> Result<()>;
}

pub(crate) fn missing_document(user_id: UserId) -> LibError {
    LibError::document_missing(anyhow!("user document {} does not exist", user_id))
}

pub(crate) fn missing_graph(user_id: UserId, graph_id: &GraphId) -> LibError {
    LibError::graph_not_found(anyhow!("graph {} not found for user {}", graph_id, user_id))
}

pub(crate) fn ensure_revision(graph: &Graph, expected: Option<u64>) -> Result<()> {
    match expected {
        Some(expected) if expected != graph.revision => Err(LibError::conflict(anyhow!(
            "graph {} is at revision {}, update expected {}",
            graph.graph_id,
            graph.revision,
            expected
        ))),
        _ => Ok(()),
    }
}
