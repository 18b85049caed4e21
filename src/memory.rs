//! In-process [`GraphStore`] backed by a map of user documents.
//!
//! All mutations run under a single write lock, so each one is atomic with
//! respect to every other. Used by the server when no database is configured
//! and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Graph, GraphDefinition, GraphId, MetadataPatch, UserDocument, UserId};
use crate::store::{GraphStore, ensure_revision, missing_document, missing_graph};

#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    documents: RwLock<HashMap<UserId, UserDocument>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a store with existing documents, e.g. imported user exports.
    pub fn with_documents(documents: impl IntoIterator<Item = UserDocument>) -> Self {
        Self {
            documents: RwLock::new(
                documents
                    .into_iter()
                    .map(|document| (document.user_id, document))
                    .collect(),
            ),
        }
    }

    async fn mutate_graph<F>(&self, user_id: UserId, graph_id: &GraphId, apply: F) -> Result<Graph>
    where
        F: FnOnce(&mut Graph) -> Result<()> + Send,
    {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&user_id)
            .ok_or_else(|| missing_document(user_id))?;
        let graph = document
            .graphs
            .iter_mut()
            .find(|graph| &graph.graph_id == graph_id)
            .ok_or_else(|| missing_graph(user_id, graph_id))?;
        apply(graph)?;
        Ok(graph.clone())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn upsert_user_document(
        &self,
        user_id: UserId,
        email: &str,
        display_name: &str,
    ) -> Result<UserDocument> {
        let mut documents = self.documents.write().await;
        let document = documents.entry(user_id).or_insert_with(|| UserDocument {
            user_id,
            email: String::new(),
            display_name: String::new(),
            graphs: Vec::new(),
        });
        document.email = email.to_string();
        document.display_name = display_name.to_string();
        Ok(document.clone())
    }

    async fn fetch_user_document(&self, user_id: UserId) -> Result<UserDocument> {
        let documents = self.documents.read().await;
        documents
            .get(&user_id)
            .cloned()
            .ok_or_else(|| missing_document(user_id))
    }

    async fn fetch_graphs(&self, user_id: UserId) -> Result<Vec<Graph>> {
        let documents = self.documents.read().await;
        documents
            .get(&user_id)
            .map(|document| document.graphs.clone())
            .ok_or_else(|| missing_document(user_id))
    }

    async fn fetch_graph(&self, user_id: UserId, graph_id: &GraphId) -> Result<Graph> {
        let documents = self.documents.read().await;
        let document = documents
            .get(&user_id)
            .ok_or_else(|| missing_document(user_id))?;
        document
            .graphs
            .iter()
            .find(|graph| &graph.graph_id == graph_id)
            .cloned()
            .ok_or_else(|| missing_graph(user_id, graph_id))
    }

    async fn create_graph(&self, user_id: UserId, definition: GraphDefinition) -> Result<Graph> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&user_id)
            .ok_or_else(|| missing_document(user_id))?;
        let graph_id = GraphId::generate(document.graphs.iter().map(|graph| &graph.graph_id));
        let graph = Graph::new(graph_id, definition);
        document.graphs.push(graph.clone());
        Ok(graph)
    }

    async fn append_point(
        &self,
        user_id: UserId,
        graph_id: &GraphId,
        value: f64,
    ) -> Result<Graph> {
        self.mutate_graph(user_id, graph_id, |graph| {
            graph.push_point(value);
            Ok(())
        })
        .await
    }

    async fn update_metadata(
        &self,
        user_id: UserId,
        graph_id: &GraphId,
        patch: MetadataPatch,
    ) -> Result<Graph> {
        self.mutate_graph(user_id, graph_id, |graph| {
            ensure_revision(graph, patch.expected_revision)?;
            graph.apply_metadata(&patch);
            Ok(())
        })
        .await
    }

    async fn delete_graph(&self, user_id: UserId, graph_id: &GraphId) -> Result<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&user_id)
            .ok_or_else(|| missing_document(user_id))?;
        let before = document.graphs.len();
        document.graphs.retain(|graph| &graph.graph_id != graph_id);
        if document.graphs.len() == before {
            return Err(missing_graph(user_id, graph_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorKind;

    fn definition(title: &str) -> GraphDefinition {
        GraphDefinition {
            title: title.to_string(),
            x_label: "Day".to_string(),
            y_label: "Count".to_string(),
            emoji: None,
        }
    }

    async fn store_with_user() -> (MemoryGraphStore, UserId) {
        let store = MemoryGraphStore::new();
        let user = UserId(Uuid::new_v4());
        store
            .upsert_user_document(user, "ada@example.com", "Ada")
            .await
            .expect("user document should be created");
        (store, user)
    }

    #[tokio::test]
    async fn missing_document_is_reported() {
        let store = MemoryGraphStore::new();
        let user = UserId(Uuid::new_v4());

        let err = store.fetch_graphs(user).await.expect_err("no document");
        assert_eq!(err.kind, ErrorKind::DocumentMissing);

        let err = store
            .create_graph(user, definition("Runs"))
            .await
            .expect_err("no document");
        assert_eq!(err.kind, ErrorKind::DocumentMissing);
    }

    #[tokio::test]
    async fn new_document_has_no_graphs() {
        let (store, user) = store_with_user().await;
        assert!(store.fetch_graphs(user).await.expect("fetch").is_empty());
    }

    #[tokio::test]
    async fn upsert_keeps_existing_graphs() {
        let (store, user) = store_with_user().await;
        store
            .create_graph(user, definition("Runs"))
            .await
            .expect("create");

        let document = store
            .upsert_user_document(user, "ada@lovelace.dev", "Ada L.")
            .await
            .expect("upsert");
        assert_eq!(document.email, "ada@lovelace.dev");
        assert_eq!(document.graphs.len(), 1);
    }

    #[tokio::test]
    async fn created_graphs_get_unique_ids() {
        let (store, user) = store_with_user().await;
        let first = store
            .create_graph(user, definition("Runs"))
            .await
            .expect("create");
        let second = store
            .create_graph(user, definition("Swims"))
            .await
            .expect("create");

        assert_ne!(first.graph_id, second.graph_id);
        assert!(first.data.is_empty());
        let titles: Vec<_> = store
            .fetch_graphs(user)
            .await
            .expect("fetch")
            .into_iter()
            .map(|graph| graph.title)
            .collect();
        assert_eq!(titles, vec!["Runs", "Swims"]);
    }

    #[tokio::test]
    async fn appends_preserve_order() {
        let (store, user) = store_with_user().await;
        let graph = store
            .create_graph(user, definition("Runs"))
            .await
            .expect("create");

        for value in [3.0, 5.0, 4.0] {
            store
                .append_point(user, &graph.graph_id, value)
                .await
                .expect("append");
        }
        let stored = store
            .fetch_graph(user, &graph.graph_id)
            .await
            .expect("fetch");
        assert_eq!(stored.data, vec![3.0, 5.0, 4.0]);
        assert_eq!(stored.revision, 3);
    }

    #[tokio::test]
    async fn concurrent_appends_all_land() {
        let (store, user) = store_with_user().await;
        let store = Arc::new(store);
        let graph = store
            .create_graph(user, definition("Runs"))
            .await
            .expect("create");

        let mut handles = Vec::new();
        for value in 0..32 {
            let store = Arc::clone(&store);
            let graph_id = graph.graph_id.clone();
            handles.push(tokio::spawn(async move {
                store.append_point(user, &graph_id, value as f64).await
            }));
        }
        for handle in handles {
            handle.await.expect("task").expect("append");
        }

        let stored = store
            .fetch_graph(user, &graph.graph_id)
            .await
            .expect("fetch");
        assert_eq!(stored.data.len(), 32);
    }

    #[tokio::test]
    async fn stale_revision_is_a_conflict() {
        let (store, user) = store_with_user().await;
        let graph = store
            .create_graph(user, definition("Runs"))
            .await
            .expect("create");
        store
            .append_point(user, &graph.graph_id, 1.0)
            .await
            .expect("append");

        let err = store
            .update_metadata(
                user,
                &graph.graph_id,
                MetadataPatch {
                    title: Some("Renamed".to_string()),
                    expected_revision: Some(0),
                    ..Default::default()
                },
            )
            .await
            .expect_err("stale revision");
        assert_eq!(err.kind, ErrorKind::Conflict);

        let stored = store
            .fetch_graph(user, &graph.graph_id)
            .await
            .expect("fetch");
        assert_eq!(stored.title, "Runs");

        let updated = store
            .update_metadata(
                user,
                &graph.graph_id,
                MetadataPatch {
                    title: Some("Renamed".to_string()),
                    expected_revision: Some(1),
                    ..Default::default()
                },
            )
            .await
            .expect("current revision");
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.data, vec![1.0]);
    }

    #[tokio::test]
    async fn delete_removes_only_the_target() {
        let (store, user) = store_with_user().await;
        let keep = store
            .create_graph(user, definition("Keep"))
            .await
            .expect("create");
        let drop = store
            .create_graph(user, definition("Drop"))
            .await
            .expect("create");
        store
            .append_point(user, &keep.graph_id, 7.0)
            .await
            .expect("append");

        store
            .delete_graph(user, &drop.graph_id)
            .await
            .expect("delete");

        let graphs = store.fetch_graphs(user).await.expect("fetch");
        assert_eq!(graphs.len(), 1);
        assert_eq!(graphs[0].graph_id, keep.graph_id);
        assert_eq!(graphs[0].data, vec![7.0]);

        let err = store
            .delete_graph(user, &drop.graph_id)
            .await
            .expect_err("already deleted");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn seeded_documents_are_readable() {
        let user = UserId(Uuid::new_v4());
        let store = MemoryGraphStore::with_documents([UserDocument {
            user_id: user,
            email: "grace@example.com".to_string(),
            display_name: "Grace".to_string(),
            graphs: Vec::new(),
        }]);
        let document = store.fetch_user_document(user).await.expect("fetch");
        assert_eq!(document.display_name, "Grace");
    }
}
