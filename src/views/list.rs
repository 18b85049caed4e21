use std::sync::Arc;

use serde::Serialize;

use crate::chart::{ChartSeries, preview_series};
use crate::emoji;
use crate::error::ErrorKind;
use crate::models::{CreateGraphPayload, Graph, GraphIcon, GraphId};
use crate::operations::GraphRepository;
use crate::routes::Route;
use crate::session::{SessionGate, SessionUser};
use crate::views::SessionFeed;

const FETCH_FAILED: &str = "Failed to fetch graphs. Please try again.";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewGraphForm {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub emoji: Option<GraphIcon>,
}

impl NewGraphForm {
    fn to_payload(&self) -> CreateGraphPayload {
        CreateGraphPayload {
            title: self.title.clone(),
            x_label: self.x_label.clone(),
            y_label: self.y_label.clone(),
            emoji: self.emoji.clone(),
        }
    }
}

/// One entry of the list, with a preview chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphCard {
    pub graph_id: GraphId,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<GraphIcon>,
    pub preview: ChartSeries,
}

impl From<&Graph> for GraphCard {
    fn from(graph: &Graph) -> Self {
        Self {
            graph_id: graph.graph_id.clone(),
            title: graph.title.clone(),
            x_label: graph.x_label.clone(),
            y_label: graph.y_label.clone(),
            emoji: graph.emoji.clone(),
            preview: preview_series(graph),
        }
    }
}

/// All graphs of the signed-in user, plus the creation form.
pub struct GraphListView {
    repository: GraphRepository,
    session: Arc<dyn SessionGate>,
    feed: Option<SessionFeed>,
    user: Option<SessionUser>,
    graphs: Vec<Graph>,
    form: NewGraphForm,
    show_form: bool,
    error: Option<String>,
}

impl GraphListView {
    pub fn new(repository: GraphRepository, session: Arc<dyn SessionGate>) -> Self {
        Self {
            repository,
            session,
            feed: None,
            user: None,
            graphs: Vec::new(),
            form: NewGraphForm::default(),
            show_form: false,
            error: None,
        }
    }

    /// Subscribes to the session and loads graphs for whoever is signed in.
    pub async fn mount(&mut self) {
        self.feed = Some(SessionFeed::attach(self.session.as_ref()));
        self.sync_session().await;
    }

    /// Applies session changes that arrived since the last call.
    pub async fn sync_session(&mut self) {
        let latest = self.feed.as_mut().and_then(SessionFeed::latest);
        if let Some(user) = latest {
            self.on_session_change(user).await;
        }
    }

    pub async fn on_session_change(&mut self, user: Option<SessionUser>) {
        self.user = user;
        self.graphs.clear();
        self.error = None;
        if let Some(user) = &self.user {
            let user_id = user.id;
            self.load(user_id).await;
        }
    }

    async fn load(&mut self, user_id: crate::models::UserId) {
        match self.repository.fetch_graphs(user_id).await {
            Ok(graphs) => self.graphs = graphs,
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "failed to fetch graphs");
                self.error = Some(match err.kind {
                    ErrorKind::DocumentMissing => err.public.to_string(),
                    _ => FETCH_FAILED.to_string(),
                });
            }
        }
    }

    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }

    pub fn cards(&self) -> Vec<GraphCard> {
        self.graphs.iter().map(GraphCard::from).collect()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_form_open(&self) -> bool {
        self.show_form
    }

    pub fn form(&self) -> &NewGraphForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut NewGraphForm {
        &mut self.form
    }

    pub fn open_form(&mut self) {
        self.show_form = true;
    }

    pub fn close_form(&mut self) {
        self.show_form = false;
    }

    /// Sets the form icon from a picker key: a custom emoji id/shortcode, or a
    /// unicode glyph.
    pub fn select_emoji(&mut self, key: &str) {
        self.form.emoji = match emoji::find_custom(key) {
            Some(custom) => Some(custom.icon()),
            None => GraphIcon::from_legacy(key),
        };
    }

    pub fn clear_emoji(&mut self) {
        self.form.emoji = None;
    }

    /// Creates the graph from the form and navigates to it.
    ///
    /// The new graph is appended to local state as returned by the store; the
    /// list is not refetched.
    pub async fn submit_form(&mut self) -> Option<Route> {
        let Some(user) = &self.user else {
            self.error = Some("User not authenticated".to_string());
            return None;
        };

        match self
            .repository
            .create_graph(user.id, self.form.to_payload())
            .await
        {
            Ok(graph) => {
                let route = Route::Graph(graph.graph_id.clone());
                self.graphs.push(graph);
                self.form = NewGraphForm::default();
                self.show_form = false;
                self.error = None;
                Some(route)
            }
            Err(err) => {
                tracing::warn!(user = %user.id, error = %err, "failed to create graph");
                self.error = Some(err.public.to_string());
                None
            }
        }
    }

    pub async fn delete_graph(&mut self, graph_id: &GraphId) {
        let Some(user) = &self.user else {
            self.error = Some("User not authenticated".to_string());
            return;
        };

        match self.repository.delete_graph(user.id, graph_id).await {
            Ok(()) => {
                self.graphs.retain(|graph| &graph.graph_id != graph_id);
                self.error = None;
            }
            Err(err) => {
                tracing::warn!(user = %user.id, graph_id = %graph_id, error = %err, "failed to delete graph");
                self.error = Some(err.public.to_string());
            }
        }
    }

    pub fn open_graph(&self, graph_id: &GraphId) -> Route {
        Route::Graph(graph_id.clone())
    }
}
