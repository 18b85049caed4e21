use std::sync::Arc;

use crate::chart::{ChartSeries, chart_series};
use crate::emoji;
use crate::error::{ErrorKind, LibError};
use crate::models::{Graph, GraphIcon, GraphId, UpdateMetadataPayload, UserId};
use crate::operations::GraphRepository;
use crate::routes::Route;
use crate::session::{SessionGate, SessionUser};
use crate::views::SessionFeed;

const FETCH_FAILED: &str = "Failed to fetch graph. Please try again.";
const INVALID_NUMBER: &str = "Please enter a valid number";

/// `Loading → {Found, NotFound, Error}`. Mutations keep the view in `Found`;
/// their failures only set the view's error message.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Found(Graph),
    NotFound,
    Error(String),
}

/// Editable copy of a graph's metadata held by the settings panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDraft {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub emoji: Option<GraphIcon>,
}

impl SettingsDraft {
    fn from_graph(graph: &Graph) -> Self {
        Self {
            title: graph.title.clone(),
            x_label: graph.x_label.clone(),
            y_label: graph.y_label.clone(),
            emoji: graph.emoji.clone(),
        }
    }

    pub fn select_emoji(&mut self, key: &str) {
        self.emoji = match emoji::find_custom(key) {
            Some(custom) => Some(custom.icon()),
            None => GraphIcon::from_legacy(key),
        };
    }
}

pub struct GraphDetailView {
    repository: GraphRepository,
    session: Arc<dyn SessionGate>,
    feed: Option<SessionFeed>,
    graph_id: GraphId,
    user: Option<UserId>,
    state: DetailState,
    error: Option<String>,
    input: String,
    settings: Option<SettingsDraft>,
    confirming_delete: bool,
}

impl GraphDetailView {
    pub fn new(
        repository: GraphRepository,
        session: Arc<dyn SessionGate>,
        graph_id: GraphId,
    ) -> Self {
        Self {
            repository,
            session,
            feed: None,
            graph_id,
            user: None,
            state: DetailState::Loading,
            error: None,
            input: String::new(),
            settings: None,
            confirming_delete: false,
        }
    }

    /// Subscribes to the session. Returns a redirect when nobody is signed in.
    pub async fn mount(&mut self) -> Option<Route> {
        self.feed = Some(SessionFeed::attach(self.session.as_ref()));
        self.sync_session().await
    }

    pub async fn sync_session(&mut self) -> Option<Route> {
        let latest = self.feed.as_mut().and_then(SessionFeed::latest)?;
        self.on_session_change(latest).await
    }

    pub async fn on_session_change(&mut self, user: Option<SessionUser>) -> Option<Route> {
        // Drafts and pending confirmations belong to the previous session.
        self.input.clear();
        self.settings = None;
        self.confirming_delete = false;
        self.error = None;
        let Some(user) = user else {
            self.user = None;
            self.state = DetailState::Loading;
            return Some(Route::GraphList);
        };
        self.user = Some(user.id);
        self.load(user.id).await;
        None
    }

    async fn load(&mut self, user_id: UserId) {
        self.state = DetailState::Loading;
        self.state = match self.repository.fetch_graph(user_id, &self.graph_id).await {
            Ok(graph) => {
                self.error = None;
                DetailState::Found(graph)
            }
            Err(err) => {
                tracing::warn!(user = %user_id, graph_id = %self.graph_id, error = %err, "failed to fetch graph");
                match err.kind {
                    ErrorKind::NotFound => {
                        self.error = Some(err.public.to_string());
                        DetailState::NotFound
                    }
                    ErrorKind::DocumentMissing => DetailState::Error(err.public.to_string()),
                    _ => DetailState::Error(FETCH_FAILED.to_string()),
                }
            }
        };
    }

    pub fn graph_id(&self) -> &GraphId {
        &self.graph_id
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn graph(&self) -> Option<&Graph> {
        match &self.state {
            DetailState::Found(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn chart(&self) -> Option<ChartSeries> {
        self.graph().map(chart_series)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    /// Appends the number in the input box. Local state changes only after
    /// the store accepted the point.
    pub async fn add_point(&mut self) {
        let Some(user_id) = self.user else {
            self.error = Some("User not authenticated".to_string());
            return;
        };
        if self.graph().is_none() {
            return;
        }
        let value = match self.input.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                self.error = Some(INVALID_NUMBER.to_string());
                return;
            }
        };

        match self
            .repository
            .append_point(user_id, &self.graph_id, value)
            .await
        {
            Ok(graph) => {
                self.state = DetailState::Found(graph);
                self.input.clear();
                self.error = None;
            }
            Err(err) => self.report(user_id, "failed to add point", err),
        }
    }

    pub fn settings(&self) -> Option<&SettingsDraft> {
        self.settings.as_ref()
    }

    pub fn settings_mut(&mut self) -> Option<&mut SettingsDraft> {
        self.settings.as_mut()
    }

    pub fn open_settings(&mut self) {
        if let Some(graph) = self.graph() {
            self.settings = Some(SettingsDraft::from_graph(graph));
        }
    }

    pub fn close_settings(&mut self) {
        self.settings = None;
        self.confirming_delete = false;
    }

    /// Writes the draft back. The update is conditional on the revision this
    /// view last saw; on a conflict the graph is reloaded and the draft kept so
    /// the user can save again.
    pub async fn save_settings(&mut self) {
        let Some(user_id) = self.user else {
            self.error = Some("User not authenticated".to_string());
            return;
        };
        let (Some(draft), Some(graph)) = (self.settings.clone(), self.graph()) else {
            return;
        };
        let payload = UpdateMetadataPayload {
            title: Some(draft.title),
            x_label: Some(draft.x_label),
            y_label: Some(draft.y_label),
            emoji: Some(draft.emoji),
            expected_revision: Some(graph.revision),
        };

        match self
            .repository
            .update_metadata(user_id, &self.graph_id, payload)
            .await
        {
            Ok(graph) => {
                self.state = DetailState::Found(graph);
                self.settings = None;
                self.error = None;
            }
            Err(err) if err.kind == ErrorKind::Conflict => {
                let public = err.public;
                self.report(user_id, "graph changed during edit", err);
                if let Ok(graph) = self.repository.fetch_graph(user_id, &self.graph_id).await {
                    self.state = DetailState::Found(graph);
                }
                self.error = Some(public.to_string());
            }
            Err(err) => self.report(user_id, "failed to update graph", err),
        }
    }

    pub fn is_confirming_delete(&self) -> bool {
        self.confirming_delete
    }

    pub fn request_delete(&mut self) {
        if self.graph().is_some() {
            self.confirming_delete = true;
        }
    }

    pub fn cancel_delete(&mut self) {
        self.confirming_delete = false;
    }

    /// Deletes after [`request_delete`](Self::request_delete); navigates back to
    /// the list on success.
    pub async fn confirm_delete(&mut self) -> Option<Route> {
        if !self.confirming_delete {
            return None;
        }
        self.confirming_delete = false;
        let Some(user_id) = self.user else {
            self.error = Some("User not authenticated".to_string());
            return None;
        };

        match self.repository.delete_graph(user_id, &self.graph_id).await {
            Ok(()) => {
                self.settings = None;
                Some(Route::GraphList)
            }
            Err(err) => {
                self.report(user_id, "failed to delete graph", err);
                None
            }
        }
    }

    pub fn back(&self) -> Route {
        Route::GraphList
    }

    fn report(&mut self, user_id: UserId, what: &'static str, err: LibError) {
        tracing::warn!(user = %user_id, graph_id = %self.graph_id, error = %err, "{what}");
        self.error = Some(err.public.to_string());
    }
}
