#[cfg(feature = "api")]
pub mod api;
pub mod chart;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod emoji;
pub mod error;
pub mod memory;
pub mod models;
pub mod operations;
pub mod routes;
pub mod session;
pub mod store;
pub mod views;

pub mod prelude {
    #[cfg(feature = "api")]
    pub use crate::api::{AuthenticatedUser, GraphApp, IdentityConfig};
    pub use crate::chart::{ChartSeries, chart_series, preview_series};
    #[cfg(feature = "sqlx")]
    pub use crate::db::{PgGraphStore, create_graph_tables};
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::memory::MemoryGraphStore;
    pub use crate::models::{
        AppendPointPayload, CreateGraphPayload, Graph, GraphIcon, GraphId, UpdateMetadataPayload,
        UpsertUserPayload, UserDocument, UserId,
    };
    pub use crate::operations::{GraphOperation, GraphOperationResult, GraphRepository};
    pub use crate::routes::Route;
    pub use crate::session::{LocalSession, SessionGate, SessionUser, Subscription};
    pub use crate::store::GraphStore;
    pub use crate::views::{DetailState, GraphDetailView, GraphListView};
}
