use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Request, State},
    http::{HeaderMap, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::error::{ErrorKind, LibError};
use crate::models::{
    AppendPointPayload, CreateGraphPayload, GraphId, UpdateMetadataPayload, UpsertUserPayload,
    UserId,
};
use crate::operations::GraphRepository;
use crate::session::SessionUser;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_NAME_HEADER: &str = "x-user-name";

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DocumentMissing => StatusCode::NOT_FOUND,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::WriteFailed => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind);
        if status.is_server_error() {
            tracing::error!(kind = ?self.0.kind, error = %self.0.source, "graph api request failed");
        } else {
            tracing::debug!(kind = ?self.0.kind, error = %self.0.source, "graph api request rejected");
        }
        json_error(status, self.0.code, self.0.public)
    }
}

pub fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        })),
    )
        .into_response()
}

pub trait GraphApp {
    fn repository(&self) -> GraphRepository;
}

/// Identity asserted for the request by [`identity_middleware`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub SessionUser);

impl AuthenticatedUser {
    pub fn id(&self) -> UserId {
        self.0.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .map(AuthenticatedUser)
            .ok_or_else(|| AppError(LibError::unauthenticated(anyhow!("no identity on request"))))
    }
}

/// How the upstream proxy's identity headers are interpreted.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Used when the request carries no `x-user-id`; `None` leaves the request
    /// anonymous.
    pub fallback_user: Option<SessionUser>,
}

/// Attaches a [`SessionUser`] from identity headers. An unparseable user id is
/// rejected; a missing one falls back to the configured user, if any.
pub async fn identity_middleware(
    State(config): State<IdentityConfig>,
    mut req: Request,
    next: Next,
) -> Response {
    match identity_from_headers(req.headers(), &config) {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
        }
        Ok(None) => {}
        Err(response) => return response,
    }
    next.run(req).await
}

fn identity_from_headers(
    headers: &HeaderMap,
    config: &IdentityConfig,
) -> Result<Option<SessionUser>, Response> {
    let Some(raw_user_id) = header_value(headers, USER_ID_HEADER) else {
        return Ok(config.fallback_user.clone());
    };

    let id = Uuid::parse_str(raw_user_id.trim()).map(UserId).map_err(|_| {
        json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_user_id",
            "x-user-id must be a UUID",
        )
    })?;
    let email = header_value(headers, USER_EMAIL_HEADER)
        .unwrap_or_default()
        .trim()
        .to_string();
    let display_name = header_value(headers, USER_NAME_HEADER)
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    Ok(Some(SessionUser {
        id,
        email,
        display_name,
    }))
}

fn header_value<'a>(headers: &'a HeaderMap, key: &str) -> Option<&'a str> {
    headers.get(key).and_then(|value| value.to_str().ok())
}

async fn get_me_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let document = app.repository().fetch_user_document(auth_user.id()).await?;
    Ok(Json(document))
}

async fn put_me_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Json(payload): Json<UpsertUserPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let document = app
        .repository()
        .create_user_document(auth_user.id(), payload)
        .await?;
    Ok(Json(document))
}

async fn create_graph_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Json(payload): Json<CreateGraphPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graph = app
        .repository()
        .create_graph(auth_user.id(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(graph)))
}

async fn list_graphs_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graphs = app.repository().fetch_graphs(auth_user.id()).await?;
    Ok(Json(graphs))
}

async fn get_graph_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graph = app
        .repository()
        .fetch_graph(auth_user.id(), &graph_id)
        .await?;
    Ok(Json(graph))
}

async fn update_graph_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
    Json(payload): Json<UpdateMetadataPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let graph = app
        .repository()
        .update_metadata(auth_user.id(), &graph_id, payload)
        .await?;
    Ok(Json(graph))
}

async fn delete_graph_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    app.repository()
        .delete_graph(auth_user.id(), &graph_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn append_point_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
    Json(payload): Json<AppendPointPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let value = payload.normalize()?;
    let graph = app
        .repository()
        .append_point(auth_user.id(), &graph_id, value)
        .await?;
    Ok(Json(graph))
}

async fn chart_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    let chart = app.repository().chart(auth_user.id(), &graph_id).await?;
    Ok(Json(chart))
}

pub fn routes<S>() -> Router<S>
where
    S: GraphApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /me [GET,PUT]");
    tracing::info!("Registering route /graph [GET,POST]");
    tracing::info!("Registering route /graph/{{graph_id}} [GET,PATCH,DELETE]");
    tracing::info!("Registering route /graph/{{graph_id}}/points [POST]");
    tracing::info!("Registering route /graph/{{graph_id}}/chart [GET]");

    Router::new()
        .route("/me", get(get_me_handler::<S>).put(put_me_handler::<S>))
        .route(
            "/graph",
            get(list_graphs_handler::<S>).post(create_graph_handler::<S>),
        )
        .route(
            "/graph/{graph_id}",
            get(get_graph_handler::<S>)
                .patch(update_graph_handler::<S>)
                .delete(delete_graph_handler::<S>),
        )
        .route(
            "/graph/{graph_id}/points",
            post(append_point_handler::<S>),
        )
        .route("/graph/{graph_id}/chart", get(chart_handler::<S>))
}
