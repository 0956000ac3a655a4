pub mod api;
pub mod edit;
pub mod middleware;

use askama::Template;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::board::{Board, Status, Task};
use crate::config::Config;
use crate::persistence::FileStateRepository;
use crate::store::{BoardStore, BoardSummary};
use crate::web::api::create_api_router;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BoardStore>,
}

impl AppState {
    pub fn new(store: BoardStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    #[error("Board lookup did not complete")]
    Blocking(#[from] tokio::task::JoinError),
}

impl axum::response::IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Page rendering failed: {}", self);
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let repository = FileStateRepository::new(config.state_file.clone());
    tracing::info!("Keeping board state in {}", repository.path().display());
    let store = tokio::task::spawn_blocking(move || BoardStore::open(repository)).await?;

    let app = create_router(AppState::new(store));
    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the full application: the board page, the health check and the JSON API.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(board_page_handler))
        .route("/health", get(health_check_handler))
        .with_state(state.clone())
        .merge(create_api_router(state))
        .layer(TraceLayer::new_for_http())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    board: Option<String>,
}

/// Renders one board, `?board=<key>` when that board exists and the default board otherwise.
#[tracing::instrument(skip(state))]
pub async fn board_page_handler(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, WebError> {
    let requested = query.board.filter(|key| !key.trim().is_empty());
    let store = state.store.clone();
    let (board, boards) =
        tokio::task::spawn_blocking(move || store.page_view(requested.as_deref())).await?;
    let template = BoardTemplate::new(&board, boards);
    template.render().map(Html).map_err(WebError::from)
}

struct Column {
    status: Status,
    tasks: Vec<Task>,
}

#[derive(Template)]
#[template(path = "board.html")]
struct BoardTemplate {
    board_key: String,
    board_name: String,
    columns: Vec<Column>,
    boards: Vec<BoardSummary>,
}

impl BoardTemplate {
    fn new(board: &Board, boards: Vec<BoardSummary>) -> Self {
        let columns = board
            .columns()
            .into_iter()
            .map(|(status, tasks)| Column {
                status,
                tasks: tasks.into_iter().cloned().collect(),
            })
            .collect();
        Self {
            board_key: board.key.clone(),
            board_name: board.name.clone(),
            columns,
            boards,
        }
    }
}
