#![allow(dead_code)]

use assert_fs::TempDir;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use kanban_server::persistence::FileStateRepository;
use kanban_server::store::BoardStore;
use kanban_server::web::{AppState, create_router};
use std::path::{Path, PathBuf};
use tower::ServiceExt;

pub const STATE_FILE_NAME: &str = "kanban_state.json";

/// Test context backed by a state file in a scratch directory.
pub struct TestContext {
    // dropping the directory deletes the state file
    pub dir: TempDir,
    pub state_file: PathBuf,
    pub state: AppState,
}

impl TestContext {
    pub fn app(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Reads the persisted document as it is on disk right now.
    pub fn state_file_contents(&self) -> String {
        std::fs::read_to_string(&self.state_file).unwrap()
    }
}

/// Sets up a fresh store whose state file does not exist yet.
pub fn setup() -> anyhow::Result<TestContext> {
    init_tracing();
    let dir = TempDir::new()?;
    let state_file = dir.path().join(STATE_FILE_NAME);
    let state = open_state(&state_file);
    Ok(TestContext {
        dir,
        state_file,
        state,
    })
}

/// Allow multiple calls to init for tests.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn open_state(state_file: &Path) -> AppState {
    AppState::new(BoardStore::open(FileStateRepository::new(state_file)))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub async fn send(app: Router, method: Method, uri: &str, body: impl Into<Body>) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

pub async fn get(app: Router, uri: &str) -> TestResponse {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post_edit(app: Router, payload: impl Into<Body>) -> TestResponse {
    send(app, Method::POST, "/edit", payload).await
}
