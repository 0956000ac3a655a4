use axum::http::StatusCode;
use kanban_server::board::{Status, Task};

mod common;

use common::{get, setup};

#[tokio::test]
async fn can_check_health_endpoint() {
    let context = setup().expect("Failed to setup test context");

    let response = get(context.app(), "/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "OK");
}

#[tokio::test]
async fn can_render_default_board() {
    let context = setup().expect("Failed to setup test context");

    let response = get(context.app(), "/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(
        response
            .headers
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(response.body.contains("My Kanban Board"));
    assert!(response.body.contains("Сделать макет главной страницы"));
    assert!(response.body.contains("Написать отчёт по практике"));
    for label in ["To do", "In progress", "Review", "Done"] {
        assert!(response.body.contains(label), "missing column {label}");
    }
}

#[tokio::test]
async fn can_render_requested_board_and_list_all_boards() {
    let context = setup().expect("Failed to setup test context");
    context
        .state
        .store
        .replace_board(
            "research",
            "Research",
            vec![Task::new(1, "Read the papers", Status::InProgress)],
        )
        .unwrap();

    let response = get(context.app(), "/?board=research").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Read the papers"));
    assert!(!response.body.contains("Сделать макет главной страницы"));
    assert!(response.body.contains(r#"href="/?board=default""#));
    assert!(response.body.contains(r#"href="/?board=research""#));
}

#[tokio::test]
async fn can_fall_back_to_default_board_for_unknown_key() {
    let context = setup().expect("Failed to setup test context");

    let response = get(context.app(), "/?board=nowhere").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("Сделать макет главной страницы"));
    assert_eq!(context.state.store.summaries().len(), 1);
}

#[tokio::test]
async fn can_escape_user_text_in_page() {
    let context = setup().expect("Failed to setup test context");
    context
        .state
        .store
        .replace_board(
            "default",
            "",
            vec![Task::new(1, "<img src=x onerror=alert(1)>", Status::Todo)],
        )
        .unwrap();

    let response = get(context.app(), "/").await;

    assert!(!response.body.contains("<img"));
    assert!(response.body.contains("&#60;img src=x onerror=alert(1)&#62;"));
}

#[tokio::test]
async fn can_link_to_boards_whose_key_needs_encoding() {
    let context = setup().expect("Failed to setup test context");
    context
        .state
        .store
        .replace_board(
            "r&d #1+2%",
            "R&D",
            vec![Task::new(1, "secret plan", Status::Todo)],
        )
        .unwrap();

    let page = get(context.app(), "/").await;
    assert!(page.body.contains(r#"href="/?board=r%26d%20%231%2B2%25""#));

    let response = get(context.app(), "/?board=r%26d%20%231%2B2%25").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("secret plan"));
    assert!(!response.body.contains("Сделать макет главной страницы"));
}
