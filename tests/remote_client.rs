//! Tests for HttpTaskService against a mock task service.

use chrono::NaiveDate;
use serde_json::json;
use todosync::{
    DeleteOutcome, HttpTaskService, Priority, ServerStatus, Task, TaskChanges, TaskService,
    TodoError,
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UNREACHABLE: &str = "http://127.0.0.1:1";

fn sample_task(id: i64) -> Task {
    serde_json::from_value(json!({
        "id": id,
        "task": "buy milk",
        "priority": "high",
        "dueDate": "2024-05-01T14:30"
    }))
    .unwrap()
}

#[tokio::test]
async fn list_reads_server_owned_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "task": "first", "completed": true},
            {"id": "2", "task": "second", "createdAt": "2024-01-01T10:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let service = HttpTaskService::new(&format!("{}/", server.uri())).unwrap();
    let tasks = service.list_tasks().await.unwrap();

    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].id, 1);
    assert_eq!(tasks[1].id, 2);
    assert_eq!(tasks[1].task, "second");
    assert!(tasks[1].created_at.is_some());
}

#[tokio::test]
async fn list_maps_non_success_to_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "maintenance"})))
        .mount(&server)
        .await;

    let service = HttpTaskService::new(&server.uri()).unwrap();
    match service.list_tasks().await {
        Err(TodoError::Server { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected server error, got {:?}", other),
    }
    assert_eq!(service.ping().await, ServerStatus::Offline);
}

#[tokio::test]
async fn undecodable_success_body_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/todos"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "created"})))
        .mount(&server)
        .await;

    let service = HttpTaskService::new(&server.uri()).unwrap();
    let err = service.list_tasks().await.unwrap_err();
    assert!(matches!(err, TodoError::InvalidResponse { .. }), "got {:?}", err);
    assert!(err.is_sync_error());

    let err = service.create_task(&sample_task(5)).await.unwrap_err();
    assert!(matches!(err, TodoError::InvalidResponse { .. }), "got {:?}", err);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let service = HttpTaskService::new(UNREACHABLE).unwrap();
    let err = service.list_tasks().await.unwrap_err();
    assert!(matches!(err, TodoError::Transport { .. }), "got {:?}", err);
    assert!(err.is_sync_error());
    assert_eq!(service.ping().await, ServerStatus::Offline);
}

#[tokio::test]
async fn create_posts_task_and_returns_server_copy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/todos"))
        .and(body_partial_json(json!({
            "id": 1700000000000i64,
            "task": "buy milk",
            "priority": "high",
            "dueDate": "2024-05-01T14:30",
            "completed": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 88,
            "task": "buy milk",
            "priority": "high",
            "dueDate": "2024-05-01T14:30"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = HttpTaskService::new(&server.uri()).unwrap();
    let saved = service
        .create_task(&sample_task(1_700_000_000_000))
        .await
        .unwrap();

    assert_eq!(saved.id, 88);
    assert_eq!(saved.priority, Priority::High);
    assert_eq!(
        saved.due_date,
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(14, 30, 0)
    );
}

#[tokio::test]
async fn update_sends_partial_body_and_maps_404() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/todos/5"))
        .and(body_partial_json(json!({
            "task": "renamed",
            "dueDate": "",
            "priority": "low",
            "completed": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5,
            "task": "renamed",
            "priority": "low",
            "completed": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/todos/6"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let service = HttpTaskService::new(&server.uri()).unwrap();
    let changes = TaskChanges {
        task: "renamed".into(),
        due_date: None,
        priority: Priority::Low,
        completed: true,
    };

    let updated = service.update_task(5, &changes).await.unwrap();
    assert!(updated.completed);
    assert_eq!(updated.task, "renamed");

    let err = service.update_task(6, &changes).await.unwrap_err();
    assert!(matches!(err, TodoError::NotFound { id: 6 }), "got {:?}", err);
}

#[tokio::test]
async fn delete_treats_404_as_already_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/todos/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/todos/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/todos/3"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal failure"))
        .mount(&server)
        .await;

    let service = HttpTaskService::new(&server.uri()).unwrap();
    assert_eq!(service.delete_task(1).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(service.delete_task(2).await.unwrap(), DeleteOutcome::AlreadyGone);

    match service.delete_task(3).await {
        Err(TodoError::Server { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal failure");
        }
        other => panic!("expected server error, got {:?}", other),
    }
}
