//! Integration tests for ranking checks and history using wiremock HTTP mocks.

use std::sync::Arc;
use std::time::Duration;

use rankgrid_client::{
    ClientError, HistoryFeed, HistoryUpdate, JobState, JobTracker, PollPolicy, RankingClient,
    Session, StoredSession,
};
use rankgrid_core::{CellStatus, CheckKind, RankForm};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn logged_in_session() -> Arc<Session> {
    Arc::new(Session::restore(
        StoredSession {
            authenticated: true,
            email: Some("owner@pizzaplace.com".to_string()),
            ..StoredSession::default()
        },
        Duration::from_secs(2),
    ))
}

fn test_client(base_url: &str, session: Arc<Session>) -> RankingClient {
    RankingClient::with_base_url(base_url, 30, session).expect("client construction should not fail")
}

fn pizza_form() -> RankForm {
    RankForm {
        business_name: "Pizza Place".to_string(),
        business_lat: "40.689199".to_string(),
        business_lng: "-73.975035".to_string(),
        ..RankForm::default()
    }
}

async fn mount_csrf(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path("/api/get-csrf-token/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "csrfToken": token })))
        .expect(times)
        .mount(server)
        .await;
}

fn quick_result(pending: u32) -> Value {
    json!({
        "business_name": "Pizza Place",
        "center_coordinates": { "lat": 40.689199, "lng": -73.975035 },
        "grid_parameters": { "size": 3, "radius_km": 5.0 },
        "task_ids": ["t-1", "t-2"],
        "grid_coordinates": ["40.644154,-74.034393,15", "40.644154,-73.975035,15"],
        "results": {
            "completed": {},
            "failed": {},
            "pending": ["t-1", "t-2"],
            "summary": {
                "total_tasks": 2,
                "completed_count": 2 - pending,
                "failed_count": 0,
                "pending_count": pending
            }
        },
        "rank_map": [
            { "task_id": "t-1", "status": "pending", "rank": null },
            { "task_id": "t-2", "status": "pending", "rank": null }
        ],
        "metadata": { "total_duration_seconds": 4.2, "success": true }
    })
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quick_check_posts_once_without_target_domain() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;

    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .and(header("X-CSRFToken", "tok-1"))
        .and(body_json(json!({
            "business_name": "Pizza Place",
            "business_lat": 40.689199,
            "business_lng": -73.975035
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(quick_result(2)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let result = client
        .submit_form(&pizza_form(), CheckKind::Quick)
        .await
        .expect("quick check should succeed");

    assert_eq!(result.business_name, "Pizza Place");
    assert_eq!(result.summary().pending_count, 2);
    let cells = result.rank_map.expect("rank map present");
    assert!(cells.iter().all(|c| c.status == CellStatus::Pending));
}

#[tokio::test]
async fn validation_error_sends_nothing() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 0).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quick_result(0)))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    for form in [
        RankForm {
            business_name: "  ".to_string(),
            ..pizza_form()
        },
        RankForm {
            business_lat: String::new(),
            ..pizza_form()
        },
        RankForm {
            business_lng: String::new(),
            ..pizza_form()
        },
    ] {
        let err = client
            .submit_form(&form, CheckKind::Quick)
            .await
            .expect_err("incomplete form must be rejected");
        assert!(matches!(err, ClientError::Validation(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn csrf_token_fetched_once_across_submissions() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .and(header("X-CSRFToken", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quick_result(0)))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    client.submit_form(&pizza_form(), CheckKind::Quick).await.unwrap();
    client.submit_form(&pizza_form(), CheckKind::Quick).await.unwrap();
    assert!(client.session().snapshot().csrf_cached);
}

#[tokio::test]
async fn grid_check_sends_advanced_parameters() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/grid-check/"))
        .and(body_json(json!({
            "business_name": "Pizza Place",
            "business_lat": 40.689199,
            "business_lng": -73.975035,
            "grid_size": 4,
            "radius_km": 2.5,
            "language_code": "es",
            "device": "mobile",
            "zoom": 13,
            "target_domain": "www.pizzaplace.com"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "business_name": "Pizza Place",
            "grid_parameters": { "size": 4, "radius_km": 2.5 },
            "rank_map": [{ "task_id": "t-1", "status": "completed", "rank": 1 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let form = RankForm {
        target_domain: "https://www.PizzaPlace.com/menu".to_string(),
        grid_size: "4".to_string(),
        radius_km: "2.5".to_string(),
        language_code: "es".to_string(),
        device: "Mobile".to_string(),
        zoom: "13".to_string(),
        ..pizza_form()
    };
    let client = test_client(&server.uri(), logged_in_session());
    let result = client.submit_form(&form, CheckKind::Advanced).await.unwrap();
    assert_eq!(result.grid_parameters.size, 4);
    assert_eq!(result.rank_map.map(|m| m.len()), Some(1));
}

#[tokio::test]
async fn remote_error_message_is_surfaced_and_not_retried() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Quick check failed",
            "message": "provider timeout"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session()).with_retry_policy(3, 0);
    let err = client
        .submit_form(&pizza_form(), CheckKind::Quick)
        .await
        .expect_err("500 must surface");
    match err {
        ClientError::Remote { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Quick check failed: provider timeout");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthenticated_check_is_an_auth_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Authentication credentials were not provided."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), Arc::new(Session::new(Duration::ZERO)));
    let err = client
        .submit_form(&pizza_form(), CheckKind::Quick)
        .await
        .unwrap_err();
    assert!(err.is_auth(), "got {err:?}");
}

#[tokio::test]
async fn csrf_fetch_failure_aborts_the_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/get-csrf-token/"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quick_result(0)))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let err = client
        .submit_form(&pizza_form(), CheckKind::Quick)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::CsrfUnavailable(_)), "got {err:?}");
    assert!(err.to_string().contains("refresh"));
}

#[tokio::test]
async fn rejected_csrf_token_is_dropped_and_refetched() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 2).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "detail": "CSRF Failed: CSRF token missing or incorrect."
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quick_result(0)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let err = client
        .submit_form(&pizza_form(), CheckKind::Quick)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::CsrfUnavailable(_)), "got {err:?}");
    assert!(!client.session().snapshot().csrf_cached);

    client.submit_form(&pizza_form(), CheckKind::Quick).await.unwrap();
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_refetched_when_business_name_changes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ranking/history/"))
        .and(query_param("business_name", "Pizza Place"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {
                    "job_id": 12,
                    "business_name": "Pizza Place",
                    "created_at": "2025-03-02T09:00:00+00:00",
                    "grid_parameters": { "size": 3, "radius_km": 5.0 },
                    "rank_map": [{ "task_id": "t-1", "status": "completed", "rank": 4 }]
                },
                {
                    "job_id": 11,
                    "business_name": "Pizza Place",
                    "created_at": "2025-03-01T09:00:00+00:00"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/ranking/history/"))
        .and(query_param("business_name", "Burger Barn"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let mut feed = HistoryFeed::new();

    let HistoryUpdate::Fetched(Some(entry)) =
        feed.on_business_name(&client, "Pizza Place").await.unwrap()
    else {
        panic!("expected a history entry");
    };
    assert_eq!(entry.job_id, 12, "most recent entry comes first");
    assert_eq!(entry.rank_map[0].rank, Some(4));

    assert_eq!(
        feed.on_business_name(&client, " Pizza Place ").await.unwrap(),
        HistoryUpdate::Unchanged
    );
    assert_eq!(
        feed.on_business_name(&client, "Burger Barn").await.unwrap(),
        HistoryUpdate::Fetched(None)
    );
}

#[tokio::test]
async fn history_skipped_when_not_logged_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ranking/history/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), Arc::new(Session::new(Duration::ZERO)));
    let mut feed = HistoryFeed::new();
    assert_eq!(
        feed.on_business_name(&client, "Pizza Place").await.unwrap(),
        HistoryUpdate::Skipped
    );
    assert!(client.latest_history("Pizza Place").await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Split workflow and job tracking
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_read_is_retried_on_server_error() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/status/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/status/"))
        .and(body_json(json!({ "task_ids": ["t-1", "t-2"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "task_count": 2,
            "task_status": { "completed": 1, "failed": 0, "pending": 1, "unknown": 0, "total": 2 },
            "timestamp": "2025-03-01T10:15:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session()).with_retry_policy(2, 0);
    let ids = vec!["t-1".to_string(), "t-2".to_string()];
    let status = client.task_status(&ids).await.unwrap();
    let counts = status.task_status.unwrap();
    assert_eq!(counts.pending, 1);
    assert!(!counts.is_settled());
}

#[tokio::test]
async fn create_tasks_returns_ids_and_coordinates() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/create-tasks/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "task_ids": ["t-1", "t-2", "t-3", "t-4"],
            "coordinates": ["1,1,15", "1,2,15", "2,1,15", "2,2,15"],
            "business_name": "Pizza Place",
            "center_coordinates": { "lat": 40.689199, "lng": -73.975035 },
            "grid_parameters": { "size": 2, "radius_km": 5.0 },
            "timestamp": "2025-03-01T10:15:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let form = RankForm {
        grid_size: "2".to_string(),
        ..pizza_form()
    };
    let request = form.compose(CheckKind::Advanced).unwrap();
    let client = test_client(&server.uri(), logged_in_session());
    let created = client.create_tasks(&request).await.unwrap();
    assert_eq!(created.task_ids.len(), 4);
    assert_eq!(created.grid_parameters.size, 2);
}

#[tokio::test]
async fn tracker_polls_until_results_settle() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/quick-check/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(quick_result(2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "task_status": { "completed": 2, "failed": 0, "pending": 0, "unknown": 0, "total": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/get-results/"))
        .and(body_json(json!({
            "task_ids": ["t-1", "t-2"],
            "max_wait_time": 60,
            "poll_interval": 30
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "completed": {
                "t-1": { "tasks": [{ "result": [{ "items": [
                    { "domain": "other.com" }, { "domain": "pizzaplace.com" }
                ]}]}]},
                "t-2": { "tasks": [{ "result": [{ "items": [{ "domain": "other.com" }] }] }] }
            },
            "failed": {},
            "pending": [],
            "summary": { "total_tasks": 2, "completed_count": 2, "failed_count": 0, "pending_count": 0 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let request = RankForm {
        target_domain: "pizzaplace.com".to_string(),
        ..pizza_form()
    }
    .compose(CheckKind::Quick)
    .unwrap();

    let mut tracker = JobTracker::new(PollPolicy {
        interval: Duration::ZERO,
        max_wait: Duration::from_secs(60),
    });
    tracker.submitted(request.target_domain.as_deref());
    let snapshot = client.submit(&request).await.unwrap();
    assert!(matches!(tracker.observe(snapshot), JobState::Polling { .. }));

    assert_eq!(tracker.wait(&client).await.unwrap(), &JobState::Completed);
    let result = tracker.into_result().unwrap();
    let cells = result.rank_map.unwrap();
    assert_eq!(cells[0].rank, Some(2));
    assert_eq!(cells[1].rank, None);
    assert!(cells.iter().all(|c| c.status == CellStatus::Completed));
}

#[tokio::test]
async fn tracker_times_out_when_tasks_stay_pending() {
    let server = MockServer::start().await;
    mount_csrf(&server, "tok-1", 1).await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "task_status": { "completed": 0, "failed": 0, "pending": 2, "unknown": 0, "total": 2 }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/get-results/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let mut tracker = JobTracker::new(PollPolicy {
        interval: Duration::ZERO,
        max_wait: Duration::ZERO,
    });
    tracker.submitted(None);
    tracker.observe(serde_json::from_value(quick_result(2)).unwrap());

    assert_eq!(tracker.wait(&client).await.unwrap(), &JobState::TimedOut);
    assert_eq!(tracker.result().unwrap().summary().pending_count, 2);
}

#[tokio::test]
async fn tracker_keeps_polling_through_status_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/status/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "error": "provider unreachable"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/ranking/get-results/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), logged_in_session());
    let mut tracker = JobTracker::new(PollPolicy {
        interval: Duration::ZERO,
        max_wait: Duration::from_secs(60),
    });
    tracker.submitted(None);
    tracker.observe(serde_json::from_value(quick_result(2)).unwrap());

    assert_eq!(tracker.wait(&client).await.unwrap(), &JobState::TimedOut);
    assert_eq!(tracker.result().unwrap().summary().pending_count, 2);
}
