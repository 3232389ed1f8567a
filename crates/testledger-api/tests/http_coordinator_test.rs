//! Contract tests for `HttpCoordinator` against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{basic_auth, body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use testledger_api::models::{
    ClaimRequest, CompletionReport, HealthQuery, HealthStatus, NewSession, SessionState,
    SessionStrategy, SpecResult,
};
use testledger_api::{ApiConfig, ApiError, Coordinator, HttpCoordinator};

fn coordinator_for(server: &MockServer) -> HttpCoordinator {
    let config = ApiConfig::new(server.uri(), "token-123").with_username("ci-bot");
    HttpCoordinator::new(config).expect("client should build")
}

#[tokio::test]
async fn health_config_sends_filters_and_decodes_skip_specs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orchestration/config"))
        .and(query_param("project_id", "42"))
        .and(query_param("version", "1.2.0"))
        .and(query_param("include_flaky", "true"))
        .and(query_param("include_quarantined", "false"))
        .and(basic_auth("ci-bot", "token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "project_id": 42,
            "skip_specs": [
                {"spec_file": "login.spec.ts", "reason": "flaky", "flaky_count": 5, "pass_rate": 0.7},
                {"spec_file": "cart.spec.ts", "reason": "quarantined"}
            ],
            "counts": {"flaky": 1, "quarantined": 1, "total": 2}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let mut query = HealthQuery::new(42);
    query.version = Some("1.2.0".to_owned());
    query.include_flaky = Some(true);
    query.include_quarantined = Some(false);

    let report = coordinator.health_config(&query).await.unwrap();
    assert_eq!(report.skip_specs.len(), 2);
    assert_eq!(report.skip_specs[0].reason, HealthStatus::Flaky);
    assert_eq!(report.skip_specs[0].occurrence_count, Some(5));
    assert_eq!(report.skip_specs[1].reason, HealthStatus::Quarantined);
    assert_eq!(report.counts.total, 2);
}

#[tokio::test]
async fn non_success_status_surfaces_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orchestration/config"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let err = coordinator
        .health_config(&HealthQuery::new(1))
        .await
        .unwrap_err();

    match err {
        ApiError::Status { status, ref body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "database unavailable");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(err.to_string().contains("database unavailable"));
}

#[tokio::test]
async fn create_session_posts_ordered_specs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orchestration/session"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "project_id": 9,
            "total_specs": ["a.spec.ts", "b.spec.ts"],
            "node_count": 3,
            "strategy": "duration_based"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "session_id": "sess-1",
            "total_specs_count": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let created = coordinator
        .create_session(&NewSession {
            project_id: 9,
            total_specs: vec!["a.spec.ts".to_owned(), "b.spec.ts".to_owned()],
            version: None,
            node_count: 3,
            strategy: SessionStrategy::DurationBased,
        })
        .await
        .unwrap();

    assert_eq!(created.session_id, "sess-1");
    assert_eq!(created.total_specs_count, 2);
}

#[tokio::test]
async fn claim_and_complete_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orchestration/claim"))
        .and(body_json(json!({
            "session_id": "sess-1",
            "node_id": "node-1",
            "batch_size": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "specs": ["a.spec.ts"],
            "remaining": 4
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orchestration/complete"))
        .and(body_json(json!({
            "session_id": "sess-1",
            "spec_file": "a.spec.ts",
            "result": "passed",
            "duration": 1500
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let batch = coordinator
        .claim(&ClaimRequest {
            session_id: "sess-1".to_owned(),
            node_id: "node-1".to_owned(),
            batch_size: 10,
        })
        .await
        .unwrap();
    assert_eq!(batch.specs, vec!["a.spec.ts"]);
    assert_eq!(batch.remaining, 4);

    let ack = coordinator
        .complete(&CompletionReport {
            session_id: "sess-1".to_owned(),
            spec_file: "a.spec.ts".to_owned(),
            result: SpecResult::Passed,
            duration: Some(1500),
        })
        .await
        .unwrap();
    assert_eq!(ack.status, "ok");
}

#[tokio::test]
async fn session_status_and_close() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orchestration/status/sess-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session": {
                "session_id": "sess-9",
                "status": "open",
                "strategy": "round_robin",
                "total_specs": 25,
                "claimed_count": 20,
                "completed_count": 10,
                "passed_count": 9,
                "failed_count": 1
            },
            "nodes": [
                {"node_id": "node-1", "claimed": 10, "completed": 10, "passed": 9, "failed": 1},
                {"node_id": "node-2", "claimed": 10}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/orchestration/session/sess-9/close"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let status = coordinator.session_status("sess-9").await.unwrap();
    assert_eq!(status.session.status, SessionState::Open);
    assert_eq!(status.session.progress_percent(), 40);
    assert_eq!(status.nodes.len(), 2);
    assert_eq!(status.nodes[1].completed, 0);

    // An empty acknowledgement body is accepted.
    let ack = coordinator.close_session("sess-9").await.unwrap();
    assert_eq!(ack.status, "");
}

#[tokio::test]
async fn malformed_json_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orchestration/claim"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let coordinator = coordinator_for(&server);
    let err = coordinator
        .claim(&ClaimRequest {
            session_id: "s".to_owned(),
            node_id: "n".to_owned(),
            batch_size: 1,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse { .. }), "got {err:?}");
}

#[tokio::test]
async fn verify_credentials_distinguishes_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .and(basic_auth("ci-bot", "token-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    assert!(coordinator_for(&server).verify_credentials().await.unwrap());

    let rejecting = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .mount(&rejecting)
        .await;
    assert!(!coordinator_for(&rejecting).verify_credentials().await.unwrap());
}
