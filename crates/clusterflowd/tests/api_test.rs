use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use clusterflow_cloud::ProviderKind;
use clusterflow_controlplane::testing::{FakeFactory, fake_template, fast_retry};
use clusterflow_controlplane::{ControlPlane, ReconcilerConfig, TeardownPolicy};
use clusterflowd::api::TERMINATION_ACCEPTED;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn plane() -> (ControlPlane, Arc<FakeFactory>) {
    let factory = Arc::new(FakeFactory::new());
    let (plane, _reconciler) = ControlPlane::start(
        factory.clone(),
        ReconcilerConfig {
            sweep_interval: Duration::from_secs(3600),
            retry: fast_retry(2),
            policy: TeardownPolicy::default(),
            retention: None,
        },
    );
    (plane, factory)
}

async fn send(plane: &ControlPlane, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = clusterflowd::router(plane.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn create(provider: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/{provider}/create"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn terminate(provider: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/{provider}/terminate"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (plane, _) = plane();
    let (status, _) = send(&plane, get("/health-check")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_and_status() {
    let (plane, _) = plane();

    let (status, body) = send(&plane, create("docker", fake_template("web-1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["clusterID"], "web-1");

    let (status, body) = send(&plane, get("/status?clusterID=web-1")).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json(&body);
    assert_eq!(summary["status"], "running");
    assert_eq!(summary["provider"], "docker");

    let (status, body) = send(&plane, get("/clusters")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_status_errors() {
    let (plane, _) = plane();

    let (status, body) = send(&plane, get("/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].is_string());

    let (status, _) = send(&plane, get("/status?clusterID=nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_errors() {
    let (plane, factory) = plane();

    let (status, _) = send(&plane, create("docker", b"{\"clusterID\":".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &plane,
        create("docker", br#"{"clusterID":"zero","nodes":0}"#.to_vec()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&plane, create("azure", fake_template("x"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    factory.set_enabled(ProviderKind::Aws, false);
    let (status, _) = send(&plane, create("aws", fake_template("x"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&plane, create("docker", fake_template("dup"))).await;
    let (status, _) = send(&plane, create("docker", fake_template("dup"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    factory.script("broken").fail_provision();
    let (status, body) = send(&plane, create("docker", fake_template("broken"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json(&body)["error"].as_str().is_some_and(|e| !e.is_empty()));
}

#[tokio::test]
async fn test_terminate() {
    let (plane, _) = plane();
    send(&plane, create("sakura", fake_template("batch"))).await;

    let (status, _) = send(&plane, terminate("sakura", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&plane, terminate("sakura", "clusterID=ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&plane, terminate("docker", "clusterID=batch")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!plane.get_status("batch").await.unwrap().cancel_requested);

    let (status, body) = send(&plane, terminate("sakura", "clusterID=batch")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, TERMINATION_ACCEPTED.as_bytes());
    assert!(plane.get_status("batch").await.unwrap().cancel_requested);
}

#[tokio::test]
async fn test_check_in() {
    let (plane, _) = plane();
    send(&plane, create("docker", fake_template("agent-1"))).await;

    let request = Request::builder()
        .method("POST")
        .uri("/check-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"clusterID":"agent-1","appExitStatus":"running","status":"step 3/10"}"#,
        ))
        .unwrap();
    let (status, _) = send(&plane, request).await;
    assert_eq!(status, StatusCode::OK);

    let summary = plane.get_status("agent-1").await.unwrap();
    assert_eq!(summary.agent_status.as_deref(), Some("step 3/10"));

    // Unknown clusters are accepted and ignored
    let request = Request::builder()
        .method("POST")
        .uri("/check-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"clusterID":"ghost","appExitStatus":"success"}"#))
        .unwrap();
    let (status, _) = send(&plane, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plane.list_clusters().await.len(), 1);

    let request = Request::builder()
        .method("POST")
        .uri("/check-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let (status, _) = send(&plane, request).await;
    assert!(status.is_client_error());
}
