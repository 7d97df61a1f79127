//! Stories about the serving deployment

use axum::http::StatusCode;
use serde_json::json;

use modelplane_lifecycle::OrchestratorClient;

use super::fake_cluster::{TestApp, DOMAIN};

const TENANT: &str = "user-a";
const TENANT_ID: &str = "fc95297aa4f56781f0decb7d4bf59b14";
const SERVING: &str = "serving-fc95297aa4f56781f0decb7d4bf59b14";

fn url() -> String {
    format!("https://{}/serving/{}", DOMAIN, TENANT_ID)
}

/// Story: a tenant deploys, waits for the model to load, and gets its URL
#[tokio::test]
async fn story_deploy_and_wait_until_available() {
    let app = TestApp::new();

    let (status, body) = app.send("POST", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"id": SERVING, "url": url()}));

    let mut objects = app.cluster.object_names(TENANT_ID);
    objects.sort();
    assert_eq!(
        objects,
        vec![
            format!("ConfigMap/{}", SERVING),
            format!("Deployment/{}", SERVING),
            format!("Ingress/{}", SERVING),
            format!("Service/{}", SERVING),
        ]
    );

    let (status, body) = app.send("GET", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"available": false, "url": url()}));

    app.cluster.set_available_replicas(TENANT_ID, SERVING, 1);
    let (_, body) = app.send("GET", "/serving", Some(TENANT), None).await;
    assert_eq!(body, json!({"available": true, "url": url()}));
}

/// Story: a tenant has at most one serving deployment
#[tokio::test]
async fn story_second_deployment_is_refused() {
    let app = TestApp::new();

    let (status, _) = app.send("POST", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send("POST", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Deployment already exists"}));
    assert_eq!(app.cluster.object_names(TENANT_ID).len(), 4);
}

/// Story: delete removes everything, after which the tenant can deploy again
#[tokio::test]
async fn story_delete_then_redeploy() {
    let app = TestApp::new();
    app.send("POST", "/serving", Some(TENANT), None).await;

    let (status, body) = app.send("DELETE", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::Value::Null);
    assert!(app.cluster.object_names(TENANT_ID).is_empty());

    let (status, body) = app.send("GET", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Deployment not found"}));

    let (status, _) = app.send("DELETE", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("POST", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::CREATED);
}

/// Story: delete cleans up a deployment that is already half gone
#[tokio::test]
async fn story_delete_tolerates_missing_pieces() {
    let app = TestApp::new();
    app.send("POST", "/serving", Some(TENANT), None).await;
    app.cluster
        .delete_service(TENANT_ID, SERVING)
        .await
        .unwrap();

    // Without its Service the deployment is not reachable, so it reads as absent
    let (status, _) = app.send("GET", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send("DELETE", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.cluster.object_names(TENANT_ID).is_empty());
}

/// Story: a real delete failure stops the teardown where it happened
#[tokio::test]
async fn story_delete_stops_on_failure() {
    let app = TestApp::new();
    app.send("POST", "/serving", Some(TENANT), None).await;
    app.cluster.fail_next("Service", 500);

    let (status, body) = app.send("DELETE", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "internal error"}));

    let mut objects = app.cluster.object_names(TENANT_ID);
    objects.sort();
    assert_eq!(
        objects,
        vec![
            format!("ConfigMap/{}", SERVING),
            format!("Ingress/{}", SERVING),
            format!("Service/{}", SERVING),
        ]
    );

    // Retrying finishes the job
    let (status, _) = app.send("DELETE", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.cluster.object_names(TENANT_ID).is_empty());
}

/// Story: a failed create rolls back what it made, so a retry starts clean
#[tokio::test]
async fn story_failed_create_is_rolled_back() {
    let app = TestApp::new();
    app.cluster.fail_next("Ingress", 500);

    let (status, body) = app.send("POST", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "internal error"}));
    assert!(app.cluster.object_names(TENANT_ID).is_empty());

    let (status, _) = app.send("POST", "/serving", Some(TENANT), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.cluster.object_names(TENANT_ID).len(), 4);
}
