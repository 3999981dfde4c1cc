use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use pretty_assertions::assert_eq;
use savestate_engine::SaveStateService;
use savestate_server::create_router;
use savestate_storage::SaveStatePaths;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestServer {
    root: TempDir,
    router: Router,
}

impl TestServer {
    async fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let paths = SaveStatePaths::from_root(root.path().join("data"));
        let service = Arc::new(SaveStateService::open(paths).await.unwrap());
        Self {
            router: create_router(service),
            root,
        }
    }

    /// A server whose settings point at an empty bare repository.
    async fn with_remote() -> Self {
        let server = Self::new().await;
        let remote = server.root.path().join("remote.git");
        git(server.root.path(), &["init", "--bare", remote.to_str().unwrap()]);

        let (status, body) = server
            .post(
                "/api/config",
                json!({ "repo_url": remote.to_str().unwrap(), "display_name": "Tester" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        server
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn post_empty(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[tokio::test]
async fn test_health_reports_version() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_status_of_fresh_install() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/api/status").await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["initialized"], false);
    assert_eq!(data["is_authorized"], false);
    assert_eq!(data["branch"], "main");
    assert_eq!(data["auto_save"]["running"], false);
    assert_eq!(data["auto_save"]["interval_minutes"], 30);
}

#[tokio::test]
async fn test_lifecycle_requires_authorization() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/api/checkpoints").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "not_authorized");
    assert!(body["message"].as_str().unwrap().contains("Not authorized"));
}

#[tokio::test]
async fn test_config_never_returns_the_token() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post(
            "/api/config",
            json!({ "repo_url": "https://github.com/acme/saves.git", "token": "ghp_secret" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.to_string().contains("ghp_secret"));

    let (status, body) = server.get("/api/config").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["token"], "********");
    assert_eq!(body["data"]["has_token"], true);
    assert_eq!(body["data"]["repo_url"], "https://github.com/acme/saves.git");
    assert!(!body.to_string().contains("ghp_secret"));
}

#[tokio::test]
async fn test_authorize_without_repository_is_rejected() {
    let server = TestServer::new().await;

    let (status, body) = server.post_empty("/api/authorize").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn test_malformed_body_gets_the_envelope() {
    let server = TestServer::new().await;

    let response = server
        .send(
            Request::post("/api/checkpoints")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{ not json"))
                .unwrap(),
        )
        .await;

    assert_eq!(response.0, StatusCode::BAD_REQUEST);
    assert_eq!(response.1["success"], false);
    assert_eq!(response.1["code"], "bad_request");
}

#[tokio::test]
async fn test_nothing_to_apply() {
    let server = TestServer::new().await;

    let (status, body) = server.post_empty("/api/interrupted-work/apply").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_interrupted_work");
}

#[tokio::test]
async fn test_checkpoint_round_trip_over_http() {
    let server = TestServer::with_remote().await;

    let (status, body) = server.post("/api/authorize", json!({ "branch": "main" })).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["branch"], "main");

    let (status, body) = server
        .post("/api/checkpoints", json!({ "name": "Before boss", "description": "Full health" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let tag = body["data"]["tag"].as_str().unwrap().to_string();
    assert!(tag.starts_with("save_"));

    let (status, body) = server.get("/api/checkpoints").await;
    assert_eq!(status, StatusCode::OK);
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["name"], "Before boss");
    assert_eq!(list[0]["description"], "Full health");

    let (status, body) = server
        .get(&format!("/api/diff?ref1={tag}&ref2={tag}"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["files"], json!([]));

    let (status, body) = server.post_empty(&format!("/api/checkpoints/{tag}/load")).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = server.delete(&format!("/api/checkpoints/{tag}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["cleared_current"], true);

    let (status, body) = server.post_empty(&format!("/api/checkpoints/{tag}/load")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_diff_requires_both_refs() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/api/diff?ref1=HEAD").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}
