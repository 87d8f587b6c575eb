use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use mediasort_core::Settings;
use mediasort_organizer::Organizer;
use mediasort_scheduler::JobScheduler;
use mediasort_server::routes::build_router;
use mediasort_server::state::AppState;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct TestApp {
    server: TestServer,
    dir: TempDir,
    scheduler: Arc<JobScheduler>,
    organizer: Arc<Organizer>,
}

impl TestApp {
    fn source(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join("downloads").join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Run one file through the pipeline so it lands in the review queue.
    async fn queue(&self, name: &str) -> PathBuf {
        let path = self.source(name, b"unlabelled video");
        self.organizer
            .process_file(&path, &CancellationToken::new())
            .await
            .unwrap();
        path
    }

    async fn pending(&self, query: &str) -> Vec<Value> {
        let resp = self.server.get(&format!("/api/v1/pending{query}")).await;
        resp.assert_status_ok();
        resp.json::<Value>().as_array().unwrap().clone()
    }
}

/// Create a test server over an in-memory database and a scratch library.
/// No provider keys are configured, so every lookup comes back empty.
async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        source_dir: dir.path().join("downloads"),
        incomplete_dir: dir.path().join("downloads/incomplete"),
        movies_dir: dir.path().join("movies"),
        tv_dir: dir.path().join("tv"),
        ..Default::default()
    };
    std::fs::create_dir_all(&settings.source_dir).unwrap();
    let settings = Arc::new(settings);

    let pool = mediasort_db::open(":memory:").await.unwrap();
    let organizer = Arc::new(mediasort_server::build_organizer(settings.clone(), pool.clone()));
    let scheduler = Arc::new(JobScheduler::new());

    let state = AppState {
        db: pool,
        settings,
        organizer: organizer.clone(),
        scheduler: scheduler.clone(),
        shutdown: CancellationToken::new(),
    };

    TestApp {
        server: TestServer::new(build_router(state)).unwrap(),
        dir,
        scheduler,
        organizer,
    }
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = test_app().await;
    let resp = app.server.get("/health").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn status_starts_empty() {
    let app = test_app().await;
    let resp = app.server.get("/api/v1/status").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["session"]["counters"]["total"], 0);
    assert_eq!(body["session"]["recent"], json!([]));
    assert_eq!(body["records"]["success"], 0);
    assert_eq!(body["records"]["error"], 0);
    assert_eq!(body["records"]["skipped_duplicate"], 0);
}

#[tokio::test]
async fn history_is_empty_on_a_fresh_database() {
    let app = test_app().await;
    let resp = app.server.get("/api/v1/history").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn approving_without_metadata_records_an_error() {
    let app = test_app().await;
    let path = app.source("mystery.mkv", b"some video bytes");

    let resp = app
        .server
        .post("/api/v1/approve")
        .json(&json!({
            "path": path,
            "kind": "movie",
            "title": "Mystery Film",
            "year": 2001
        }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["status"], "error");
    assert!(body["destination_path"].is_null());
    assert!(path.exists(), "failed approval must keep the source");

    let history: Value = app.server.get("/api/v1/history?limit=5").await.json();
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "error");
    assert_eq!(rows[0]["destination_path"], "");

    let status: Value = app.server.get("/api/v1/status").await.json();
    assert_eq!(status["session"]["counters"]["error"], 1);
    assert_eq!(status["records"]["error"], 1);
}

#[tokio::test]
async fn approving_a_missing_file_is_not_found() {
    let app = test_app().await;
    let path = app.dir.path().join("downloads/absent.mkv");
    let resp = app
        .server
        .post("/api/v1/approve")
        .json(&json!({ "path": path, "kind": "movie", "title": "Absent" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn approving_with_an_empty_title_is_rejected() {
    let app = test_app().await;
    let path = app.source("blank.mkv", b"bytes");
    let resp = app
        .server
        .post("/api/v1/approve")
        .json(&json!({ "path": path, "kind": "episode", "title": "  ", "season": 1, "episode": 2 }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(path.exists());
}

#[tokio::test]
async fn jobs_can_be_created_listed_and_deleted() {
    let app = test_app().await;

    let resp = app
        .server
        .post("/api/v1/jobs")
        .json(&json!({
            "name": "nightly-sweep",
            "kind": "duplicate_sweep",
            "cron": "0 0 3 * * *"
        }))
        .await;
    resp.assert_status(StatusCode::CREATED);
    let created: Value = resp.json();
    assert_eq!(created["name"], "nightly-sweep");
    assert_eq!(created["cron"], "0 0 3 * * *");
    assert!(created["next_run"].is_string());
    assert!(app.scheduler.contains("nightly-sweep"));

    let list: Value = app.server.get("/api/v1/jobs").await.json();
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|j| j["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["nightly-sweep"]);

    let resp = app.server.delete("/api/v1/jobs/nightly-sweep").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["ok"], true);
    assert!(!app.scheduler.contains("nightly-sweep"));

    let resp = app.server.delete("/api/v1/jobs/nightly-sweep").await;
    resp.assert_status(StatusCode::NOT_FOUND);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn invalid_cron_is_a_bad_request() {
    let app = test_app().await;
    let resp = app
        .server
        .post("/api/v1/jobs")
        .json(&json!({
            "name": "broken",
            "kind": "process_directory",
            "cron": "every tuesday"
        }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(!app.scheduler.contains("broken"));
}

#[tokio::test]
async fn scan_is_accepted() {
    let app = test_app().await;
    let resp = app.server.post("/api/v1/scan").await;
    resp.assert_status(StatusCode::ACCEPTED);
    let body: Value = resp.json();
    assert_eq!(body["status"], "accepted");
}

#[tokio::test]
async fn unrecognized_files_wait_in_the_review_queue() {
    let app = test_app().await;
    let path = app.queue("camera roll.mkv").await;

    let rows = app.pending("").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["file_path"], path.to_string_lossy().as_ref());
    assert_eq!(rows[0]["status"], "pending");
    assert_eq!(rows[0]["reason"], "unrecognized filename");
    assert_eq!(rows[0]["size_bytes"], 16);

    assert!(app.pending("?status=rejected").await.is_empty());
    assert_eq!(app.pending("?status=all").await.len(), 1);

    let resp = app.server.get("/api/v1/pending?status=lost").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejected_entries_leave_the_queue() {
    let app = test_app().await;
    app.queue("camera roll.mkv").await;
    let id = app.pending("").await[0]["id"].as_str().unwrap().to_string();

    let resp = app
        .server
        .post(&format!("/api/v1/pending/{id}/reject"))
        .json(&json!({ "notes": "holiday footage" }))
        .await;
    resp.assert_status_ok();
    assert_eq!(resp.json::<Value>()["ok"], true);

    assert!(app.pending("").await.is_empty());
    let rejected = app.pending("?status=rejected").await;
    assert_eq!(rejected[0]["review_notes"], "holiday footage");

    let resp = app
        .server
        .post("/api/v1/pending/no-such-id/reject")
        .json(&json!({}))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn approving_a_pending_entry_runs_the_pipeline() {
    let app = test_app().await;
    let path = app.queue("camera roll.mkv").await;
    let id = app.pending("").await[0]["id"].as_str().unwrap().to_string();

    let resp = app
        .server
        .post(&format!("/api/v1/pending/{id}/approve"))
        .json(&json!({ "kind": "movie", "title": "Holiday", "year": 2019 }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    // No provider keys, so the lookup fails and the entry stays pending.
    assert_eq!(body["status"], "error");
    assert!(path.exists());

    let rows = app.pending("").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["suggested_title"], "Holiday");
    assert_eq!(rows[0]["suggested_year"], 2019);

    let resp = app
        .server
        .post("/api/v1/pending/no-such-id/approve")
        .json(&json!({ "kind": "movie", "title": "Holiday" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);

    app.server
        .post(&format!("/api/v1/pending/{id}/reject"))
        .json(&json!({}))
        .await
        .assert_status_ok();
    let resp = app
        .server
        .post(&format!("/api/v1/pending/{id}/approve"))
        .json(&json!({ "kind": "movie", "title": "Holiday" }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approving_a_pending_entry_whose_file_is_gone_is_not_found() {
    let app = test_app().await;
    let path = app.queue("camera roll.mkv").await;
    let id = app.pending("").await[0]["id"].as_str().unwrap().to_string();
    std::fs::remove_file(&path).unwrap();

    let resp = app
        .server
        .post(&format!("/api/v1/pending/{id}/approve"))
        .json(&json!({ "kind": "movie", "title": "Holiday" }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn search_without_results_is_not_found() {
    let app = test_app().await;
    let resp = app
        .server
        .post("/api/v1/search")
        .json(&json!({ "kind": "series", "title": "Nothing Like It", "year": 2010 }))
        .await;
    resp.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["error"]["code"], "not_found");

    let resp = app
        .server
        .post("/api/v1/search")
        .json(&json!({ "kind": "movie", "title": " " }))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn downloads_listing_stays_inside_the_source_directory() {
    let app = test_app().await;
    let downloads = app.dir.path().join("downloads");
    std::fs::create_dir_all(downloads.join("incomplete")).unwrap();
    std::fs::create_dir_all(downloads.join("Pack")).unwrap();
    std::fs::write(downloads.join("Pack/Show.S01E01.mkv"), b"ep").unwrap();
    app.source("Film.2020.mkv", b"film");

    let resp = app.server.get("/api/v1/downloads").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    let names: Vec<&str> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Pack", "Film.2020.mkv"]);
    assert_eq!(body["entries"][0]["is_directory"], true);
    assert_eq!(body["entries"][1]["is_video"], true);
    assert_eq!(body["entries"][1]["size_bytes"], 4);

    let resp = app.server.get("/api/v1/downloads?path=Pack").await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["entries"][0]["name"], "Show.S01E01.mkv");

    let resp = app.server.get("/api/v1/downloads?path=../movies").await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    std::fs::create_dir_all(app.dir.path().join("movies")).unwrap();
    let outside = app.dir.path().join("movies");
    let resp = app
        .server
        .get("/api/v1/downloads")
        .add_query_param("path", outside.to_string_lossy())
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);

    let resp = app.server.get("/api/v1/downloads?path=incomplete").await;
    resp.assert_status(StatusCode::BAD_REQUEST);
}
