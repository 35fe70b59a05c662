//! HTTP adapter tests on an ephemeral port.

mod common;

use std::sync::Arc;
use std::time::Duration;

use docvault::db;
use docvault::gateway::GatewayFetcher;
use docvault::migrate;
use docvault::models::SourceRecord;
use docvault::server::{router, AppState};
use docvault::store::{RecoveryStore, SqliteRecoveryStore};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

struct TestServer {
    base: String,
    store: Arc<SqliteRecoveryStore>,
    _tmp: TempDir,
    _gateway: MockServer,
}

async fn start() -> TestServer {
    let gateway = MockServer::start().await;
    Mock::given(path("/ipfs/QmEnc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE_ENVELOPE))
        .mount(&gateway)
        .await;

    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("server.sqlite"))
        .await
        .unwrap();
    migrate::apply(&pool).await.unwrap();
    let store = Arc::new(SqliteRecoveryStore::new(pool));

    let fetcher = Arc::new(
        GatewayFetcher::new(
            vec![format!("{}/ipfs/", gateway.uri())],
            Duration::from_secs(2),
        )
        .unwrap(),
    );
    let app = router(AppState {
        fetcher,
        store: store.clone(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        store,
        _tmp: tmp,
        _gateway: gateway,
    }
}

async fn post_decrypt(server: &TestServer, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/decrypt", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_version() {
    let server = start().await;
    let body: Value = reqwest::get(format!("{}/health", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn decrypt_by_content_ref() {
    let server = start().await;
    let (status, body) = post_decrypt(
        &server,
        json!({ "content_ref": "QmEnc", "decryption_key": PASSPHRASE }),
    )
    .await;

    assert_eq!(status, 200);
    assert!(body["served_by"].as_str().unwrap().ends_with("/ipfs/"));
    assert_eq!(body["initial_format"], "cipher_envelope");
    assert_eq!(body["decrypted"], true);
    assert_eq!(body["format"], "json_envelope");
    assert_eq!(body["json"]["message"], "Decryption is working!");
    assert_eq!(body["artifacts"], json!([]));
}

#[tokio::test]
async fn decrypt_inline_blob_with_artifacts() {
    let server = start().await;
    let blob = encrypt(&envelope_json(), "pw", [3; 8]);
    let (status, body) =
        post_decrypt(&server, json!({ "blob": blob, "decryption_key": "pw" })).await;

    assert_eq!(status, 200);
    assert_eq!(body["served_by"], "inline");
    let artifacts = body["artifacts"].as_array().unwrap();
    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0]["kind"], "thumbnail");
    assert_eq!(artifacts[1]["kind"], "document");
    assert_eq!(artifacts[1]["mime_type"], "application/pdf");
    assert_eq!(artifacts[1]["size"], DOCUMENT_BYTES.len());
}

#[tokio::test]
async fn decrypt_errors_use_stable_codes() {
    let server = start().await;

    let (status, body) = post_decrypt(&server, json!({ "blob": FIXTURE_ENVELOPE })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "missing_key");

    let (status, body) = post_decrypt(
        &server,
        json!({ "blob": FIXTURE_ENVELOPE, "decryption_key": "wrong-key" }),
    )
    .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "decryption_failed");

    let (status, body) = post_decrypt(&server, json!({ "content_ref": "QmMissing" })).await;
    assert_eq!(status, 502);
    assert_eq!(body["error"]["code"], "fetch_exhausted");

    let (status, body) = post_decrypt(&server, json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = post_decrypt(&server, json!({ "blob": "plain words" })).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "unsupported_format");
}

#[tokio::test]
async fn status_endpoint() {
    let server = start().await;

    let resp = reqwest::get(format!("{}/status/doc-9", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    server
        .store
        .upsert_source_record(&SourceRecord {
            document_id: "doc-9".to_string(),
            content_ref: "QmEnc".to_string(),
            decryption_key: Some(PASSPHRASE.to_string()),
            case_label: "Case 9".to_string(),
        })
        .await
        .unwrap();
    server
        .store
        .mark_recovery_status("doc-9", false, "no artifacts found")
        .await
        .unwrap();

    let body: Value = reqwest::get(format!("{}/status/doc-9", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["document_id"], "doc-9");
    assert_eq!(body["recovered"], false);
    assert_eq!(body["status_detail"], "no artifacts found");
    assert_eq!(body["artifacts"], json!([]));
}
