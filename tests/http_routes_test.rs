use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use club_export::config::{Delivery, EnrichmentConfig};
use club_export::{create_router, AppState, AttributeClient, ExportEngine, LocalStorage};
use httpmock::prelude::*;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const BOUNDARY: &str = "club-export-test-boundary";
const PATH: &str = "/stores/teststore/v3/customers/attribute-values";

fn router(server: &MockServer, storage_dir: &std::path::Path, delivery: Delivery) -> Router {
    let client = AttributeClient::new(EnrichmentConfig {
        base_url: server.base_url(),
        store_hash: "teststore".to_string(),
        auth_token: "test-token".to_string(),
        attribute_id: 2,
        timeout_seconds: 2,
        retry_attempts: 0,
        retry_delay_ms: 10,
    });

    let state = AppState::new(
        ExportEngine::new(client),
        LocalStorage::new(storage_dir),
        delivery,
        "http://localhost:5000".to_string(),
        CancellationToken::new(),
    );
    create_router(state, 1024 * 1024)
}

fn multipart_request(field: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"customers.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = BOUNDARY,
        f = field,
        c = content
    );

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn mock_lookup(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path(PATH);
        then.status(200).json_body(serde_json::json!({
            "data": [{"attribute_id": 2, "attribute_value": "2025-09-30"}]
        }));
    });
}

const CSV: &str = "Customer ID,Customer Name,Email,Customer Group,Date Joined\n\
                   1,Ann,ann@example.com,Gold Service Club,2019-01-01\n\
                   2,Bob,bob@example.com,Bronze,2019-01-01\n";

#[tokio::test]
async fn test_inline_upload_returns_csv_attachment() {
    let server = MockServer::start();
    mock_lookup(&server);
    let temp_dir = TempDir::new().unwrap();
    let app = router(&server, temp_dir.path(), Delivery::Inline);

    let response = app.oneshot(multipart_request("file", CSV)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"expired-customers-"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "Customer ID,Customer Name,Email,Customer Group,Expiration Date\n\
         1,Ann,ann@example.com,Gold Service Club,2025-09-30\n"
    );
}

#[tokio::test]
async fn test_missing_file_field_is_bad_request() {
    let server = MockServer::start();
    let temp_dir = TempDir::new().unwrap();
    let app = router(&server, temp_dir.path(), Delivery::Inline);

    let response = app.oneshot(multipart_request("other", CSV)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "input_missing");
    assert_eq!(json["message"], "No file uploaded.");
}

#[tokio::test]
async fn test_no_matching_customers_is_bad_request() {
    let server = MockServer::start();
    let temp_dir = TempDir::new().unwrap();
    let app = router(&server, temp_dir.path(), Delivery::Inline);

    let csv = "Customer ID,Customer Name,Email,Customer Group,Date Joined\n\
               2,Bob,bob@example.com,Bronze,2019-01-01\n";
    let response = app.oneshot(multipart_request("file", csv)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["code"], "no_matching_records");
    assert_eq!(
        json["message"],
        "No customers found matching the specified groups."
    );
}

#[tokio::test]
async fn test_stored_delivery_then_download() {
    let server = MockServer::start();
    mock_lookup(&server);
    let temp_dir = TempDir::new().unwrap();
    let app = router(&server, temp_dir.path(), Delivery::Stored);

    let response = app
        .clone()
        .oneshot(multipart_request("file", CSV))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    let file_name = json["fileName"].as_str().unwrap().to_string();
    assert_eq!(
        json["downloadUrl"],
        format!("http://localhost:5000/download/{}", file_name)
    );
    assert!(temp_dir.path().join(&file_name).exists());

    let download = app
        .oneshot(
            Request::builder()
                .uri(format!("/download/{}", file_name))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    let body = to_bytes(download.into_body(), usize::MAX).await.unwrap();
    assert!(std::str::from_utf8(&body).unwrap().contains("2025-09-30"));
}

#[tokio::test]
async fn test_download_rejects_traversal_and_missing_files() {
    let server = MockServer::start();
    let temp_dir = TempDir::new().unwrap();
    let app = router(&server, temp_dir.path(), Delivery::Stored);

    let traversal = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/download/..%2Fsecret.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);

    let missing = app
        .oneshot(
            Request::builder()
                .uri("/download/nothing-here.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start();
    let temp_dir = TempDir::new().unwrap();
    let app = router(&server, temp_dir.path(), Delivery::Inline);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
}
