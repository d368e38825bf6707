//! Direct and multipart uploads against a mock upload API

use serde_json::json;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use ucare_client::{
    part_count, Client, ClientError, Config, StorePolicy, UploadOptions, UploadProgress,
    UploadSignature, UploadSource,
};
use wiremock::matchers::{body_string_contains, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const SESSION: &str = "f3b6c4a2-5d0e-4a3b-9c1d-2e7f8a9b0c1d";
const FILE_ID: &str = "0a6f1d57-e0a1-4c2b-9f68-4b5e6a7c8d9e";

fn config(server: &MockServer) -> Config {
    Config::new("demopublickey", Some("demosecretkey".to_string()))
        .with_bases(server.uri(), server.uri())
        .with_multipart(10, 4)
}

async fn mount_file_lookup(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{}/", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": id, "is_ready": true})))
        .mount(server)
        .await;
}

async fn mount_session(server: &MockServer, parts: u64) {
    let urls: Vec<String> = (0..parts)
        .map(|i| format!("{}/part/{}/", server.uri(), i))
        .collect();
    Mock::given(method("POST"))
        .and(path("/multipart/start/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": SESSION, "parts": urls})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/multipart/complete/"))
        .and(body_string_contains(SESSION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": FILE_ID})))
        .mount(server)
        .await;
}

async fn part_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "PUT" && r.url.path().starts_with("/part/"))
        .collect()
}

fn spool_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_small_payload_goes_direct() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/base/"))
        .and(body_string_contains("UPLOADCARE_PUB_KEY"))
        .and(body_string_contains("demopublickey"))
        .and(body_string_contains("UPLOADCARE_STORE"))
        .and(body_string_contains("hello.txt"))
        .and(body_string_contains("0123456789"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"file": FILE_ID})))
        .expect(1)
        .mount(&server)
        .await;
    mount_file_lookup(&server, FILE_ID).await;

    let client = Client::new(config(&server)).unwrap();
    let file = client
        .upload(UploadSource::bytes(&b"0123456789"[..], "hello.txt"), &UploadOptions::new())
        .await
        .unwrap();
    assert_eq!(file.uuid, FILE_ID);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/multipart/start/"));
}

#[tokio::test]
async fn test_part_count_and_last_chunk_length() {
    for (size, chunk) in [(11u64, 4u64), (12, 4), (13, 13), (25, 5)] {
        let server = MockServer::start().await;
        let expected = part_count(size, chunk);
        mount_session(&server, expected).await;
        mount_file_lookup(&server, FILE_ID).await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/part/\d+/$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let config = config(&server).with_multipart(size - 1, chunk);
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        let file = Client::new(config)
            .unwrap()
            .upload(UploadSource::bytes(data.clone(), "blob.bin"), &UploadOptions::new())
            .await
            .unwrap();
        assert_eq!(file.uuid, FILE_ID);

        let mut parts = part_requests(&server).await;
        assert_eq!(parts.len() as u64, expected, "size {} chunk {}", size, chunk);
        parts.sort_by_key(|r| r.url.path().to_string());

        let tail = if size % chunk == 0 { chunk } else { size % chunk };
        assert_eq!(parts.last().unwrap().body.len() as u64, tail);
        let joined: Vec<u8> = parts.iter().flat_map(|r| r.body.clone()).collect();
        assert_eq!(joined, data);
    }
}

#[tokio::test]
async fn test_parts_are_raw_unsigned_puts() {
    let server = MockServer::start().await;
    mount_session(&server, 3).await;
    mount_file_lookup(&server, FILE_ID).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/part/\d+/$"))
        .and(header("content-type", "text/plain"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let client = Client::new(config(&server).with_part_concurrency(2)).unwrap();
    client
        .upload(UploadSource::bytes(vec![b'x'; 11], "notes.txt"), &UploadOptions::new())
        .await
        .unwrap();

    for part in part_requests(&server).await {
        assert!(part.headers.get("authorization").is_none());
    }
}

#[tokio::test]
async fn test_start_carries_metadata_and_signature() {
    let server = MockServer::start().await;
    let urls: Vec<String> = (0..3).map(|i| format!("{}/part/{}/", server.uri(), i)).collect();
    Mock::given(method("POST"))
        .and(path("/multipart/start/"))
        .and(body_string_contains("photo.jpg"))
        .and(body_string_contains("image/jpeg"))
        .and(body_string_contains("1454902434"))
        .and(body_string_contains("46f70d2b4fb6196daeb2d4f9f4d7b3a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": SESSION, "parts": urls})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/multipart/complete/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": FILE_ID})))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/part/\d+/$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    mount_file_lookup(&server, FILE_ID).await;

    let options = UploadOptions::new()
        .with_store(StorePolicy::Store)
        .with_signature(UploadSignature::new("46f70d2b4fb6196daeb2d4f9f4d7b3a2", "1454902434"));
    Client::new(config(&server))
        .unwrap()
        .upload(UploadSource::bytes(vec![0u8; 11], "photo.jpg"), &options)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_part_url_count_mismatch_is_upload_failure() {
    let server = MockServer::start().await;
    mount_session(&server, 2).await;

    let err = Client::new(config(&server))
        .unwrap()
        .upload(UploadSource::bytes(vec![0u8; 11], "blob.bin"), &UploadOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_upload_failure());
    assert!(part_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_stream_spool_removed_after_success() {
    let server = MockServer::start().await;
    mount_session(&server, 3).await;
    mount_file_lookup(&server, FILE_ID).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/part/\d+/$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let spool = tempfile::tempdir().unwrap();
    let client = Client::new(config(&server).with_spool_dir(spool.path())).unwrap();
    let source = UploadSource::reader(Cursor::new(vec![1u8; 11]), "stream.bin");
    client.upload(source, &UploadOptions::new()).await.unwrap();

    assert_eq!(part_requests(&server).await.len(), 3);
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_stream_spool_removed_after_part_failure() {
    let server = MockServer::start().await;
    mount_session(&server, 3).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/part/\d+/$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storage offline"))
        .mount(&server)
        .await;

    let spool = tempfile::tempdir().unwrap();
    let client = Client::new(config(&server).with_spool_dir(spool.path())).unwrap();
    let source = UploadSource::reader(Cursor::new(vec![1u8; 11]), "stream.bin");
    let err = client.upload(source, &UploadOptions::new()).await.unwrap_err();

    // Transport errors surface unchanged.
    assert!(matches!(err, ClientError::Api { status: 500, .. }));
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_stream_spool_removed_after_rejected_start() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/multipart/start/"))
        .respond_with(ResponseTemplate::new(403).set_body_string("pub_key is invalid"))
        .mount(&server)
        .await;

    let spool = tempfile::tempdir().unwrap();
    let client = Client::new(config(&server).with_spool_dir(spool.path())).unwrap();
    let source = UploadSource::reader(Cursor::new(vec![1u8; 11]), "stream.bin");
    let err = client.upload(source, &UploadOptions::new()).await.unwrap_err();

    assert!(err.is_auth_error());
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_small_stream_spool_removed_after_direct_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/base/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"file": FILE_ID})))
        .mount(&server)
        .await;
    mount_file_lookup(&server, FILE_ID).await;

    let spool = tempfile::tempdir().unwrap();
    let client = Client::new(config(&server).with_spool_dir(spool.path())).unwrap();
    let source = UploadSource::reader(Cursor::new(b"tiny".to_vec()), "tiny.txt");
    client.upload(source, &UploadOptions::new()).await.unwrap();
    assert_eq!(spool_entries(spool.path()), 0);
}

#[tokio::test]
async fn test_upload_only_client_uses_public_info_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/base/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"file": FILE_ID})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/info/"))
        .and(query_param("pub_key", "demopublickey"))
        .and(query_param("file_id", FILE_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": FILE_ID})))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::upload_only("demopublickey").with_bases(server.uri(), server.uri());
    let file = Client::new(config)
        .unwrap()
        .upload(UploadSource::bytes(&b"abc"[..], "a.txt"), &UploadOptions::new())
        .await
        .unwrap();
    assert_eq!(file.uuid, FILE_ID);

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/files/")));
}

#[tokio::test]
async fn test_upload_from_path() {
    let server = MockServer::start().await;
    mount_session(&server, 3).await;
    mount_file_lookup(&server, FILE_ID).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/part/\d+/$"))
        .and(header("content-type", "image/png"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("chart.png");
    std::fs::write(&file_path, vec![9u8; 11]).unwrap();

    let file = Client::new(config(&server))
        .unwrap()
        .upload(UploadSource::path(&file_path), &UploadOptions::new())
        .await
        .unwrap();
    assert_eq!(file.uuid, FILE_ID);
    assert!(file_path.exists());
}

#[tokio::test]
async fn test_missing_path_is_upload_failure() {
    let server = MockServer::start().await;
    let err = Client::new(config(&server))
        .unwrap()
        .upload(UploadSource::path("/definitely/not/here.bin"), &UploadOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_upload_failure());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_reported_per_part() {
    let server = MockServer::start().await;
    mount_session(&server, 3).await;
    mount_file_lookup(&server, FILE_ID).await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/part/\d+/$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let seen: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let client = Client::new(config(&server)).unwrap();
    let uploader = client
        .uploader()
        .on_progress(Box::new(move |p| sink.lock().unwrap().push(p)));
    uploader
        .upload(UploadSource::bytes(vec![0u8; 11], "blob.bin"), &UploadOptions::new())
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[2].bytes_uploaded, 11);
    assert_eq!(seen[2].total_parts, 3);
    assert_eq!(seen[2].percentage(), 100.0);
}
