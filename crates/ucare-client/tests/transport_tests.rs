//! Request signing, fixed headers and status classification against a mock server

use rstest::rstest;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use ucare_auth::{CanonicalRequest, Credentials, Signer, EMPTY_MD5};
use ucare_client::{Client, ClientError, Config};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_ID: &str = "27c7846b-a019-4516-a5e4-de635f822161";

fn client(server: &MockServer) -> Client {
    let config = Config::new("demopublickey", Some("demosecretkey".to_string()))
        .with_bases(server.uri(), server.uri());
    Client::new(config).unwrap()
}

#[tokio::test]
async fn test_signed_request_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/files/{}/", FILE_ID)))
        .and(header("accept", "application/vnd.uploadcare-v0.6+json"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uuid": FILE_ID, "size": 642})))
        .expect(1)
        .mount(&server)
        .await;

    let file = client(&server).get_file(FILE_ID).await.unwrap();
    assert_eq!(file.uuid, FILE_ID);
    assert_eq!(file.size, 642);

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let headers = &request.headers;

    let user_agent = headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(user_agent.starts_with("ucare-rust/"));
    assert!(user_agent.ends_with("/demopublickey"));

    // Recompute the signature over the Date that was actually sent.
    let date = headers.get("date").unwrap().to_str().unwrap();
    assert!(date.ends_with("+0000"));
    let canonical = CanonicalRequest::new(
        "GET",
        b"",
        "application/json",
        date,
        format!("/files/{}/", FILE_ID),
    );
    assert_eq!(canonical.body_md5(), EMPTY_MD5);
    let signer = Signer::new(Credentials::new("demopublickey", Some("demosecretkey")));
    assert_eq!(
        headers.get("authorization").unwrap().to_str().unwrap(),
        signer.authorization(&canonical).unwrap()
    );
}

#[tokio::test]
async fn test_simple_auth_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/project/"))
        .and(header("authorization", "Uploadcare.Simple demopublickey:demosecretkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "demo", "pub_key": "demopublickey", "collaborators": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = Config::new("demopublickey", Some("demosecretkey".to_string()))
        .with_simple_auth()
        .with_bases(server.uri(), server.uri());
    let project = assert_ok!(Client::new(config).unwrap().get_project().await);
    assert_eq!(project.pub_key, "demopublickey");
}

#[rstest]
#[case(401)]
#[case(403)]
#[case(400)]
#[case(404)]
#[case(429)]
#[case(500)]
#[case(502)]
#[tokio::test]
async fn test_status_classification(#[case] status: u16) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/project/"))
        .respond_with(ResponseTemplate::new(status).set_body_string("detail from server"))
        .mount(&server)
        .await;

    let err = client(&server).get_project().await.unwrap_err();
    match (status, err) {
        (401 | 403, ClientError::Authentication(detail)) => assert_eq!(detail, "detail from server"),
        (400 | 404, ClientError::InvalidRequest { status: s, detail }) => {
            assert_eq!(s, status);
            assert_eq!(detail, "detail from server");
        }
        (429, ClientError::RateLimited(_)) => {}
        (_, ClientError::Api { status: s, body }) => {
            assert_eq!(s, status);
            assert_eq!(body, "detail from server");
        }
        (_, other) => panic!("status {} mapped to {:?}", status, other),
    }
}

#[tokio::test]
async fn test_missing_secret_fails_before_network() {
    let server = MockServer::start().await;
    let config = Config::upload_only("demopublickey").with_bases(server.uri(), server.uri());
    let client = Client::new(config).unwrap();

    let err = assert_err!(client.get_file(FILE_ID).await);
    assert!(err.is_auth_error());
    let err = assert_err!(client.store_files(&["a", "b"]).await);
    assert!(err.is_auth_error());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let config = Config::new("pub", Some("secret".to_string()))
        .with_bases("http://127.0.0.1:1", "http://127.0.0.1:1");
    let err = Client::new(config).unwrap().get_project().await.unwrap_err();
    assert!(err.is_network_error());
    assert!(std::error::Error::source(&err).is_some());
}

#[tokio::test]
async fn test_unexpected_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/project/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client(&server).get_project().await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_truncated_error_body_keeps_status() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(b"HTTP/1.1 502 Bad Gateway\r\ncontent-length: 100\r\n\r\npartial")
            .await
            .unwrap();
    });

    let config = Config::new("demopublickey", Some("demosecretkey".to_string()))
        .with_bases(base.clone(), base);
    let err = Client::new(config).unwrap().get_project().await.unwrap_err();
    match err {
        ClientError::Api { status, body } => {
            assert_eq!(status, 502);
            assert!(body.is_empty());
        }
        other => panic!("truncated body mapped to {:?}", other),
    }
}
