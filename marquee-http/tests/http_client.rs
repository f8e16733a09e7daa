use marquee_http::{Fetcher, HttpClient, HttpError};
use reqwest::StatusCode;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_text_returns_page_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rotten tomatoes The Wire"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><a href=\"x\">x</a></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let url = format!("{}/search?q=rotten+tomatoes+The+Wire", server.uri());
    let body = client.get_text(&url).await.unwrap();
    assert!(body.contains("<a href=\"x\">"));
}

#[tokio::test]
async fn fetch_bytes_is_byte_exact() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    Mock::given(method("GET"))
        .and(path("/img/wire.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let got = client
        .fetch_bytes(&format!("{}/img/wire.jpg", server.uri()))
        .await
        .unwrap();
    assert_eq!(got, payload);
}

#[tokio::test]
async fn non_success_status_is_an_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new().unwrap();
    let err = client
        .fetch_text(&format!("{}/gone", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    match err {
        HttpError::Status { snippet, .. } => assert_eq!(snippet, "busy"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn malformed_url_is_rejected_before_sending() {
    let client = HttpClient::new().unwrap();
    let err = client.fetch_text("not a url").await.unwrap_err();
    assert!(matches!(err, HttpError::Url(_)));
}
