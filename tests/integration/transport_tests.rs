//! Reqwest transport against a mock server

use reqwest::Method;
use ripple_crawl::config::TransportConfig;
use ripple_crawl::crawler::{FetchRequest, Params, ReqwestTransport, Transport, TransportOverrides};
use ripple_crawl::TransportError;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(method: Method, url: String, params: Params) -> FetchRequest {
    FetchRequest {
        method,
        url: Url::parse(&url).unwrap(),
        params,
        options: TransportOverrides::default(),
    }
}

fn transport(config: TransportConfig) -> ReqwestTransport {
    ReqwestTransport::new(config).expect("Failed to build transport")
}

#[tokio::test]
async fn test_get_sends_form_params_as_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>found</p>", "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let params = Params::Form(vec![
        ("q".to_string(), "rust".to_string()),
        ("page".to_string(), "2".to_string()),
    ]);
    let response = transport(TransportConfig::default())
        .fetch(request(Method::GET, format!("{}/search", mock_server.uri()), params))
        .await
        .expect("Fetch failed");

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type(), Some("text/html"));
    assert_eq!(response.text(), "<p>found</p>");
}

#[tokio::test]
async fn test_post_sends_form_params_as_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user=ada&lang=en"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let params = Params::Form(vec![
        ("user".to_string(), "ada".to_string()),
        ("lang".to_string(), "en".to_string()),
    ]);
    let response = transport(TransportConfig::default())
        .fetch(request(Method::POST, format!("{}/login", mock_server.uri()), params))
        .await
        .expect("Fetch failed");

    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn test_raw_params_are_sent_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/doc"))
        .and(body_string("{\"id\":1}"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = transport(TransportConfig::default())
        .fetch(request(
            Method::PUT,
            format!("{}/doc", mock_server.uri()),
            Params::Raw("{\"id\":1}".to_string()),
        ))
        .await
        .expect("Fetch failed");

    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_user_agent_and_header_overrides() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", "ripple-test/1.0"))
        .and(header("x-crawl-id", "42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut fetch = request(Method::GET, format!("{}/", mock_server.uri()), Params::None);
    fetch.options.user_agent = Some("ripple-test/1.0".to_string());
    fetch.options.headers = vec![("x-crawl-id".to_string(), "42".to_string())];

    let response = transport(TransportConfig::default())
        .fetch(fetch)
        .await
        .expect("Fetch failed");
    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_configured_user_agent_is_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("user-agent", ripple_crawl::config::DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    transport(TransportConfig::default())
        .fetch(request(Method::GET, format!("{}/", mock_server.uri()), Params::None))
        .await
        .expect("Fetch failed");
}

#[tokio::test]
async fn test_non_success_status_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_raw("missing", "text/plain"))
        .mount(&mock_server)
        .await;

    let response = transport(TransportConfig::default())
        .fetch(request(Method::GET, format!("{}/gone", mock_server.uri()), Params::None))
        .await
        .expect("Fetch failed");

    assert_eq!(response.status, 404);
    assert_eq!(response.text(), "missing");
}

#[tokio::test]
async fn test_redirects_follow_configured_limit() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/one"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", format!("{}/two", base).as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/two"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", format!("{}/end", base).as_str()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("arrived", "text/plain"))
        .mount(&mock_server)
        .await;

    let client = transport(TransportConfig::default());

    let response = client
        .fetch(request(Method::GET, format!("{}/one", base), Params::None))
        .await
        .expect("Fetch failed");
    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "arrived");

    // Per-request override: do not follow at all
    let mut no_follow = request(Method::GET, format!("{}/one", base), Params::None);
    no_follow.options.follow = Some(0);
    let response = client.fetch(no_follow).await.expect("Fetch failed");
    assert_eq!(response.status, 302);

    // One redirect allowed, two needed
    let mut too_few = request(Method::GET, format!("{}/one", base), Params::None);
    too_few.options.follow = Some(1);
    let error = client.fetch(too_few).await.unwrap_err();
    assert!(matches!(error, TransportError::Http(_)));
}

#[tokio::test]
async fn test_timeout_is_reported_as_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let mut slow = request(Method::GET, format!("{}/slow", mock_server.uri()), Params::None);
    slow.options.timeout = Some(Duration::from_millis(50));

    let error = transport(TransportConfig::default())
        .fetch(slow)
        .await
        .unwrap_err();
    assert!(matches!(error, TransportError::Timeout));
}

#[tokio::test]
async fn test_connection_refused_is_reported_as_connect() {
    // Reserve a port, then free it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let error = transport(TransportConfig::default())
        .fetch(request(Method::GET, format!("http://127.0.0.1:{}/", port), Params::None))
        .await
        .unwrap_err();
    assert!(matches!(error, TransportError::Connect(_)));
}

#[tokio::test]
async fn test_undecoded_body_is_returned_as_bytes() {
    let mock_server = MockServer::start().await;
    let payload = vec![0xff_u8, 0x00, 0x41];

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    let mut raw = request(Method::GET, format!("{}/bin", mock_server.uri()), Params::None);
    raw.options.decode = Some(false);

    let response = transport(TransportConfig::default())
        .fetch(raw)
        .await
        .expect("Fetch failed");
    assert_eq!(response.body, payload);
}
