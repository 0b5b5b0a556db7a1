use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SEARCH_PATH: &str = "/v2/web/search";

/// Search backend XML with one group per URL, in order
pub fn search_xml(urls: &[String]) -> String {
    let groups: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                "<group><categ attr=\"d\" name=\"x\"/><doccount>1</doccount><doc id=\"{}\"><url>{}</url><domain>example</domain></doc></group>",
                i, url
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><yandexsearch version="1.0"><response><results><grouping>{}</grouping></results></response></yandexsearch>"#,
        groups
    )
}

/// JSON envelope the search backend answers with
pub fn search_envelope(urls: &[String]) -> serde_json::Value {
    serde_json::json!({ "rawData": STANDARD.encode(search_xml(urls)) })
}

/// Mounts a search backend answer for one zero-based result page.
///
/// `expected_calls` is verified when the server is dropped.
pub async fn mount_search_page(server: &MockServer, page: u32, urls: &[String], expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_partial_json(serde_json::json!({ "query": { "page": page } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_envelope(urls)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Mounts a non-2xx search backend answer for one result page
pub async fn mount_search_error(server: &MockServer, page: u32, status_code: u16) {
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(body_partial_json(serde_json::json!({ "query": { "page": page } })))
        .respond_with(
            ResponseTemplate::new(status_code)
                .set_body_json(serde_json::json!({ "code": 8, "message": "Quota exceeded" })),
        )
        .expect(1)
        .mount(server)
        .await;
}

/// Serves an HTML page at `url_path` on an existing server
pub async fn mount_html_page(server: &MockServer, url_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Creates a mock HTTP server that delays responses to simulate network timeouts.
pub async fn mock_timeout_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>slow</body></html>")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that answers every GET with `status_code`
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}
