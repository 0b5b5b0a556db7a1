mod common;

use common::fixtures::{company_html, generated_inn, load_fixture, test_config};
use common::wiremock_helpers::{mount_html_page, mount_search_error, mount_search_page, SEARCH_PATH};
use supplierfinder::{SearchError, SearchOrchestrator};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves `count` distinct company pages starting at `first` and returns
/// their URLs
async fn mount_companies(server: &MockServer, first: u32, count: u32) -> Vec<String> {
    let mut urls = Vec::new();
    for n in first..first + count {
        let url_path = format!("/company/{}", n);
        let html = company_html(&format!("Компания номер {}", n), &generated_inn(n));
        mount_html_page(server, &url_path, &html).await;
        urls.push(format!("{}{}", server.uri(), url_path));
    }
    urls
}

#[tokio::test]
async fn test_stops_at_candidate_cap_within_first_page() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    let urls = mount_companies(&pages, 0, 50).await;
    mount_search_page(&search, 0, &urls, 1).await;
    mount_search_page(&search, 1, &[], 0).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let companies = orchestrator.search("мебель", "Казань").await.unwrap();

    assert_eq!(companies.len(), 30);
    let ids: Vec<String> = companies.keys().map(|id| id.to_string()).collect();
    let expected: Vec<String> = (1..=30).map(|n| format!("company_{}", n)).collect();
    assert_eq!(ids, expected, "ids follow discovery order");

    let first = companies.values().next().unwrap();
    assert_eq!(first.legal_name, "ООО Компания номер 0");
    assert_eq!(first.inn, generated_inn(0));
    assert_eq!(first.website, urls[0]);

    let last = companies.values().last().unwrap();
    assert_eq!(last.website, urls[29]);
}

#[tokio::test]
async fn test_sequential_fetching_gives_same_result() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    let urls = mount_companies(&pages, 0, 12).await;
    mount_search_page(&search, 0, &urls, 2).await;
    mount_search_page(&search, 1, &[], 2).await;

    let mut config = test_config(&search.uri());
    config.search.fetch_concurrency = 1;
    let sequential = SearchOrchestrator::new(&config).unwrap().search("мебель", "Казань").await.unwrap();

    config.search.fetch_concurrency = 8;
    let concurrent = SearchOrchestrator::new(&config).unwrap().search("мебель", "Казань").await.unwrap();

    assert_eq!(sequential.len(), 12);
    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_empty_first_page_stops_pagination() {
    let search = MockServer::start().await;
    mount_search_page(&search, 0, &[], 1).await;
    mount_search_page(&search, 1, &[], 0).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let companies = orchestrator.search("мебель", "Казань").await.unwrap();

    assert!(companies.is_empty());
}

#[tokio::test]
async fn test_backend_error_on_second_page_keeps_first_page_results() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    let urls = mount_companies(&pages, 0, 3).await;
    mount_search_page(&search, 0, &urls, 1).await;
    mount_search_error(&search, 1, 429).await;
    mount_search_page(&search, 2, &[], 0).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let companies = orchestrator.search("мебель", "Казань").await.unwrap();

    assert_eq!(companies.len(), 3);
}

#[tokio::test]
async fn test_backend_transport_failure_is_an_error() {
    // Nothing listens on the discard port
    let config = test_config("http://127.0.0.1:9");
    let orchestrator = SearchOrchestrator::new(&config).unwrap();

    let result = orchestrator.search("мебель", "Казань").await;
    assert!(matches!(result, Err(SearchError::Backend { page: 0, .. })));
}

#[tokio::test]
async fn test_undecodable_envelope_is_an_error() {
    let search = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&search)
        .await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();

    let result = orchestrator.search("мебель", "Казань").await;
    assert!(matches!(result, Err(SearchError::Backend { .. })));
}

#[tokio::test]
async fn test_same_website_on_two_pages_collapses() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    let urls = mount_companies(&pages, 0, 2).await;
    mount_search_page(&search, 0, &urls[..1], 1).await;
    mount_search_page(&search, 1, &urls, 1).await;
    mount_search_page(&search, 2, &[], 1).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let session = orchestrator.search_session("мебель", "Казань").await.unwrap();

    assert_eq!(session.stats().duplicates_suppressed, 1);
    assert_eq!(session.stats().pages_fetched, 3);
    let companies = session.into_companies();
    assert_eq!(companies.len(), 2);
    let websites: Vec<_> = companies.values().map(|c| c.website.clone()).collect();
    assert_eq!(websites, urls);
}

#[tokio::test]
async fn test_pages_without_valid_inn_or_content_are_skipped() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    // Check digit is wrong
    mount_html_page(&pages, "/bad-inn", &company_html("Фальшивка", "7707083890")).await;
    mount_html_page(&pages, "/no-name", "<html><body><p>ИНН: 7736050003</p></body></html>").await;
    let good = mount_companies(&pages, 7, 1).await;

    let urls = vec![
        format!("{}/bad-inn", pages.uri()),
        format!("{}/missing", pages.uri()),
        format!("{}/no-name", pages.uri()),
        good[0].clone(),
    ];
    mount_search_page(&search, 0, &urls, 1).await;
    mount_search_page(&search, 1, &[], 1).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let session = orchestrator.search_session("мебель", "Казань").await.unwrap();

    let stats = session.stats();
    assert_eq!(stats.urls_visited, 4);
    assert_eq!(stats.pages_without_data, 1, "only the 404 page yields nothing");

    let companies = session.into_companies();
    assert_eq!(companies.len(), 1);
    let company = companies.values().next().unwrap();
    assert_eq!(company.id.to_string(), "company_1", "rejected pages consume no id");
    assert_eq!(company.website, good[0]);
}

#[tokio::test]
async fn test_contact_page_scenario() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    mount_html_page(&pages, "/contacts", &load_fixture("pages/romashka.html")).await;
    let urls = vec![format!("{}/contacts", pages.uri())];
    mount_search_page(&search, 0, &urls, 1).await;
    mount_search_page(&search, 1, &[], 1).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let companies = orchestrator.search("мебель", "Казань").await.unwrap();

    assert_eq!(companies.len(), 1);
    let company = companies.values().next().unwrap();
    assert_eq!(company.legal_name, "ООО Ромашка");
    assert_eq!(company.inn, "7707083893");
    assert_eq!(company.email.as_deref(), Some("a@b.ru"));
    assert_eq!(company.phone.as_deref(), Some("+7 912 345-67-89"));
}

#[tokio::test]
async fn test_request_carries_query_and_api_key() {
    let search = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SEARCH_PATH))
        .and(header("Authorization", "Api-Key test-key"))
        .and(body_partial_json(serde_json::json!({
            "query": { "queryText": "кирпич Тверь ИНН", "page": 0 },
            "groupSpec": { "groupsOnPage": 50, "docsInGroup": 1 }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(common::wiremock_helpers::search_envelope(&[])),
        )
        .expect(1)
        .mount(&search)
        .await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let companies = orchestrator.search(" кирпич ", "Тверь").await.unwrap();
    assert!(companies.is_empty());
}

#[tokio::test]
async fn test_limit_overrides_apply() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    let urls = mount_companies(&pages, 0, 10).await;
    mount_search_page(&search, 0, &urls, 1).await;

    let config = test_config(&search.uri());
    let orchestrator = SearchOrchestrator::new(&config)
        .unwrap()
        .with_limits(Some(1), Some(4));
    let companies = orchestrator.search("мебель", "Казань").await.unwrap();
    assert_eq!(companies.len(), 4);
}

#[tokio::test]
async fn test_cap_lets_current_chunk_finish_and_starts_no_more() {
    let search = MockServer::start().await;
    let pages = MockServer::start().await;

    let mut urls = Vec::new();
    for n in 0..8u32 {
        let url_path = format!("/company/{}", n);
        let html = company_html(&format!("Компания номер {}", n), &generated_inn(n));
        // The first chunk of four is fetched in full, later chunks never
        let expected_calls = if n < 4 { 1 } else { 0 };
        Mock::given(method("GET"))
            .and(path(url_path.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .expect(expected_calls)
            .mount(&pages)
            .await;
        urls.push(format!("{}{}", pages.uri(), url_path));
    }
    mount_search_page(&search, 0, &urls, 1).await;
    mount_search_page(&search, 1, &[], 0).await;

    let mut config = test_config(&search.uri());
    config.search.fetch_concurrency = 4;
    config.search.candidate_cap = 2;
    let orchestrator = SearchOrchestrator::new(&config).unwrap();
    let session = orchestrator.search_session("мебель", "Казань").await.unwrap();

    assert_eq!(session.stats().urls_visited, 2, "nothing past the cap is extracted");
    let companies = session.into_companies();
    assert_eq!(companies.len(), 2);
    let websites: Vec<_> = companies.values().map(|c| c.website.clone()).collect();
    assert_eq!(websites, urls[..2].to_vec());
}
