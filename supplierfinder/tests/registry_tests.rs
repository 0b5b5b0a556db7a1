mod common;

use common::fixtures::{generated_inn, load_fixture};
use supplierfinder::company::{CandidateCompany, CandidateId, PartialCandidate};
use supplierfinder::config::{CriteriaConfig, RegistryConfig};
use supplierfinder::export::Companies;
use supplierfinder::registry::{self, RegistryClient, RegistryError};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_config(server: &MockServer) -> RegistryConfig {
    RegistryConfig {
        enabled: true,
        base_url: server.uri(),
        api_key: "registry-key".to_string(),
        timeout_secs: 5,
        criteria: CriteriaConfig::default(),
    }
}

fn extended_report() -> serde_json::Value {
    serde_json::from_str(&load_fixture("registry/extended_report.json")).unwrap()
}

async fn mount_report(server: &MockServer, report: &str, inn: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", report)))
        .and(query_param("inn", inn))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_lookup_merges_all_reports() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/GetCompanyExtendedReport"))
        .and(query_param("inn", "7707083893"))
        .and(header("Authorization", "Bearer registry-key"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(extended_report()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/GetCompanySparkRisksReportXML"))
        .and(query_param("inn", "7707083893"))
        .and(query_param("date", "latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "SROs": { "SRO": [ { "Name": "Ассоциация банков России" } ] }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/GetCompanyLicenses"))
        .and(query_param("inn", "7707083893"))
        .and(query_param("date", "latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "INN": "7707083893",
            "ShortName": "Сбербанк",
            "Licenses": {
                "License": [
                    {"Number": "1481", "ActivityKind": "Банковские операции", "CurrentStatus": "Действующая"},
                    {"Number": "1481-2", "IssueDate": "2015-08-11"}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(&registry_config(&server)).unwrap();
    let profile = client.lookup("7707083893").await.expect("profile should be returned");

    assert_eq!(profile.ogrn.as_deref(), Some("1027700132195"));
    assert_eq!(profile.legal_name.as_deref(), Some("ПАО Сбербанк"));
    assert_eq!(profile.revenue, Some(3_547_000_000.0));
    assert_eq!(profile.risk_level.as_deref(), Some("Низкий"));
    assert_eq!(profile.sro_name.as_deref(), Some("Ассоциация банков России"));
    assert_eq!(profile.licenses.len(), 2);
    assert_eq!(profile.licenses[0].activity.as_deref(), Some("Банковские операции"));
    assert_eq!(profile.licenses[1].issue_date.as_deref(), Some("2015-08-11"));
}

#[tokio::test]
async fn test_missing_side_reports_still_give_profile() {
    let server = MockServer::start().await;
    mount_report(&server, "GetCompanyExtendedReport", "7707083893", extended_report()).await;
    Mock::given(method("GET"))
        .and(path("/GetCompanySparkRisksReportXML"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/GetCompanyLicenses"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&registry_config(&server)).unwrap();
    let profile = client.fetch_profile("7707083893").await.unwrap();
    assert_eq!(profile.legal_name.as_deref(), Some("ПАО Сбербанк"));
    assert_eq!(profile.sro_name, None);
    assert!(profile.licenses.is_empty());
}

#[tokio::test]
async fn test_invalid_inn_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = RegistryClient::new(&registry_config(&server)).unwrap();
    assert!(client.lookup("7707083890").await.is_none());
    assert!(client.lookup("12345").await.is_none());
}

#[tokio::test]
async fn test_server_error_yields_none() {
    let server = common::wiremock_helpers::mock_error_server(503).await;
    let client = RegistryClient::new(&registry_config(&server)).unwrap();

    assert!(client.lookup("7707083893").await.is_none());
    assert!(matches!(
        client.fetch_profile("7707083893").await,
        Err(RegistryError::Status(status)) if status.as_u16() == 503
    ));
}

#[tokio::test]
async fn test_garbage_extended_report_yields_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/GetCompanyExtendedReport"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = RegistryClient::new(&registry_config(&server)).unwrap();
    assert!(matches!(
        client.fetch_profile("7707083893").await,
        Err(RegistryError::Decode(_))
    ));
    assert!(client.lookup("7707083893").await.is_none());
}

#[tokio::test]
async fn test_vetting_and_enriching_found_companies() {
    let server = MockServer::start().await;

    let mut companies = Companies::new();
    let mut id = CandidateId::FIRST;
    for n in 0..3u32 {
        let inn = generated_inn(n);
        let partial = PartialCandidate {
            legal_name: Some(format!("ООО Компания номер {}", n)),
            inn: Some(inn.clone()),
            email: None,
            phone: None,
        };
        let company = CandidateCompany::from_partial(id, partial, &format!("https://c{}.ru", n)).unwrap();
        companies.insert(id, company);
        id = id.next();

        // Company 1 is high risk, company 2 is unknown to the registry
        let mut report = extended_report();
        report["INN"] = serde_json::Value::String(inn.clone());
        if n == 1 {
            report["ConsolidatedIndicator"]["@Description"] = "Высокий".into();
        }
        if n != 2 {
            mount_report(&server, "GetCompanyExtendedReport", &inn, report).await;
        }
    }

    let client = RegistryClient::new(&registry_config(&server)).unwrap();
    let profiles = client.lookup_all(&companies).await;
    assert_eq!(profiles.len(), 3);
    assert!(profiles.values().nth(2).unwrap().is_none());

    assert_eq!(registry::enrich_company_data(&mut companies, &profiles), 2);
    let first = companies.values().next().unwrap();
    assert_eq!(first.phone.as_deref(), Some("+7 495 500-55-50"));

    let criteria = CriteriaConfig {
        risk_level: Some("Низкий".to_string()),
        min_revenue: Some(50_000_000.0),
        ..CriteriaConfig::default()
    };
    let kept = registry::validate_companies(companies, &profiles, &criteria);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept.keys().next().unwrap().to_string(), "company_1");
}
