use std::path::PathBuf;

use supplierfinder::config::AppConfig;

pub fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> String {
    std::fs::read_to_string(fixture_path(relative))
        .unwrap_or_else(|_| panic!("Failed to load fixture: {}", relative))
}

/// Valid 10-digit INN built from a sequence number
pub fn generated_inn(n: u32) -> String {
    const WEIGHTS: [u32; 9] = [2, 4, 10, 3, 5, 9, 4, 6, 8];
    let body = format!("{:09}", 500_000_000 + n);
    let digits: Vec<u32> = body.bytes().map(|b| u32::from(b - b'0')).collect();
    let check = supplierfinder::inn::check_digit(&digits, &WEIGHTS);
    format!("{}{}", body, check)
}

/// A company contact page in the shape seen on real supplier sites
pub fn company_html(name: &str, inn: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="ru">
<head><title>{name}</title><style>body {{ color: #333; }}</style></head>
<body>
  <header><nav><a href="/">Главная</a> <a href="/contacts">Контакты</a></nav></header>
  <main>
    <h1>Контакты</h1>
    <p>ООО "{name}"</p>
    <p>ИНН: {inn}</p>
  </main>
  <script>var inn = "0000000000";</script>
</body>
</html>"#
    )
}

/// Template configuration pointed at a mock search backend
pub fn test_config(search_server_uri: &str) -> AppConfig {
    let mut config = AppConfig::from_template().expect("template config should be valid");
    config.search.endpoint = format!("{}/v2/web/search", search_server_uri);
    config.search.api_key = "test-key".to_string();
    config.search.timeout_secs = 5;
    config.http.page_timeout_secs = 5;
    config
}
