//! Integration tests for the technical audit against a mock HTTP server.
//!
//! These verify the classification rules end to end: status-code tiers,
//! noindex detection, canonical mismatches, redirect tracking, and the
//! site-level robots/sitemap checks.

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seo_recovery::audit::{
    audit_single_url, check_robots_and_sitemap, run_quick_audit, Issue, Severity,
};
use seo_recovery::FetchStats;

async fn mock_page(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("Failed to build test client")
}

#[tokio::test]
async fn test_404_is_critical_with_issue_tag() {
    let server = MockServer::start().await;
    mock_page(&server, "/gone", 404, "not here").await;

    let stats = FetchStats::new();
    let result = audit_single_url(&client(), &format!("{}/gone", server.uri()), &stats).await;

    assert_eq!(result.status_code, "404");
    assert_eq!(result.severity, Severity::Critical);
    assert!(result.has_issue(Issue::NotFound));
    assert!(!result.has_issue(Issue::ServerError));
}

#[tokio::test]
async fn test_500_and_403_tiers() {
    let server = MockServer::start().await;
    mock_page(&server, "/boom", 500, "oops").await;
    mock_page(&server, "/forbidden", 403, "no").await;

    let stats = FetchStats::new();
    let down = audit_single_url(&client(), &format!("{}/boom", server.uri()), &stats).await;
    assert_eq!(down.severity, Severity::Critical);
    assert!(down.has_issue(Issue::ServerError));

    let blocked =
        audit_single_url(&client(), &format!("{}/forbidden", server.uri()), &stats).await;
    assert_eq!(blocked.severity, Severity::Warning);
    assert!(blocked.has_issue(Issue::ClientError));
}

#[tokio::test]
async fn test_noindex_page_is_warning() {
    let server = MockServer::start().await;
    mock_page(
        &server,
        "/hidden",
        200,
        r#"<html><head><meta name="robots" content="noindex, follow"></head></html>"#,
    )
    .await;

    let stats = FetchStats::new();
    let result = audit_single_url(&client(), &format!("{}/hidden", server.uri()), &stats).await;

    assert_eq!(result.status_code, "200");
    assert_eq!(result.severity, Severity::Warning);
    assert!(result.has_issue(Issue::Noindex));
}

#[tokio::test]
async fn test_canonical_mismatch_detected_and_self_canonical_ignored() {
    let server = MockServer::start().await;
    mock_page(
        &server,
        "/elsewhere",
        200,
        r#"<link rel="canonical" href="https://other-site.example/page">"#,
    )
    .await;
    let self_url = format!("{}/self", server.uri());
    mock_page(
        &server,
        "/self",
        200,
        &format!(r#"<link rel="canonical" href="{self_url}">"#),
    )
    .await;

    let stats = FetchStats::new();
    let mismatch =
        audit_single_url(&client(), &format!("{}/elsewhere", server.uri()), &stats).await;
    assert!(mismatch.has_issue(Issue::CanonicalMismatch));
    assert_eq!(mismatch.canonical, "https://other-site.example/page");

    let clean = audit_single_url(&client(), &self_url, &stats).await;
    assert!(!clean.has_issue(Issue::CanonicalMismatch));
    assert_eq!(clean.severity, Severity::Info);
}

#[tokio::test]
async fn test_redirect_is_informational() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    mock_page(&server, "/new", 200, "moved here").await;

    let stats = FetchStats::new();
    let result = audit_single_url(&client(), &format!("{}/old", server.uri()), &stats).await;

    assert_eq!(result.status_code, "200");
    assert_eq!(result.severity, Severity::Info);
    assert!(result.has_issue(Issue::Redirected));
    assert!(result.final_url.ends_with("/new"));
}

#[tokio::test]
async fn test_unreachable_host_becomes_critical_result() {
    // Reserved port on localhost with no listener.
    let stats = FetchStats::new();
    let result = audit_single_url(&client(), "http://127.0.0.1:1/page", &stats).await;

    assert_eq!(result.status_code, "0");
    assert_eq!(result.severity, Severity::Critical);
    assert!(result.has_issue(Issue::RequestError));
    assert!(!result.detail.is_empty());
    assert!(result.detail.chars().count() <= 100);
}

#[tokio::test]
async fn test_run_quick_audit_dedupes_and_sorts() {
    let server = MockServer::start().await;
    mock_page(&server, "/ok", 200, "fine").await;
    mock_page(&server, "/gone", 404, "missing").await;

    let ok_url = format!("{}/ok", server.uri());
    let gone_url = format!("{}/gone", server.uri());
    let urls = vec![ok_url.clone(), gone_url.clone(), ok_url.clone()];

    let client = Arc::new(client());
    let stats = Arc::new(FetchStats::new());
    let results = run_quick_audit(&client, &urls, 4, &stats).await;

    // duplicate /ok collapsed, critical first
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].url, gone_url);
    assert_eq!(results[0].severity, Severity::Critical);
    assert_eq!(results[1].url, ok_url);
}

#[tokio::test]
async fn test_robots_and_sitemap_checks() {
    let server = MockServer::start().await;
    mock_page(&server, "/robots.txt", 200, "User-agent: *\nAllow: /").await;
    mock_page(&server, "/sitemap.xml", 404, "").await;

    let stats = FetchStats::new();
    let checks = check_robots_and_sitemap(&client(), &server.uri(), &stats).await;

    assert_eq!(checks.len(), 2);
    let robots = checks.iter().find(|c| c.check.as_deref() == Some("robots.txt")).unwrap();
    assert_eq!(robots.severity, Severity::Info);
    assert!(robots.issues.is_empty());

    let sitemap = checks.iter().find(|c| c.check.as_deref() == Some("sitemap.xml")).unwrap();
    assert_eq!(sitemap.severity, Severity::Critical);
    assert!(sitemap.has_issue(Issue::AccessError));
}
