//! Integration tests for site discovery: sitemap traversal and the
//! internal-link crawl fallback.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seo_recovery::crawler::{crawl_internal_links, discover_site_urls, fetch_sitemap_urls};
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
async fn test_sitemap_index_traversal() {
    let server = MockServer::start().await;
    let base = server.uri();
    mock_page(
        &server,
        "/sitemap.xml",
        200,
        &format!(
            "<sitemapindex>\
             <sitemap><loc>{base}/sitemap-products.xml</loc></sitemap>\
             <sitemap><loc>{base}/sitemap-pages.xml</loc></sitemap>\
             </sitemapindex>"
        ),
    )
    .await;
    mock_page(
        &server,
        "/sitemap-products.xml",
        200,
        &format!("<urlset><url><loc>{base}/products/a</loc></url></urlset>"),
    )
    .await;
    mock_page(
        &server,
        "/sitemap-pages.xml",
        200,
        &format!(
            "<urlset>\
             <url><loc>{base}/about</loc></url>\
             <url><loc>{base}/products/a</loc></url>\
             </urlset>"
        ),
    )
    .await;

    let stats = FetchStats::new();
    let urls = fetch_sitemap_urls(&client(), &base, &stats).await;

    // nested indices followed, duplicates collapsed
    assert_eq!(
        urls,
        vec![format!("{base}/products/a"), format!("{base}/about")]
    );
}

#[tokio::test]
async fn test_cyclic_sitemap_index_terminates() {
    let server = MockServer::start().await;
    let base = server.uri();
    mock_page(
        &server,
        "/sitemap.xml",
        200,
        &format!(
            "<sitemapindex>\
             <sitemap><loc>{base}/sitemap.xml</loc></sitemap>\
             <sitemap><loc>{base}/child.xml</loc></sitemap>\
             </sitemapindex>"
        ),
    )
    .await;
    mock_page(
        &server,
        "/child.xml",
        200,
        &format!("<urlset><url><loc>{base}/page</loc></url></urlset>"),
    )
    .await;

    let stats = FetchStats::new();
    let urls = fetch_sitemap_urls(&client(), &base, &stats).await;
    assert_eq!(urls, vec![format!("{base}/page")]);
}

#[tokio::test]
async fn test_crawl_follows_internal_links_only() {
    let server = MockServer::start().await;
    let base = server.uri();
    mock_page(
        &server,
        "/",
        200,
        &format!(
            r#"<a href="/products/a">A</a>
               <a href="{base}/about">About</a>
               <a href="https://elsewhere.example/x">External</a>
               <a href="/assets/logo.png">Logo</a>"#
        ),
    )
    .await;
    mock_page(&server, "/products/a", 200, r#"<a href="/">home</a>"#).await;
    mock_page(&server, "/about", 200, "plain page").await;

    let stats = FetchStats::new();
    let urls = crawl_internal_links(&client(), &base, 10, &stats).await;

    assert!(urls.contains(&format!("{base}/")));
    assert!(urls.contains(&format!("{base}/products/a")));
    assert!(urls.contains(&format!("{base}/about")));
    assert!(!urls.iter().any(|u| u.contains("elsewhere.example")));
    assert!(!urls.iter().any(|u| u.ends_with(".png")));
}

#[tokio::test]
async fn test_crawl_respects_cap() {
    let server = MockServer::start().await;
    let base = server.uri();
    let links: String = (0..20)
        .map(|i| format!(r#"<a href="/page-{i}">p{i}</a>"#))
        .collect();
    mock_page(&server, "/", 200, &links).await;
    for i in 0..20 {
        mock_page(&server, &format!("/page-{i}"), 200, "leaf").await;
    }

    let stats = FetchStats::new();
    let urls = crawl_internal_links(&client(), &base, 5, &stats).await;
    assert_eq!(urls.len(), 5);
}

#[tokio::test]
async fn test_discovery_prefers_sitemap_and_falls_back_to_crawl() {
    // Site A: sitemap fills the cap, no crawl needed.
    let with_sitemap = MockServer::start().await;
    let base_a = with_sitemap.uri();
    mock_page(
        &with_sitemap,
        "/sitemap.xml",
        200,
        &format!(
            "<urlset>\
             <url><loc>{base_a}/a</loc></url>\
             <url><loc>{base_a}/b</loc></url>\
             <url><loc>https://elsewhere.example/offsite</loc></url>\
             </urlset>"
        ),
    )
    .await;

    let stats = FetchStats::new();
    let urls = discover_site_urls(&client(), &base_a, 2, &stats).await;
    assert_eq!(urls, vec![format!("{base_a}/a"), format!("{base_a}/b")]);

    // Site B: no sitemap, discovery comes from the crawl.
    let without_sitemap = MockServer::start().await;
    let base_b = without_sitemap.uri();
    mock_page(&without_sitemap, "/sitemap.xml", 404, "").await;
    mock_page(
        &without_sitemap,
        "/",
        200,
        r#"<a href="/only-page">x</a>"#,
    )
    .await;
    mock_page(&without_sitemap, "/only-page", 200, "leaf").await;

    let urls = discover_site_urls(&client(), &base_b, 10, &stats).await;
    assert!(urls.contains(&format!("{base_b}/only-page")));
}
