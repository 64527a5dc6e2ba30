//! Integration tests for the crawl orchestrator against a mock server.
//!
//! Covers the repeat/pacing semantics of single downloads, the
//! wait-for-all policy of batch downloads, and the ignore-repeat
//! semantics of page crawling.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use picgrab_core::{ConnectionPool, Crawler, CrawlerBuilder, PacePolicy, PoolConfig};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fresh builder with an injected pool and a temp output dir, so tests
/// never share global state or write outside their sandbox.
fn test_builder(output: &TempDir) -> CrawlerBuilder {
    Crawler::builder()
        .pool(Arc::new(ConnectionPool::new(PoolConfig::default())))
        .output_dir(output.path())
}

/// Pace policy that counts invocations instead of sleeping.
#[derive(Debug, Default)]
struct CountingPace {
    calls: AtomicU32,
}

#[async_trait]
impl PacePolicy for CountingPace {
    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_download_one_persists_image_via_post() {
    let server = MockServer::start().await;
    // No referer configured, so the image request uses POST.
    Mock::given(method("POST"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"cat bytes"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let report = crawler
        .download_one(&format!("{}/cat.jpg", server.uri()))
        .await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 0);
    let path = report.attempts()[0].as_ref().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"cat bytes");
    assert_eq!(path.extension().unwrap(), "jpg");
}

#[tokio::test]
async fn test_download_one_uses_get_when_referer_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.jpg"))
        .and(wiremock::matchers::header("Referer", "https://gallery.example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output)
        .referer("https://gallery.example.com")
        .build()
        .unwrap();

    let report = crawler
        .download_one(&format!("{}/cat.jpg", server.uri()))
        .await;
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn test_download_one_auto_referer_derives_origin() {
    let server = MockServer::start().await;
    let expected_origin = server.uri(); // scheme://host:port; host has no port in origin
    // The derived Referer is scheme://host (no port, no path).
    let origin = {
        let parsed = url::Url::parse(&expected_origin).unwrap();
        format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap())
    };

    Mock::given(method("GET"))
        .and(path("/cat.jpg"))
        .and(wiremock::matchers::header("Referer", origin.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).auto_referer().build().unwrap();

    let report = crawler
        .download_one(&format!("{}/cat.jpg", server.uri()))
        .await;
    assert_eq!(report.succeeded(), 1);
}

#[tokio::test]
async fn test_download_one_repeat_issues_exactly_n_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
        .expect(3)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).repeat(3).build().unwrap();

    let report = crawler
        .download_one(&format!("{}/cat.jpg", server.uri()))
        .await;

    assert_eq!(report.attempts().len(), 3);
    assert_eq!(report.succeeded(), 3);
}

#[tokio::test]
async fn test_download_one_failed_attempt_does_not_cancel_later_attempts() {
    let server = MockServer::start().await;
    // First attempt fails, the remaining two succeed.
    Mock::given(method("POST"))
        .and(path("/flaky.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/flaky.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).repeat(3).build().unwrap();

    let report = crawler
        .download_one(&format!("{}/flaky.jpg", server.uri()))
        .await;

    assert_eq!(report.attempts().len(), 3);
    assert!(report.attempts()[0].is_err());
    assert_eq!(report.succeeded(), 2);
}

#[tokio::test]
async fn test_pace_policy_invoked_before_every_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"img"))
        .mount(&server)
        .await;

    let pace = Arc::new(CountingPace::default());
    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output)
        .repeat(4)
        .pace_policy(Arc::clone(&pace) as Arc<dyn PacePolicy>)
        .build()
        .unwrap();

    crawler
        .download_one(&format!("{}/cat.jpg", server.uri()))
        .await;

    assert_eq!(pace.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_download_many_reports_every_url_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/b.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"b"))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let urls = vec![
        format!("{}/a.jpg", server.uri()),
        format!("{}/missing.jpg", server.uri()),
        format!("{}/b.jpg", server.uri()),
    ];
    let report = crawler.download_many(&urls).await;

    // Wait-for-all: every URL accounted for, failures isolated.
    assert_eq!(report.reports().len(), 3);
    assert_eq!(report.completed(), 2);
    assert_eq!(report.failed(), 1);

    // Reports come back in input order regardless of completion order.
    assert_eq!(report.reports()[0].url(), urls[0]);
    assert_eq!(report.reports()[1].url(), urls[1]);
    assert_eq!(report.reports()[2].url(), urls[2]);
    assert!(report.reports()[1].attempts()[0].is_err());
}

#[tokio::test]
async fn test_download_many_applies_repeat_per_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/b.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"b"))
        .expect(2)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).repeat(2).build().unwrap();

    let urls = vec![
        format!("{}/a.jpg", server.uri()),
        format!("{}/b.jpg", server.uri()),
    ];
    let report = crawler.download_many(&urls).await;
    assert_eq!(report.total_attempts(), 4);
}

#[tokio::test]
async fn test_download_page_fetches_each_image_once_ignoring_repeat() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<html><body>
            <img src="{0}/a.jpg">
            <img src="{0}/b.png">
        </body></html>"#,
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/b.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"b"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    // repeat(5) must be ignored for page crawls.
    let crawler = test_builder(&output).repeat(5).build().unwrap();

    let report = crawler
        .download_page(&format!("{}/gallery", server.uri()))
        .await;

    assert_eq!(report.reports().len(), 2);
    assert_eq!(report.total_attempts(), 2, "repeat must be ignored");
    assert_eq!(report.completed(), 2);
    assert!(report.page_failures().is_empty());
}

#[tokio::test]
async fn test_download_page_keeps_duplicate_references() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<img src="{0}/a.jpg"><img src="{0}/a.jpg">"#,
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/gallery"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    // Dedup is out of scope: the repeated reference downloads twice.
    Mock::given(method("POST"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .expect(2)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let report = crawler
        .download_page(&format!("{}/gallery", server.uri()))
        .await;
    assert_eq!(report.reports().len(), 2);
    assert_eq!(report.completed(), 2);
}

#[tokio::test]
async fn test_download_page_resolves_relative_image_urls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/albums/cats/index.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<img src="thumb/a.jpg">"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/albums/cats/thumb/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let report = crawler
        .download_page(&format!("{}/albums/cats/index.html", server.uri()))
        .await;
    assert_eq!(report.completed(), 1);
}

#[tokio::test]
async fn test_download_page_failure_yields_page_failure_not_panic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let report = crawler.download_page(&format!("{}/gone", server.uri())).await;

    assert!(report.reports().is_empty());
    assert_eq!(report.page_failures().len(), 1);
}

#[tokio::test]
async fn test_download_pages_isolates_failing_page() {
    let server = MockServer::start().await;
    let page = format!(r#"<img src="{}/a.jpg">"#, server.uri());

    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let urls = vec![
        format!("{}/good", server.uri()),
        format!("{}/bad", server.uri()),
    ];
    let report = crawler.download_pages(&urls).await;

    assert_eq!(report.completed(), 1, "good page's image downloads");
    assert_eq!(report.page_failures().len(), 1, "bad page is recorded");
    assert!(report.page_failures()[0].url.ends_with("/bad"));
}

#[tokio::test]
async fn test_download_many_runs_slow_downloads_in_parallel() {
    let server = MockServer::start().await;
    // Six downloads at 200ms each: sequential execution would need
    // 1200ms, three-wide parallel execution about 400ms.
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"img")
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).parallelism(3).unwrap().build().unwrap();

    let urls: Vec<String> = (0..6)
        .map(|i| format!("{}/img{i}.jpg", server.uri()))
        .collect();

    let start = std::time::Instant::now();
    let report = crawler.download_many(&urls).await;
    let elapsed = start.elapsed();

    assert_eq!(report.completed(), 6, "wait-for-all: every URL finishes");
    assert!(
        elapsed < std::time::Duration::from_millis(1000),
        "batch must be bounded by the pool, not the latency sum: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_download_many_empty_input_returns_empty_report() {
    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let report = crawler.download_many(&[]).await;
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_malformed_page_degrades_to_partial_extraction() {
    let server = MockServer::start().await;
    let page = format!(
        r#"<div><p <b><img src="{}/a.jpg"><span"#,
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"a"))
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let crawler = test_builder(&output).build().unwrap();

    let report = crawler
        .download_page(&format!("{}/broken", server.uri()))
        .await;
    assert!(report.page_failures().is_empty(), "malformed HTML is not an error");
    assert_eq!(report.completed(), 1);
}
