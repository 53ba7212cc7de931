//! Integration tests for the crawler
//!
//! These tests use wiremock to serve sitemaps and pages and run the full
//! resolve, dispatch and persist cycle end-to-end against real storage.

use sitemap_harvester::config::Config;
use sitemap_harvester::crawler::{resolve_seeds, run_crawl, run_crawl_until, ShutdownHandle};
use sitemap_harvester::output::load_statistics;
use sitemap_harvester::storage::{
    blob_key_for_url, BlobStore, FsBlobStore, RunStatus, SqliteRecordStore,
};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing into `dir`
fn create_test_config(sitemaps: Vec<String>, budget: usize, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler.sitemaps = sitemaps;
    config.crawler.max_requests_per_crawl = budget;
    config.crawler.max_concurrency = 4;
    config.transport.request_timeout_secs = 5;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.output.database_path = dir.path().join("harvest.db").display().to_string();
    config.output.blob_dir = dir.path().join("blobs").display().to_string();
    config.output.summary_path = dir.path().join("summary.md").display().to_string();
    config
}

fn urlset(locs: &[String]) -> String {
    let urls: String = locs
        .iter()
        .map(|loc| format!("  <url><loc>{}</loc></url>\n", loc))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{}</urlset>",
        urls
    )
}

fn sitemap_index(locs: &[String]) -> String {
    let maps: String = locs
        .iter()
        .map(|loc| format!("  <sitemap>\n    <loc>{}</loc>\n  </sitemap>\n", loc))
        .collect();
    format!("<?xml version=\"1.0\"?>\n<sitemapindex>\n{}</sitemapindex>", maps)
}

fn html_page(title: &str, links: &[String]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!(
        r#"<html><head><title>{}</title><meta name="description" content="About {}"></head>
        <body><main>{} body text</main>{}</body></html>"#,
        title, title, title, anchors
    )
}

async fn mount_xml(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/xml"))
        .mount(server)
        .await;
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

fn open_store(config: &Config) -> SqliteRecordStore {
    SqliteRecordStore::new(Path::new(&config.output.database_path))
        .expect("Failed to open database")
}

fn recorded_urls(store: &SqliteRecordStore, run_id: i64) -> Vec<String> {
    let mut urls: Vec<String> = store
        .get_records_for_run(run_id)
        .expect("Failed to load records")
        .into_iter()
        .map(|r| r.record.url)
        .collect();
    urls.sort();
    urls
}

#[tokio::test]
async fn test_budget_of_one_persists_single_record() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(
        &server,
        "/sitemap.xml",
        urlset(&[format!("{}/a", base), format!("{}/b", base)]),
    )
    .await;
    mount_html(&server, "/a", html_page("A", &[])).await;
    mount_html(&server, "/b", html_page("B", &[])).await;

    let config = create_test_config(vec![format!("{}/sitemap.xml", base)], 1, &dir);
    let outcome = run_crawl(&config, "hash").await.expect("Crawl failed");

    assert_eq!(outcome.sitemap_entries, 2);
    assert_eq!(outcome.report.admitted, 1);
    assert_eq!(outcome.report.processed, 1);

    let store = open_store(&config);
    let urls = recorded_urls(&store, outcome.run_id);
    assert_eq!(urls.len(), 1);
    assert!(urls[0] == format!("{}/a", base) || urls[0] == format!("{}/b", base));

    let blob_files: Vec<_> = std::fs::read_dir(dir.path().join("blobs").join("pages"))
        .unwrap()
        .collect();
    assert_eq!(blob_files.len(), 1);
}

#[tokio::test]
async fn test_sitemap_index_flattening_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(
        &server,
        "/sitemap_index.xml",
        sitemap_index(&[format!("{}/posts.xml", base), "/pages.xml".to_string()]),
    )
    .await;
    mount_xml(
        &server,
        "/posts.xml",
        urlset(&[format!("{}/post-1", base), format!("{}/post-2", base)]),
    )
    .await;
    mount_xml(
        &server,
        "/pages.xml",
        urlset(&[format!("{}/about", base), format!("{}/contact", base)]),
    )
    .await;
    for route in ["/post-1", "/post-2", "/about", "/contact"] {
        mount_html(&server, route, html_page(route, &[])).await;
    }

    let config = create_test_config(vec![format!("{}/sitemap_index.xml", base)], 100, &dir);
    let outcome = run_crawl(&config, "hash").await.expect("Crawl failed");

    assert_eq!(outcome.sitemap_entries, 4);
    assert_eq!(outcome.report.processed, 4);

    let store = open_store(&config);
    let mut by_sitemap = store.count_records_by_sitemap(outcome.run_id).unwrap();
    by_sitemap.sort();
    assert_eq!(
        by_sitemap,
        vec![
            (format!("{}/pages.xml", base), 2),
            (format!("{}/posts.xml", base), 2),
        ]
    );
}

#[tokio::test]
async fn test_internal_links_followed_external_ignored() {
    let server = MockServer::start().await;
    let external = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(&server, "/sitemap.xml", urlset(&[format!("{}/", base)])).await;
    mount_html(
        &server,
        "/",
        html_page(
            "Home",
            &[
                "/docs".to_string(),
                format!("{}/elsewhere", external.uri()),
                "mailto:someone@example.com".to_string(),
            ],
        ),
    )
    .await;
    mount_html(&server, "/docs", html_page("Docs", &["/".to_string()])).await;
    mount_html(&external, "/elsewhere", html_page("Elsewhere", &[])).await;

    let config = create_test_config(vec![format!("{}/sitemap.xml", base)], 100, &dir);
    let outcome = run_crawl(&config, "hash").await.expect("Crawl failed");

    let store = open_store(&config);
    assert_eq!(
        recorded_urls(&store, outcome.run_id),
        vec![format!("{}/", base), format!("{}/docs", base)]
    );

    let external_requests = external.received_requests().await.unwrap_or_default();
    assert!(external_requests.is_empty());

    // Discovered pages inherit the sitemap of the page that linked them
    let records = store.get_records_for_run(outcome.run_id).unwrap();
    assert!(records
        .iter()
        .all(|r| r.record.sitemap == format!("{}/sitemap.xml", base)));
}

#[tokio::test]
async fn test_cyclic_sitemap_indexes_terminate() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(
        &server,
        "/a.xml",
        sitemap_index(&[format!("{}/b.xml", base), format!("{}/a.xml", base)]),
    )
    .await;
    mount_xml(
        &server,
        "/b.xml",
        sitemap_index(&[format!("{}/a.xml", base), format!("{}/urls.xml", base)]),
    )
    .await;
    mount_xml(&server, "/urls.xml", urlset(&[format!("{}/page", base)])).await;
    mount_html(&server, "/page", html_page("Page", &[])).await;

    let config = create_test_config(vec![format!("{}/a.xml", base)], 100, &dir);
    let seeds = tokio::time::timeout(Duration::from_secs(10), resolve_seeds(&config))
        .await
        .expect("Sitemap resolution did not terminate")
        .unwrap();

    assert_eq!(seeds.len(), 1);
    assert_eq!(seeds[0].url, format!("{}/page", base));
    assert_eq!(seeds[0].source_sitemap, format!("{}/urls.xml", base));
}

#[tokio::test]
async fn test_failed_pages_and_non_html_are_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(
        &server,
        "/sitemap.xml",
        urlset(&[
            format!("{}/ok", base),
            format!("{}/gone", base),
            format!("{}/report.pdf", base),
        ]),
    )
    .await;
    mount_html(&server, "/ok", html_page("Ok", &[])).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("%PDF-1.4", "application/pdf"))
        .mount(&server)
        .await;

    let config = create_test_config(vec![format!("{}/sitemap.xml", base)], 100, &dir);
    let outcome = run_crawl(&config, "hash").await.expect("Crawl failed");

    assert_eq!(outcome.report.processed, 1);
    assert_eq!(outcome.report.fetch_failures, 1);
    assert_eq!(outcome.report.content_mismatches, 1);

    let store = open_store(&config);
    assert_eq!(recorded_urls(&store, outcome.run_id), vec![format!("{}/ok", base)]);
}

#[tokio::test]
async fn test_unreachable_sitemap_completes_empty_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let config = create_test_config(vec![format!("{}/missing.xml", server.uri())], 10, &dir);
    let outcome = run_crawl(&config, "hash").await.expect("Crawl failed");

    assert_eq!(outcome.sitemap_entries, 0);
    assert_eq!(outcome.report.processed, 0);

    let store = open_store(&config);
    let run = store.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_records_documents_and_statistics() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(&server, "/sitemap.xml", urlset(&[format!("{}/article", base)])).await;
    mount_html(&server, "/article", html_page("Article", &[])).await;

    let config = create_test_config(vec![format!("{}/sitemap.xml", base)], 10, &dir);
    let outcome = run_crawl(&config, "config-hash").await.expect("Crawl failed");

    let store = open_store(&config);
    let stats = load_statistics(&store, None).unwrap();
    assert_eq!(stats.run.id, outcome.run_id);
    assert_eq!(stats.run.status, RunStatus::Completed);
    assert_eq!(stats.run.config_hash, "config-hash");
    assert_eq!(stats.total_records, 1);
    assert_eq!(stats.with_description, 1);
    assert_eq!(stats.with_snippet, 1);

    let page_url = format!("{}/article", base);
    let record = &store.get_records_for_run(outcome.run_id).unwrap()[0].record;
    assert_eq!(record.title, "Article");
    assert_eq!(record.meta_description, "About Article");
    assert_eq!(record.snippet, "Article body text");

    let blobs = FsBlobStore::open(Path::new(&config.output.blob_dir)).unwrap();
    let document = blobs
        .get(&blob_key_for_url(&page_url))
        .await
        .unwrap()
        .expect("Document should be stored");
    assert_eq!(document["url"], page_url.as_str());
    assert_eq!(document["sitemap"], format!("{}/sitemap.xml", base).as_str());
    assert_eq!(document["title"], "Article");
    assert_eq!(document["depth"], 0);
}

#[tokio::test]
async fn test_recrawl_overwrites_document_and_appends_records() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    mount_xml(&server, "/sitemap.xml", urlset(&[format!("{}/page", base)])).await;
    mount_html(&server, "/page", html_page("Page", &[])).await;

    let config = create_test_config(vec![format!("{}/sitemap.xml", base)], 10, &dir);
    let first = run_crawl(&config, "hash").await.expect("First crawl failed");
    let second = run_crawl(&config, "hash").await.expect("Second crawl failed");

    assert_ne!(first.run_id, second.run_id);

    let store = open_store(&config);
    assert_eq!(store.count_records(first.run_id).unwrap(), 1);
    assert_eq!(store.count_records(second.run_id).unwrap(), 1);

    let blob_files: Vec<_> = std::fs::read_dir(dir.path().join("blobs").join("pages"))
        .unwrap()
        .collect();
    assert_eq!(blob_files.len(), 1);
}

#[tokio::test]
async fn test_shutdown_during_sitemap_resolution_marks_run_interrupted() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    // The sitemap answers long after shutdown is requested
    Mock::given(method("GET"))
        .and(path("/slow.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(urlset(&[format!("{}/page", base)]), "application/xml")
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    mount_html(&server, "/page", html_page("Page", &[])).await;

    let mut config = create_test_config(vec![format!("{}/slow.xml", base)], 10, &dir);
    config.transport.request_timeout_secs = 60;

    let shutdown = ShutdownHandle::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.shutdown();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run_crawl_until(&config, "hash", shutdown),
    )
    .await
    .expect("Shutdown was not honored during sitemap resolution")
    .expect("Crawl failed");

    assert!(outcome.report.interrupted);
    assert_eq!(outcome.sitemap_entries, 0);

    let store = open_store(&config);
    let run = store.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    assert!(run.finished_at.is_some());
    assert_eq!(store.count_records(outcome.run_id).unwrap(), 0);
}
