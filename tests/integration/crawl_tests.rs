//! Integration tests for the crawler
//!
//! These tests use wiremock to serve pages and a temporary SQLite file as the
//! checkpoint store, and run the full raw-mode crawl cycle end-to-end,
//! including restarts.

use resume_crawl::config::{Config, CrawlerConfig, InputConfig, StoreConfig};
use resume_crawl::crawler::Coordinator;
use resume_crawl::output::{collect_results, load_statistics};
use resume_crawl::state::{batch_key, FailureKind};
use resume_crawl::storage::{batch_keys, load_progress};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a raw-mode configuration crawling `urls` into `db_path`
fn create_test_config(urls: Vec<String>, db_path: &str, threshold: u32) -> Config {
    Config {
        input: InputConfig {
            urls,
            ..InputConfig::default()
        },
        crawler: CrawlerConfig {
            concurrency: 2,
            raw_html_only: true,
            flush_threshold: threshold,
            ..CrawlerConfig::default()
        },
        store: StoreConfig {
            database_path: db_path.to_string(),
            ..StoreConfig::default()
        },
        http: Default::default(),
        browser: Default::default(),
    }
}

/// Serves `/page/{n}` for every n in `pages`, each expected exactly `hits` times
async fn mount_pages(server: &MockServer, pages: std::ops::Range<usize>, hits: u64) {
    for n in pages {
        Mock::given(method("GET"))
            .and(path(format!("/page/{}", n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<html>page {}</html>", n)))
            .expect(hits)
            .mount(server)
            .await;
    }
}

fn page_urls(server: &MockServer, count: usize) -> Vec<String> {
    (0..count)
        .map(|n| format!("{}/page/{}", server.uri(), n))
        .collect()
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("crawl.db").to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_full_crawl_commits_every_page() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server, 0..5, 1).await;
    let dir = TempDir::new().unwrap();

    let config = create_test_config(page_urls(&mock_server, 5), &db_path(&dir), 2);
    let coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.run().await.unwrap();

    assert_eq!(outcome.pages_processed, 5);
    assert_eq!(outcome.failures, 0);
    assert_eq!(outcome.progress.pages_completed_count, 5);

    let store = coordinator.store().as_ref();
    let keys = batch_keys(store).unwrap();
    assert_eq!(keys.first(), Some(&batch_key(1)));
    assert_eq!(keys.len() as u64, outcome.progress.batches_written_count);

    let pages = collect_results(store).unwrap();
    assert_eq!(pages.len(), 5);
    for page in &pages {
        assert_eq!(page.status_code, Some(200));
        assert!(page.raw_content.as_deref().unwrap().starts_with("<html>page"));
        assert!(page.request_finished_at.is_some());
    }
}

#[tokio::test]
async fn test_restart_only_fetches_remaining_pages() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server, 0..5, 1).await;
    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    // First run sees a shorter list, as if the crawl had been cut off
    let first = create_test_config(page_urls(&mock_server, 3), &db, 10);
    Coordinator::new(first, false).unwrap().run().await.unwrap();

    let second = create_test_config(page_urls(&mock_server, 5), &db, 10);
    let coordinator = Coordinator::new(second, false).unwrap();
    let outcome = coordinator.run().await.unwrap();

    assert_eq!(outcome.skipped, 3);
    assert_eq!(outcome.pages_processed, 2);

    let progress = load_progress(coordinator.store().as_ref()).unwrap().unwrap();
    assert_eq!(progress.pages_completed_count, 5);
    assert_eq!(progress.batches_written_count, 2);
    assert_eq!(
        batch_keys(coordinator.store().as_ref()).unwrap(),
        vec![batch_key(1), batch_key(2)]
    );
}

#[tokio::test]
async fn test_fresh_start_recrawls_everything() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server, 0..3, 2).await;
    let dir = TempDir::new().unwrap();
    let db = db_path(&dir);

    let config = create_test_config(page_urls(&mock_server, 3), &db, 10);
    Coordinator::new(config.clone(), false).unwrap().run().await.unwrap();

    let coordinator = Coordinator::new(config, true).unwrap();
    let outcome = coordinator.run().await.unwrap();

    assert_eq!(outcome.skipped, 0);
    assert_eq!(outcome.pages_processed, 3);
    assert_eq!(outcome.progress.batches_written_count, 1);
}

#[tokio::test]
async fn test_page_failures_are_stored_not_fatal() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server, 0..1, 1).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&mock_server)
        .await;
    let dir = TempDir::new().unwrap();

    let urls = vec![
        format!("{}/page/0", mock_server.uri()),
        format!("{}/broken", mock_server.uri()),
        // Nothing listens on the discard port
        "http://127.0.0.1:9/".to_string(),
    ];
    let coordinator = Coordinator::new(create_test_config(urls, &db_path(&dir), 10), false).unwrap();
    let outcome = coordinator.run().await.unwrap();

    assert_eq!(outcome.pages_processed, 3);
    assert_eq!(outcome.failures, 1);
    assert_eq!(outcome.progress.pages_completed_count, 3);

    let pages = collect_results(coordinator.store().as_ref()).unwrap();
    let broken = pages.iter().find(|p| p.url.ends_with("/broken")).unwrap();
    assert_eq!(broken.status_code, Some(500));
    assert!(!broken.is_failure());

    let unreachable = pages.iter().find(|p| p.url.contains(":9/")).unwrap();
    assert_eq!(unreachable.failure.as_ref().unwrap().kind, FailureKind::Network);

    let stats = load_statistics(coordinator.store().as_ref()).unwrap();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.pages_stored, 3);
}

#[tokio::test]
async fn test_url_list_file_extends_input() {
    let mock_server = MockServer::start().await;
    mount_pages(&mock_server, 0..3, 1).await;
    let list = format!(
        "{}/page/1\n\n  {}/page/2  \nnot-a-url\n",
        mock_server.uri(),
        mock_server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/urls.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list))
        .mount(&mock_server)
        .await;
    let dir = TempDir::new().unwrap();

    let mut config = create_test_config(page_urls(&mock_server, 1), &db_path(&dir), 10);
    config.input.url_list_file = Some(format!("{}/urls.txt", mock_server.uri()));
    let coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.run().await.unwrap();

    assert_eq!(outcome.pages_processed, 3);
    let mut urls: Vec<String> = collect_results(coordinator.store().as_ref())
        .unwrap()
        .into_iter()
        .map(|p| p.url)
        .collect();
    urls.sort();
    assert_eq!(urls, page_urls(&mock_server, 3));
}
