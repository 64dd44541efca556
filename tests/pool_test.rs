//! Supervisor integration tests
//!
//! Each test runs a full pool against a local wiremock server:
//! 1. Listing pages are served under `/list?p=N`
//! 2. Images are served under `/img/<name>`
//! 3. Downloads land in a temporary save directory
//!
//! No external services are needed.

use imgpool::config::Config;
use imgpool::observability::PoolSummary;
use imgpool::queue::{MemoryQueue, WorkQueue};
use imgpool::supervisor::{Supervisor, SupervisorError};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{Duration, sleep, timeout};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const QUEUE_KEY: &str = "wallpaper_url_queue";

/// Test context holding the mock site, the queue and the save directory
struct PoolContext {
    server: MockServer,
    queue: Arc<MemoryQueue>,
    save_dir: TempDir,
}

impl PoolContext {
    async fn setup() -> Self {
        Self {
            server: MockServer::start().await,
            queue: Arc::new(MemoryQueue::new()),
            save_dir: TempDir::new().unwrap(),
        }
    }

    fn image_url(&self, name: &str) -> String {
        format!("{}/img/{}", self.server.uri(), name)
    }

    async fn serve_image(&self, name: &str, body: &'static [u8]) {
        Mock::given(method("GET"))
            .and(path(format!("/img/{name}")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    async fn serve_empty_listing(&self) {
        Mock::given(method("GET"))
            .and(path("/list"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>no images</p>"))
            .mount(&self.server)
            .await;
    }

    async fn seed(&self, names: &[&str]) {
        let urls: Vec<String> = names.iter().map(|name| self.image_url(name)).collect();
        self.queue.add_members(QUEUE_KEY, &urls).await.unwrap();
    }

    fn config(&self, workers: usize, idle_ceiling: u32) -> Config {
        let mut config = Config::default();
        config.pool.worker_num = workers;
        config.pool.max_idle_polls = idle_ceiling;
        config.pool.idle_interval_ms = 20;
        config.storage.save_dir = self.save_dir.path().to_path_buf();
        config.source.listing_url = format!("{}/list?p={{page}}", self.server.uri());
        config.http.max_retries = 1;
        config
    }

    fn supervisor(&self, config: Config, shutdown: CancellationToken) -> Supervisor {
        Supervisor::builder()
            .config(config)
            .queue(self.queue.clone())
            .shutdown(shutdown)
            .build()
    }

    async fn run(&self, config: Config) -> Result<PoolSummary, SupervisorError> {
        timeout(
            Duration::from_secs(30),
            self.supervisor(config, CancellationToken::new()).run(),
        )
        .await
        .expect("pool did not finish")
    }
}

#[tokio::test]
async fn test_seeded_queue_is_drained_to_disk() {
    let ctx = PoolContext::setup().await;
    ctx.serve_empty_listing().await;
    ctx.serve_image("a.jpg", b"first image").await;
    ctx.serve_image("b.jpg", b"second image").await;
    ctx.seed(&["a.jpg", "b.jpg"]).await;

    let summary = ctx.run(ctx.config(2, 3)).await.unwrap();

    assert_eq!(summary.exited, 3);
    assert_eq!(summary.idle_timeouts, 2);
    assert_eq!(summary.totals.saved, 2);
    assert_eq!(summary.totals.failed, 0);
    assert!(ctx.queue.is_empty(QUEUE_KEY).await.unwrap());
    assert_eq!(
        std::fs::read(ctx.save_dir.path().join("a.jpg")).unwrap(),
        b"first image"
    );
    assert_eq!(
        std::fs::read(ctx.save_dir.path().join("b.jpg")).unwrap(),
        b"second image"
    );
}

#[tokio::test]
async fn test_second_run_skips_existing_files() {
    let ctx = PoolContext::setup().await;
    ctx.serve_empty_listing().await;
    std::fs::write(ctx.save_dir.path().join("a.jpg"), b"kept").unwrap();
    ctx.seed(&["a.jpg"]).await;

    let summary = ctx.run(ctx.config(1, 2)).await.unwrap();

    assert_eq!(summary.totals.saved, 0);
    assert_eq!(summary.totals.already_present, 1);
    assert_eq!(std::fs::read(ctx.save_dir.path().join("a.jpg")).unwrap(), b"kept");
}

#[tokio::test]
async fn test_failing_url_cycles_until_shutdown() {
    let ctx = PoolContext::setup().await;
    ctx.serve_empty_listing().await;
    Mock::given(method("GET"))
        .and(path("/img/broken.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&ctx.server)
        .await;
    ctx.seed(&["broken.jpg"]).await;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(ctx.supervisor(ctx.config(1, 1000), shutdown.clone()).run());

    // Wait until the URL has been attempted several times
    timeout(Duration::from_secs(10), async {
        loop {
            let attempts = ctx
                .server
                .received_requests()
                .await
                .unwrap_or_default()
                .iter()
                .filter(|request| request.url.path() == "/img/broken.jpg")
                .count();
            if attempts >= 3 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("broken URL was not retried");

    shutdown.cancel();
    let summary = timeout(Duration::from_secs(10), handle)
        .await
        .expect("pool did not stop")
        .unwrap()
        .unwrap();

    assert!(summary.totals.failed >= 3);
    assert_eq!(summary.totals.saved, 0);
    assert_eq!(ctx.queue.len(QUEUE_KEY).await.unwrap(), 1);
    let leftovers = std::fs::read_dir(ctx.save_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_shutdown_converges_with_idle_workers() {
    let ctx = PoolContext::setup().await;
    ctx.serve_empty_listing().await;

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(ctx.supervisor(ctx.config(4, 1000), shutdown.clone()).run());

    sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    let summary = timeout(Duration::from_secs(10), handle)
        .await
        .expect("pool did not converge")
        .unwrap()
        .unwrap();

    assert_eq!(summary.exited, 5);
    assert!(summary.cancelled >= 4);
    assert_eq!(summary.aborted, 0);
    assert_eq!(summary.panicked, 0);
}

#[tokio::test]
async fn test_extraction_feeds_download_workers() {
    let ctx = PoolContext::setup().await;
    let page_one = format!(
        r#"<div><img class="thumb" src="{}"><img src="{}"></div>"#,
        ctx.image_url("a.jpg"),
        ctx.image_url("b.jpg")
    );

    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page_one))
        .expect(1)
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>end</p>"))
        .expect(1)
        .mount(&ctx.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(query_param("p", "3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&ctx.server)
        .await;
    ctx.serve_image("a.jpg", b"a").await;
    ctx.serve_image("b.jpg", b"b").await;

    let summary = ctx.run(ctx.config(2, 10)).await.unwrap();

    assert_eq!(summary.totals.pages_fetched, 2);
    assert_eq!(summary.totals.urls_published, 2);
    assert_eq!(summary.totals.saved, 2);
    assert!(ctx.save_dir.path().join("a.jpg").exists());
    assert!(ctx.save_dir.path().join("b.jpg").exists());
    ctx.server.verify().await;
}
