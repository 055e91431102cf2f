//! Integration tests for the crawler
//!
//! Most tests drive the scheduler with scripted fetchers so timing and
//! failures are deterministic; the last few use wiremock to run the full
//! cycle over real HTTP.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_harvest::config::{AdaptiveConfig, HarvestConfig};
use sumi_harvest::crawler::crawl;
use sumi_harvest::storage::{open_stores, SqliteFrontierStore};
use sumi_harvest::{
    AdaptiveFetcher, Crawler, Dataset, FetchMode, Fetcher, HarvestError, Request,
    RequestFrontier, Response, Router, RunState, RunSummary,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves a fixed page, optionally failing the first few calls per URL
struct ScriptedFetcher {
    mode: FetchMode,
    status: u16,
    body: String,
    failures_per_url: usize,
    delay: Duration,
    set_cookie: Option<String>,
    calls: Mutex<HashMap<String, usize>>,
    cookies_seen: Mutex<Vec<Option<String>>>,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(status: u16, body: &str) -> Self {
        Self {
            mode: FetchMode::Light,
            status,
            body: body.to_string(),
            failures_per_url: 0,
            delay: Duration::ZERO,
            set_cookie: None,
            calls: Mutex::new(HashMap::new()),
            cookies_seen: Mutex::new(Vec::new()),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn ok() -> Self {
        Self::new(
            200,
            "<html><head><title>Page</title></head><body><p>Plenty of server-rendered text here.</p></body></html>",
        )
    }

    fn serving_as(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    fn failing_first(mut self, failures: usize) -> Self {
        self.failures_per_url = failures;
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn set_cookie(mut self, header: &str) -> Self {
        self.set_cookie = Some(header.to_string());
        self
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn mode(&self) -> FetchMode {
        self.mode
    }

    async fn execute(&self, request: &Request) -> Response {
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(request.url().to_string()).or_insert(0);
            *count += 1;
            *count
        };
        self.cookies_seen
            .lock()
            .unwrap()
            .push(request.header("Cookie").map(str::to_string));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.current.fetch_sub(1, Ordering::SeqCst);

        let status = if call <= self.failures_per_url {
            500
        } else {
            self.status
        };
        let mut builder = Response::builder(request.clone(), status)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(self.body.clone())
            .mode(self.mode);
        if let Some(cookie) = &self.set_cookie {
            builder = builder.header("Set-Cookie", cookie.clone());
        }
        builder.build()
    }
}

fn test_config(max_concurrency: usize, max_retries: u32) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.crawler.max_concurrency = max_concurrency;
    config.crawler.max_retries = max_retries;
    config.crawler.request_timeout = 5;
    config
}

fn counting_router(handled: Arc<AtomicUsize>) -> Router {
    let mut router = Router::new();
    router.set_default(move |ctx| {
        handled.fetch_add(1, Ordering::SeqCst);
        ctx.save_data(json!({ "url": ctx.request().url().as_str() }))?;
        Ok(())
    });
    router
}

#[tokio::test]
async fn test_single_request_succeeds() {
    let handled = Arc::new(AtomicUsize::new(0));
    let crawler = Crawler::in_memory(
        &test_config(1, 3),
        Arc::new(ScriptedFetcher::ok()),
        counting_router(Arc::clone(&handled)),
    );
    crawler.enqueue("https://example.com/").unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.requests_total, 1);
    assert_eq!(summary.requests_successful, 1);
    assert_eq!(summary.requests_failed, 0);
    assert_eq!(summary.requests_retried, 0);
    assert_eq!(summary.frontier.pending_count, 0);
    assert_eq!(summary.frontier.handled_count, 1);
    assert_eq!(summary.dataset.count, 1);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(crawler.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_failed_request_is_retried() {
    let fetcher = Arc::new(ScriptedFetcher::ok().failing_first(1));
    let handled = Arc::new(AtomicUsize::new(0));
    let crawler = Crawler::in_memory(
        &test_config(1, 3),
        fetcher.clone(),
        counting_router(Arc::clone(&handled)),
    );
    crawler.enqueue("https://example.com/flaky").unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.requests_total, 2);
    assert_eq!(summary.requests_retried, 1);
    assert_eq!(summary.requests_successful, 1);
    assert_eq!(summary.requests_failed, 0);
    assert_eq!(fetcher.total_calls(), 2);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_budget_is_exhausted() {
    let fetcher = Arc::new(ScriptedFetcher::new(503, "unavailable"));
    let handled = Arc::new(AtomicUsize::new(0));
    let crawler = Crawler::in_memory(
        &test_config(1, 3),
        fetcher.clone(),
        counting_router(Arc::clone(&handled)),
    );
    crawler.enqueue("https://example.com/down").unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.requests_total, 4);
    assert_eq!(summary.requests_retried, 3);
    assert_eq!(summary.requests_failed, 1);
    assert_eq!(summary.requests_successful, 0);
    assert_eq!(summary.frontier.handled_count, 1);
    assert_eq!(summary.frontier.pending_count, 0);
    assert_eq!(handled.load(Ordering::SeqCst), 0, "failed responses are not routed");
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let fetcher = Arc::new(ScriptedFetcher::ok().delay(Duration::from_millis(50)));
    let crawler = Crawler::in_memory(
        &test_config(3, 0),
        fetcher.clone(),
        counting_router(Arc::new(AtomicUsize::new(0))),
    );
    let urls: Vec<String> = (0..12)
        .map(|i| format!("https://example.com/page/{}", i))
        .collect();
    crawler.enqueue_all(urls.iter().map(String::as_str)).unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.requests_successful, 12);
    let peak = fetcher.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak concurrency was {}", peak);
    assert!(peak > 1, "requests never overlapped");
    assert_eq!(crawler.in_flight(), 0);
}

#[tokio::test]
async fn test_handler_enqueued_work_is_processed() {
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);

    let mut router = Router::new();
    router.register("example.com/list", |ctx| {
        for i in 0..20 {
            ctx.enqueue(&format!("https://example.com/item/{}", i))?;
        }
        Ok(())
    });
    router.register("example.com/item/", move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        ctx.save_data(json!({ "item": ctx.request().path() }))?;
        Ok(())
    });

    let crawler = Crawler::in_memory(
        &test_config(4, 0),
        Arc::new(ScriptedFetcher::ok().delay(Duration::from_millis(5))),
        router,
    );
    crawler.enqueue("https://example.com/list").unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.requests_total, 21);
    assert_eq!(summary.requests_successful, 21);
    assert_eq!(summary.frontier.handled_count, 21);
    assert_eq!(summary.dataset.count, 20);
    assert_eq!(handled.load(Ordering::SeqCst), 20);
}

#[tokio::test]
async fn test_first_matching_route_wins() {
    let hits: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let (a, b, fallback) = (Arc::clone(&hits), Arc::clone(&hits), Arc::clone(&hits));

    let mut router = Router::new();
    router
        .register("example.com/shop", move |_| {
            a.lock().unwrap().push("shop");
            Ok(())
        })
        .register("example.com/shop/item", move |_| {
            b.lock().unwrap().push("item");
            Ok(())
        })
        .set_default(move |_| {
            fallback.lock().unwrap().push("default");
            Ok(())
        });

    let crawler = Crawler::in_memory(&test_config(1, 0), Arc::new(ScriptedFetcher::ok()), router);
    crawler.enqueue("https://example.com/shop/item/1").unwrap();
    crawler.enqueue("https://example.com/about").unwrap();

    crawler.run().await.unwrap();

    let mut hits = hits.lock().unwrap().clone();
    hits.sort();
    assert_eq!(hits, vec!["default", "shop"]);
}

#[tokio::test]
async fn test_handler_error_and_panic_are_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut router = Router::new();
    router.set_default(move |ctx| match counter.fetch_add(1, Ordering::SeqCst) {
        0 => anyhow::bail!("transient handler failure"),
        1 => panic!("handler blew up"),
        _ => {
            ctx.save_data(json!({ "ok": true }))?;
            Ok(())
        }
    });

    let crawler = Crawler::in_memory(&test_config(1, 3), Arc::new(ScriptedFetcher::ok()), router);
    crawler.enqueue("https://example.com/").unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(summary.requests_total, 3);
    assert_eq!(summary.requests_retried, 2);
    assert_eq!(summary.requests_successful, 1);
    assert_eq!(summary.dataset.count, 1);
}

#[tokio::test]
async fn test_session_cookies_are_sent_on_later_requests() {
    let fetcher = Arc::new(ScriptedFetcher::ok().set_cookie("sid=abc123; Path=/; HttpOnly"));
    let crawler = Crawler::in_memory(
        &test_config(1, 0),
        fetcher.clone(),
        counting_router(Arc::new(AtomicUsize::new(0))),
    );
    crawler.enqueue("https://example.com/login").unwrap();
    crawler.enqueue("https://example.com/account").unwrap();
    crawler.enqueue("https://other.example.org/").unwrap();

    crawler.run().await.unwrap();

    let seen = fetcher.cookies_seen.lock().unwrap().clone();
    assert_eq!(seen[0], None);
    assert_eq!(seen[1].as_deref(), Some("sid=abc123"));
    assert_eq!(seen[2], None, "cookies are scoped to their destination");

    let stats = crawler.sessions().stats();
    assert_eq!(stats.size, 2);
}

#[tokio::test]
async fn test_adaptive_fetcher_escalates_and_learns() {
    let light = Arc::new(ScriptedFetcher::new(
        403,
        r#"<html><body><div id="root"></div><script src="/bundle.js"></script></body></html>"#,
    ));
    let heavy = Arc::new(
        ScriptedFetcher::new(
            200,
            "<html><head><title>Rendered</title></head><body><p>Rendered product listing with enough text to pass.</p></body></html>",
        )
        .serving_as(FetchMode::Heavy),
    );
    let fetcher = Arc::new(AdaptiveFetcher::new(
        light.clone(),
        heavy.clone(),
        AdaptiveConfig::default(),
    ));

    let modes = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&modes);
    let mut router = Router::new();
    router.set_default(move |ctx| {
        recorded.lock().unwrap().push(ctx.response().mode());
        Ok(())
    });

    let crawler = Crawler::in_memory(&test_config(1, 0), fetcher, router);
    crawler.enqueue("https://shop.example.com/products/shoes/1").unwrap();
    crawler.enqueue("https://shop.example.com/products/shoes/2").unwrap();

    let summary = crawler.run().await.unwrap();

    assert_eq!(summary.requests_successful, 2);
    assert_eq!(light.total_calls(), 1, "second page goes straight to heavy");
    assert_eq!(heavy.total_calls(), 2);
    assert_eq!(
        *modes.lock().unwrap(),
        vec![FetchMode::Heavy, FetchMode::Heavy]
    );

    let selector = crawler.mode_selector().unwrap();
    assert_eq!(
        selector.select_mode("https://shop.example.com/products/shoes/99"),
        FetchMode::Heavy
    );
}

#[tokio::test]
async fn test_stop_ends_an_idle_crawl() {
    let mut config = test_config(2, 0);
    config.crawler.exit_on_empty_queue = false;

    let crawler = Crawler::in_memory(
        &config,
        Arc::new(ScriptedFetcher::ok()),
        counting_router(Arc::new(AtomicUsize::new(0))),
    );
    crawler.enqueue("https://example.com/").unwrap();

    let runner = crawler.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(crawler.state(), RunState::Running);
    crawler.stop();

    let summary = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("crawl did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(summary.requests_successful, 1);
    assert_eq!(crawler.state(), RunState::Stopped);
}

#[tokio::test]
async fn test_run_rejects_concurrent_invocation() {
    let mut config = test_config(1, 0);
    config.crawler.exit_on_empty_queue = false;

    let crawler = Crawler::in_memory(
        &config,
        Arc::new(ScriptedFetcher::ok()),
        counting_router(Arc::new(AtomicUsize::new(0))),
    );

    let runner = crawler.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    while crawler.state() != RunState::Running {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(matches!(
        crawler.run().await,
        Err(HarvestError::AlreadyRunning)
    ));

    crawler.stop();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_stats_reset_between_runs() {
    let crawler = Crawler::in_memory(
        &test_config(1, 0),
        Arc::new(ScriptedFetcher::ok()),
        counting_router(Arc::new(AtomicUsize::new(0))),
    );

    crawler.enqueue("https://example.com/one").unwrap();
    assert_eq!(crawler.run().await.unwrap().requests_total, 1);

    crawler.enqueue("https://example.com/two").unwrap();
    crawler.enqueue("https://example.com/three").unwrap();
    let second = crawler.run().await.unwrap();
    assert_eq!(second.requests_total, 2);
    assert_eq!(second.frontier.handled_count, 3);
}

fn self_requeueing_router(calls: Arc<AtomicUsize>) -> Router {
    let mut router = Router::new();
    router.set_default(move |ctx| {
        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
            ctx.enqueue_request(ctx.request().clone())?;
            anyhow::bail!("failed after queueing itself again");
        }
        Ok(())
    });
    router
}

async fn run_self_requeue(frontier: RequestFrontier) -> RunSummary {
    let calls = Arc::new(AtomicUsize::new(0));
    let crawler = Crawler::new(
        &test_config(1, 3),
        Arc::new(ScriptedFetcher::ok()),
        self_requeueing_router(Arc::clone(&calls)),
        Arc::new(frontier),
        Arc::new(Dataset::in_memory()),
    );
    crawler.enqueue("https://example.com/again").unwrap();

    let summary = crawler.run().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    summary
}

#[tokio::test]
async fn test_retry_after_self_requeue_matches_across_stores() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = RequestFrontier::new(
        SqliteFrontierStore::open(&dir.path().join("frontier.db")).unwrap(),
    );

    for summary in [
        run_self_requeue(RequestFrontier::in_memory()).await,
        run_self_requeue(sqlite).await,
    ] {
        assert_eq!(summary.requests_total, 2);
        assert_eq!(summary.requests_retried, 1);
        assert_eq!(summary.requests_successful, 1);
        assert_eq!(summary.requests_failed, 0);
        assert_eq!(summary.frontier.pending_count, 0);
        assert_eq!(summary.frontier.handled_count, 1);
    }
}

async fn mount_site(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Home</title></head><body>
                <p>Welcome to the test site.</p>
                <a href="/about">About</a>
                <a href="/missing">Missing</a>
            </body></html>"#,
            "text/html",
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/about"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<html><head><title>About</title></head><body><p>About us.</p></body></html>",
            "text/html",
        ))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn link_following_router() -> Router {
    let mut router = Router::new();
    router.set_default(|ctx| {
        ctx.save_data(json!({
            "url": ctx.response().url().as_str(),
            "title": ctx.html().title,
        }))?;
        if ctx.request().path() == "/" {
            ctx.enqueue_links()?;
        }
        Ok(())
    });
    router
}

#[tokio::test]
async fn test_crawl_over_http() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let config = test_config(2, 1);
    let summary = crawl(&config, &[format!("{}/", server.uri())], link_following_router())
        .await
        .unwrap();

    assert_eq!(summary.requests_successful, 2);
    assert_eq!(summary.requests_failed, 1);
    assert_eq!(summary.requests_retried, 1);
    assert_eq!(summary.requests_total, 4);
    assert_eq!(summary.frontier.handled_count, 3);
    assert_eq!(summary.dataset.count, 2);
}

#[tokio::test]
async fn test_crawl_persists_to_sqlite() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("harvest.db");

    let mut config = test_config(2, 0);
    config.storage.database_path = Some(db_path.to_string_lossy().to_string());

    let summary = crawl(&config, &[format!("{}/", server.uri())], link_following_router())
        .await
        .unwrap();
    assert_eq!(summary.dataset.count, 2);

    let (frontier, dataset) = open_stores(&config.storage).unwrap();
    let info = frontier.info().unwrap();
    assert_eq!(info.pending_count, 0);
    assert_eq!(info.handled_count, 3);

    let mut titles: Vec<String> = dataset
        .all()
        .unwrap()
        .iter()
        .filter_map(|record| record.data["title"].as_str().map(str::to_string))
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["About".to_string(), "Home".to_string()]);
}
