//! Crawl scheduler
//!
//! The control loop pops requests from the frontier and hands each one to
//! its own tokio task, holding a semaphore permit so no more than
//! `max-concurrency` fetches run at once. Each task:
//! 1. Injects the destination's session cookies and executes the fetcher
//! 2. Merges returned cookies into the session pool
//! 3. On failure, reclaims the request while retry budget remains,
//!    otherwise marks it handled as failed
//! 4. On success, routes the exchange to a handler and marks it handled

use crate::config::{CrawlerConfig, HarvestConfig};
use crate::crawler::stats::{CrawlStats, DatasetInfo, RunSummary, StatsSnapshot};
use crate::crawler::{Context, Router};
use crate::fetch::{Fetcher, ModeSelector};
use crate::frontier::RequestFrontier;
use crate::model::Request;
use crate::session::SessionPool;
use crate::storage::Dataset;
use crate::HarvestError;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pause when the frontier is empty but tasks may still enqueue work
const BUSY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause when the frontier is empty and the crawl keeps waiting for work
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Running,
    /// No new dispatch; waiting for in-flight tasks
    Draining,
    Stopped,
}

struct Shared {
    config: CrawlerConfig,
    fetcher: Arc<dyn Fetcher>,
    selector: Option<Arc<ModeSelector>>,
    router: Router,
    frontier: Arc<RequestFrontier>,
    dataset: Arc<Dataset>,
    sessions: Arc<SessionPool>,
    stats: CrawlStats,
    state: Mutex<RunState>,
    stop_requested: AtomicBool,
    in_flight: AtomicUsize,
}

impl Shared {
    fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// Decrements the in-flight counter when a task ends, however it ends
struct InFlightGuard(Arc<Shared>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The crawl engine
///
/// Cloning is cheap and every clone drives the same crawl, so one clone can
/// call [`Crawler::stop`] while another is inside [`Crawler::run`].
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::{Crawler, HarvestConfig, HttpFetcher, Router};
/// use std::sync::Arc;
///
/// # async fn example() -> sumi_harvest::Result<()> {
/// let config = HarvestConfig::default();
/// let mut router = Router::new();
/// router.set_default(|ctx| {
///     ctx.enqueue_links()?;
///     Ok(())
/// });
///
/// let crawler = Crawler::in_memory(&config, Arc::new(HttpFetcher::new(&config)?), router);
/// crawler.enqueue("https://example.com/")?;
/// let summary = crawler.run().await?;
/// println!("{} requests", summary.requests_total);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Crawler {
    shared: Arc<Shared>,
}

impl Crawler {
    /// Creates a crawler over the given frontier and dataset
    ///
    /// If the fetcher selects modes adaptively, its pattern cache is made
    /// available to handlers through the [`Context`].
    pub fn new(
        config: &HarvestConfig,
        fetcher: Arc<dyn Fetcher>,
        router: Router,
        frontier: Arc<RequestFrontier>,
        dataset: Arc<Dataset>,
    ) -> Self {
        let selector = fetcher.mode_selector();
        Self {
            shared: Arc::new(Shared {
                config: config.crawler.clone(),
                fetcher,
                selector,
                router,
                frontier,
                dataset,
                sessions: Arc::new(SessionPool::new()),
                stats: CrawlStats::default(),
                state: Mutex::new(RunState::Idle),
                stop_requested: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates a crawler with in-memory frontier and dataset
    pub fn in_memory(config: &HarvestConfig, fetcher: Arc<dyn Fetcher>, router: Router) -> Self {
        Self::new(
            config,
            fetcher,
            router,
            Arc::new(RequestFrontier::in_memory()),
            Arc::new(Dataset::in_memory()),
        )
    }

    pub fn enqueue(&self, url: &str) -> crate::Result<bool> {
        self.enqueue_request(Request::new(url)?)
    }

    pub fn enqueue_request(&self, request: Request) -> crate::Result<bool> {
        Ok(self.shared.frontier.add(request)?)
    }

    /// Queues a GET request per URL, returning how many were accepted
    pub fn enqueue_all<'a>(&self, urls: impl IntoIterator<Item = &'a str>) -> crate::Result<usize> {
        let requests = urls
            .into_iter()
            .map(Request::new)
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(self.shared.frontier.add_all(requests)?)
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Asks a running crawl to stop dispatching; in-flight requests finish
    pub fn stop(&self) {
        info!("Stop requested");
        self.shared.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    pub fn frontier(&self) -> &Arc<RequestFrontier> {
        &self.shared.frontier
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.shared.dataset
    }

    pub fn sessions(&self) -> &Arc<SessionPool> {
        &self.shared.sessions
    }

    pub fn mode_selector(&self) -> Option<&Arc<ModeSelector>> {
        self.shared.selector.as_ref()
    }

    /// Current counters plus frontier and dataset sizes
    pub fn summary(&self) -> crate::Result<RunSummary> {
        Ok(RunSummary::new(
            self.stats(),
            self.shared.frontier.info()?,
            DatasetInfo {
                count: self.shared.dataset.count()?,
            },
        ))
    }

    /// Runs the crawl until the frontier is drained or [`Crawler::stop`] is called
    ///
    /// Fetch and handler failures are absorbed by the retry policy and show
    /// up only in the statistics. A frontier store failure ends the run with
    /// an error once in-flight tasks have finished.
    ///
    /// # Errors
    ///
    /// * `HarvestError::AlreadyRunning` - this crawler is already running
    /// * `HarvestError::Storage` - the frontier store failed
    pub async fn run(&self) -> crate::Result<RunSummary> {
        let shared = &self.shared;
        {
            let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*state, RunState::Running | RunState::Draining) {
                return Err(HarvestError::AlreadyRunning);
            }
            *state = RunState::Running;
        }
        shared.stop_requested.store(false, Ordering::SeqCst);
        shared.stats.reset();

        let start_time = std::time::Instant::now();
        info!(
            "Starting crawl: {} pending, concurrency {}",
            shared
                .frontier
                .info()
                .map(|info| info.pending_count)
                .unwrap_or_default(),
            shared.config.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(shared.config.max_concurrency.max(1)));
        let mut tasks: JoinSet<crate::Result<()>> = JoinSet::new();
        let mut failure: Option<HarvestError> = None;

        while failure.is_none() && !self.stop_requested() {
            while let Some(joined) = tasks.try_join_next() {
                record_task_result(joined, &mut failure);
            }
            if failure.is_some() {
                break;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            if self.stop_requested() {
                break;
            }

            let next = match shared.frontier.next() {
                Ok(next) => next,
                Err(e) => {
                    failure = Some(e.into());
                    break;
                }
            };

            match next {
                Some(request) => {
                    shared.in_flight.fetch_add(1, Ordering::SeqCst);
                    let guard = InFlightGuard(Arc::clone(shared));
                    let task_shared = Arc::clone(shared);
                    tasks.spawn(async move {
                        let _permit = permit;
                        let _guard = guard;
                        run_request(task_shared, request).await
                    });
                }
                None => {
                    drop(permit);
                    if shared.in_flight.load(Ordering::SeqCst) > 0 {
                        tokio::time::sleep(BUSY_POLL_INTERVAL).await;
                    } else {
                        // A task may have enqueued work just before finishing
                        match shared.frontier.is_empty() {
                            Ok(false) => continue,
                            Ok(true) if shared.config.exit_on_empty_queue => {
                                debug!("Frontier drained");
                                break;
                            }
                            Ok(true) => tokio::time::sleep(IDLE_POLL_INTERVAL).await,
                            Err(e) => {
                                failure = Some(e.into());
                                break;
                            }
                        }
                    }
                }
            }
        }

        shared.set_state(RunState::Draining);
        debug!("Waiting for {} in-flight requests", self.in_flight());
        while let Some(joined) = tasks.join_next().await {
            record_task_result(joined, &mut failure);
        }
        shared.set_state(RunState::Stopped);

        if let Some(e) = failure {
            error!("Crawl aborted: {}", e);
            return Err(e);
        }

        let summary = self.summary()?;
        info!(
            "Crawl finished in {:?}: {} requests, {} successful, {} failed, {} retried",
            start_time.elapsed(),
            summary.requests_total,
            summary.requests_successful,
            summary.requests_failed,
            summary.requests_retried
        );
        Ok(summary)
    }

    fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::SeqCst)
    }
}

fn record_task_result(
    joined: Result<crate::Result<()>, tokio::task::JoinError>,
    failure: &mut Option<HarvestError>,
) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            if failure.is_none() {
                *failure = Some(e);
            }
        }
        Err(e) => error!("Worker task aborted: {}", e),
    }
}

/// Processes one request, treating a panic in the fetch or handler path as
/// a failed attempt
async fn run_request(shared: Arc<Shared>, request: Request) -> crate::Result<()> {
    let outcome = tokio::spawn(attempt(Arc::clone(&shared), request.clone())).await;

    match outcome {
        Ok(result) => result,
        Err(e) => {
            error!("Request {} panicked: {}", request.url(), e);
            retry_or_fail(&shared, request)
        }
    }
}

async fn attempt(shared: Arc<Shared>, request: Request) -> crate::Result<()> {
    shared.stats.record_attempt();

    let destination = request.destination();
    shared.sessions.get(&destination);
    let cookie_header = shared.sessions.cookie_header(&destination);

    let mut outgoing = request.clone();
    if !cookie_header.is_empty() {
        outgoing.set_header("Cookie", cookie_header);
    }

    debug!(
        "Fetching {} (attempt {})",
        request.url(),
        request.retry_count() + 1
    );
    let response = shared.fetcher.execute(&outgoing).await;

    let cookies = shared.fetcher.extract_cookies(&response);
    shared.sessions.update_cookies(&destination, cookies);

    if !response.is_success() {
        debug!(
            "Request {} failed with status {}{}",
            request.url(),
            response.status(),
            response
                .error()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default()
        );
        return retry_or_fail(&shared, request);
    }

    let context = Context::new(
        response,
        Arc::clone(&shared.frontier),
        Arc::clone(&shared.dataset),
        shared.selector.clone(),
    );
    if let Err(e) = shared.router.dispatch(&context) {
        error!("Handler failed for {}: {:#}", request.url(), e);
        return retry_or_fail(&shared, request);
    }

    shared.frontier.mark_handled(request.id())?;
    shared.stats.record_success();
    Ok(())
}

fn retry_or_fail(shared: &Shared, request: Request) -> crate::Result<()> {
    if request.retry_count() < shared.config.max_retries {
        shared.stats.record_retry();
        shared.frontier.reclaim(request)?;
    } else {
        warn!(
            "Giving up on {} after {} retries",
            request.url(),
            request.retry_count()
        );
        shared.stats.record_failure();
        shared.frontier.mark_handled(request.id())?;
    }
    Ok(())
}
