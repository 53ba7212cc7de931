//! Crawl dispatcher - bounded worker pool driving the crawl
//!
//! The dispatcher owns one crawl run:
//! - Admitting the sitemap seeds into a fresh [`Frontier`]
//! - Running a fixed pool of workers over a shared [`TaskQueue`]
//! - Fetching, processing and persisting every admitted page
//! - Feeding discovered links back through the frontier
//! - Stopping early when its [`ShutdownHandle`] is triggered

use crate::config::Config;
use crate::crawler::fetcher::{is_html_content_type, FetchResult, Transport};
use crate::crawler::frontier::{CrawlTask, Frontier};
use crate::crawler::parser::PageProcessor;
use crate::crawler::queue::TaskQueue;
use crate::sitemap::SitemapEntry;
use crate::storage::{blob_key_for_url, BlobStore, PageDocument, PageRecord, RecordSink};
use crate::HarvestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use url::Url;

/// Pages between two progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// Tunables of one dispatcher
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Number of concurrent workers
    pub max_concurrency: usize,

    /// Frontier budget
    pub max_requests_per_crawl: usize,

    /// Whether discovered links must stay on their seed's host
    pub follow_internal_only: bool,

    /// Upper bound on a single page fetch
    pub request_timeout: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrency: config.crawler.max_concurrency,
            max_requests_per_crawl: config.crawler.max_requests_per_crawl,
            follow_internal_only: config.crawler.follow_internal_only,
            request_timeout: Duration::from_secs(config.transport.request_timeout_secs),
        }
    }
}

/// Summary of one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    /// Sitemap entries offered as seeds
    pub seeds: usize,

    /// Seeds the frontier accepted
    pub seeds_admitted: usize,

    /// URLs admitted in total (seeds and discovered links)
    pub admitted: usize,

    /// Pages fetched and processed
    pub processed: usize,

    /// Fetches that failed (network, timeout, non-2xx)
    pub fetch_failures: usize,

    /// Responses discarded because they were not HTML
    pub content_mismatches: usize,

    /// Row-store writes that failed
    pub record_failures: usize,

    /// Blob-store writes that failed
    pub blob_failures: usize,

    /// Whether the run was stopped through its shutdown handle
    pub interrupted: bool,

    pub elapsed: Duration,
}

/// Cloneable trigger that stops a running dispatcher
///
/// Triggering is sticky: a dispatcher started after the trigger stops at once.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Requests shutdown; in-flight fetches are abandoned
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicUsize,
    fetch_failures: AtomicUsize,
    content_mismatches: AtomicUsize,
    record_failures: AtomicUsize,
    blob_failures: AtomicUsize,
}

fn bump(counter: &AtomicUsize) -> usize {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

/// State shared by every worker of one run
struct RunContext {
    frontier: Frontier,
    queue: TaskQueue,
    transport: Arc<dyn Transport>,
    processor: Arc<dyn PageProcessor>,
    records: Arc<dyn RecordSink>,
    blobs: Arc<dyn BlobStore>,
    request_timeout: Duration,
    counters: Counters,
    started: Instant,
}

/// Completes a popped task when dropped, even if processing panics
struct InFlight<'a>(&'a TaskQueue);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Bounded-concurrency crawl engine
pub struct Dispatcher {
    settings: DispatchSettings,
    transport: Arc<dyn Transport>,
    processor: Arc<dyn PageProcessor>,
    records: Arc<dyn RecordSink>,
    blobs: Arc<dyn BlobStore>,
    shutdown: ShutdownHandle,
}

impl Dispatcher {
    /// Creates a dispatcher over the given collaborators
    ///
    /// # Returns
    ///
    /// * `Ok(Dispatcher)` - Ready to run
    /// * `Err(HarvestError::WorkerPool)` - Concurrency or budget is zero
    pub fn new(
        settings: DispatchSettings,
        transport: Arc<dyn Transport>,
        processor: Arc<dyn PageProcessor>,
        records: Arc<dyn RecordSink>,
        blobs: Arc<dyn BlobStore>,
    ) -> crate::Result<Self> {
        if settings.max_concurrency == 0 {
            return Err(HarvestError::WorkerPool(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if settings.max_requests_per_crawl == 0 {
            return Err(HarvestError::WorkerPool(
                "max_requests_per_crawl must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            settings,
            transport,
            processor,
            records,
            blobs,
            shutdown: ShutdownHandle::new(),
        })
    }

    /// Replaces the dispatcher's shutdown trigger with a shared one
    pub fn with_shutdown_handle(mut self, handle: ShutdownHandle) -> Self {
        self.shutdown = handle;
        self
    }

    /// Handle that stops [`run`](Self::run) from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Crawls from the given seeds until the frontier is drained
    ///
    /// Seeds are admitted in order, each scoped to its own host. The run ends
    /// when no task is queued or in flight, or when shutdown is requested.
    pub async fn run(&self, seeds: &[SitemapEntry]) -> CrawlReport {
        let context = Arc::new(RunContext {
            frontier: Frontier::new(
                self.settings.max_requests_per_crawl,
                self.settings.follow_internal_only,
            ),
            queue: TaskQueue::new(),
            transport: Arc::clone(&self.transport),
            processor: Arc::clone(&self.processor),
            records: Arc::clone(&self.records),
            blobs: Arc::clone(&self.blobs),
            request_timeout: self.settings.request_timeout,
            counters: Counters::default(),
            started: Instant::now(),
        });

        let mut seeds_admitted = 0;
        for seed in seeds {
            if let Some(task) = context.frontier.admit_seed(seed) {
                context.queue.push(task);
                seeds_admitted += 1;
            }
        }

        tracing::info!(
            "Admitted {} of {} seeds (budget {}), starting {} workers",
            seeds_admitted,
            seeds.len(),
            context.frontier.budget(),
            self.settings.max_concurrency
        );

        let mut workers = JoinSet::new();
        for worker_id in 0..self.settings.max_concurrency {
            workers.spawn(worker_loop(worker_id, Arc::clone(&context)));
        }

        let shutdown = self.shutdown.wait();
        tokio::pin!(shutdown);

        let interrupted = loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) => tracing::error!("Worker task failed: {}", e),
                    None => break false,
                },
                _ = &mut shutdown => {
                    tracing::warn!("Shutdown requested, abandoning in-flight fetches");
                    context.queue.close();
                    workers.abort_all();
                    while workers.join_next().await.is_some() {}
                    break true;
                }
            }
        };

        let report = context.report(seeds.len(), seeds_admitted, interrupted);

        tracing::info!(
            "Dispatch finished: {} pages processed, {} admitted, {} fetch failures in {:?}",
            report.processed,
            report.admitted,
            report.fetch_failures,
            report.elapsed
        );

        report
    }
}

/// Pops and processes tasks until the queue reports the crawl finished
async fn worker_loop(worker_id: usize, context: Arc<RunContext>) {
    while let Some(task) = context.queue.pop().await {
        let _in_flight = InFlight(&context.queue);
        context.process_task(task).await;
    }
    tracing::debug!("Worker {} finished", worker_id);
}

impl RunContext {
    /// Fetches, processes and persists one task
    async fn process_task(&self, task: CrawlTask) {
        tracing::debug!("Processing {} (depth {})", task.url, task.depth);

        let fetched = match tokio::time::timeout(self.request_timeout, self.transport.fetch(&task.url))
            .await
        {
            Ok(result) => result,
            Err(_) => FetchResult::NetworkError {
                error: format!("no response within {:?}", self.request_timeout),
                timed_out: true,
            },
        };

        let (final_url, content_type, body) = match fetched {
            FetchResult::Success {
                final_url,
                content_type,
                body,
                ..
            } => (final_url, content_type, body),
            failure => {
                bump(&self.counters.fetch_failures);
                tracing::warn!(
                    "Failed to fetch {}: {}",
                    task.url,
                    failure.describe_failure()
                );
                return;
            }
        };

        if !is_html_content_type(&content_type) {
            bump(&self.counters.content_mismatches);
            tracing::info!("Skipping {}: expected HTML, got {}", task.url, content_type);
            return;
        }

        // Relative links resolve against where the page was actually served
        let base_url = match Url::parse(&final_url).or_else(|_| Url::parse(&task.url)) {
            Ok(url) => url,
            Err(e) => {
                bump(&self.counters.fetch_failures);
                tracing::warn!("Unusable final URL {} for {}: {}", final_url, task.url, e);
                return;
            }
        };

        let page = self.processor.process(&body, &base_url);

        let mut discovered = 0;
        for link in &page.links {
            if let Some(child) =
                self.frontier
                    .try_admit(link, &task.start_host, &task.sitemap, task.depth + 1)
            {
                self.queue.push(child);
                discovered += 1;
            }
        }
        tracing::debug!(
            "{}: {} links found, {} admitted",
            task.url,
            page.links.len(),
            discovered
        );

        let record = PageRecord {
            title: page.metadata.title,
            url: task.url.clone(),
            sitemap: task.sitemap.clone(),
            meta_description: page.metadata.meta_description,
            snippet: page.metadata.snippet,
        };

        self.persist(&record, &final_url, task.depth).await;

        let processed = bump(&self.counters.processed);
        if processed % PROGRESS_INTERVAL == 0 {
            let rate = processed as f64 / self.started.elapsed().as_secs_f64().max(f64::EPSILON);
            tracing::info!(
                "Progress: {} pages processed, {} admitted, {} queued, {:.2} pages/sec",
                processed,
                self.frontier.admitted_count(),
                self.queue.len(),
                rate
            );
        }
    }

    /// Writes the record and the full document; each failure stays local
    async fn persist(&self, record: &PageRecord, loaded_url: &str, depth: u32) {
        if let Err(e) = self.records.append(record).await {
            bump(&self.counters.record_failures);
            tracing::warn!("Failed to store record for {}: {}", record.url, e);
        }

        let key = blob_key_for_url(&record.url);
        let document = PageDocument::from_record(record, loaded_url, depth);
        let stored = match serde_json::to_value(&document) {
            Ok(value) => self.blobs.put(&key, &value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = stored {
            bump(&self.counters.blob_failures);
            tracing::warn!("Failed to store document {}: {}", key, e);
        }
    }

    fn report(&self, seeds: usize, seeds_admitted: usize, interrupted: bool) -> CrawlReport {
        let load = |counter: &AtomicUsize| counter.load(Ordering::Relaxed);
        CrawlReport {
            seeds,
            seeds_admitted,
            admitted: self.frontier.admitted_count(),
            processed: load(&self.counters.processed),
            fetch_failures: load(&self.counters.fetch_failures),
            content_mismatches: load(&self.counters.content_mismatches),
            record_failures: load(&self.counters.record_failures),
            blob_failures: load(&self.counters.blob_failures),
            interrupted,
            elapsed: self.started.elapsed(),
        }
    }
}
