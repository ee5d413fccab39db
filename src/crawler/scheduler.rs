//! Scheduler: concurrency gate, drain loop and retry policy
//!
//! This module handles:
//! - Wrapping submissions into jobs with a retry budget
//! - Dispatching the highest-priority queued job whenever a slot is free
//! - Routing responses to the XML or HTML parser
//! - Re-queueing failed attempts and reporting failures to callbacks that asked for them
//! - Sampling the resource monitor after every completed attempt
//!
//! All bookkeeping runs on the task that drives [`Scheduler::run`]. In-flight
//! fetches are futures polled by that same task, so completions are handled
//! one at a time and the queue and counters need no locking.

use crate::config::{Config, RetryPlacement, SchedulerConfig};
use crate::crawler::fetcher::{FetchRequest, Params, Response, Transport, TransportOverrides};
use crate::crawler::monitor::ResourceMonitor;
use crate::crawler::parser::{DocumentParser, MarkupParser};
use crate::crawler::queue::RequestQueue;
use crate::document::{ContentKind, Document};
use crate::state::JobState;
use crate::{CrawlError, FetchError, TransportError};
use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Method;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

/// What a successful attempt produced
#[derive(Debug)]
pub enum Fetched {
    /// Parsed document, stamped with the request's method and URL
    Document(Document),
    /// Unparsed response, for jobs submitted with parsing disabled
    Raw(Response),
}

impl Fetched {
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Document(document) => Some(document),
            Self::Raw(_) => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            Self::Document(document) => Some(document),
            Self::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&Response> {
        match self {
            Self::Raw(response) => Some(response),
            Self::Document(_) => None,
        }
    }
}

type ResultOnlyFn = Box<dyn FnMut(&mut Submitter, Fetched)>;
type WithErrorFn = Box<dyn FnMut(&mut Submitter, Result<Fetched, CrawlError>)>;

/// How a job reports back
///
/// `ResultOnly` callbacks see successes only: a job that fails every attempt is
/// dropped without telling them. `WithError` callbacks also get every failed
/// attempt, including the final one.
pub enum Callback {
    ResultOnly(ResultOnlyFn),
    WithError(WithErrorFn),
}

impl Callback {
    pub fn result_only<F>(callback: F) -> Self
    where
        F: FnMut(&mut Submitter, Fetched) + 'static,
    {
        Self::ResultOnly(Box::new(callback))
    }

    pub fn with_error<F>(callback: F) -> Self
    where
        F: FnMut(&mut Submitter, Result<Fetched, CrawlError>) + 'static,
    {
        Self::WithError(Box::new(callback))
    }

    fn deliver(&mut self, submitter: &mut Submitter, fetched: Fetched) {
        match self {
            Self::ResultOnly(callback) => callback(submitter, fetched),
            Self::WithError(callback) => callback(submitter, Ok(fetched)),
        }
    }

    /// Returns false when the callback has no error channel
    fn report_failure(&mut self, submitter: &mut Submitter, error: CrawlError) -> bool {
        match self {
            Self::ResultOnly(_) => false,
            Self::WithError(callback) => {
                callback(submitter, Err(error));
                true
            }
        }
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResultOnly(_) => write!(f, "Callback::ResultOnly"),
            Self::WithError(_) => write!(f, "Callback::WithError"),
        }
    }
}

/// Per-job settings
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Attempt budget; `None` or `Some(0)` uses the scheduler default
    pub tries: Option<u32>,
    /// `Some(false)` hands the raw response to the callback
    pub parse: Option<bool>,
    pub transport: TransportOverrides,
}

impl JobOptions {
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = Some(tries);
        self
    }

    /// Skip parsing and deliver the raw response
    pub fn raw(mut self) -> Self {
        self.parse = Some(false);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport.headers.push((name.into(), value.into()));
        self
    }
}

/// A queued unit of work
struct Job {
    depth: usize,
    tries: u32,
    remaining_tries: u32,
    method: Method,
    target: Url,
    params: Params,
    callback: Callback,
    options: JobOptions,
    state: JobState,
}

impl Job {
    fn transition(&mut self, next: JobState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid job transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("{} {}: {} -> {}", self.method, self.target, self.state, next);
        self.state = next;
    }

    /// 1-based number of the attempt that just finished
    fn attempt(&self) -> u32 {
        self.tries - self.remaining_tries
    }
}

/// A submission made from inside a callback
struct Submission {
    depth: usize,
    method: Method,
    target: Url,
    params: Params,
    callback: Callback,
    options: JobOptions,
}

/// Handle callbacks use to submit follow-up work
///
/// Submissions are queued as soon as the callback returns.
pub struct Submitter {
    depth: usize,
    pending: Vec<Submission>,
}

impl Submitter {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            pending: Vec::new(),
        }
    }

    /// Depth the job whose callback is running was submitted at
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of submissions made so far in this callback
    pub fn submitted(&self) -> usize {
        self.pending.len()
    }

    pub fn submit(
        &mut self,
        depth: usize,
        method: Method,
        target: Url,
        params: Params,
        callback: Callback,
        options: JobOptions,
    ) {
        self.pending.push(Submission {
            depth,
            method,
            target,
            params,
            callback,
            options,
        });
    }
}

/// Counters describing a scheduler's progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub concurrency_limit: usize,
    pub in_flight: usize,
    /// Highest `in_flight` value seen
    pub peak_in_flight: usize,
    pub total_dispatched: u64,
    pub succeeded: u64,
    /// Failed attempts that were re-queued
    pub retried: u64,
    /// Jobs dropped after their last attempt failed
    pub exhausted: u64,
    pub queued: usize,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dispatched: {}, succeeded: {}, retried: {}, exhausted: {}, queued: {}, in flight: {} (peak {}/{})",
            self.total_dispatched,
            self.succeeded,
            self.retried,
            self.exhausted,
            self.queued,
            self.in_flight,
            self.peak_in_flight,
            self.concurrency_limit
        )
    }
}

struct Completion {
    job: Job,
    result: Result<Response, TransportError>,
}

/// Bounded-concurrency request scheduler for one crawl session
///
/// # Example
///
/// ```no_run
/// use ripple_crawl::config::Config;
/// use ripple_crawl::crawler::{Callback, JobOptions, Params, ReqwestTransport, Scheduler};
/// use reqwest::Method;
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let transport = ReqwestTransport::new(config.transport.clone())?;
/// let mut scheduler = Scheduler::new(&config, transport);
///
/// scheduler.submit(
///     0,
///     Method::GET,
///     Url::parse("https://example.com/")?,
///     Params::None,
///     Callback::result_only(|_, fetched| {
///         if let Some(doc) = fetched.document() {
///             println!("{:?}", doc.first_content("title"));
///         }
///     }),
///     JobOptions::default(),
/// );
///
/// let stats = scheduler.run().await;
/// println!("{}", stats);
/// # Ok(())
/// # }
/// ```
pub struct Scheduler<T, P = MarkupParser> {
    transport: Rc<T>,
    parser: P,
    config: SchedulerConfig,
    queue: RequestQueue<Job>,
    monitor: ResourceMonitor,
    in_flight: FuturesUnordered<LocalBoxFuture<'static, Completion>>,
    stats: SchedulerStats,
}

impl<T: Transport + 'static> Scheduler<T, MarkupParser> {
    /// Creates a scheduler with the default parser and a sysinfo-backed monitor
    pub fn new(config: &Config, transport: T) -> Self {
        Self::with_parts(
            config.scheduler.clone(),
            transport,
            MarkupParser,
            ResourceMonitor::new(config.monitor.clone()),
        )
    }
}

impl<T: Transport + 'static, P: DocumentParser> Scheduler<T, P> {
    pub fn with_parts(
        config: SchedulerConfig,
        transport: T,
        parser: P,
        monitor: ResourceMonitor,
    ) -> Self {
        let stats = SchedulerStats {
            concurrency_limit: config.concurrency.max(1),
            ..SchedulerStats::default()
        };

        Self {
            transport: Rc::new(transport),
            parser,
            config,
            queue: RequestQueue::new(),
            monitor,
            in_flight: FuturesUnordered::new(),
            stats,
        }
    }

    /// Queues a fetch job at `depth`
    ///
    /// Never blocks. The job is dispatched by [`Scheduler::run`] once it is the
    /// highest-priority job and a concurrency slot is free; submissions made
    /// outside a callback wait for the next `run()` call.
    pub fn submit(
        &mut self,
        depth: usize,
        method: Method,
        target: Url,
        params: Params,
        callback: Callback,
        options: JobOptions,
    ) {
        self.enqueue(Submission {
            depth,
            method,
            target,
            params,
            callback,
            options,
        });
    }

    /// Drives the drain loop until nothing is queued or in flight
    pub async fn run(&mut self) -> SchedulerStats {
        self.pump();

        while let Some(completion) = self.in_flight.next().await {
            self.complete(completion);
        }

        let stats = self.stats();
        tracing::debug!("Scheduler idle: {}", stats);
        stats
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            queued: self.queue.len(),
            ..self.stats
        }
    }

    /// Number of jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn monitor(&self) -> &ResourceMonitor {
        &self.monitor
    }

    fn enqueue(&mut self, submission: Submission) {
        let tries = submission
            .options
            .tries
            .filter(|tries| *tries > 0)
            .unwrap_or(self.config.tries)
            .max(1);

        tracing::trace!(
            "Queueing {} {} at depth {} ({} tries)",
            submission.method,
            submission.target,
            submission.depth,
            tries
        );

        self.queue.push(
            submission.depth,
            Job {
                depth: submission.depth,
                tries,
                remaining_tries: tries,
                method: submission.method,
                target: submission.target,
                params: submission.params,
                callback: submission.callback,
                options: submission.options,
                state: JobState::Queued,
            },
        );
    }

    /// Dispatches queued jobs until the concurrency limit is reached or the queue is empty
    fn pump(&mut self) {
        while self.stats.in_flight < self.stats.concurrency_limit {
            let Some(job) = self.queue.pop_highest() else {
                return;
            };
            self.dispatch(job);
        }
    }

    fn dispatch(&mut self, mut job: Job) {
        job.remaining_tries -= 1;
        job.transition(JobState::InFlight);

        self.stats.in_flight += 1;
        self.stats.total_dispatched += 1;
        self.stats.peak_in_flight = self.stats.peak_in_flight.max(self.stats.in_flight);

        tracing::debug!(
            "Dispatching [{}] {} (depth {}, attempt {}/{})",
            job.method,
            job.target,
            job.depth,
            job.attempt(),
            job.tries
        );

        let request = FetchRequest {
            method: job.method.clone(),
            url: job.target.clone(),
            params: job.params.clone(),
            options: job.options.transport.clone(),
        };
        let transport = Rc::clone(&self.transport);

        self.in_flight.push(Box::pin(async move {
            let result = transport.fetch(request).await;
            Completion { job, result }
        }));
    }

    fn complete(&mut self, completion: Completion) {
        let Completion { mut job, result } = completion;
        self.stats.in_flight -= 1;

        let mut submitter = Submitter::new(job.depth);
        let outcome = match result {
            Ok(response) => self.interpret(&job, response),
            Err(error) => Err(FetchError::Transport(error)),
        };

        match outcome {
            Ok(fetched) => {
                job.transition(JobState::Succeeded);
                self.stats.succeeded += 1;
                job.callback.deliver(&mut submitter, fetched);
            }
            Err(cause) => self.fail(job, cause, &mut submitter),
        }

        for submission in submitter.pending {
            self.enqueue(submission);
            self.pump();
        }

        self.monitor
            .sample(self.queue.len(), self.stats.total_dispatched);
        self.pump();
    }

    /// Turns a response into what the callback receives
    fn interpret(&self, job: &Job, response: Response) -> Result<Fetched, FetchError> {
        if job.options.parse == Some(false) {
            return Ok(Fetched::Raw(response));
        }

        let kind = ContentKind::from_content_type(response.content_type());
        let mut document = self.parser.parse_as(kind, &response.body);
        if document.is_empty_document() {
            return Err(FetchError::EmptyDocument);
        }

        document.stamp(job.method.clone(), job.target.clone());
        Ok(Fetched::Document(document))
    }

    fn fail(&mut self, mut job: Job, cause: FetchError, submitter: &mut Submitter) {
        let next = JobState::after_failure(job.remaining_tries);
        job.transition(next);

        let method = job.method.to_string();
        let url = job.target.to_string();
        let error = if next == JobState::FailedRetryable {
            CrawlError::Attempt {
                method,
                url,
                attempt: job.attempt(),
                tries: job.tries,
                source: cause,
            }
        } else {
            CrawlError::ExhaustedRetries {
                method,
                url,
                attempts: job.tries,
                source: cause,
            }
        };

        if next == JobState::FailedRetryable {
            tracing::debug!("{}; retrying", error);
        } else {
            tracing::warn!("{}", error);
        }

        let notified = job.callback.report_failure(submitter, error);

        if next == JobState::FailedRetryable {
            self.stats.retried += 1;
            self.requeue(job);
        } else {
            self.stats.exhausted += 1;
            if !notified {
                tracing::debug!(
                    "Dropping [{}] {} without notifying its callback",
                    job.method,
                    job.target
                );
            }
        }
    }

    fn requeue(&mut self, mut job: Job) {
        job.transition(JobState::Queued);
        match self.config.retry_placement {
            RetryPlacement::Lowest => self.queue.push_lowest(job),
            RetryPlacement::Highest => self.queue.push_highest(job),
            RetryPlacement::Original => {
                let depth = job.depth;
                self.queue.push(depth, job);
            }
        }
    }
}
