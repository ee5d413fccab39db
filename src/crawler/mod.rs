//! Crawler module: queueing, fetching, parsing and scheduling
//!
//! This module contains the core crawl machinery, including:
//! - A depth-indexed request queue
//! - The `Transport` seam and its reqwest implementation
//! - HTML and XML parsing into navigable documents
//! - The bounded-concurrency scheduler with retries
//! - Throttled process resource diagnostics

mod fetcher;
mod monitor;
mod parser;
mod queue;
mod scheduler;

pub use crate::document::ContentKind;
pub use fetcher::{
    build_http_client, FetchRequest, Params, ReqwestTransport, Response, Transport,
    TransportOverrides,
};
pub use monitor::{MemoryProbe, MemoryUsage, ProcessMemory, ResourceMonitor, ResourceReport};
pub use parser::{DocumentParser, MarkupParser};
pub use queue::RequestQueue;
pub use scheduler::{Callback, Fetched, JobOptions, Scheduler, SchedulerStats, Submitter};
