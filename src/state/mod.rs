//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobState`: where a job is in its lifecycle (queued, in flight, succeeded, failed)

mod job_state;

// Re-export main types
pub use job_state::JobState;
