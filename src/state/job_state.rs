/// Job state definitions for tracking a fetch job through the scheduler
use std::fmt;

/// Represents the current state of a job in the scheduler
///
/// ```text
/// Queued -> InFlight -> Succeeded
///                    -> FailedRetryable -> Queued
///                    -> FailedTerminal
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    // ===== Active States =====
    /// Job is waiting in a depth bucket
    Queued,

    /// Job's fetch has been issued and has not completed yet
    InFlight,

    /// Attempt failed but the job has tries left; it is about to be re-queued
    FailedRetryable,

    // ===== Terminal States =====
    /// Response was delivered to the job's callback
    Succeeded,

    /// Final attempt failed; the job is dropped
    FailedTerminal,
}

impl JobState {
    /// Returns true if this is a terminal state (the job will be dropped)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::FailedTerminal)
    }

    /// Returns true if this represents a failed attempt
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FailedRetryable | Self::FailedTerminal)
    }

    /// State a job enters after a failed attempt with `remaining_tries` left
    pub fn after_failure(remaining_tries: u32) -> Self {
        if remaining_tries > 0 {
            Self::FailedRetryable
        } else {
            Self::FailedTerminal
        }
    }

    /// Returns true if the scheduler may move a job from `self` to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::InFlight)
                | (Self::InFlight, Self::Succeeded)
                | (Self::InFlight, Self::FailedRetryable)
                | (Self::InFlight, Self::FailedTerminal)
                | (Self::FailedRetryable, Self::Queued)
        )
    }

    /// Short lowercase name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::FailedRetryable => "failed_retryable",
            Self::Succeeded => "succeeded",
            Self::FailedTerminal => "failed_terminal",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
