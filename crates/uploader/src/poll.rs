//! Bounded polling for server-side state transitions.

use std::future::Future;
use std::time::Duration;

use tracing::trace;

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    /// Wait for the storage URI: 60 attempts, 2 s apart.
    pub const STORAGE_URI: Self = Self {
        attempts: 60,
        interval: Duration::from_secs(2),
    };

    /// Wait for commit processing: 120 attempts, 5 s apart.
    pub const COMMIT: Self = Self {
        attempts: 120,
        interval: Duration::from_secs(5),
    };
}

/// What one probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState<T> {
    Ready(T),
    Pending,
    /// The server reported a terminal failure state.
    Failed(String),
}

/// Why polling ended without a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    Exhausted { attempts: u32 },
    Failed(String),
    Probe(E),
}

/// Calls `probe` until it is ready, fails, or `policy.attempts` run out.
///
/// Sleeps `policy.interval` between attempts, never after the last one.
/// A probe error ends polling immediately. Dropping the future cancels it.
pub async fn poll_until<T, E, F, Fut>(policy: PollPolicy, mut probe: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollState<T>, E>>,
{
    for attempt in 1..=policy.attempts {
        match probe().await.map_err(PollError::Probe)? {
            PollState::Ready(value) => return Ok(value),
            PollState::Failed(state) => return Err(PollError::Failed(state)),
            PollState::Pending => trace!(attempt, "still pending"),
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(PollError::Exhausted {
        attempts: policy.attempts,
    })
}
