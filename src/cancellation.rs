//! Cancellation framework: generation-tagged tokens for restartable tasks and
//! a timeout/cancel guard wrapped around every external call.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{IveeError, Result};

/// Lifecycle of a restartable background task (the keyword poller).
/// Each restart cancels the previous token and issues a fresh one.
pub struct TaskGeneration {
    current_token: RwLock<CancellationToken>,
    generation: AtomicU64,
}

impl Default for TaskGeneration {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskGeneration {
    /// Starts inactive: the initial token is already cancelled.
    pub fn new() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self {
            current_token: RwLock::new(token),
            generation: AtomicU64::new(0),
        }
    }

    /// Cancel the current task, advance generation, return the new token + generation.
    pub fn cancel_and_advance(&self) -> (CancellationToken, u64) {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        let fresh = CancellationToken::new();
        *token_guard = fresh.clone();
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        (fresh, gen)
    }

    /// Cancel the current task without advancing generation.
    pub fn cancel_all(&self) {
        self.current_token.read().cancel();
    }

    /// Whether the current generation is live.
    pub fn is_active(&self) -> bool {
        !self.current_token.read().is_cancelled()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Run `fut` under a deadline and a cancellation token.
/// Expiry maps to `IveeError::Timeout`, cancellation to `IveeError::Cancelled`.
pub async fn guarded<T, F>(
    stage: &'static str,
    timeout: Duration,
    token: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(IveeError::Cancelled(stage)),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(inner) => inner,
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(stage, timeout_ms, "external call timed out");
                Err(IveeError::Timeout { stage, timeout_ms })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_starts_inactive() {
        let gen = TaskGeneration::new();
        assert!(!gen.is_active());
        assert_eq!(gen.current_generation(), 0);
    }

    #[test]
    fn advance_cancels_previous() {
        let gen = TaskGeneration::new();
        let (first, g1) = gen.cancel_and_advance();
        assert!(gen.is_active());
        let (second, g2) = gen.cancel_and_advance();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!((g1, g2), (1, 2));
        gen.cancel_all();
        assert!(second.is_cancelled());
        assert!(!gen.is_active());
        assert_eq!(gen.current_generation(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_times_out() {
        let token = CancellationToken::new();
        let res: Result<()> = guarded("speech", Duration::from_millis(50), &token, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert_eq!(res, Err(IveeError::Timeout { stage: "speech", timeout_ms: 50 }));
    }

    #[tokio::test]
    async fn guarded_observes_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let res: Result<u8> =
            guarded("capture", Duration::from_secs(1), &token, std::future::pending()).await;
        assert_eq!(res, Err(IveeError::Cancelled("capture")));
    }

    #[tokio::test]
    async fn guarded_passes_result_through() {
        let token = CancellationToken::new();
        let ok = guarded("poll", Duration::from_secs(1), &token, async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
        let err: Result<()> = guarded("poll", Duration::from_secs(1), &token, async {
            Err(IveeError::Detection("engine offline".into()))
        })
        .await;
        assert_eq!(err, Err(IveeError::Detection("engine offline".into())));
    }
}
