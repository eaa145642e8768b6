//! Deadline and cancellation for pipeline blocking points.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{PipelineResult, RecognitionError};

/// Wraps every await in the pipeline so a hard deadline or an external
/// cancel signal interrupts it. When a guarded future is abandoned it is
/// dropped, which kills any subprocess it owns.
#[derive(Debug, Clone, Default)]
pub struct CancelGuard {
    deadline: Option<Instant>,
    budget_secs: u64,
    cancel: Option<watch::Receiver<bool>>,
}

impl CancelGuard {
    /// No deadline and no cancel signal.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Deadline `budget` from now.
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + budget),
            budget_secs: budget.as_secs(),
            cancel: None,
        }
    }

    /// Also stop when `cancel` becomes `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Check the guard without waiting.
    pub fn check(&self) -> PipelineResult<()> {
        if self.is_cancelled() {
            return Err(RecognitionError::Cancelled);
        }
        if matches!(self.deadline, Some(d) if Instant::now() >= d) {
            return Err(RecognitionError::TimeoutExceeded(self.budget_secs));
        }
        Ok(())
    }

    /// Await `fut` unless the deadline passes or cancellation is signalled
    /// first.
    pub async fn run<F: Future>(&mut self, fut: F) -> PipelineResult<F::Output> {
        self.check()?;

        let deadline = self.deadline;
        let budget_secs = self.budget_secs;
        let cancel = self.cancel.as_mut();

        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async move {
            match cancel {
                // A dropped sender can no longer cancel.
                Some(rx) => {
                    let closed = rx.wait_for(|c| *c).await.is_err();
                    if closed {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            output = fut => Ok(output),
            _ = expired => Err(RecognitionError::TimeoutExceeded(budget_secs)),
            _ = cancelled => Err(RecognitionError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_future_passes_through() {
        let mut guard = CancelGuard::with_budget(Duration::from_secs(5));
        assert_eq!(guard.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_deadline_interrupts_pending_future() {
        let mut guard = CancelGuard::with_budget(Duration::from_millis(20));
        let err = guard
            .run(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(guard.check().is_err());
    }

    #[tokio::test]
    async fn test_cancel_signal_interrupts_pending_future() {
        let (tx, rx) = watch::channel(false);
        let mut guard = CancelGuard::unbounded().with_cancel(rx);

        let waiter = tokio::spawn(async move { guard.run(std::future::pending::<()>()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(true).unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, RecognitionError::Cancelled));
    }

    #[tokio::test]
    async fn test_dropped_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut guard = CancelGuard::with_budget(Duration::from_millis(20)).with_cancel(rx);
        let err = guard.run(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
