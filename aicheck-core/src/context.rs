//! Request context: cancellation signal plus optional deadline.
//!
//! Every core operation takes a [`RequestContext`] threaded from the originating
//! request. Waits inside the retry executor race against it, so no backoff sleep
//! ever outlives the caller.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupt {
    /// The caller fired its cancel handle
    #[error("context canceled")]
    Cancelled,
    /// The deadline attached to the context has passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal and deadline for a single logical request.
///
/// Cheap to clone; clones observe the same signal.
#[derive(Debug, Clone)]
pub struct RequestContext {
    cancel: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Fires the cancellation signal of the contexts it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancel every context sharing this signal.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        // The sender is dropped right away, so the signal can never fire.
        let (_tx, rx) = watch::channel(false);
        Self {
            cancel: rx,
            deadline: None,
        }
    }

    /// A context that can be cancelled through the returned handle.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    /// Derive a context sharing this signal with a deadline no later than `deadline`.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// The deadline, if one is attached.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline (`None` when unbounded).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns the interruption if the context has already fired.
    pub fn interrupted(&self) -> Option<Interrupt> {
        if *self.cancel.borrow() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Interrupt {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancelled() => Interrupt::Cancelled,
            _ = deadline => Interrupt::DeadlineExceeded,
        }
    }

    /// Sleep for `duration` unless the context fires first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupt> {
        if let Some(interrupt) = self.interrupted() {
            return Err(interrupt);
        }

        tokio::select! {
            biased;
            interrupt = self.done() => Err(interrupt),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Drive `future` to completion unless the context fires first.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        if let Some(interrupt) = self.interrupted() {
            return Err(interrupt);
        }

        tokio::select! {
            biased;
            interrupt = self.done() => Err(interrupt),
            output = future => Ok(output),
        }
    }

    async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling: this context can no longer be cancelled.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}
