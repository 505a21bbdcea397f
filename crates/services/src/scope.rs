//! Cancellation scopes tying async work to the lifetime of its owner.
//!
//! A view creates a `TaskScope` when it opens and cancels (or drops) it when
//! it closes. Work started through the scope resolves to `Err(Cancelled)`
//! once that happens, so a late response is discarded instead of being
//! written into state nobody is looking at.

use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("task scope was cancelled")]
pub struct Cancelled;

/// Owner side of a cancellation scope. Dropping it cancels every token.
#[derive(Debug)]
pub struct TaskScope {
    tx: watch::Sender<bool>,
}

/// Cloneable handle for work that runs inside a scope.
#[derive(Debug, Clone)]
pub struct ScopeToken {
    /// `None` for detached work that no owner can cancel.
    rx: Option<watch::Receiver<bool>>,
}

impl TaskScope {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    #[must_use]
    pub fn token(&self) -> ScopeToken {
        ScopeToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Run `fut` unless the scope is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the scope is cancelled before or while `fut` runs.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        self.token().run(fut).await
    }
}

impl Default for TaskScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

impl ScopeToken {
    /// A token that is never cancelled.
    #[must_use]
    pub fn detached() -> Self {
        Self { rx: None }
    }

    /// A dropped owner counts as cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx
            .as_ref()
            .is_some_and(|rx| *rx.borrow() || rx.has_changed().is_err())
    }

    /// Run `fut` unless the owning scope is cancelled or dropped first.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the scope goes away before `fut` completes.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        let Some(mut rx) = self.rx.clone() else {
            return Ok(fut.await);
        };
        tokio::select! {
            biased;
            _ = rx.wait_for(|cancelled| *cancelled) => Err(Cancelled),
            out = fut => {
                if self.is_cancelled() {
                    Err(Cancelled)
                } else {
                    Ok(out)
                }
            }
        }
    }
}
