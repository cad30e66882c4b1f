// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 syntegrity contributors

//! Run context
//!
//! Carries the cancellation token and optional deadline that every lifecycle
//! operation threads through. Engine calls are wrapped in [`Context::guard`],
//! which fails with `Cancelled` as soon as the token fires or the deadline
//! passes.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{PipelineError, PipelineResult};

/// Cancellation scope for a pipeline invocation
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Create a fresh, uncancelled context
    pub fn new() -> Self {
        Self::default()
    }

    /// Token that cancels this context when triggered
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derive a child context whose deadline is at most `timeout` from now.
    /// Cancelling the parent cancels the child; the reverse does not hold.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Fail with `Cancelled` if the token fired or the deadline passed
    pub fn check(&self) -> PipelineResult<()> {
        if self.token.is_cancelled() {
            return Err(cancelled("cancellation requested"));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(cancelled("deadline exceeded"));
            }
        }
        Ok(())
    }

    /// Run `fut` unless the context is cancelled first
    pub async fn guard<T, E, F>(&self, fut: F) -> PipelineResult<T>
    where
        F: Future<Output = Result<T, E>>,
        PipelineError: From<E>,
    {
        self.check()?;

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(cancelled("cancellation requested")),
            _ = expired => Err(cancelled("deadline exceeded")),
            result = fut => result.map_err(PipelineError::from),
        }
    }

    /// Sleep that wakes early with `Cancelled`
    pub async fn sleep(&self, duration: Duration) -> PipelineResult<()> {
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok::<(), PipelineError>(())
        })
        .await
    }
}

fn cancelled(reason: &str) -> PipelineError {
    PipelineError::Cancelled {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let ctx = Context::new();
        let value = ctx
            .guard(async { Ok::<_, PipelineError>(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_fast() {
        let ctx = Context::new();
        ctx.cancel();

        let err = ctx
            .guard(async { Ok::<_, PipelineError>(()) })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_parent_cancellation_reaches_child() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert!(child.check().is_err());
    }

    #[tokio::test]
    async fn test_deadline_interrupts_sleep() {
        let ctx = Context::new().with_timeout(Duration::from_millis(10));
        let err = ctx.sleep(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err.kind(), "Cancelled");
    }

    #[tokio::test]
    async fn test_child_deadline_never_exceeds_parent() {
        let parent = Context::new().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(300));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
