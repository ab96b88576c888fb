//! Deadline helpers for upstream calls

use std::future::Future;
use std::time::{Duration, Instant};

/// Apply timeout to an async operation
///
/// Returns `Err` with the original error type if the operation times out.
pub async fn with_timeout<T, E>(
    timeout: Duration,
    future: impl Future<Output = Result<T, E>>,
) -> Result<T, TimeoutError<E>> {
    match tokio::time::timeout(timeout, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(TimeoutError::Inner(err)),
        Err(_) => Err(TimeoutError::Timeout(timeout)),
    }
}

/// A fixed budget shared by several sequential steps of one request
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time left before the budget is spent (zero once exceeded)
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    /// Run `future` within whatever is left of the budget
    ///
    /// A timeout reports the full budget, not the remainder.
    pub async fn run<T, E>(
        &self,
        future: impl Future<Output = Result<T, E>>,
    ) -> Result<T, TimeoutError<E>> {
        with_timeout(self.remaining(), future)
            .await
            .map_err(|err| match err {
                TimeoutError::Timeout(_) => TimeoutError::Timeout(self.budget),
                inner => inner,
            })
    }
}

/// Error type for timeout operations
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Inner(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result: Result<i32, TimeoutError<String>> =
            with_timeout(Duration::from_secs(1), async { Ok::<_, String>(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_inner_error() {
        let result: Result<i32, TimeoutError<String>> = with_timeout(
            Duration::from_secs(1),
            async { Err::<i32, _>("inner error".to_string()) },
        )
        .await;

        match result {
            Err(TimeoutError::Inner(msg)) => assert_eq!(msg, "inner error"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_with_timeout_timeout() {
        let result: Result<i32, TimeoutError<String>> = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, String>(42)
            },
        )
        .await;

        assert!(matches!(result, Err(TimeoutError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_deadline_reports_full_budget() {
        let deadline = Deadline::after(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(deadline.remaining() < Duration::from_millis(20));

        let result: Result<(), TimeoutError<String>> = deadline
            .run(async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            })
            .await;

        match result {
            Err(TimeoutError::Timeout(d)) => assert_eq!(d, Duration::from_millis(20)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_exhausted_deadline_has_no_time_left() {
        let deadline = Deadline::after(Duration::ZERO);
        assert_eq!(deadline.remaining(), Duration::ZERO);
        assert_eq!(deadline.budget(), Duration::ZERO);
    }
}
