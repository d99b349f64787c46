//! Bounded fan-out with a deterministic join.
//!
//! The synthesis and generation stages issue independent AI calls
//! concurrently up to a semaphore-bounded limit. Each call writes into its
//! own index slot, and the join awaits handles in spawn order, so stage
//! output ordering is independent of completion order. Cancellation aborts
//! the whole fan-out and releases pending permits.

use std::sync::Arc;

use tokio::sync::Semaphore;

use quizforge_shared::{CancelToken, QuizForgeError, Result};

/// Run `f` over every item with at most `concurrency` futures in flight.
///
/// Per-item outcomes are returned in the original item order; the only
/// whole-call error is cancellation (or a panicked task, which is a bug).
pub async fn run_ordered<I, T, Fut>(
    items: Vec<I>,
    concurrency: usize,
    cancel: &CancelToken,
    f: impl Fn(usize, I) -> Fut,
) -> Result<Vec<T>>
where
    I: Send + 'static,
    T: Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        let sem = semaphore.clone();
        let cancel = cancel.clone();
        let fut = f(index, item);

        handles.push(tokio::spawn(async move {
            let _permit = tokio::select! {
                permit = sem.acquire_owned() => permit
                    .map_err(|_| QuizForgeError::internal("fan-out semaphore closed"))?,
                _ = cancel.cancelled() => return Err(QuizForgeError::Cancelled),
            };
            tokio::select! {
                out = fut => Ok(out),
                _ = cancel.cancelled() => Err(QuizForgeError::Cancelled),
            }
        }));
    }

    // Awaiting in spawn order restores input order regardless of which
    // task finished first.
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Ok(value)) => results.push(value),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => {
                return Err(QuizForgeError::internal(format!(
                    "fan-out task panicked: {join_err}"
                )));
            }
        }
    }

    Ok(results)
}
