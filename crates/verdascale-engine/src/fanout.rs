//! Bounded parallel execution of per-instance cloud work.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run `jobs` with at most `limit` in flight and collect every outcome.
///
/// Returns only after all jobs finished. Dropping the returned future
/// aborts the jobs still running.
pub(crate) async fn run_bounded<T, F>(limit: usize, jobs: Vec<F>) -> Vec<Result<T, String>>
where
    T: Send + 'static,
    F: Future<Output = Result<T, String>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();
    let total = jobs.len();

    for job in jobs {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| format!("semaphore closed: {e}"))?;
            job.await
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        outcomes.push(joined.unwrap_or_else(|e| Err(format!("worker failed: {e}"))));
    }
    outcomes
}
