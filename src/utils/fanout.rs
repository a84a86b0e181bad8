//! Deadline-bounded fan-out.
//!
//! Runs a set of independent probes concurrently and joins on all of them,
//! with one aggregate budget over the whole group. Members that finish
//! before the budget keep their real result; members still running when it
//! fires are dropped and replaced by a synthesized result. Output order
//! always matches input order.

use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};

/// Runs every future concurrently and returns their outputs in input order.
///
/// `on_timeout(index)` builds the result for any member that has not
/// completed when `budget` expires. Dropping an unfinished member releases
/// the sockets and timers it owns.
pub async fn join_all_within<T, F>(
    futures: Vec<F>,
    budget: Duration,
    on_timeout: impl Fn(usize) -> T,
) -> Vec<T>
where
    F: Future<Output = T>,
{
    let total = futures.len();
    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut pending: FuturesUnordered<_> = futures
        .into_iter()
        .enumerate()
        .map(|(index, fut)| async move { (index, fut.await) })
        .collect();

    let deadline = tokio::time::Instant::now() + budget;
    let mut completed = 0usize;
    while completed < total {
        match tokio::time::timeout_at(deadline, pending.next()).await {
            Ok(Some((index, value))) => {
                slots[index] = Some(value);
                completed += 1;
            }
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "Group budget of {}ms expired with {} of {} probes outstanding",
                    budget.as_millis(),
                    total - completed,
                    total
                );
                break;
            }
        }
    }
    // Abandon anything still in flight before synthesizing results
    drop(pending);

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.unwrap_or_else(|| on_timeout(index)))
        .collect()
}
