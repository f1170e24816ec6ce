//! Bounded, order-preserving concurrent map.
//!
//! Every per-repository step (list branches, read a manifest, push protection)
//! is independent, so they are fanned out with at most `limit` requests in
//! flight. Results always come back in input order, whatever order the
//! requests complete in.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;

/// Map `f` over `items` with at most `limit` futures running at once.
///
/// A `limit` of zero is treated as one.
pub async fn parallel_map<I, T, R, F, Fut>(items: I, limit: usize, f: F) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .collect()
        .await
}

/// Like [`parallel_map`] for fallible work: stops at the first error in input
/// order and drops the futures still in flight.
pub async fn try_parallel_map<I, T, R, E, F, Fut>(items: I, limit: usize, f: F) -> Result<Vec<R>, E>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    stream::iter(items)
        .map(f)
        .buffered(limit.max(1))
        .try_collect()
        .await
}
