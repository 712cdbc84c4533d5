//! "N at a time" fan-out used for per-title detail requests.

use crate::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Run `op` over `items` with at most `limit` calls unsettled at once.
///
/// `Ok(None)` drops the item from the output. On the first `Err` no further
/// items are started, the calls already in flight are driven to completion,
/// and then that first error is returned. Output order follows completion
/// order, not input order.
pub async fn map_limit<T, R, F, Fut>(
    items: impl IntoIterator<Item = T>,
    limit: usize,
    mut op: F,
) -> Result<Vec<R>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<Option<R>>>,
{
    let limit = limit.max(1);
    let mut pending = items.into_iter();
    let mut in_flight = FuturesUnordered::new();
    let mut results = Vec::new();
    let mut first_error = None;

    for item in pending.by_ref().take(limit) {
        in_flight.push(op(item));
    }

    while let Some(outcome) = in_flight.next().await {
        match outcome {
            Ok(Some(value)) => results.push(value),
            Ok(None) => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if first_error.is_none()
            && let Some(item) = pending.next()
        {
            in_flight.push(op(item));
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
        started: AtomicUsize,
        finished: AtomicUsize,
    }

    impl Gauge {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            })
        }

        async fn track<R>(&self, spins: usize, value: R) -> R {
            self.started.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for _ in 0..spins {
                tokio::task::yield_now().await;
            }
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            value
        }
    }

    #[tokio::test]
    async fn never_exceeds_limit() {
        for limit in [1usize, 2, 4, 7] {
            for size in [0usize, 1, 3, 10, 25] {
                let gauge = Gauge::new();
                let out = map_limit(0..size, limit, |i| {
                    let gauge = gauge.clone();
                    async move { Ok(Some(gauge.track(i % 5 + 1, i).await)) }
                })
                .await
                .unwrap();

                assert_eq!(out.len(), size);
                assert!(gauge.peak.load(Ordering::SeqCst) <= limit);
                if size >= limit {
                    assert_eq!(gauge.peak.load(Ordering::SeqCst), limit);
                }
            }
        }
    }

    #[tokio::test]
    async fn zero_limit_behaves_as_one() {
        let gauge = Gauge::new();
        let out = map_limit(0..5, 0, |i| {
            let gauge = gauge.clone();
            async move { Ok(Some(gauge.track(2, i).await)) }
        })
        .await
        .unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skipped_items_are_omitted() {
        let mut out = map_limit(1..=10, 4, |i| async move {
            Ok(if i % 2 == 0 { Some(i) } else { None })
        })
        .await
        .unwrap();
        out.sort();
        assert_eq!(out, vec![2, 4, 6, 8, 10]);
    }

    #[tokio::test]
    async fn first_error_wins_after_in_flight_settles() {
        let gauge = Gauge::new();
        let result: Result<Vec<usize>> = map_limit(0..20, 4, |i| {
            let gauge = gauge.clone();
            async move {
                // item 1 fails quickly, the rest take longer
                let spins = if i == 1 { 1 } else { 5 };
                gauge.track(spins, ()).await;
                if i == 1 || i == 2 {
                    Err(Error::transport(format!("item-{i}"), "boom"))
                } else {
                    Ok(Some(i))
                }
            }
        })
        .await;

        match result {
            Err(Error::Transport { url, .. }) => assert_eq!(url, "item-1"),
            other => panic!("expected transport error, got {other:?}"),
        }
        let started = gauge.started.load(Ordering::SeqCst);
        assert_eq!(started, gauge.finished.load(Ordering::SeqCst));
        assert!(started < 20, "no new work should start after a failure");
    }
}
