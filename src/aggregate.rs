use crate::transport::Transport;
use crate::{
    CgvAdapter, LotteCinemaAdapter, MegaboxAdapter, MovieListing, QueryOptions, Result,
    SourceAdapter, sort_by_release_date,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Runs every configured source and merges their listings.
pub struct Aggregator {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl Aggregator {
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    /// CGV, Lotte Cinema and Megabox over one transport.
    pub fn with_default_sources(transport: Arc<dyn Transport>) -> Self {
        Self::new(vec![
            Box::new(CgvAdapter::new(transport.clone())),
            Box::new(LotteCinemaAdapter::new(transport.clone())),
            Box::new(MegaboxAdapter::new(transport)),
        ])
    }

    /// All listings sorted by release date, unknown dates last.
    ///
    /// Sources run concurrently and all of them are awaited. If any source
    /// fails, the call fails with the first error in source order; there is no
    /// partial result.
    #[instrument(level = "info", skip_all, fields(genre = options.genre().unwrap_or("")))]
    pub async fn list_all(&self, options: &QueryOptions) -> Result<Vec<MovieListing>> {
        let outcomes = join_all(self.adapters.iter().map(|adapter| adapter.list(options))).await;

        let mut listings = Vec::new();
        for (adapter, outcome) in self.adapters.iter().zip(outcomes) {
            match outcome {
                Ok(found) => {
                    info!(brand = %adapter.brand(), count = found.len(), "source finished");
                    listings.extend(found);
                }
                Err(e) => {
                    error!(brand = %adapter.brand(), error = %e, "source failed");
                    return Err(e);
                }
            }
        }

        sort_by_release_date(&mut listings);
        info!(count = listings.len(), "aggregated listings");
        Ok(listings)
    }
}

/// Query every default source through `transport`.
pub async fn list_all(
    transport: Arc<dyn Transport>,
    options: &QueryOptions,
) -> Result<Vec<MovieListing>> {
    Aggregator::with_default_sources(transport)
        .list_all(options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date::parse_kst_date;
    use crate::{Error, TheaterBrand};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        brand: TheaterBrand,
        outcome: fn() -> Result<Vec<MovieListing>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        fn brand(&self) -> TheaterBrand {
            self.brand
        }

        async fn list(&self, _options: &QueryOptions) -> Result<Vec<MovieListing>> {
            tokio::task::yield_now().await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn listing(title: &str, brand: TheaterBrand, date: Option<&str>) -> MovieListing {
        MovieListing {
            title: title.to_string(),
            image: None,
            link: format!("https://example.com/{title}"),
            release_date: date.map(|d| parse_kst_date(d).unwrap()),
            theater_brand: brand,
        }
    }

    fn fixed(
        brand: TheaterBrand,
        outcome: fn() -> Result<Vec<MovieListing>>,
        calls: &Arc<AtomicUsize>,
    ) -> Box<dyn SourceAdapter> {
        Box::new(Fixed {
            brand,
            outcome,
            calls: calls.clone(),
        })
    }

    #[tokio::test]
    async fn known_dates_first_then_unknown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let aggregator = Aggregator::new(vec![
            fixed(
                TheaterBrand::Megabox,
                || Ok(vec![listing("undated", TheaterBrand::Megabox, None)]),
                &calls,
            ),
            fixed(
                TheaterBrand::Cgv,
                || Ok(vec![listing("dated", TheaterBrand::Cgv, Some("2024.03.01"))]),
                &calls,
            ),
        ]);

        let all = aggregator.list_all(&QueryOptions::default()).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["dated", "undated"]);
        assert_eq!(all[0].theater_brand, TheaterBrand::Cgv);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn merges_across_sources_by_date() {
        let calls = Arc::new(AtomicUsize::new(0));
        let aggregator = Aggregator::new(vec![
            fixed(
                TheaterBrand::Cgv,
                || {
                    Ok(vec![
                        listing("c-may", TheaterBrand::Cgv, Some("2024.05.01")),
                        listing("c-none", TheaterBrand::Cgv, None),
                        listing("c-jan", TheaterBrand::Cgv, Some("2024.01.01")),
                    ])
                },
                &calls,
            ),
            fixed(
                TheaterBrand::LotteCinema,
                || {
                    Ok(vec![
                        listing("l-none", TheaterBrand::LotteCinema, None),
                        listing("l-mar", TheaterBrand::LotteCinema, Some("2024.03.01")),
                    ])
                },
                &calls,
            ),
        ]);

        let all = aggregator.list_all(&QueryOptions::default()).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["c-jan", "l-mar", "c-may", "c-none", "l-none"]);
    }

    #[tokio::test]
    async fn one_failing_source_fails_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let aggregator = Aggregator::new(vec![
            fixed(
                TheaterBrand::Cgv,
                || Ok(vec![listing("ok", TheaterBrand::Cgv, Some("2024.03.01"))]),
                &calls,
            ),
            fixed(
                TheaterBrand::LotteCinema,
                || Err(Error::malformed("http://lotte.test", "expected value")),
                &calls,
            ),
            fixed(
                TheaterBrand::Megabox,
                || Err(Error::transport("http://megabox.test", "timed out")),
                &calls,
            ),
        ]);

        let err = aggregator.list_all(&QueryOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
        // every source still ran to completion
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_sources_is_empty() {
        let all = Aggregator::new(Vec::new())
            .list_all(&QueryOptions::default())
            .await
            .unwrap();
        assert!(all.is_empty());
    }
}
