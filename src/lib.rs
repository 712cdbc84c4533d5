pub mod aggregate;
pub mod bounded;
pub mod cgv;
pub mod date;
mod error;
pub mod feed;
pub mod lotte_cinema;
pub mod megabox;
pub mod transport;

#[cfg(test)]
mod testing;

pub use aggregate::{Aggregator, list_all};
pub use cgv::CgvAdapter;
pub use error::{Error, Result};
pub use lotte_cinema::LotteCinemaAdapter;
pub use megabox::MegaboxAdapter;
pub use transport::{HttpTransport, Transport};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::fmt;

/// Which chain a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TheaterBrand {
    #[serde(rename = "CGV")]
    Cgv,
    #[serde(rename = "Lotte Cinema")]
    LotteCinema,
    #[serde(rename = "Megabox")]
    Megabox,
}

impl TheaterBrand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Cgv => "CGV",
            Self::LotteCinema => "Lotte Cinema",
            Self::Megabox => "Megabox",
        }
    }
}

impl fmt::Display for TheaterBrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common movie data structure that all adapters produce
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieListing {
    pub title: String,
    /// Absolute poster URL
    pub image: Option<String>,
    /// Absolute URL of the title's detail page
    pub link: String,
    /// Midnight KST of the release day; `None` when the origin gave no usable date
    pub release_date: Option<DateTime<FixedOffset>>,
    #[serde(rename = "theaterBrandName")]
    pub theater_brand: TheaterBrand,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub genre: Option<String>,
}

impl QueryOptions {
    pub fn with_genre(genre: impl Into<String>) -> Self {
        Self {
            genre: Some(genre.into()),
        }
    }

    /// The requested genre, or `None` when absent or blank.
    pub fn genre(&self) -> Option<&str> {
        self.genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    /// Whether an item carrying `genres` survives the filter.
    ///
    /// With no filter everything passes. Otherwise one token must equal the
    /// requested genre after trimming, ignoring case.
    pub fn accepts<'a>(&self, genres: impl IntoIterator<Item = &'a str>) -> bool {
        let Some(wanted) = self.genre() else {
            return true;
        };
        let wanted = wanted.to_lowercase();
        genres
            .into_iter()
            .any(|g| g.trim().to_lowercase() == wanted)
    }
}

/// One theater chain.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn brand(&self) -> TheaterBrand;

    /// Fetch and normalize this chain's upcoming titles.
    async fn list(&self, options: &QueryOptions) -> Result<Vec<MovieListing>>;
}

pub(crate) fn selector(css: &str) -> Result<scraper::Selector> {
    scraper::Selector::parse(css).map_err(|e| Error::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Stable ascending sort on release date; unknown dates go last.
pub fn sort_by_release_date(listings: &mut [MovieListing]) {
    listings.sort_by(|a, b| match (a.release_date, b.release_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
