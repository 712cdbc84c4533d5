//! Lotte Cinema: one form POST to the movie-data endpoint inside a fresh
//! cookie session. The endpoint rejects calls without the session cookie and
//! matching `Origin` / `Referer`.

use crate::date::release_date;
use crate::transport::{FetchRequest, Transport, USER_AGENT};
use crate::{Error, MovieListing, QueryOptions, Result, SourceAdapter, TheaterBrand};
use reqwest::header;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

const ORIGIN: &str = "http://www.lottecinema.co.kr";
const ENTRY_PATH: &str = "/LCHS/Contents/Movie/Movie-List.aspx";
const DATA_PATH: &str = "/LCWS/Movie/MovieData.aspx";
const DETAIL_PATH: &str = "/LCHS/Contents/Movie/Movie-Detail-View.aspx";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct MovieData {
    #[serde(rename = "Movies")]
    movies: MovieItems,
}

#[derive(Debug, Deserialize)]
struct MovieItems {
    #[serde(rename = "Items")]
    items: Vec<LotteMovie>,
}

#[derive(Debug, Deserialize)]
struct LotteMovie {
    #[serde(rename = "MovieNameKR", default)]
    name: String,
    #[serde(rename = "PosterURL", default)]
    poster_url: Option<String>,
    #[serde(rename = "RepresentationMovieCode")]
    code: MovieCode,
    #[serde(rename = "ReleaseDate", default)]
    release_date: Option<String>,
    #[serde(rename = "MovieGenreName", default)]
    genre: Option<String>,
}

/// Movie codes arrive as strings, occasionally as bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MovieCode {
    Text(String),
    Number(i64),
}

impl fmt::Display for MovieCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s.trim()),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

pub struct LotteCinemaAdapter {
    transport: Arc<dyn Transport>,
    origin: String,
}

impl LotteCinemaAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            origin: ORIGIN.to_string(),
        }
    }

    /// Point the adapter at another host, e.g. `http://localhost:8080`.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    fn search_params() -> serde_json::Value {
        serde_json::json!({
            "MethodName": "GetMovies",
            "channelType": "HO",
            "osType": "Chrome",
            "osVersion": USER_AGENT,
            "multiLanguageID": "KR",
            "division": 1,
            "moviePlayYN": "N",
            "orderType": "5",
            "blockSize": PAGE_SIZE,
            "pageNo": 1,
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for LotteCinemaAdapter {
    fn brand(&self) -> TheaterBrand {
        TheaterBrand::LotteCinema
    }

    #[instrument(level = "info", skip_all, fields(brand = "Lotte Cinema"))]
    async fn list(&self, options: &QueryOptions) -> Result<Vec<MovieListing>> {
        // Cookie jar lives only for this call.
        let session = self.transport.session()?;

        let entry = session
            .fetch(
                FetchRequest::get(self.url(ENTRY_PATH))
                    .header(header::USER_AGENT.as_str(), USER_AGENT),
            )
            .await?;
        debug!(url = %entry.final_url, "session established");

        let data_url = self.url(DATA_PATH);
        let params = Self::search_params().to_string();
        let resp = session
            .fetch(
                FetchRequest::post(&data_url)
                    .header(header::USER_AGENT.as_str(), USER_AGENT)
                    .header("X-Requested-With", "XMLHttpRequest")
                    .header(header::ORIGIN.as_str(), &self.origin)
                    .header(header::REFERER.as_str(), entry.final_url.as_str())
                    .form(&[("paramList", params.as_str())]),
            )
            .await?;

        let listings = parse_movie_data(&resp.body, &resp.final_url, &self.origin, options)?;
        info!(count = listings.len(), "collected listings");
        Ok(listings)
    }
}

/// Turn the movie-data response into listings, applying the genre filter.
pub fn parse_movie_data(
    body: &str,
    endpoint: &Url,
    origin: &str,
    options: &QueryOptions,
) -> Result<Vec<MovieListing>> {
    let data: MovieData =
        serde_json::from_str(body).map_err(|e| Error::malformed(endpoint.as_str(), e))?;

    let listings = data
        .movies
        .items
        .into_iter()
        // "드라마/액션"
        .filter(|movie| {
            options.accepts(movie.genre.as_deref().unwrap_or("").split('/'))
        })
        .map(|movie| {
            let date_prefix: String = movie
                .release_date
                .as_deref()
                .unwrap_or("")
                .chars()
                .take(10)
                .collect();
            let image = movie
                .poster_url
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .and_then(|p| endpoint.join(p).ok())
                .map(String::from);

            MovieListing {
                title: movie.name.trim().to_string(),
                image,
                link: format!("{origin}{DETAIL_PATH}?movie={}", movie.code),
                release_date: release_date(&date_prefix),
                theater_brand: TheaterBrand::LotteCinema,
            }
        })
        .collect();

    Ok(listings)
}
