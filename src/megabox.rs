//! Megabox: JSON movie list, then one detail POST per title whose answer is
//! an HTML fragment. The list endpoint mixes content categories; only
//! animation titles are kept.

use crate::bounded::map_limit;
use crate::date::release_date;
use crate::transport::{FetchRequest, Transport, USER_AGENT};
use crate::{Error, MovieListing, QueryOptions, Result, SourceAdapter, TheaterBrand, selector};
use regex::Regex;
use reqwest::header;
use scraper::Html;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument};
use url::Url;

const LIST_URL: &str = "https://www.megabox.co.kr/on/oh/oha/Movie/selectMovieList.do";
const INFO_URL: &str = "https://www.megabox.co.kr/on/oh/oha/Movie/selectMovieInfo.do";
const DETAIL_PAGE_URL: &str = "https://www.megabox.co.kr/movie-detail";
const DETAIL_CONCURRENCY: usize = 4;

const CATEGORY_MARKER: &str = "애니메이션";
const GENRE_LABEL: &str = "장르";

static RELEASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"개봉일\s*:\s*([\d.]+)").unwrap());

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieList {
    movie_list: Vec<MovieSummary>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovieSummary {
    rpst_movie_no: String,
    #[serde(default)]
    movie_nm: String,
    #[serde(default)]
    img_path_nm: Option<String>,
}

/// What the detail fragment contributes to a listing.
#[derive(Debug, Default, PartialEq)]
pub struct MovieInfo {
    pub release_text: Option<String>,
    pub genres: Vec<String>,
}

pub struct MegaboxAdapter {
    transport: Arc<dyn Transport>,
    list_url: String,
    info_url: String,
}

impl MegaboxAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            list_url: LIST_URL.to_string(),
            info_url: INFO_URL.to_string(),
        }
    }

    pub fn with_endpoints(mut self, list_url: impl Into<String>, info_url: impl Into<String>) -> Self {
        self.list_url = list_url.into();
        self.info_url = info_url.into();
        self
    }

    async fn fetch_detail(
        transport: Arc<dyn Transport>,
        info_url: String,
        list_url: Url,
        summary: MovieSummary,
        options: QueryOptions,
    ) -> Result<Option<MovieListing>> {
        let resp = transport
            .fetch(
                FetchRequest::post(info_url)
                    .header(header::USER_AGENT.as_str(), USER_AGENT)
                    .json(serde_json::json!({ "rpstMovieNo": summary.rpst_movie_no })),
            )
            .await?;

        let Some(info) = parse_movie_info(&resp.body)? else {
            debug!(movie = %summary.rpst_movie_no, "not in category");
            return Ok(None);
        };
        if options.genre().is_some() && !options.accepts(info.genres.iter().map(String::as_str)) {
            debug!(movie = %summary.rpst_movie_no, "skipped by genre filter");
            return Ok(None);
        }

        let image = summary
            .img_path_nm
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .and_then(|p| list_url.join(p).ok())
            .map(String::from);
        let link = Url::parse_with_params(DETAIL_PAGE_URL, &[("rpstMovieNo", &summary.rpst_movie_no)])?;

        Ok(Some(MovieListing {
            title: summary.movie_nm.trim().to_string(),
            image,
            link: link.into(),
            release_date: info.release_text.as_deref().and_then(release_date),
            theater_brand: TheaterBrand::Megabox,
        }))
    }
}

#[async_trait::async_trait]
impl SourceAdapter for MegaboxAdapter {
    fn brand(&self) -> TheaterBrand {
        TheaterBrand::Megabox
    }

    #[instrument(level = "info", skip_all, fields(brand = "Megabox"))]
    async fn list(&self, options: &QueryOptions) -> Result<Vec<MovieListing>> {
        let resp = self
            .transport
            .fetch(
                FetchRequest::post(&self.list_url)
                    .header(header::USER_AGENT.as_str(), USER_AGENT)
                    .header(header::ACCEPT.as_str(), "application/json")
                    .json(serde_json::json!({
                        "currentPage": "1",
                        "recordCountPerPage": "20",
                        "pageType": "rfilmDe",
                        "ibxMovieNmSearch": "",
                        "onairYn": "MSC02",
                        "specialType": "",
                    })),
            )
            .await?;

        let list: MovieList = serde_json::from_str(&resp.body)
            .map_err(|e| Error::malformed(resp.final_url.as_str(), e))?;
        info!(count = list.movie_list.len(), "movie list received");

        let list_url = resp.final_url;
        let listings = map_limit(list.movie_list, DETAIL_CONCURRENCY, |summary| {
            Self::fetch_detail(
                self.transport.clone(),
                self.info_url.clone(),
                list_url.clone(),
                summary,
                options.clone(),
            )
        })
        .await?;

        info!(count = listings.len(), "collected listings");
        Ok(listings)
    }
}

/// Read the `.movie-info` block of a detail fragment.
///
/// Returns `None` when the block does not mention the animation category.
pub fn parse_movie_info(html: &str) -> Result<Option<MovieInfo>> {
    let document = Html::parse_fragment(html);
    let info_sel = selector(".movie-info")?;
    let p_sel = selector("p")?;

    let blocks: Vec<_> = document.select(&info_sel).collect();
    let text: String = blocks.iter().flat_map(|b| b.text()).collect();
    if !text.contains(CATEGORY_MARKER) {
        return Ok(None);
    }

    let mut info = MovieInfo::default();
    for p in blocks.iter().flat_map(|b| b.select(&p_sel)) {
        let line = p.text().collect::<String>();
        if info.release_text.is_none()
            && let Some(caps) = RELEASE_RE.captures(&line)
        {
            info.release_text = Some(caps[1].to_string());
        }
        // "장르 : 애니메이션, 가족 / 95분"
        if info.genres.is_empty()
            && let Some((label, rest)) = line.split_once(':')
            && label.trim() == GENRE_LABEL
        {
            let rest = rest.split('/').next().unwrap_or("");
            info.genres = rest
                .split(',')
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect();
        }
    }
    Ok(Some(info))
}
