//! CGV: static "coming soon" chart plus one HTML page per title.

use crate::bounded::map_limit;
use crate::date::release_date;
use crate::transport::{FetchRequest, Transport, USER_AGENT};
use crate::{MovieListing, QueryOptions, Result, SourceAdapter, TheaterBrand, selector};
use reqwest::header;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

const LISTING_URL: &str = "http://www.cgv.co.kr/movies/pre-movies.aspx";
const DETAIL_CONCURRENCY: usize = 4;

const GENRE_LABEL: &str = "장르";
const RELEASE_LABEL: &str = "개봉";
const RE_RELEASE_MARK: &str = "(재개봉)";

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Label part of "label : value" rows.
fn label_of(text: &str) -> &str {
    text.split(':').next().unwrap_or("").trim()
}

pub struct CgvAdapter {
    transport: Arc<dyn Transport>,
    listing_url: String,
}

impl CgvAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            listing_url: LISTING_URL.to_string(),
        }
    }

    pub fn with_listing_url(mut self, url: impl Into<String>) -> Self {
        self.listing_url = url.into();
        self
    }

    async fn fetch_detail(
        transport: Arc<dyn Transport>,
        link: Url,
        options: QueryOptions,
    ) -> Result<Option<MovieListing>> {
        let resp = transport
            .fetch(FetchRequest::get(link.as_str()).header(header::USER_AGENT.as_str(), USER_AGENT))
            .await?;
        let listing = parse_detail(&resp.body, &resp.final_url, &options)?;
        if listing.is_none() {
            debug!(url = %resp.final_url, "skipped by genre filter");
        }
        Ok(listing)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for CgvAdapter {
    fn brand(&self) -> TheaterBrand {
        TheaterBrand::Cgv
    }

    #[instrument(level = "info", skip_all, fields(brand = "CGV"))]
    async fn list(&self, options: &QueryOptions) -> Result<Vec<MovieListing>> {
        let resp = self
            .transport
            .fetch(
                FetchRequest::get(&self.listing_url)
                    .header(header::USER_AGENT.as_str(), USER_AGENT),
            )
            .await?;

        let links = parse_listing(&resp.body, &resp.final_url)?;
        info!(count = links.len(), url = %resp.final_url, "discovered detail pages");

        let listings = map_limit(links, DETAIL_CONCURRENCY, |link| {
            Self::fetch_detail(self.transport.clone(), link, options.clone())
        })
        .await?;

        info!(count = listings.len(), "collected listings");
        Ok(listings)
    }
}

/// Absolute detail-page URLs from the chart, first occurrence order, no duplicates.
pub fn parse_listing(html: &str, page_url: &Url) -> Result<Vec<Url>> {
    let document = Html::parse_document(html);
    let link_sel = selector(".sect-movie-chart ol > li .box-image > a")?;

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for a in document.select(&link_sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let Ok(link) = page_url.join(href.trim()) else {
            debug!(href, "unresolvable link");
            continue;
        };
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }
    Ok(links)
}

/// Build a listing from a detail page, or `None` if the genre filter rejects it.
///
/// Missing fields are not errors: title falls back to an empty string, the
/// poster to `None` and the release date to unknown.
pub fn parse_detail(
    html: &str,
    page_url: &Url,
    options: &QueryOptions,
) -> Result<Option<MovieListing>> {
    let document = Html::parse_document(html);
    let section_sel = selector("#select_main .sect-base-movie")?;
    let row_sel = selector(".box-contents .spec dl dt")?;
    let title_sel = selector(".box-contents .title > strong")?;
    let image_sel = selector(".box-image .thumb-image img")?;

    let section = document.select(&section_sel).next();
    let label_rows: Vec<ElementRef<'_>> = section
        .map(|s| s.select(&row_sel).collect())
        .unwrap_or_default();

    // "장르 : 드라마, 애니메이션"
    let genre_text: String = label_rows
        .iter()
        .map(|dt| text_of(*dt))
        .filter(|t| label_of(t) == GENRE_LABEL)
        .collect::<String>()
        .trim()
        .to_string();
    if options.genre().is_some() {
        let genres = genre_text.split_once(':').map(|(_, v)| v).unwrap_or("");
        if !options.accepts(genres.split(',')) {
            return Ok(None);
        }
    }

    // "<dt>개봉 :</dt><dd>2024.03.01 (재개봉)</dd>"
    let release_text: String = label_rows
        .iter()
        .filter(|dt| label_of(&text_of(**dt)) == RELEASE_LABEL)
        .filter_map(|dt| {
            dt.next_siblings()
                .filter_map(ElementRef::wrap)
                .next()
                .filter(|sib| sib.value().name() == "dd")
        })
        .map(text_of)
        .collect::<String>()
        .replace(RE_RELEASE_MARK, "")
        .trim()
        .to_string();

    let title = section
        .and_then(|s| s.select(&title_sel).next())
        .map(|e| text_of(e).trim().to_string())
        .unwrap_or_default();

    let image = section
        .and_then(|s| s.select(&image_sel).next())
        .and_then(|img| img.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .and_then(|src| page_url.join(src).ok())
        .map(String::from);

    Ok(Some(MovieListing {
        title,
        image,
        link: page_url.to_string(),
        release_date: release_date(&release_text),
        theater_brand: TheaterBrand::Cgv,
    }))
}
