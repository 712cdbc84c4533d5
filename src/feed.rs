//! Renderers for aggregated listings.

use crate::date::kst;
use crate::{MovieListing, Result};
use rss::{ChannelBuilder, ItemBuilder};

fn release_day(listing: &MovieListing) -> String {
    listing
        .release_date
        .map(|d| d.with_timezone(&kst()).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Plain-text report, one block per listing.
pub fn to_text(listings: &[MovieListing]) -> String {
    let mut out = String::new();
    for listing in listings {
        out.push_str(&format!("BRAND       : {}\n", listing.theater_brand));
        out.push_str(&format!("TITLE       : {}\n", listing.title));
        out.push_str(&format!("RELEASE DATE: {}\n", release_day(listing)));
        out.push_str(&format!("LINK        : {}\n", listing.link));
        if let Some(ref image) = listing.image {
            out.push_str(&format!("POSTER      : {}\n", image));
        }
        out.push('\n');
    }
    out
}

pub fn to_json(listings: &[MovieListing]) -> Result<String> {
    Ok(serde_json::to_string_pretty(listings)?)
}

/// Generate an RSS channel from a list of listings
pub fn to_rss(
    listings: &[MovieListing],
    channel_title: &str,
    channel_link: &str,
    channel_description: &str,
) -> Result<String> {
    let mut items = Vec::new();

    for listing in listings {
        let mut description_parts = vec![
            format!("{}", listing.theater_brand),
            format!("개봉: {}", release_day(listing)),
        ];
        if let Some(ref poster) = listing.image {
            description_parts.push(format!("<img src=\"{}\" alt=\"Poster\" />", poster));
        }

        let guid = rss::Guid {
            value: listing.link.clone(),
            permalink: true,
        };

        let mut item_builder = ItemBuilder::default();
        item_builder.title(format!("[{}] {}", listing.theater_brand, listing.title));
        item_builder.link(listing.link.clone());
        item_builder.description(description_parts.join("<br/>\n"));
        item_builder.guid(guid);
        if let Some(date) = listing.release_date {
            item_builder.pub_date(date.to_rfc2822());
        }

        items.push(item_builder.build());
    }

    let channel = ChannelBuilder::default()
        .title(channel_title)
        .link(channel_link)
        .description(channel_description)
        .items(items)
        .build();

    let mut buf = Vec::new();
    channel.write_to(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
