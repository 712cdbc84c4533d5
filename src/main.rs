use clap::{Parser, ValueEnum};
use screening_movies::feed;
use screening_movies::{
    Aggregator, CgvAdapter, HttpTransport, LotteCinemaAdapter, MegaboxAdapter, QueryOptions,
    SourceAdapter, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    All,
    Cgv,
    Lotte,
    Megabox,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Rss,
}

/// Upcoming movies from Korean theater chains, sorted by release date.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Only titles listed under this genre (e.g. 애니메이션)
    #[arg(long)]
    genre: Option<String>,

    #[arg(long, value_enum, default_value_t = Source::All)]
    source: Source,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Write to this file instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Per-request timeout
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::with_timeout(Some(
        Duration::from_secs(cli.timeout_secs),
    ))?);
    let options = QueryOptions { genre: cli.genre };

    let listings = match cli.source {
        Source::All => Aggregator::with_default_sources(transport).list_all(&options).await?,
        single => {
            let adapter: Box<dyn SourceAdapter> = match single {
                Source::Cgv => Box::new(CgvAdapter::new(transport)),
                Source::Lotte => Box::new(LotteCinemaAdapter::new(transport)),
                _ => Box::new(MegaboxAdapter::new(transport)),
            };
            Aggregator::new(vec![adapter]).list_all(&options).await?
        }
    };
    info!(count = listings.len(), "listings ready");

    let rendered = match cli.format {
        Format::Text => feed::to_text(&listings),
        Format::Json => feed::to_json(&listings)?,
        Format::Rss => feed::to_rss(
            &listings,
            "Upcoming movies",
            "http://www.cgv.co.kr/movies/pre-movies.aspx",
            "Upcoming releases from CGV, Lotte Cinema and Megabox",
        )?,
    };

    match cli.output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            info!(path = %path.display(), "written");
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
