use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytscrape::{
    CaptionFetcher, ScrapeError, ScrapeOptions, Scraper, TranscriptOutcome, VideoListingProvider,
    VideoRecord,
};

#[derive(Parser)]
#[command(name = "ytscrape")]
#[command(version, about = "List YouTube videos and extract transcripts from auto-generated captions")]
#[command(long_about = None)]
#[command(arg_required_else_help = true, allow_external_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print listings as one JSON object per line
    #[arg(long, global = true)]
    json: bool,

    /// Caption downloader executable
    #[arg(long = "yt-dlp", value_name = "PATH", env = "YTSCRAPE_YT_DLP", default_value = "yt-dlp", global = true)]
    yt_dlp: String,

    /// Caption languages to request (e.g. en, en.*, de)
    #[arg(long, value_name = "CODE", env = "YTSCRAPE_LANG", global = true)]
    lang: Option<String>,

    /// Directory for the temporary caption file
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    work_dir: PathBuf,

    /// Custom User-Agent string
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Proxy URL (http://proxy:port)
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Request timeout in seconds (default: none)
    #[arg(long, value_name = "SECS", global = true)]
    timeout: Option<u64>,

    /// Pause between listing page requests in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 1000, global = true)]
    page_delay_ms: u64,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// List the videos of a channel (id or @handle)
    Channel {
        channel_id: String,
        /// Maximum number of videos
        limit: Option<usize>,
    },

    /// List the videos of a playlist
    Playlist {
        playlist_id: String,
        /// Maximum number of videos
        limit: Option<usize>,
    },

    /// Search for videos
    Search {
        query: String,
        /// Maximum number of results
        #[arg(default_value_t = 10)]
        limit: usize,
    },

    /// Print a video's transcript, or save it to a file
    Transcript {
        video_url: String,
        output_file: Option<PathBuf>,
    },

    #[command(external_subcommand)]
    Unknown(Vec<String>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let mut stdout = std::io::stdout();
    if let Commands::Unknown(args) = &cli.command {
        return report_unknown(&mut stdout, args);
    }

    let scraper = Scraper::new(build_options(&cli));
    run(&cli.command, cli.json, &scraper, &mut stdout).await
}

/// Initialize logging based on verbosity level. Logs go to stderr so stdout
/// only carries listings and transcripts.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ytscrape_cli=debug,ytscrape=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ytscrape_cli=info,ytscrape=info".into())
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .with(env_filter)
        .init();
}

/// Build ScrapeOptions from CLI arguments
fn build_options(cli: &Cli) -> ScrapeOptions {
    let mut options = ScrapeOptions::new()
        .yt_dlp_path(&cli.yt_dlp)
        .work_dir(&cli.work_dir)
        .page_delay(Duration::from_millis(cli.page_delay_ms));

    if let Some(language) = &cli.lang {
        options = options.subtitle_language(language);
    }

    if let Some(user_agent) = &cli.user_agent {
        options = options.user_agent(user_agent);
    }

    if let Some(proxy) = &cli.proxy {
        options = options.proxy(proxy);
    }

    if let Some(timeout) = cli.timeout {
        options = options.timeout(timeout);
    }

    options
}

async fn run<L, C, W>(
    command: &Commands,
    json: bool,
    scraper: &Scraper<L, C>,
    out: &mut W,
) -> anyhow::Result<()>
where
    L: VideoListingProvider,
    C: CaptionFetcher,
    W: Write,
{
    match command {
        Commands::Channel { channel_id, limit } => {
            let videos = scraper
                .channel_videos(channel_id, *limit)
                .await
                .map_err(|e| listing_error(e, format!("Failed to list channel {}", channel_id)))?;
            print_videos(out, &videos, json)?;
        }
        Commands::Playlist { playlist_id, limit } => {
            let videos = scraper
                .playlist_videos(playlist_id, *limit)
                .await
                .map_err(|e| listing_error(e, format!("Failed to list playlist {}", playlist_id)))?;
            print_videos(out, &videos, json)?;
        }
        Commands::Search { query, limit } => {
            let videos = scraper
                .search_videos(query, Some(*limit))
                .await
                .map_err(|e| listing_error(e, format!("Failed to search for {:?}", query)))?;
            print_videos(out, &videos, json)?;
        }
        Commands::Transcript {
            video_url,
            output_file,
        } => {
            let outcome = scraper
                .transcript(video_url)
                .await
                .with_context(|| format!("Failed to fetch transcript for {}", video_url))?;
            report_transcript(out, outcome, output_file.as_deref()).await?;
        }
        Commands::Unknown(args) => report_unknown(out, args)?,
    }

    Ok(())
}

/// Unknown commands are reported, not rejected
fn report_unknown<W: Write>(out: &mut W, args: &[String]) -> anyhow::Result<()> {
    let name = args.first().map(String::as_str).unwrap_or_default();
    writeln!(out, "Unknown command: {}", name)?;
    Ok(())
}

/// Wrap a listing failure, with a hint when the network was at fault
fn listing_error(error: ScrapeError, what: String) -> anyhow::Error {
    let context = if error.is_network() {
        format!("{} (check your connection or --proxy setting)", what)
    } else {
        what
    };
    anyhow::Error::new(error).context(context)
}

/// Print one line per video, `id: title` or JSON
fn print_videos<W: Write>(out: &mut W, videos: &[VideoRecord], json: bool) -> anyhow::Result<()> {
    for video in videos {
        if json {
            writeln!(out, "{}", serde_json::to_string(video)?)?;
        } else {
            writeln!(out, "{}", video)?;
        }
    }

    debug!("Printed {} videos", videos.len());
    Ok(())
}

/// Print or save a transcript; unavailable transcripts are reported, not failed
async fn report_transcript<W: Write>(
    out: &mut W,
    outcome: TranscriptOutcome,
    output_file: Option<&Path>,
) -> anyhow::Result<()> {
    match outcome {
        TranscriptOutcome::Transcript(text) => match output_file {
            Some(path) => {
                write_transcript_file(path, &text).await?;
                writeln!(out, "Transcript saved to: {}", path.display())?;
                info!("Saved {} characters of transcript", text.len());
            }
            None => {
                if !text.is_empty() {
                    writeln!(out, "{}", text)?;
                }
            }
        },
        TranscriptOutcome::Unavailable(reason) => {
            writeln!(out, "{}", reason)?;
        }
    }

    Ok(())
}

/// Write transcript content to file, replacing any existing file
async fn write_transcript_file(path: &Path, content: &str) -> anyhow::Result<()> {
    // Create parent directories if needed
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    fs::write(path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!("Written {} bytes to {}", content.len(), path.display());
    Ok(())
}
