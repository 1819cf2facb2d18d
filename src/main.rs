use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use episode_feed::config::Config;
use episode_feed::feed::{merge_files, MergeOptions};
use episode_feed::util::{atomic_write, latest_episode};

#[derive(Parser, Debug)]
#[command(
    name = "episode-feed",
    about = "Merge the latest episode document into an RSS 2.0 feed"
)]
struct Args {
    /// Config file (defaults to ./episode-feed.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed to update, overriding paths.feed
    #[arg(long, value_name = "FILE")]
    feed: Option<PathBuf>,

    /// Directory searched for episode documents, overriding paths.data_dir
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Merge this episode instead of the newest one in the data directory
    #[arg(long, value_name = "FILE")]
    episode: Option<PathBuf>,

    /// Keep the episode file after a successful merge
    #[arg(long)]
    keep_episode: bool,

    /// Print the merged feed to stdout instead of writing it
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(Config::DEFAULT_FILE));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;

    let feed_path = args.feed.unwrap_or_else(|| config.paths.feed.clone());
    let data_dir = args.data_dir.unwrap_or_else(|| config.paths.data_dir.clone());

    let episode_path = match args.episode {
        Some(path) => path,
        None => match latest_episode(&data_dir, &config.paths.episode_prefix)? {
            Some(path) => path,
            None => {
                println!("No episode file found in data directory");
                return Ok(());
            }
        },
    };
    tracing::info!(episode = %episode_path.display(), feed = %feed_path.display(), "Selected episode");

    let options = MergeOptions::from_config(&config);
    let outcome = merge_files(&feed_path, &episode_path, &options).with_context(|| {
        format!(
            "Failed to merge '{}' into '{}'",
            episode_path.display(),
            feed_path.display()
        )
    })?;

    if args.dry_run {
        std::io::stdout()
            .lock()
            .write_all(&outcome.bytes)
            .context("Failed to write feed to stdout")?;
        return Ok(());
    }

    atomic_write(&feed_path, &outcome.bytes)?;
    println!("Wrote RSS feed to: {}", feed_path.display());

    if !args.keep_episode {
        // The feed is already written; a leftover episode is merely re-merged as duplicates
        match std::fs::remove_file(&episode_path) {
            Ok(()) => println!("Deleted processed episode file: {}", episode_path.display()),
            Err(e) => tracing::warn!(
                path = %episode_path.display(),
                error = %e,
                "Failed to delete consumed episode file"
            ),
        }
    }

    Ok(())
}
