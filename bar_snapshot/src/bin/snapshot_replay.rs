use std::{
    error::Error,
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use bar_snapshot::{
    BarListener, ListenerConfig,
    events::{ChannelPublisher, ControlEvent},
    models::raw::RawBar,
    providers::replay::{ReplayProvider, ReplayStream},
};
use clap::Parser;
use log::{info, warn};
use serde_json::Value;

/// Replays recorded bars through a listener and prints the market snapshot.
///
/// Input is JSON Lines. A line with a `type` key is a control event
/// (`watch_bars`, `unwatch_bars`, `request_market_snapshot_bars`); any other
/// line is a raw vendor bar fed in as a live bar.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Listener config (TOML). Defaults to the file named by BAR_SNAPSHOT_CONFIG.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON Lines file to replay, or "-" for stdin
    #[arg(long, default_value = "-")]
    bars: String,

    /// Comma-separated symbols to watch before replaying (e.g. "AAPL,MSFT")
    #[arg(long, value_delimiter = ',')]
    watch: Vec<String>,

    /// JSON Lines file of raw bars served as history for the watched symbols
    #[arg(long)]
    backfill: Option<PathBuf>,

    /// Densify the final snapshot
    #[arg(long)]
    normalize: bool,

    /// Print every published event instead of only the final snapshot
    #[arg(long)]
    events: bool,
}

fn read_lines(source: &str) -> Result<Vec<String>, io::Error> {
    let reader: Box<dyn BufRead> = if source == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(source)?))
    };
    reader
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .collect()
}

fn read_raw_bars(path: &Path) -> Result<Vec<RawBar>, Box<dyn Error>> {
    let lines = read_lines(&path.to_string_lossy())?;
    let mut bars = Vec::with_capacity(lines.len());
    for line in lines {
        bars.push(serde_json::from_str(&line)?);
    }
    Ok(bars)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ListenerConfig::from_path(path)?,
        None => ListenerConfig::from_env()?,
    };
    let suffix = config.key_suffix.clone();

    let stream = Arc::new(ReplayStream::new());
    let (publisher, mut rx) = ChannelPublisher::channel();
    let listener = BarListener::new(config, stream, Arc::new(publisher))?;
    listener.connect()?;

    if !cli.watch.is_empty() {
        listener.watch(&cli.watch)?;
    }

    if let Some(path) = &cli.backfill {
        let provider = ReplayProvider::new(read_raw_bars(path)?);
        let n = listener.backfill(&provider, &listener.watched()).await?;
        info!("backfilled {n} bars from {}", path.display());
    }

    let mut replayed = 0usize;
    for (lineno, line) in read_lines(&cli.bars)?.into_iter().enumerate() {
        let value: Value = serde_json::from_str(&line)?;
        if value.get("type").is_some() {
            listener.handle(serde_json::from_value::<ControlEvent>(value)?)?;
            continue;
        }
        let raw: RawBar = serde_json::from_value(value)?;
        match listener.on_live_bar(&raw) {
            Ok(_) => replayed += 1,
            Err(e) => warn!("skipping line {}: {e}", lineno + 1),
        }
    }
    info!("replayed {replayed} bars");

    let snapshot = listener.request_market_snapshot(cli.normalize);
    listener.shutdown();
    drop(listener);

    if cli.events {
        while let Some(event) = rx.recv().await {
            println!("{}", event.to_json()?);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&snapshot.records(&suffix))?);
    }

    Ok(())
}
