use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use vitrina::core::catalog::Catalog;
use vitrina::core::config::Config;
use vitrina::core::error::Result;
use vitrina::refresh::source::JsonRowsSource;

/// Serve the product catalog from memory, refreshing it from a JSON export
/// of the products table.
#[derive(Parser, Debug)]
#[command(name = "catalogd", version)]
struct Args {
    /// JSON export of the products table (array of rows or {"products": [...]})
    #[arg(short, long)]
    source: PathBuf,

    /// Directory holding productos_db.json and ventas_analysis.json
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Seconds between refreshes
    #[arg(long)]
    interval: Option<u64>,

    /// Seconds before a pull from the source is abandoned
    #[arg(long)]
    timeout: Option<u64>,

    /// Query result cache entries (0 disables)
    #[arg(long)]
    cache_size: Option<usize>,

    /// Also match model, category and subcategory in name search
    #[arg(long)]
    extended_search: bool,

    /// Do not write the mirror file after a refresh
    #[arg(long)]
    no_persist: bool,

    /// Load once, print statistics as JSON and exit
    #[arg(long)]
    once: bool,

    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(storage) = &self.storage {
            config.storage_path = storage.clone();
        }
        if let Some(interval) = self.interval {
            config.refresh_interval_secs = interval;
        }
        if let Some(timeout) = self.timeout {
            config.source_timeout_secs = timeout;
        }
        if let Some(cache_size) = self.cache_size {
            config.query_cache_size = cache_size;
        }
        if self.extended_search {
            config.extended_search = true;
        }
        if self.no_persist {
            config.persist_mirror = false;
        }
        config
    }
}

fn init_logger(verbose: bool, quiet: bool) {
    let log_level = if quiet {
        log::LevelFilter::Error
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // RUST_LOG takes over completely when set
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
        return;
    }

    env_logger::Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            // Info is printed bare, everything else with its level
            if record.level() == log::Level::Info {
                writeln!(buf, "{}", record.args())
            } else {
                writeln!(buf, "[{}] {}", record.level(), record.args())
            }
        })
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose, args.quiet);

    let config = args.config();
    let source = Arc::new(JsonRowsSource::new(&args.source));
    let catalog = Catalog::open(config, source).await?;

    let stats = catalog.catalog_stats();
    log::info!(
        "[catalogd] Serving {} products in {} categories (version {}, {:?}), mirror {:.2} MB",
        stats.total_products,
        stats.category_count,
        stats.snapshot_version,
        stats.origin,
        stats.mirror_size_mb()
    );

    if args.once {
        let stats = serde_json::to_string_pretty(&stats)?;
        println!("{}", stats);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresh = catalog.start_refresh(shutdown_rx);

    if let Err(e) = signal::ctrl_c().await {
        log::error!("[catalogd] Could not listen for Ctrl+C: {}", e);
    }
    log::info!("[catalogd] Shutdown signal received");

    let _ = shutdown_tx.send(true);
    refresh.await?;

    let health = catalog.health();
    log::info!("[catalogd] Stopped with status {:?}", health.status);
    Ok(())
}
