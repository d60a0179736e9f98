//! sftp-catalogue - Incremental SFTP Catalogue Crawler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use sftp_catalogue::config::{compile_product_pattern, validate_root, CliArgs, Command};
use sftp_catalogue::config::{ConnectionConfig, CrawlConfig};
use sftp_catalogue::db::CatalogueStore;
use sftp_catalogue::progress::{print_header, print_summary, ProgressReporter};
use sftp_catalogue::remote::{Connector, SftpConnector};
use sftp_catalogue::resume::PathLayout;
use sftp_catalogue::walker::Crawler;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    match &args.command {
        Some(Command::Boundaries {
            store_path,
            root,
            product_pattern,
        }) => show_boundaries(store_path, root, product_pattern),
        None => crawl(&args),
    }
}

fn crawl(args: &CliArgs) -> Result<()> {
    // Validate and create config
    let config = CrawlConfig::from_args(args).context("Invalid configuration")?;
    let connection = ConnectionConfig::from_args(args).context("Invalid connection settings")?;

    let connector = SftpConnector::new(connection.target, connection.timeout, connection.retries);

    if config.show_progress {
        print_header(
            &connector.describe(),
            &config.root,
            config.worker_count,
            &config.store_path.display().to_string(),
        );
    }

    let crawler = Crawler::new(config.clone(), connector);

    // Setup signal handler for graceful shutdown
    let cancel_flag = crawler.cancel_token().flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing current listing...");
        cancel_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let report = if config.show_progress {
        let progress = ProgressReporter::new();
        progress.set_status("Connecting to SFTP server...");
        let result = crawler.run_with_progress(|p| progress.update(&p));
        match &result {
            Ok(_) => progress.finish("Crawl completed"),
            Err(_) => progress.finish_and_clear(),
        }
        result
    } else {
        crawler.run()
    }
    .with_context(|| format!("Crawl of '{}' failed", config.root))?;

    if config.show_progress {
        print_summary(&report);
    }

    if !report.abandoned.is_empty() {
        warn!(
            abandoned = report.abandoned.len(),
            "Crawl completed with abandoned subtrees"
        );
    }
    info!(
        new = report.files_new,
        total = report.catalogued,
        "Catalogue updated"
    );

    // Artifact paths for the next pipeline stage
    println!("{}", report.store_path.display());
    println!("{}", report.log_path.display());

    Ok(())
}

fn show_boundaries(store_path: &Path, root: &str, product_pattern: &str) -> Result<()> {
    if !store_path.exists() {
        anyhow::bail!("Catalogue '{}' does not exist", store_path.display());
    }

    let root = validate_root(root).context("Invalid root")?;
    let pattern = compile_product_pattern(product_pattern).context("Invalid product pattern")?;
    let layout = PathLayout::new(&root, pattern);

    let store = CatalogueStore::open(store_path)
        .with_context(|| format!("Failed to open catalogue '{}'", store_path.display()))?;
    let boundaries = store
        .query_resume_boundaries(&layout)
        .context("Failed to compute resume boundaries")?;

    let json = serde_json::to_string_pretty(&boundaries).context("Failed to encode boundaries")?;
    println!("{}", json);

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let default = if verbose {
        "sftp_catalogue=debug,warn"
    } else {
        "sftp_catalogue=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
