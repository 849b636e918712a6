//! CLI mode - single-album and batch download front end.

mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::{
    AppConfig, Error, Ledger, LogSink, Orchestrator, PixivResolver, ProgressCounters, Tee,
    parse_url_list,
};

use progress::{BarSink, print_album_summary, print_batch_summary};

/// Parsed command-line options.
struct CliArgs {
    urls: Vec<String>,
    output: Option<PathBuf>,
    workers: Option<usize>,
    force: bool,
}

fn invalid_input(message: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        message,
    ))
}

fn parse_args(args: &[String]) -> crate::Result<CliArgs> {
    let mut parsed = CliArgs {
        urls: Vec::new(),
        output: None,
        workers: None,
        force: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                let dir = args
                    .get(i)
                    .ok_or_else(|| invalid_input("--output requires a directory"))?;
                parsed.output = Some(PathBuf::from(dir));
            }
            "--workers" => {
                i += 1;
                let n = args
                    .get(i)
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(|| invalid_input("--workers requires a positive number"))?;
                parsed.workers = Some(n);
            }
            "--force" => parsed.force = true,
            flag if flag.starts_with('-') => {
                return Err(invalid_input(&format!("unknown option: {flag}")));
            }
            url => parsed.urls.push(url.to_string()),
        }
        i += 1;
    }

    Ok(parsed)
}

/// Runs the CLI download mode.
///
/// With URL arguments each one is processed as an album; with none, the
/// batch list file is read instead. Albums already in the ledger are
/// skipped without network traffic, and a per-album failure never stops
/// the rest of the batch.
///
/// # Errors
///
/// Returns an error for unusable arguments or when the ledger becomes
/// unwritable; per-album resolution failures are logged and skipped.
pub async fn run(args: Vec<String>) -> crate::Result<()> {
    let parsed = parse_args(&args)?;

    let mut config = AppConfig::load()?;
    if let Some(dir) = parsed.output {
        config.paths.download_dir = dir;
    }
    if let Some(n) = parsed.workers {
        config.download.concurrent_downloads = n;
    }
    if parsed.force {
        config.download.force_overwrite = true;
    }

    let urls = if parsed.urls.is_empty() {
        match std::fs::read_to_string(&config.paths.url_list_path) {
            Ok(contents) => parse_url_list(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!(
                    "No URLs given and no {} found.",
                    config.paths.url_list_path.display()
                );
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        parsed.urls
    };

    if urls.is_empty() {
        println!("No album URLs to process.");
        return Ok(());
    }

    let ledger = Arc::new(Ledger::load(&config.paths.ledger_path)?);
    let resolver = PixivResolver::new(config.download.request_timeout)?;

    let bars = Arc::new(BarSink::new());
    let counters = Arc::new(ProgressCounters::new());
    let sink = Tee(Arc::clone(&bars), Tee(LogSink, Arc::clone(&counters)));

    let orchestrator = Orchestrator::new(resolver, ledger, &config, Arc::new(sink))?;

    // Ctrl-C stops dispatching new work; in-flight transfers finish.
    let shutdown = orchestrator.shutdown_token();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("shutdown requested, finishing in-flight transfers");
                shutdown.cancel();
            }
        });
    }

    println!("Processing {} album URL(s)...", urls.len());
    let started = Instant::now();

    for url in &urls {
        if shutdown.is_cancelled() {
            log::warn!("skipping remaining albums");
            break;
        }
        match orchestrator.process(url).await {
            Ok(result) => print_album_summary(&result),
            // An unwritable ledger means completions can no longer be
            // recorded; carrying on would re-download everything forever.
            Err(e @ Error::Io(_)) => {
                bars.finish();
                return Err(e);
            }
            Err(e) => log::error!("album {url} failed: {e}"),
        }
    }

    bars.finish();
    print_batch_summary(&counters.snapshot(), started.elapsed());

    Ok(())
}
