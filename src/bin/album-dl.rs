use std::env;

fn print_usage() {
    eprintln!("Usage: album-dl [OPTIONS] [url]...");
    eprintln!();
    eprintln!("Downloads each album URL into the output directory, skipping albums");
    eprintln!("already recorded in already_downloaded.txt. With no URLs, reads the");
    eprintln!("batch list from URLs.txt.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --output <DIR>    Download root (default: Downloads)");
    eprintln!("  --workers <N>     Concurrent asset downloads per album (default: 4)");
    eprintln!("  --force           Re-download assets that already exist on disk");
    eprintln!("  -h, --help        Show this help");
}

#[tokio::main]
async fn main() -> album_dl::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    #[cfg(feature = "cli")]
    {
        album_dl::cli::run(args).await
    }
    #[cfg(not(feature = "cli"))]
    {
        let _ = args;
        eprintln!("CLI support not compiled in");
        std::process::exit(1);
    }
}
