// League standings entry point.
//
// Startup sequence:
// 1. Initialize tracing (stderr, so stdout stays clean for the report)
// 2. Load config
// 3. Build the HTTP match source
// 4. Run once and print, or keep refreshing through the cached service

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use pennant_app::fetcher::HttpMatchSource;
use pennant_app::pipeline::{Pipeline, Report};
use pennant_app::render;
use pennant_app::service::LeagueService;
use pennant_core::cache::SystemClock;
use pennant_core::config;
use tracing::info;

/// League standings and today's matches from the match-history API.
#[derive(Debug, Parser)]
#[command(name = "pennant", version, about, long_about = None)]
struct Args {
    /// Print the report as JSON instead of a text table
    #[arg(long)]
    json: bool,

    /// Keep running and refresh every SECS seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1. Initialize tracing
    init_tracing()?;

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, {} roster entries, pages {:?}",
        config.league.name,
        config.roster.len(),
        config.source.pages
    );

    // 3. Build the match source
    let source =
        HttpMatchSource::from_config(&config.source).context("failed to build HTTP client")?;
    let pipeline = Pipeline::new(config, Arc::new(source));

    // 4. Run
    match args.watch {
        None => {
            let report = pipeline.run(Utc::now()).await;
            print_report(&report, args.json)?;
        }
        Some(secs) => {
            let service = LeagueService::new(pipeline, Arc::new(SystemClock));
            let mut ticker = tokio::time::interval(Duration::from_secs(secs));
            info!("Refreshing every {secs}s, Ctrl+C to stop");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = service.report().await;
                        print_report(&report, args.json)?;
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }

    info!("Done");
    Ok(())
}

fn print_report(report: &Report, json: bool) -> anyhow::Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{text}");
    } else {
        print!("{}", render::render_report(report));
    }
    Ok(())
}

/// Initialize tracing to stderr.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("pennant_app=info,pennant_core=info,pennant_league=info,warn")
        }))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
