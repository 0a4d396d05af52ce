//! guidegen - one-shot playlist/guide/record generator
//!
//! Fetches a remote channel catalog and EPG feed per configured market,
//! normalizes them into one channel model, filters the program listings
//! into rolling windows, and emits an M3U playlist, an XMLTV guide and a
//! flat JSON record document per market plus a combined set across markets.

use clap::Parser;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod cli;
mod config;
mod epg;
mod error;
mod fetch;
mod guide;
mod models;
mod normalize;
mod pipeline;
mod playlist;
mod records;

use cli::Args;
use config::{Config, Market};
use error::{GenError, Result};
use fetch::SourceClient;

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args) {
        error!("{e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    let markets = select_markets(&config, &args.market)?;

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| GenError::write(&config.output_dir, e))?;

    let client = SourceClient::new(config.source.clone());
    let now = chrono::Utc::now();
    let resolve_streams = !args.no_streams;

    // Markets run in sorted code order; that order is what the aggregation
    // below sees, so disagreements resolve toward the later market
    let mut outputs = Vec::new();
    for market in &markets {
        info!("processing market {}", market.code);
        match pipeline::run_market(&client, &config, market, now, resolve_streams) {
            Ok(output) => {
                if output.snapshot.channels.is_empty() {
                    warn!("market {}: no channels found", market.code);
                }
                outputs.push(output);
            }
            Err(e) => error!("market {} failed: {e}", market.code),
        }
    }

    if outputs.is_empty() {
        return Err(GenError::fetch(
            "primary catalog source",
            "every configured market failed; nothing to aggregate",
        ));
    }

    let (combined, combined_records) = pipeline::combine(&outputs);
    pipeline::emit_all(
        &config,
        &pipeline::artifact_paths(&config, "all"),
        &combined,
        &combined_records,
        now,
    );

    info!(
        "done: {}/{} markets, {} channels combined",
        outputs.len(),
        markets.len(),
        combined.channels.len()
    );
    Ok(())
}

/// The configured market table, optionally narrowed by --market flags.
/// Asking for an unconfigured market is a config error, not a silent skip.
fn select_markets(config: &Config, requested: &[String]) -> Result<Vec<Market>> {
    let all = config.markets();
    if requested.is_empty() {
        return Ok(all);
    }
    for code in requested {
        if !all.iter().any(|m| &m.code == code) {
            return Err(GenError::Config(format!("unknown market code: {code}")));
        }
    }
    Ok(all
        .into_iter()
        .filter(|m| requested.contains(&m.code))
        .collect())
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "guidegen=debug"
    } else {
        "guidegen=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        serde_json::from_str(
            r#"{
                "source": { "catalog_url": "https://api.example.com/channels?m={market}" },
                "markets": { "at": 300, "it": 36, "uk": 18 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_select_all_markets_by_default() {
        let markets = select_markets(&config(), &[]).unwrap();
        let codes: Vec<&str> = markets.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["at", "it", "uk"]);
    }

    #[test]
    fn test_select_subset_keeps_sorted_order() {
        let requested = vec!["uk".to_string(), "at".to_string()];
        let markets = select_markets(&config(), &requested).unwrap();
        let codes: Vec<&str> = markets.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(codes, vec!["at", "uk"]);
    }

    #[test]
    fn test_unknown_market_is_an_error() {
        let requested = vec!["xx".to_string()];
        assert!(select_markets(&config(), &requested).is_err());
    }
}
