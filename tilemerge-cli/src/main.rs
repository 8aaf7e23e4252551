//! tilemerge CLI - Command-line interface
//!
//! Plans tile requests, loads tiled GeoJSON into one deduplicated feature
//! collection, and dissolves local GeoJSON files.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tilemerge::logging::init_logging;

use commands::{dissolve, fetch, plan};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "tilemerge")]
#[command(version, about = "Merge tiled GeoJSON into one feature collection", long_about = None)]
struct Cli {
    /// Config file (default: ~/.tilemerge/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the tiles a view would request, nearest to the centre first
    Plan(plan::PlanArgs),

    /// Load a view and write the aggregate as GeoJSON
    Fetch(fetch::FetchArgs),

    /// Merge features of a GeoJSON file that share a property value
    Dissolve(dissolve::DissolveArgs),
}

fn main() {
    let cli = Cli::parse();

    let _guard = match init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e).exit(),
    };

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::common::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Plan(args) => plan::run(args, &config),
        Commands::Fetch(args) => fetch::run(args, config),
        Commands::Dissolve(args) => dissolve::run(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch_with_negative_bounds() {
        let cli = Cli::parse_from([
            "tilemerge",
            "fetch",
            "--bounds",
            "-2,0,1,1",
            "--zoom",
            "3",
            "--url",
            "http://t/{z}/{x}/{y}",
            "--verbose",
        ]);

        assert!(cli.verbose);
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert_eq!(args.view.bounds.min_x, -2);
        assert_eq!(args.view.zoom, 3);
        assert_eq!(args.wait_secs, fetch::DEFAULT_WAIT_SECS);
    }

    #[test]
    fn test_parse_dissolve() {
        let cli = Cli::parse_from([
            "tilemerge",
            "--config",
            "custom.ini",
            "dissolve",
            "parcels.geojson",
            "--property",
            "owner",
            "--precedence",
            "merge",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("custom.ini")));
        let Commands::Dissolve(args) = cli.command else {
            panic!("expected dissolve");
        };
        assert_eq!(args.property.as_deref(), Some("owner"));
        assert_eq!(
            args.precedence,
            Some(tilemerge::union::PropertyPrecedence::Merge)
        );
    }
}
