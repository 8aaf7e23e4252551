//! Dissolve command - merge the features of a local GeoJSON file.
//!
//! Features sharing a property value are unioned the same way the layer
//! merges fragments across tiles; everything else passes through.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::Args;
use tilemerge::aggregate::{AggregateAssembler, AggregateFeatureCollection, AggregateStats};
use tilemerge::config::ConfigFile;
use tilemerge::feature::DedupPolicy;
use tilemerge::union::PropertyPrecedence;
use tracing::info;

use super::common::{parse_precedence, write_geojson};
use crate::error::CliError;

/// Arguments for the dissolve command.
#[derive(Debug, Args)]
pub struct DissolveArgs {
    /// GeoJSON FeatureCollection to read ("-" for stdin)
    pub input: PathBuf,

    /// Group features by this property, overriding [features] merge_property
    #[arg(long)]
    pub property: Option<String>,

    /// Attribute precedence for merged features: first, last or merge
    #[arg(long, value_parser = parse_precedence)]
    pub precedence: Option<PropertyPrecedence>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the dissolve command.
pub fn run(args: DissolveArgs, config: &ConfigFile) -> Result<(), CliError> {
    let property = args
        .property
        .clone()
        .or_else(|| config.features.merge_property.clone())
        .ok_or_else(|| {
            CliError::InvalidArgument(
                "no merge property: pass --property or set [features] merge_property".to_string(),
            )
        })?;
    let precedence = args
        .precedence
        .unwrap_or(config.features.property_precedence);

    let bytes = read_input(&args.input)?;
    let input = AggregateFeatureCollection::from_geojson(&bytes).map_err(CliError::Input)?;

    let (output, stats) = dissolve(input, &property, precedence);
    info!(
        property = %property,
        features = stats.features,
        groups = stats.groups_merged,
        cancelled_edges = stats.union.cancelled_pairs,
        "Dissolved"
    );

    write_geojson(args.output.as_ref(), &output.to_geojson())
}

/// Union features sharing `property`, keeping top-level members.
fn dissolve(
    input: AggregateFeatureCollection,
    property: &str,
    precedence: PropertyPrecedence,
) -> (AggregateFeatureCollection, AggregateStats) {
    let mut assembler =
        AggregateAssembler::new(DedupPolicy::merge_by_property(property), precedence);
    let (features, stats) = assembler.assemble_features([input.features.as_slice()]);

    (
        AggregateFeatureCollection {
            features,
            properties: input.properties,
        },
        stats,
    )
}

fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    let read_error = |error| CliError::FileRead {
        path: path.display().to_string(),
        error,
    };

    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        io::stdin().read_to_end(&mut bytes).map_err(read_error)?;
        Ok(bytes)
    } else {
        fs::read(path).map_err(read_error)
    }
}
