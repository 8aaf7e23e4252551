//! Common types and utilities shared across CLI commands.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::Value;
use tilemerge::config::ConfigFile;
use tilemerge::coord::TileBounds;
use tilemerge::layer::Viewport;
use tilemerge::union::PropertyPrecedence;

use crate::error::CliError;

/// Which part of the grid to look at.
#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Tile bounds as MIN_X,MIN_Y,MAX_X,MAX_Y (inclusive)
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    pub bounds: TileBounds,

    /// Zoom level
    #[arg(long)]
    pub zoom: u8,

    /// URL template, overriding [source] url
    #[arg(long)]
    pub url: Option<String>,
}

impl ViewArgs {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.bounds, self.zoom)
    }
}

/// Parse `MIN_X,MIN_Y,MAX_X,MAX_Y`.
pub fn parse_bounds(s: &str) -> Result<TileBounds, String> {
    let parts: Vec<i64> = s
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("expected integers MIN_X,MIN_Y,MAX_X,MAX_Y: {}", e))?;

    match parts.as_slice() {
        [min_x, min_y, max_x, max_y] => {
            TileBounds::new(*min_x, *min_y, *max_x, *max_y).map_err(|e| e.to_string())
        }
        _ => Err(format!(
            "expected 4 comma-separated values, got {}",
            parts.len()
        )),
    }
}

/// Parse a property precedence name (first, last or merge).
pub fn parse_precedence(s: &str) -> Result<PropertyPrecedence, String> {
    s.parse().map_err(|e: tilemerge::union::ParsePrecedenceError| e.to_string())
}

/// Load the config file named on the command line, or the default one.
///
/// An explicitly named file must exist; the default file may be absent.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) if !path.exists() => Err(CliError::InvalidArgument(format!(
            "config file '{}' does not exist",
            path.display()
        ))),
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

/// Write a GeoJSON document to a file, or to stdout when `output` is `None`.
pub fn write_geojson(output: Option<&PathBuf>, document: &Value) -> Result<(), CliError> {
    let mut text = serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string());
    text.push('\n');

    match output {
        Some(path) => fs::write(path, text).map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        }),
        None => io::stdout()
            .lock()
            .write_all(text.as_bytes())
            .map_err(|error| CliError::FileWrite {
                path: "<stdout>".to_string(),
                error,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bounds() {
        assert_eq!(
            parse_bounds("-1, 0,2,3").unwrap(),
            TileBounds::new(-1, 0, 2, 3).unwrap()
        );
        assert!(parse_bounds("1,2,3").is_err());
        assert!(parse_bounds("a,b,c,d").is_err());
        assert!(parse_bounds("3,0,1,0").is_err());
    }

    #[test]
    fn test_parse_precedence() {
        assert_eq!(parse_precedence("last").unwrap(), PropertyPrecedence::LastFragment);
        assert!(parse_precedence("newest").is_err());
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("nope.ini");

        assert!(matches!(
            load_config(Some(&missing)),
            Err(CliError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_write_geojson_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.geojson");

        write_geojson(Some(&path), &serde_json::json!({"type": "FeatureCollection"})).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["type"], "FeatureCollection");
    }
}
