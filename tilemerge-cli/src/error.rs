//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::io;
use std::process;

use tilemerge::config::ConfigFileError;
use tilemerge::coord::CoordError;
use tilemerge::feature::GeoJsonError;
use tilemerge::layer::LayerError;
use tilemerge::provider::ProviderError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(io::Error),
    /// Configuration file error
    Config(ConfigFileError),
    /// Bad command-line argument
    InvalidArgument(String),
    /// Layer failed to start or rejected an update
    Layer(LayerError),
    /// Failed to start the async runtime
    Runtime(io::Error),
    /// Tiles did not settle in time
    Timeout { secs: u64 },
    /// Failed to read an input file
    FileRead { path: String, error: io::Error },
    /// Input was not a GeoJSON FeatureCollection
    Input(GeoJsonError),
    /// Failed to write output
    FileWrite { path: String, error: io::Error },
}

impl CliError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) | CliError::Config(_) => 2,
            CliError::Timeout { .. } => 3,
            _ => 1,
        }
    }

    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Config(ConfigFileError::MissingValue { .. }) => {
                eprintln!();
                eprintln!("Pass --url or set it in the config file:");
                eprintln!("  [source]");
                eprintln!("  url = https://{{s}}.tiles.example/{{z}}/{{x}}/{{y}}.geojson");
            }
            CliError::Timeout { .. } => {
                eprintln!();
                eprintln!("Use --wait-secs to wait longer, or [http] timeout_secs to fail");
                eprintln!("slow requests sooner.");
            }
            _ => {}
        }

        process::exit(self.exit_code())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "{}", e),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Layer(e) => write!(f, "Layer error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Timeout { secs } => write!(f, "Tiles did not settle within {}s", secs),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::Input(e) => write!(f, "Invalid input: {}", e),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Layer(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::Input(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<LayerError> for CliError {
    fn from(e: LayerError) -> Self {
        CliError::Layer(e)
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Layer(LayerError::Coord(e))
    }
}

impl From<ProviderError> for CliError {
    fn from(e: ProviderError) -> Self {
        CliError::Layer(LayerError::Provider(e))
    }
}
