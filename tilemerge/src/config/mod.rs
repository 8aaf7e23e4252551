//! User configuration loaded from `~/.tilemerge/config.ini`.
//!
//! [`ConfigFile`] mirrors the INI sections one struct per section (see
//! [`settings`]), [`parse_ini`](parser::parse_ini) is the only place INI
//! keys are mapped to fields, and [`ConfigFile::to_layer_config`] turns
//! the result into a [`LayerConfig`](crate::layer::LayerConfig).
//!
//! ```ini
//! [source]
//! url = https://{s}.tiles.example/{z}/{x}/{y}.geojson
//! subdomains = abc
//!
//! [grid]
//! min_zoom = 4
//! max_zoom = 14
//!
//! [features]
//! merge_property = name
//! property_precedence = merge
//!
//! [http]
//! timeout_secs = 10
//! ```

mod file;
mod parser;
pub mod settings;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, FeatureSettings, GridSettings, HttpSettings, SourceSettings};
