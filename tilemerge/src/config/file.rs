//! Loading `~/.tilemerge/config.ini` and turning it into a layer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::layer::LayerConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// A value needed to build the layer is set nowhere
    #[error("Missing configuration: {section}.{key}")]
    MissingValue { section: String, key: String },
}

impl ConfigFile {
    /// Load configuration from the default path (~/.tilemerge/config.ini).
    ///
    /// A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Build a [`LayerConfig`], with `url` taking precedence over `[source] url`.
    pub fn to_layer_config(&self, url: Option<&str>) -> Result<LayerConfig, ConfigFileError> {
        let url = url
            .map(str::to_string)
            .or_else(|| self.source.url.clone())
            .ok_or_else(|| ConfigFileError::MissingValue {
                section: "source".to_string(),
                key: "url".to_string(),
            })?;

        let grid = &self.grid;
        let mut config = LayerConfig::new(url)
            .with_subdomains(&self.source.subdomains)
            .with_grid(grid.policy(self.source.tms))
            .with_tile_size(grid.tile_size)
            .with_clip_tiles(grid.clip_tiles)
            .with_property_precedence(self.features.property_precedence)
            .with_request_timeout(Duration::from_secs(self.http.timeout_secs))
            .with_user_agent(self.http.user_agent.clone());

        if let Some(fallback) = &self.source.error_tile_url {
            config = config.with_error_tile_url(fallback.clone());
        }
        if let Some(property) = &self.features.merge_property {
            config = config.with_merge_property(property.clone());
        }
        Ok(config)
    }
}

/// Get the path to the config directory (~/.tilemerge).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilemerge")
}

/// Get the path to the config file (~/.tilemerge/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::union::PropertyPrecedence;
    use std::fs;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        fs::write(
            &config_path,
            "[source]\nurl = http://t/{z}/{x}/{y}\n[features]\nmerge_property = name\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.source.url.as_deref(), Some("http://t/{z}/{x}/{y}"));
        assert_eq!(config.features.merge_property.as_deref(), Some("name"));
    }

    #[test]
    fn test_load_reports_invalid_value() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        fs::write(&config_path, "[http]\ntimeout_secs = soon\n").unwrap();

        let err = ConfigFile::load_from(&config_path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: http.timeout_secs = 'soon' - must be a positive integer (seconds)"
        );
    }

    #[test]
    fn test_to_layer_config_requires_url() {
        let config = ConfigFile::default();
        assert!(matches!(
            config.to_layer_config(None),
            Err(ConfigFileError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_to_layer_config_url_override() {
        let mut config = ConfigFile::default();
        config.source.url = Some("http://file/{z}/{x}/{y}".to_string());

        let layer = config.to_layer_config(Some("http://cli/{z}/{x}/{y}")).unwrap();
        assert_eq!(layer.url_template, "http://cli/{z}/{x}/{y}");

        let layer = config.to_layer_config(None).unwrap();
        assert_eq!(layer.url_template, "http://file/{z}/{x}/{y}");
    }

    #[test]
    fn test_to_layer_config_carries_settings() {
        let mut config = ConfigFile::default();
        config.source.error_tile_url = Some("http://t/empty.json".to_string());
        config.grid.max_zoom = 12;
        config.grid.zoom_offset = 2;
        config.features.merge_property = Some("name".to_string());
        config.features.property_precedence = PropertyPrecedence::LastFragment;
        config.http.timeout_secs = 7;

        let layer = config.to_layer_config(Some("http://t/{z}/{x}/{y}")).unwrap();
        assert_eq!(layer.grid.max_zoom, 12);
        assert_eq!(layer.grid.zoom_offset, 2);
        assert_eq!(layer.error_tile_url.as_deref(), Some("http://t/empty.json"));
        assert!(layer.dedup.is_merging());
        assert_eq!(layer.property_precedence, PropertyPrecedence::LastFragment);
        assert_eq!(layer.request_timeout, Duration::from_secs(7));
        assert_eq!(layer.subdomains, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_config_file_path_under_home() {
        let path = config_file_path();
        assert!(path.ends_with(".tilemerge/config.ini"));
    }
}
