//! Settings structs, one per `[section]` of the INI file.

use crate::layer::{DEFAULT_SUBDOMAINS, DEFAULT_TILE_SIZE};
use crate::provider::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::scheduler::{GridPolicy, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
use crate::union::PropertyPrecedence;

/// Parsed contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub source: SourceSettings,
    pub grid: GridSettings,
    pub features: FeatureSettings,
    pub http: HttpSettings,
}

/// `[source]`: where tiles come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSettings {
    /// URL template; may be left out and given on the command line instead.
    pub url: Option<String>,
    /// Characters substituted for `{s}`.
    pub subdomains: String,
    pub error_tile_url: Option<String>,
    /// Flip rows for TMS servers.
    pub tms: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: None,
            subdomains: DEFAULT_SUBDOMAINS.to_string(),
            error_tile_url: None,
            tms: false,
        }
    }
}

/// `[grid]`: zoom range and world bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSettings {
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub tile_size: u32,
    pub no_wrap: bool,
    pub continuous_world: bool,
    pub zoom_offset: i8,
    pub zoom_reverse: bool,
    pub clip_tiles: bool,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            tile_size: DEFAULT_TILE_SIZE,
            no_wrap: false,
            continuous_world: false,
            zoom_offset: 0,
            zoom_reverse: false,
            clip_tiles: false,
        }
    }
}

impl GridSettings {
    /// Grid rules for the scheduler. TMS lives under `[source]` and is passed in.
    pub fn policy(&self, tms: bool) -> GridPolicy {
        GridPolicy {
            min_zoom: self.min_zoom,
            max_zoom: self.max_zoom,
            no_wrap: self.no_wrap,
            continuous_world: self.continuous_world,
            tms,
            zoom_offset: self.zoom_offset,
            zoom_reverse: self.zoom_reverse,
        }
    }
}

/// `[features]`: deduplication and merging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSettings {
    /// Group fragments by this property. Unset means exact-id dedup.
    pub merge_property: Option<String>,
    pub property_precedence: PropertyPrecedence,
}

/// `[http]`: transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
