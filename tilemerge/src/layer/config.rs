//! Layer configuration.

use std::time::Duration;

use crate::feature::{DedupPolicy, MergeKey};
use crate::provider::{ProviderError, UrlTemplate, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::scheduler::GridPolicy;
use crate::union::PropertyPrecedence;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default subdomains for `{s}`.
pub const DEFAULT_SUBDOMAINS: &str = "abc";

/// Default capacity of the layer event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything a [`TileLayer`](super::TileLayer) needs to know up front.
///
/// # Example
///
/// ```ignore
/// let config = LayerConfig::new("https://{s}.tiles.example/{z}/{x}/{y}.geojson")
///     .with_zoom_range(4, 14)
///     .with_merge_property("name")
///     .with_error_tile_url("https://tiles.example/empty.geojson");
/// ```
#[derive(Debug, Clone)]
pub struct LayerConfig {
    /// URL template with `{s}`, `{z}`, `{x}`, `{y}` placeholders.
    pub url_template: String,
    /// Zoom range and world-bound rules.
    pub grid: GridPolicy,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Subdomains substituted for `{s}`.
    pub subdomains: Vec<String>,
    /// URL reported alongside a failed tile.
    pub error_tile_url: Option<String>,
    /// Exact-id deduplication or merge-key grouping.
    pub dedup: DedupPolicy,
    /// Which fragment supplies a merged feature's attributes.
    pub property_precedence: PropertyPrecedence,
    /// Clip rendered features to their tile. Carried for renderers only.
    pub clip_tiles: bool,
    /// Per-request timeout of the HTTP client.
    pub request_timeout: Duration,
    /// User-Agent of the HTTP client.
    pub user_agent: String,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl LayerConfig {
    /// Configuration with defaults for everything but the URL template.
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            grid: GridPolicy::default(),
            tile_size: DEFAULT_TILE_SIZE,
            subdomains: split_subdomains(DEFAULT_SUBDOMAINS),
            error_tile_url: None,
            dedup: DedupPolicy::default(),
            property_precedence: PropertyPrecedence::default(),
            clip_tiles: false,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Replace every grid rule at once.
    pub fn with_grid(mut self, grid: GridPolicy) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.grid.min_zoom = min_zoom;
        self.grid.max_zoom = max_zoom;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    /// Single-character subdomains, e.g. `"abc"`.
    pub fn with_subdomains(mut self, subdomains: &str) -> Self {
        self.subdomains = split_subdomains(subdomains);
        self
    }

    pub fn with_no_wrap(mut self, no_wrap: bool) -> Self {
        self.grid.no_wrap = no_wrap;
        self
    }

    pub fn with_continuous_world(mut self, continuous_world: bool) -> Self {
        self.grid.continuous_world = continuous_world;
        self
    }

    pub fn with_tms(mut self, tms: bool) -> Self {
        self.grid.tms = tms;
        self
    }

    pub fn with_zoom_offset(mut self, zoom_offset: i8) -> Self {
        self.grid.zoom_offset = zoom_offset;
        self
    }

    pub fn with_zoom_reverse(mut self, zoom_reverse: bool) -> Self {
        self.grid.zoom_reverse = zoom_reverse;
        self
    }

    pub fn with_error_tile_url(mut self, url: impl Into<String>) -> Self {
        self.error_tile_url = Some(url.into());
        self
    }

    /// Group fragments with a custom merge key.
    pub fn with_merge_key(mut self, key: impl MergeKey + 'static) -> Self {
        self.dedup = DedupPolicy::merge_by(key);
        self
    }

    /// Group fragments sharing a property value.
    pub fn with_merge_property(mut self, property: impl Into<String>) -> Self {
        self.dedup = DedupPolicy::merge_by_property(property);
        self
    }

    pub fn with_property_precedence(mut self, precedence: PropertyPrecedence) -> Self {
        self.property_precedence = precedence;
        self
    }

    pub fn with_clip_tiles(mut self, clip_tiles: bool) -> Self {
        self.clip_tiles = clip_tiles;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Parse the URL template against the configured subdomains.
    pub fn template(&self) -> Result<UrlTemplate, ProviderError> {
        UrlTemplate::with_subdomains(self.url_template.clone(), self.subdomains.clone())
    }
}

fn split_subdomains(subdomains: &str) -> Vec<String> {
    subdomains.chars().map(String::from).collect()
}
