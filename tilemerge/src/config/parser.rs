//! INI parsing: `Ini` → [`ConfigFile`].
//!
//! Starts from defaults and overlays what the file sets. Unknown sections
//! and keys are ignored; known keys with bad values are errors.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Highest zoom a grid setting may name.
const MAX_ZOOM_LIMIT: u8 = 30;

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [source] section
    if let Some(section) = ini.section(Some("source")) {
        let s = Section::new("source", section);
        if let Some(v) = s.text("url") {
            config.source.url = Some(v);
        }
        if let Some(v) = s.text("subdomains") {
            config.source.subdomains = v;
        }
        if let Some(v) = s.text("error_tile_url") {
            config.source.error_tile_url = Some(v);
        }
        if let Some(v) = s.flag("tms")? {
            config.source.tms = v;
        }
    }

    // [grid] section
    if let Some(section) = ini.section(Some("grid")) {
        let s = Section::new("grid", section);
        if let Some(v) = s.number::<u8>("min_zoom", "must be an integer between 0 and 30")? {
            config.grid.min_zoom = v;
        }
        if let Some(v) = s.number::<u8>("max_zoom", "must be an integer between 0 and 30")? {
            config.grid.max_zoom = v;
        }
        if let Some(v) = s.number::<u32>("tile_size", "must be a positive integer (pixels)")? {
            if v == 0 {
                return Err(s.invalid("tile_size", "must be a positive integer (pixels)"));
            }
            config.grid.tile_size = v;
        }
        if let Some(v) = s.flag("no_wrap")? {
            config.grid.no_wrap = v;
        }
        if let Some(v) = s.flag("continuous_world")? {
            config.grid.continuous_world = v;
        }
        if let Some(v) = s.number::<i8>("zoom_offset", "must be an integer between -30 and 30")? {
            config.grid.zoom_offset = v;
        }
        if let Some(v) = s.flag("zoom_reverse")? {
            config.grid.zoom_reverse = v;
        }
        if let Some(v) = s.flag("clip_tiles")? {
            config.grid.clip_tiles = v;
        }

        if config.grid.max_zoom > MAX_ZOOM_LIMIT {
            return Err(s.invalid("max_zoom", "must be an integer between 0 and 30"));
        }
        if config.grid.min_zoom > config.grid.max_zoom {
            return Err(s.invalid("min_zoom", "must not exceed max_zoom"));
        }
    }

    // [features] section
    if let Some(section) = ini.section(Some("features")) {
        let s = Section::new("features", section);
        if let Some(v) = s.text("merge_property") {
            config.features.merge_property = Some(v);
        }
        if let Some(v) = s.number("property_precedence", "must be one of: first, last, merge")? {
            config.features.property_precedence = v;
        }
    }

    // [http] section
    if let Some(section) = ini.section(Some("http")) {
        let s = Section::new("http", section);
        if let Some(v) = s.number::<u64>("timeout_secs", "must be a positive integer (seconds)")? {
            if v == 0 {
                return Err(s.invalid("timeout_secs", "must be a positive integer (seconds)"));
            }
            config.http.timeout_secs = v;
        }
        if let Some(v) = s.text("user_agent") {
            config.http.user_agent = v;
        }
    }

    Ok(config)
}

/// One INI section plus its name, for error reporting.
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    /// Trimmed value; empty counts as unset.
    fn text(&self, key: &str) -> Option<String> {
        self.props
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn number<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigFileError> {
        match self.text(key) {
            None => Ok(None),
            Some(v) => v
                .to_lowercase()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(key, reason)),
        }
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, ConfigFileError> {
        match self.text(key).map(|v| v.to_lowercase()).as_deref() {
            None => Ok(None),
            Some("true" | "yes" | "on" | "1") => Ok(Some(true)),
            Some("false" | "no" | "off" | "0") => Ok(Some(false)),
            Some(_) => Err(self.invalid(key, "must be true or false")),
        }
    }

    fn invalid(&self, key: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: self.props.get(key).unwrap_or_default().to_string(),
            reason: reason.to_string(),
        }
    }
}
