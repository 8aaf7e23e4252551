//! Per-tile request bookkeeping.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::coord::TileCoord;
use crate::feature::Feature;

/// Identifier of one fetch attempt.
///
/// A fresh id is issued every time a coordinate is scheduled, so a
/// completion can be matched against the record that is current *now*
/// rather than one that was evicted and re-created in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileState {
    /// Request issued, no result yet.
    Pending,
    /// Body received and accepted.
    Loaded,
    /// Transport failure or unusable body.
    Errored,
}

impl TileState {
    /// Whether the state is terminal.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Loaded => write!(f, "loaded"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// Rejected lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileStateError {
    /// The tile already reached a terminal state.
    #[error("Tile {coord} is already {state}")]
    AlreadySettled { coord: TileCoord, state: TileState },

    /// Fragments were attached to a tile that is not loaded.
    #[error("Tile {coord} is {state}, expected loaded")]
    NotLoaded { coord: TileCoord, state: TileState },

    /// Fragments were attached twice.
    #[error("Tile {coord} was already processed")]
    AlreadyProcessed { coord: TileCoord },
}

/// State of one scheduled tile.
#[derive(Debug, Clone)]
pub struct TileRecord {
    coord: TileCoord,
    request_id: RequestId,
    url: String,
    state: TileState,
    payload: Option<Value>,
    fragments: Vec<Feature>,
    processed: bool,
    fallback_url: Option<String>,
    error: Option<String>,
}

impl TileRecord {
    /// Create a pending record.
    ///
    /// # Arguments
    ///
    /// * `coord` - Scheduled coordinate (unwrapped, as planned)
    /// * `request_id` - Id of the fetch attempt serving this record
    /// * `url` - Fully resolved request URL
    pub fn new(coord: TileCoord, request_id: RequestId, url: impl Into<String>) -> Self {
        Self {
            coord,
            request_id,
            url: url.into(),
            state: TileState::Pending,
            payload: None,
            fragments: Vec::new(),
            processed: false,
            fallback_url: None,
            error: None,
        }
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    /// Raw payload, present once loaded.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Parsed fragments. Empty unless loaded and processed.
    pub fn fragments(&self) -> &[Feature] {
        &self.fragments
    }

    /// Whether fragments have been extracted from the payload.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Fallback URL recorded when the tile errored.
    pub fn fallback_url(&self) -> Option<&str> {
        self.fallback_url.as_deref()
    }

    /// Failure description recorded when the tile errored.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Move to `Loaded`, keeping the raw payload.
    pub fn mark_loaded(&mut self, payload: Value) -> Result<(), TileStateError> {
        self.ensure_pending()?;
        self.state = TileState::Loaded;
        self.payload = Some(payload);
        Ok(())
    }

    /// Store the fragments parsed from the payload.
    pub fn attach_fragments(&mut self, fragments: Vec<Feature>) -> Result<(), TileStateError> {
        if self.state != TileState::Loaded {
            return Err(TileStateError::NotLoaded {
                coord: self.coord,
                state: self.state,
            });
        }
        if self.processed {
            return Err(TileStateError::AlreadyProcessed { coord: self.coord });
        }
        self.fragments = fragments;
        self.processed = true;
        Ok(())
    }

    /// Move to `Errored`. Errored tiles contribute no features.
    pub fn mark_errored(
        &mut self,
        error: impl Into<String>,
        fallback_url: Option<String>,
    ) -> Result<(), TileStateError> {
        self.ensure_pending()?;
        self.state = TileState::Errored;
        self.error = Some(error.into());
        self.fallback_url = fallback_url;
        Ok(())
    }

    /// Top-level payload members other than `type` and `features`.
    pub fn top_level_properties(&self) -> Map<String, Value> {
        match self.payload.as_ref().and_then(Value::as_object) {
            Some(object) => object
                .iter()
                .filter(|(key, _)| key.as_str() != "type" && key.as_str() != "features")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            None => Map::new(),
        }
    }

    fn ensure_pending(&self) -> Result<(), TileStateError> {
        if self.state.is_settled() {
            return Err(TileStateError::AlreadySettled {
                coord: self.coord,
                state: self.state,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;
    use serde_json::json;

    fn record() -> TileRecord {
        TileRecord::new(
            TileCoord::new(3, 1, 2),
            RequestId(7),
            "https://a.example/3/1/2.json",
        )
    }

    #[test]
    fn test_new_record_is_pending() {
        let record = record();
        assert_eq!(record.state(), TileState::Pending);
        assert_eq!(record.request_id(), RequestId(7));
        assert!(record.payload().is_none());
        assert!(!record.is_processed());
    }

    #[test]
    fn test_load_then_process() {
        let mut record = record();
        record
            .mark_loaded(json!({"type": "FeatureCollection", "features": []}))
            .unwrap();
        record
            .attach_fragments(vec![Feature::new(Point::new(0.0, 0.0))])
            .unwrap();

        assert_eq!(record.state(), TileState::Loaded);
        assert!(record.is_processed());
        assert_eq!(record.fragments().len(), 1);
    }

    #[test]
    fn test_second_transition_rejected() {
        let mut record = record();
        record.mark_loaded(json!({"features": []})).unwrap();

        assert!(matches!(
            record.mark_errored("late", None),
            Err(TileStateError::AlreadySettled {
                state: TileState::Loaded,
                ..
            })
        ));
        assert!(record.mark_loaded(json!({"features": []})).is_err());
        assert_eq!(record.state(), TileState::Loaded);
    }

    #[test]
    fn test_errored_keeps_fallback() {
        let mut record = record();
        record
            .mark_errored("connection refused", Some("https://fallback/tile.json".into()))
            .unwrap();

        assert_eq!(record.state(), TileState::Errored);
        assert_eq!(record.fallback_url(), Some("https://fallback/tile.json"));
        assert_eq!(record.error(), Some("connection refused"));
        assert!(record.fragments().is_empty());
        assert!(matches!(
            record.attach_fragments(vec![]),
            Err(TileStateError::NotLoaded { .. })
        ));
    }

    #[test]
    fn test_fragments_attach_once() {
        let mut record = record();
        record.mark_loaded(json!({"features": []})).unwrap();
        record.attach_fragments(vec![]).unwrap();
        assert_eq!(
            record.attach_fragments(vec![]),
            Err(TileStateError::AlreadyProcessed {
                coord: TileCoord::new(3, 1, 2)
            })
        );
    }

    #[test]
    fn test_top_level_properties_exclude_reserved_keys() {
        let mut record = record();
        record
            .mark_loaded(json!({
                "type": "FeatureCollection",
                "features": [],
                "attribution": "survey",
                "generated": 12
            }))
            .unwrap();

        let props = record.top_level_properties();
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("attribution"), Some(&json!("survey")));
        assert!(!props.contains_key("type"));
    }
}
