//! Feature data model.

use std::fmt;

use geo::Geometry;
use serde_json::{Map, Value};

/// Property mapping of a feature (`properties` member in GeoJSON).
pub type Properties = Map<String, Value>;

/// Application-supplied feature identity.
///
/// GeoJSON allows either a string or a number. Integral numbers keep their
/// numeric form; any other number is carried by its textual representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureId {
    /// String identifier.
    Text(String),
    /// Integral identifier.
    Number(i64),
}

impl FeatureId {
    /// Read an id from a GeoJSON `id` member.
    ///
    /// Returns `None` for `null` and for values GeoJSON does not allow as ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Number(n) => Some(
                n.as_i64()
                    .map(Self::Number)
                    .unwrap_or_else(|| Self::Text(n.to_string())),
            ),
            _ => None,
        }
    }

    /// Textual identity used for deduplication.
    ///
    /// `1` and `"1"` share a key, so a server that mixes numeric and string
    /// ids still has each feature counted once.
    pub fn dedup_key(&self) -> String {
        self.to_string()
    }

    /// Convert back to a GeoJSON value.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => Value::from(*n),
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FeatureId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// A single geographic feature, or one tile's fragment of one.
///
/// Features are immutable once ingested; the store and the union engine
/// only ever build new features from existing ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Optional identity.
    pub id: Option<FeatureId>,
    /// Geometry in the source coordinate space.
    pub geometry: Geometry<f64>,
    /// Property mapping.
    pub properties: Properties,
}

impl Feature {
    /// Create a feature without an id or properties.
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: None,
            geometry: geometry.into(),
            properties: Properties::new(),
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set one property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Look up a property value.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}
