//! The externally visible feature collection.

use serde_json::{json, Map, Value};

use crate::feature::{feature_to_value, parse_features, parse_payload, Feature, GeoJsonError};

/// Every feature currently visible through the layer, plus the top-level
/// members tile payloads carried besides `type` and `features`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateFeatureCollection {
    /// Deduplicated and merged features.
    pub features: Vec<Feature>,
    /// Top-level payload members.
    pub properties: Map<String, Value>,
}

impl AggregateFeatureCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serialise as a GeoJSON FeatureCollection.
    ///
    /// Top-level members are written first so that `type` and `features`
    /// always win over a payload member of the same name.
    pub fn to_geojson(&self) -> Value {
        let mut object = self.properties.clone();
        object.insert("type".to_string(), json!("FeatureCollection"));
        object.insert(
            "features".to_string(),
            Value::Array(self.features.iter().map(feature_to_value).collect()),
        );
        Value::Object(object)
    }

    /// Read a collection from a GeoJSON document.
    ///
    /// Malformed features are skipped with a warning, as for tile bodies.
    pub fn from_geojson(bytes: &[u8]) -> Result<Self, GeoJsonError> {
        let payload = parse_payload(bytes)?;
        let features = parse_features(&payload).features;
        let properties = match payload {
            Value::Object(object) => object
                .into_iter()
                .filter(|(key, _)| key != "type" && key != "features")
                .collect(),
            _ => Map::new(),
        };
        Ok(Self {
            features,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    #[test]
    fn test_to_geojson_shape() {
        let mut collection = AggregateFeatureCollection::new();
        collection
            .features
            .push(Feature::new(Point::new(1.0, 2.0)).with_id("a"));
        collection
            .properties
            .insert("attribution".to_string(), json!("survey"));

        let value = collection.to_geojson();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["attribution"], "survey");
        assert_eq!(value["features"][0]["id"], "a");
        assert_eq!(value["features"][0]["geometry"]["type"], "Point");
    }

    #[test]
    fn test_reserved_members_not_overridden() {
        let mut collection = AggregateFeatureCollection::new();
        collection
            .properties
            .insert("type".to_string(), json!("Bogus"));

        assert_eq!(collection.to_geojson()["type"], "FeatureCollection");
    }

    #[test]
    fn test_from_geojson_keeps_members() {
        let body = br#"{
            "type": "FeatureCollection",
            "name": "lakes",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}},
                {"type": "Feature", "geometry": {"type": "Blob"}, "properties": {}}
            ]
        }"#;

        let collection = AggregateFeatureCollection::from_geojson(body).unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection.properties.get("name"), Some(&json!("lakes")));
    }
}
