//! Features, their GeoJSON form, and the cross-tile feature store.

mod geojson;
mod model;
mod store;

pub use geojson::{
    feature_to_value, geometry_to_value, parse_feature, parse_features, parse_geometry,
    parse_payload, GeoJsonError, ParsedFeatures,
};
pub use model::{Feature, FeatureId, Properties};
pub use store::{DedupPolicy, FeatureGroup, FeatureStore, Ingested, MergeKey, PropertyMergeKey};
