//! GeoJSON ⇄ feature conversion.
//!
//! Tile bodies are parsed as generic `serde_json::Value` documents and walked
//! by hand so that a single broken feature can be skipped without losing the
//! rest of the tile.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

use super::model::{Feature, FeatureId, Properties};

/// Errors raised while reading GeoJSON.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoJsonError {
    /// The body is not valid JSON.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The document is not a feature collection.
    #[error("Expected a FeatureCollection, found {0}")]
    NotFeatureCollection(String),

    /// A feature is not a JSON object.
    #[error("Feature is not a JSON object")]
    NotAnObject,

    /// A feature has a null or absent geometry.
    #[error("Feature has no geometry")]
    MissingGeometry,

    /// Geometry type we do not understand.
    #[error("Unsupported geometry type '{0}'")]
    UnsupportedGeometry(String),

    /// Coordinates that do not match the geometry type.
    #[error("Invalid coordinates for {geometry}: {reason}")]
    InvalidCoordinates {
        geometry: &'static str,
        reason: String,
    },
}

/// Features read from one tile payload.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeatures {
    /// Features that parsed cleanly, in document order.
    pub features: Vec<Feature>,
    /// Number of malformed features that were skipped.
    pub skipped: usize,
}

/// Parse a tile body into a JSON document and check it is a feature collection.
pub fn parse_payload(bytes: &[u8]) -> Result<Value, GeoJsonError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| GeoJsonError::InvalidJson(e.to_string()))?;

    match value.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") | None => {}
        Some(other) => return Err(GeoJsonError::NotFeatureCollection(other.to_string())),
    }
    if !value.get("features").is_some_and(Value::is_array) {
        return Err(GeoJsonError::NotFeatureCollection(
            "document without a features array".to_string(),
        ));
    }
    Ok(value)
}

/// Extract every well-formed feature from a feature collection document.
///
/// Malformed features are logged and skipped; the remaining features are kept.
pub fn parse_features(payload: &Value) -> ParsedFeatures {
    let mut parsed = ParsedFeatures::default();

    let Some(features) = payload.get("features").and_then(Value::as_array) else {
        return parsed;
    };

    for (index, value) in features.iter().enumerate() {
        match parse_feature(value) {
            Ok(feature) => parsed.features.push(feature),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed feature");
                parsed.skipped += 1;
            }
        }
    }

    parsed
}

/// Parse one GeoJSON feature object.
pub fn parse_feature(value: &Value) -> Result<Feature, GeoJsonError> {
    let object = value.as_object().ok_or(GeoJsonError::NotAnObject)?;

    let geometry = match object.get("geometry") {
        None | Some(Value::Null) => return Err(GeoJsonError::MissingGeometry),
        Some(g) => parse_geometry(g)?,
    };

    let properties = match object.get("properties") {
        Some(Value::Object(map)) => map.clone(),
        _ => Properties::new(),
    };

    Ok(Feature {
        id: object.get("id").and_then(FeatureId::from_value),
        geometry,
        properties,
    })
}

/// Parse a GeoJSON geometry object.
pub fn parse_geometry(value: &Value) -> Result<Geometry<f64>, GeoJsonError> {
    let geometry_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeoJsonError::UnsupportedGeometry("<missing>".to_string()))?;

    if geometry_type == "GeometryCollection" {
        let members = value
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("GeometryCollection", "missing geometries array"))?;
        let geometries = members
            .iter()
            .map(parse_geometry)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(geometries)));
    }

    let coordinates = value
        .get("coordinates")
        .ok_or_else(|| invalid(static_name(geometry_type), "missing coordinates"))?;

    match geometry_type {
        "Point" => Ok(Geometry::Point(Point(parse_position(coordinates, "Point")?))),
        "MultiPoint" => Ok(Geometry::MultiPoint(MultiPoint(
            parse_positions(coordinates, "MultiPoint")?
                .into_iter()
                .map(Point)
                .collect(),
        ))),
        "LineString" => Ok(Geometry::LineString(LineString(parse_positions(
            coordinates,
            "LineString",
        )?))),
        "MultiLineString" => Ok(Geometry::MultiLineString(MultiLineString(
            array(coordinates, "MultiLineString")?
                .iter()
                .map(|line| parse_positions(line, "MultiLineString").map(LineString))
                .collect::<Result<Vec<_>, _>>()?,
        ))),
        "Polygon" => Ok(Geometry::Polygon(parse_polygon(coordinates, "Polygon")?)),
        "MultiPolygon" => Ok(Geometry::MultiPolygon(MultiPolygon(
            array(coordinates, "MultiPolygon")?
                .iter()
                .map(|polygon| parse_polygon(polygon, "MultiPolygon"))
                .collect::<Result<Vec<_>, _>>()?,
        ))),
        other => Err(GeoJsonError::UnsupportedGeometry(other.to_string())),
    }
}

fn static_name(geometry_type: &str) -> &'static str {
    match geometry_type {
        "Point" => "Point",
        "MultiPoint" => "MultiPoint",
        "LineString" => "LineString",
        "MultiLineString" => "MultiLineString",
        "Polygon" => "Polygon",
        "MultiPolygon" => "MultiPolygon",
        _ => "geometry",
    }
}

fn invalid(geometry: &'static str, reason: impl Into<String>) -> GeoJsonError {
    GeoJsonError::InvalidCoordinates {
        geometry,
        reason: reason.into(),
    }
}

fn array<'a>(value: &'a Value, geometry: &'static str) -> Result<&'a Vec<Value>, GeoJsonError> {
    value
        .as_array()
        .ok_or_else(|| invalid(geometry, "expected an array"))
}

fn parse_position(value: &Value, geometry: &'static str) -> Result<Coord<f64>, GeoJsonError> {
    let position = array(value, geometry)?;
    if position.len() < 2 {
        return Err(invalid(geometry, "position needs at least two numbers"));
    }
    let x = position[0]
        .as_f64()
        .ok_or_else(|| invalid(geometry, "non-numeric x"))?;
    let y = position[1]
        .as_f64()
        .ok_or_else(|| invalid(geometry, "non-numeric y"))?;
    Ok(Coord { x, y })
}

fn parse_positions(value: &Value, geometry: &'static str) -> Result<Vec<Coord<f64>>, GeoJsonError> {
    array(value, geometry)?
        .iter()
        .map(|position| parse_position(position, geometry))
        .collect()
}

fn parse_polygon(value: &Value, geometry: &'static str) -> Result<Polygon<f64>, GeoJsonError> {
    let mut rings = array(value, geometry)?
        .iter()
        .map(|ring| parse_positions(ring, geometry).map(LineString));
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString(Vec::new()),
    };
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn position_value(coord: &Coord<f64>) -> Value {
    json!([coord.x, coord.y])
}

fn line_value(line: &LineString<f64>) -> Value {
    Value::Array(line.0.iter().map(position_value).collect())
}

fn polygon_value(polygon: &Polygon<f64>) -> Value {
    let mut rings = vec![line_value(polygon.exterior())];
    rings.extend(polygon.interiors().iter().map(line_value));
    Value::Array(rings)
}

/// Serialise a geometry as a GeoJSON geometry object.
///
/// `Line`, `Rect` and `Triangle` have no GeoJSON counterpart and are written
/// as `LineString` and `Polygon`.
pub fn geometry_to_value(geometry: &Geometry<f64>) -> Value {
    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": position_value(&p.0)}),
        Geometry::MultiPoint(mp) => json!({
            "type": "MultiPoint",
            "coordinates": mp.0.iter().map(|p| position_value(&p.0)).collect::<Vec<_>>(),
        }),
        Geometry::Line(line) => json!({
            "type": "LineString",
            "coordinates": [position_value(&line.start), position_value(&line.end)],
        }),
        Geometry::LineString(ls) => json!({"type": "LineString", "coordinates": line_value(ls)}),
        Geometry::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line_value).collect::<Vec<_>>(),
        }),
        Geometry::Polygon(p) => json!({"type": "Polygon", "coordinates": polygon_value(p)}),
        Geometry::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_value).collect::<Vec<_>>(),
        }),
        Geometry::GeometryCollection(gc) => json!({
            "type": "GeometryCollection",
            "geometries": gc.0.iter().map(geometry_to_value).collect::<Vec<_>>(),
        }),
        Geometry::Rect(rect) => {
            json!({"type": "Polygon", "coordinates": polygon_value(&rect.to_polygon())})
        }
        Geometry::Triangle(triangle) => {
            json!({"type": "Polygon", "coordinates": polygon_value(&triangle.to_polygon())})
        }
    }
}

/// Serialise a feature as a GeoJSON feature object.
pub fn feature_to_value(feature: &Feature) -> Value {
    let mut object = Map::new();
    object.insert("type".to_string(), json!("Feature"));
    if let Some(id) = &feature.id {
        object.insert("id".to_string(), id.to_value());
    }
    object.insert("geometry".to_string(), geometry_to_value(&feature.geometry));
    object.insert(
        "properties".to_string(),
        Value::Object(feature.properties.clone()),
    );
    Value::Object(object)
}
