//! Integration tests for the tile layer.
//!
//! These drive a [`LayerDaemon`] end to end against an in-memory tile
//! server:
//! - Exact-id deduplication across overlapping tiles
//! - Dissolving merge groups across tile seams
//! - Failed tiles reporting errors without blocking settlement
//! - Late results from reset batches being ignored
//!
//! Run with: `cargo test --test layer_integration`

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use geo::Geometry;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use tilemerge::aggregate::AggregateFeatureCollection;
use tilemerge::coord::{TileBounds, TileCoord};
use tilemerge::feature::FeatureId;
use tilemerge::layer::{LayerConfig, LayerDaemon, LayerEvent, LayerHandle, Viewport};
use tilemerge::provider::{AsyncHttpClient, ProviderError};
use tilemerge::union::PropertyPrecedence;

// ============================================================================
// Helper Functions
// ============================================================================

const TEMPLATE: &str = "http://tiles.test/{z}/{x}/{y}.json";

/// Tile server keyed by full URL. Unknown URLs answer 404.
#[derive(Clone, Default)]
struct TileServer {
    tiles: HashMap<String, Result<Vec<u8>, ProviderError>>,
    delay: Option<Duration>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl TileServer {
    fn tile(mut self, zoom: u8, x: i64, y: i64, body: Value) -> Self {
        self.tiles
            .insert(url(zoom, x, y), Ok(body.to_string().into_bytes()));
        self
    }

    fn failing(mut self, zoom: u8, x: i64, y: i64, error: ProviderError) -> Self {
        self.tiles.insert(url(zoom, x, y), Err(error));
        self
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl AsyncHttpClient for TileServer {
    async fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.hits.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tiles
            .get(url)
            .cloned()
            .unwrap_or_else(|| {
                Err(ProviderError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                })
            })
    }
}

fn url(zoom: u8, x: i64, y: i64) -> String {
    format!("http://tiles.test/{}/{}/{}.json", zoom, x, y)
}

fn collection(features: Vec<Value>) -> Value {
    json!({ "type": "FeatureCollection", "features": features })
}

fn point(id: i64, x: f64, y: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "geometry": { "type": "Point", "coordinates": [x, y] },
        "properties": {}
    })
}

fn square(name: &str, part: &str, x0: f64) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [[[x0, 0.0], [x0 + 1.0, 0.0], [x0 + 1.0, 1.0], [x0, 1.0], [x0, 0.0]]]
        },
        "properties": { "name": name, "part": part }
    })
}

fn viewport(min_x: i64, min_y: i64, max_x: i64, max_y: i64, zoom: u8) -> Viewport {
    Viewport::new(TileBounds::new(min_x, min_y, max_x, max_y).unwrap(), zoom)
}

/// Start a daemon and return its handle plus what stops it.
fn start(config: LayerConfig, server: TileServer) -> (LayerHandle, CancellationToken) {
    let (daemon, handle) = LayerDaemon::new(config, Arc::new(server)).unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(daemon.run(shutdown.clone()));
    (handle, shutdown)
}

/// Collect events up to and including the next `Settled`.
async fn until_settled(events: &mut broadcast::Receiver<LayerEvent>) -> Vec<LayerEvent> {
    let mut seen = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(LayerEvent::Settled) => {
                    seen.push(LayerEvent::Settled);
                    break;
                }
                Ok(event) => seen.push(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("layer stopped"),
            }
        }
    })
    .await
    .expect("layer never settled");
    seen
}

fn ids(collection: &AggregateFeatureCollection) -> Vec<Option<FeatureId>> {
    collection.features.iter().map(|f| f.id.clone()).collect()
}

// ============================================================================
// Integration Tests
// ============================================================================

/// A feature present in two overlapping tiles is only reported once.
#[tokio::test]
async fn test_duplicate_ids_across_tiles_are_dropped() {
    let server = TileServer::default()
        .tile(1, 0, 0, collection(vec![point(1, 0.5, 0.5), point(2, 0.1, 0.1)]))
        .tile(1, 1, 0, collection(vec![point(1, 0.5, 0.5), point(3, 1.9, 0.1)]));
    let (handle, shutdown) = start(LayerConfig::new(TEMPLATE), server);
    let mut events = handle.subscribe();

    let summary = handle.update(viewport(0, 0, 1, 0, 1)).await.unwrap();
    assert_eq!(summary.scheduled, 2);
    until_settled(&mut events).await;

    let aggregate = handle.aggregate();
    assert_eq!(
        ids(&aggregate),
        vec![
            Some(FeatureId::Number(1)),
            Some(FeatureId::Number(2)),
            Some(FeatureId::Number(3)),
        ]
    );

    shutdown.cancel();
}

/// Two halves of one polygon split along a tile seam come back as one ring.
#[tokio::test]
async fn test_merge_group_dissolves_across_seam() {
    let server = TileServer::default()
        .tile(1, 0, 0, collection(vec![square("lake", "west", 0.0)]))
        .tile(1, 1, 0, collection(vec![square("lake", "east", 1.0)]));
    let config = LayerConfig::new(TEMPLATE).with_merge_property("name");
    let (handle, shutdown) = start(config, server);
    let mut events = handle.subscribe();

    handle.update(viewport(0, 0, 1, 0, 1)).await.unwrap();
    until_settled(&mut events).await;

    let aggregate = handle.aggregate();
    assert_eq!(aggregate.len(), 1);

    let lake = &aggregate.features[0];
    let Geometry::Polygon(polygon) = &lake.geometry else {
        panic!("expected a polygon, got {:?}", lake.geometry);
    };
    // Six boundary edges survive; the seam is gone
    assert_eq!(polygon.exterior().0.len(), 7);
    assert!(polygon
        .exterior()
        .0
        .iter()
        .any(|c| c.x == 2.0 && c.y == 1.0));
    // Row-major tile order: the western fragment comes first
    assert_eq!(lake.property("part"), Some(&json!("west")));

    shutdown.cancel();
}

/// Merged attributes follow the configured precedence.
#[tokio::test]
async fn test_merge_group_uses_last_fragment_attributes() {
    let server = TileServer::default()
        .tile(1, 0, 0, collection(vec![square("lake", "west", 0.0)]))
        .tile(1, 1, 0, collection(vec![square("lake", "east", 1.0)]));
    let config = LayerConfig::new(TEMPLATE)
        .with_merge_property("name")
        .with_property_precedence(PropertyPrecedence::LastFragment);
    let (handle, shutdown) = start(config, server);
    let mut events = handle.subscribe();

    handle.update(viewport(0, 0, 1, 0, 1)).await.unwrap();
    until_settled(&mut events).await;

    assert_eq!(
        handle.aggregate().features[0].property("part"),
        Some(&json!("east"))
    );

    shutdown.cancel();
}

/// A failing tile is reported with its fallback and the batch still settles.
#[tokio::test]
async fn test_failed_tile_does_not_block_settlement() {
    let server = TileServer::default()
        .tile(1, 0, 0, collection(vec![point(1, 0.5, 0.5)]))
        .failing(1, 1, 0, ProviderError::HttpError("connection reset".to_string()));
    let config = LayerConfig::new(TEMPLATE).with_error_tile_url("http://tiles.test/blank.json");
    let (handle, shutdown) = start(config, server);
    let mut events = handle.subscribe();

    handle.update(viewport(0, 0, 1, 0, 1)).await.unwrap();
    let seen = until_settled(&mut events).await;

    assert_eq!(seen.first(), Some(&LayerEvent::Loading));
    let errors: Vec<_> = seen
        .iter()
        .filter_map(|event| match event {
            LayerEvent::TileError {
                coord,
                fallback_url,
                ..
            } => Some((*coord, fallback_url.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        errors,
        vec![(
            TileCoord::new(1, 1, 0),
            Some("http://tiles.test/blank.json".to_string())
        )]
    );
    assert_eq!(handle.aggregate().len(), 1);

    shutdown.cancel();
}

/// Results of a batch discarded by reset never reach the aggregate.
#[tokio::test]
async fn test_reset_discards_in_flight_results() {
    let server = TileServer::default()
        .tile(2, 0, 0, collection(vec![point(1, 0.0, 0.0)]))
        .tile(2, 3, 3, collection(vec![point(9, 3.0, 3.0)]))
        .delayed(Duration::from_millis(100));
    let (handle, shutdown) = start(LayerConfig::new(TEMPLATE), server);
    let mut events = handle.subscribe();

    handle.update(viewport(0, 0, 0, 0, 2)).await.unwrap();
    handle.reset().await.unwrap();
    handle.update(viewport(3, 3, 3, 3, 2)).await.unwrap();
    until_settled(&mut events).await;

    // Give the discarded request time to finish had it not been cancelled
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(ids(&handle.aggregate()), vec![Some(FeatureId::Number(9))]);

    shutdown.cancel();
}

/// Panning away from loaded tiles drops their features.
#[tokio::test]
async fn test_panning_evicts_features() {
    let server = TileServer::default()
        .tile(2, 0, 0, collection(vec![point(1, 0.0, 0.0)]))
        .tile(2, 1, 0, collection(vec![point(2, 1.0, 0.0)]));
    let (handle, shutdown) = start(LayerConfig::new(TEMPLATE), server);
    let mut events = handle.subscribe();

    handle.update(viewport(0, 0, 1, 0, 2)).await.unwrap();
    until_settled(&mut events).await;
    assert_eq!(handle.aggregate().len(), 2);

    let summary = handle.update(viewport(1, 0, 1, 0, 2)).await.unwrap();
    assert_eq!(summary.evicted, 1);
    assert_eq!(summary.scheduled, 0);
    assert_eq!(ids(&handle.aggregate()), vec![Some(FeatureId::Number(2))]);

    shutdown.cancel();
}

/// Top-level payload members are carried onto the aggregate.
#[tokio::test]
async fn test_top_level_members_survive() {
    let mut body = collection(vec![point(1, 0.0, 0.0)]);
    body["attribution"] = json!("test data");
    let server = TileServer::default().tile(0, 0, 0, body);
    let (handle, shutdown) = start(LayerConfig::new(TEMPLATE), server);
    let mut events = handle.subscribe();

    handle.update(viewport(0, 0, 0, 0, 0)).await.unwrap();
    until_settled(&mut events).await;

    let geojson = handle.aggregate().to_geojson();
    assert_eq!(geojson["attribution"], json!("test data"));
    assert_eq!(geojson["type"], json!("FeatureCollection"));

    shutdown.cancel();
}
