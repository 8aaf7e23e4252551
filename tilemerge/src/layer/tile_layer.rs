//! The single owner of scheduler, fetcher and aggregate.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::config::LayerConfig;
use super::error::LayerError;
use super::events::LayerEvent;
use crate::aggregate::{AggregateAssembler, AggregateFeatureCollection, AggregateStats};
use crate::coord::{TileBounds, TileKey};
use crate::feature::{parse_features, parse_payload};
use crate::fetcher::{FetchCompletion, FetchOutcome, TileFetcher};
use crate::provider::{AsyncHttpClient, UrlTemplate};
use crate::scheduler::TileGridScheduler;
use crate::tile::{TileRecord, TileState};

/// Tile bounds and zoom of the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub bounds: TileBounds,
    pub zoom: u8,
}

impl Viewport {
    pub fn new(bounds: TileBounds, zoom: u8) -> Self {
        Self { bounds, zoom }
    }
}

/// What one [`TileLayer::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Requests issued.
    pub scheduled: usize,
    /// Records dropped (zoom change or out of bounds).
    pub evicted: usize,
    /// Requests in flight afterwards.
    pub pending: usize,
}

/// A tiled GeoJSON source presented as one feature collection.
///
/// All mutation happens through `&mut self`; the layer is meant to be
/// driven from a single task (see [`LayerDaemon`](super::LayerDaemon)).
/// Observers use [`subscribe`](Self::subscribe) for events and
/// [`watch_aggregate`](Self::watch_aggregate) for snapshots.
pub struct TileLayer<C>
where
    C: AsyncHttpClient + 'static,
{
    config: LayerConfig,
    template: UrlTemplate,
    scheduler: TileGridScheduler,
    fetcher: TileFetcher<C>,
    assembler: AggregateAssembler,
    events: broadcast::Sender<LayerEvent>,
    aggregate: watch::Sender<Arc<AggregateFeatureCollection>>,
}

impl<C> TileLayer<C>
where
    C: AsyncHttpClient + 'static,
{
    /// Create a layer and the receiver its fetch completions arrive on.
    ///
    /// Feed every completion back through
    /// [`handle_completion`](Self::handle_completion).
    pub fn new(
        config: LayerConfig,
        client: Arc<C>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FetchCompletion>), LayerError> {
        let template = config.template()?;
        let (fetcher, completions) = TileFetcher::new(client);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (aggregate, _) = watch::channel(Arc::new(AggregateFeatureCollection::new()));

        let layer = Self {
            template,
            scheduler: TileGridScheduler::new(config.grid),
            fetcher,
            assembler: AggregateAssembler::new(config.dedup.clone(), config.property_precedence),
            events,
            aggregate,
            config,
        };
        Ok((layer, completions))
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LayerEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<LayerEvent> {
        self.events.clone()
    }

    /// Subscribe to aggregate snapshots.
    pub fn watch_aggregate(&self) -> watch::Receiver<Arc<AggregateFeatureCollection>> {
        self.aggregate.subscribe()
    }

    /// The latest aggregate.
    pub fn aggregate(&self) -> Arc<AggregateFeatureCollection> {
        Arc::clone(&self.aggregate.borrow())
    }

    /// The load counter.
    pub fn pending(&self) -> usize {
        self.fetcher.pending()
    }

    pub fn active_zoom(&self) -> Option<u8> {
        self.scheduler.active_zoom()
    }

    pub fn tile(&self, key: &TileKey) -> Option<&TileRecord> {
        self.scheduler.get(key)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &TileRecord> {
        self.scheduler.records()
    }

    /// Bring the tile map in line with a new view.
    ///
    /// A zoom change hard-resets the layer first. Tiles outside the new
    /// bounds are evicted, then every missing tile is requested, nearest
    /// to the centre first.
    pub fn update(&mut self, viewport: Viewport) -> Result<UpdateSummary, LayerError> {
        let Viewport { bounds, zoom } = viewport;
        let mut summary = UpdateSummary::default();
        let mut was_idle = self.fetcher.is_idle();

        let policy = self.scheduler.policy();
        if policy.accepts_zoom(zoom) {
            policy.request_zoom(zoom)?;
        }

        let planned = if self.scheduler.active_zoom() == Some(zoom) {
            let evicted = self.scheduler.evict_outside(&bounds);
            summary.evicted = evicted.len();
            self.release(evicted);
            self.scheduler.plan(&bounds, zoom)?
        } else {
            // Plan first so a bad zoom leaves the current state untouched
            let planned = self.scheduler.plan(&bounds, zoom)?;
            summary.evicted = self.hard_reset();
            self.scheduler.activate_zoom(zoom);
            // The reset zeroed the counter; the aborted batch never settles
            was_idle = true;
            planned
        };

        let urls = planned
            .iter()
            .map(|coord| -> Result<String, LayerError> {
                let position = self.scheduler.policy().request_position(*coord)?;
                Ok(self.template.render(position.zoom, position.x, position.y))
            })
            .collect::<Result<Vec<String>, LayerError>>()?;

        for (coord, url) in planned.into_iter().zip(urls) {
            if let Some(request_id) = self.scheduler.schedule(coord, url.clone()) {
                debug!(tile = %coord, request = %request_id, url = %url, "Tile scheduled");
                self.fetcher.fetch(coord, request_id, url);
                summary.scheduled += 1;
            }
        }

        // Evictions and new requests count as one transition
        let busy = !self.fetcher.is_idle();
        if was_idle && busy {
            let _ = self.events.send(LayerEvent::Loading);
        } else if !was_idle && !busy {
            self.settle_if_idle();
        }

        summary.pending = self.fetcher.pending();
        info!(
            zoom,
            bounds = %bounds,
            scheduled = summary.scheduled,
            evicted = summary.evicted,
            pending = summary.pending,
            "Layer updated"
        );
        Ok(summary)
    }

    /// Like [`update`](Self::update), from projected pixel bounds.
    pub fn update_pixels(
        &mut self,
        min_px: (f64, f64),
        max_px: (f64, f64),
        zoom: u8,
    ) -> Result<UpdateSummary, LayerError> {
        let bounds = TileBounds::from_pixel_bounds(min_px, max_px, self.config.tile_size)?;
        self.update(Viewport::new(bounds, zoom))
    }

    /// Drop every tile, abort every request and clear the aggregate.
    pub fn reset(&mut self) {
        let dropped = self.hard_reset();
        info!(dropped, "Layer reset");
    }

    /// Apply one fetch result.
    ///
    /// # Returns
    ///
    /// `false` if the completion was stale and ignored.
    pub fn handle_completion(&mut self, completion: FetchCompletion) -> bool {
        let FetchCompletion {
            coord,
            request_id,
            url,
            outcome,
            elapsed,
        } = completion;

        let accepted = self.fetcher.complete(&coord.key(), request_id);
        let record = match self.scheduler.current_mut(&coord.key(), request_id) {
            Some(record) if accepted => record,
            _ => {
                debug!(tile = %coord, request = %request_id, "Discarding stale tile result");
                return false;
            }
        };

        let failure = match outcome {
            FetchOutcome::Loaded(body) => match parse_payload(&body) {
                Ok(payload) => {
                    let parsed = parse_features(&payload);
                    debug!(
                        tile = %coord,
                        features = parsed.features.len(),
                        skipped = parsed.skipped,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Tile loaded"
                    );
                    if let Err(e) = record
                        .mark_loaded(payload)
                        .and_then(|_| record.attach_fragments(parsed.features))
                    {
                        warn!(tile = %coord, error = %e, "Rejected tile transition");
                    }
                    None
                }
                Err(e) => Some(e.to_string()),
            },
            FetchOutcome::Errored(e) => Some(e.to_string()),
        };

        match failure {
            Some(reason) => {
                let fallback_url = self.config.error_tile_url.clone();
                warn!(tile = %coord, url = %url, error = %reason, "Tile failed");
                if let Err(e) = record.mark_errored(reason.clone(), fallback_url.clone()) {
                    warn!(tile = %coord, error = %e, "Rejected tile transition");
                }
                let _ = self.events.send(LayerEvent::TileError {
                    coord,
                    url,
                    fallback_url,
                    reason,
                });
            }
            None => {
                self.rebuild();
            }
        }

        self.settle_if_idle();
        true
    }

    /// Recompute the aggregate from the loaded tiles and publish it.
    pub fn rebuild(&mut self) -> AggregateStats {
        let (collection, stats) = self.assembler.assemble(self.scheduler.loaded());
        self.aggregate.send_replace(Arc::new(collection));
        let _ = self.events.send(LayerEvent::AggregateRebuilt {
            features: stats.features,
        });
        stats
    }

    /// Abort outstanding requests without touching the tile map.
    ///
    /// Used on shutdown; records stay `Pending`.
    pub fn abort_requests(&mut self) -> usize {
        self.fetcher.cancel_all()
    }

    fn hard_reset(&mut self) -> usize {
        self.fetcher.cancel_all();
        let dropped = self.scheduler.reset();
        let had_features = dropped.iter().any(|r| r.state() == TileState::Loaded);
        if had_features || !self.aggregate.borrow().is_empty() {
            self.rebuild();
        }
        dropped.len()
    }

    /// Cancel requests of evicted pending tiles and rebuild if loaded tiles went away.
    fn release(&mut self, evicted: Vec<TileRecord>) {
        let mut lost_features = false;
        for record in &evicted {
            match record.state() {
                TileState::Pending => {
                    self.fetcher.cancel(&record.coord().key(), record.request_id());
                }
                TileState::Loaded => lost_features = true,
                TileState::Errored => {}
            }
        }

        if lost_features {
            self.rebuild();
        }
    }

    fn settle_if_idle(&mut self) {
        if self.fetcher.is_idle() {
            info!(tiles = self.scheduler.len(), "All pending tiles settled");
            let _ = self.events.send(LayerEvent::Settled);
        }
    }
}
