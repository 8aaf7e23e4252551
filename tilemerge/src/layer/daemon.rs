//! Background task driving a [`TileLayer`].
//!
//! The daemon owns the layer exclusively. Everything else talks to it
//! through a cloneable [`LayerHandle`]: commands go in over an mpsc channel,
//! events come out over broadcast, and aggregate snapshots over watch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   LayerCommand    ┌─────────────────────────────┐
//! │ LayerHandle  │ ────────────────► │         LayerDaemon         │
//! │              │                   │                             │
//! │ subscribe()  │ ◄── LayerEvent ── │  TileLayer ◄── completions ─┼── fetch tasks
//! │ aggregate()  │ ◄── snapshot ──── │                             │
//! └──────────────┘                   └─────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tilemerge::layer::{LayerConfig, LayerDaemon, Viewport};
//!
//! let (daemon, handle) = LayerDaemon::new(config, client)?;
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//!
//! let mut events = handle.subscribe();
//! handle.update(Viewport::new(bounds, 12)).await?;
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::LayerConfig;
use super::error::LayerError;
use super::events::LayerEvent;
use super::tile_layer::{TileLayer, UpdateSummary, Viewport};
use crate::aggregate::{AggregateFeatureCollection, AggregateStats};
use crate::fetcher::FetchCompletion;
use crate::provider::AsyncHttpClient;

/// Default capacity of the command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;

/// Requests accepted by the daemon.
#[derive(Debug)]
pub enum LayerCommand {
    /// Move the view.
    Update {
        viewport: Viewport,
        reply: Option<oneshot::Sender<Result<UpdateSummary, LayerError>>>,
    },
    /// Hard reset.
    Reset { reply: Option<oneshot::Sender<()>> },
    /// Recompute the aggregate without changing tiles.
    Rebuild {
        reply: Option<oneshot::Sender<AggregateStats>>,
    },
}

/// Cloneable access to a running daemon.
#[derive(Debug, Clone)]
pub struct LayerHandle {
    commands: mpsc::Sender<LayerCommand>,
    events: broadcast::Sender<LayerEvent>,
    aggregate: watch::Receiver<Arc<AggregateFeatureCollection>>,
}

impl LayerHandle {
    /// Move the view and wait until the requests are issued.
    pub async fn update(&self, viewport: Viewport) -> Result<UpdateSummary, LayerError> {
        let (reply, response) = oneshot::channel();
        self.send(LayerCommand::Update {
            viewport,
            reply: Some(reply),
        })
        .await?;
        response.await.map_err(|_| LayerError::DaemonStopped)?
    }

    /// Hard-reset the layer and wait for it to finish.
    pub async fn reset(&self) -> Result<(), LayerError> {
        let (reply, response) = oneshot::channel();
        self.send(LayerCommand::Reset { reply: Some(reply) }).await?;
        response.await.map_err(|_| LayerError::DaemonStopped)
    }

    /// Force an aggregate rebuild.
    pub async fn rebuild(&self) -> Result<AggregateStats, LayerError> {
        let (reply, response) = oneshot::channel();
        self.send(LayerCommand::Rebuild { reply: Some(reply) }).await?;
        response.await.map_err(|_| LayerError::DaemonStopped)
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<LayerEvent> {
        self.events.subscribe()
    }

    /// The latest aggregate snapshot.
    pub fn aggregate(&self) -> Arc<AggregateFeatureCollection> {
        Arc::clone(&self.aggregate.borrow())
    }

    /// Receiver notified whenever a new aggregate is published.
    pub fn watch_aggregate(&self) -> watch::Receiver<Arc<AggregateFeatureCollection>> {
        self.aggregate.clone()
    }

    async fn send(&self, command: LayerCommand) -> Result<(), LayerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LayerError::DaemonStopped)
    }
}

/// Runs a [`TileLayer`] on one task.
///
/// # Type Parameters
///
/// * `C` - HTTP client used for tile requests
pub struct LayerDaemon<C>
where
    C: AsyncHttpClient + 'static,
{
    layer: TileLayer<C>,
    completions: mpsc::UnboundedReceiver<FetchCompletion>,
    commands: mpsc::Receiver<LayerCommand>,
}

impl<C> LayerDaemon<C>
where
    C: AsyncHttpClient + 'static,
{
    /// Creates a daemon and the handle used to drive it.
    pub fn new(config: LayerConfig, client: Arc<C>) -> Result<(Self, LayerHandle), LayerError> {
        let (layer, completions) = TileLayer::new(config, client)?;
        let (command_tx, commands) = mpsc::channel(DEFAULT_COMMAND_CAPACITY);

        let handle = LayerHandle {
            commands: command_tx,
            events: layer.event_sender(),
            aggregate: layer.watch_aggregate(),
        };
        let daemon = Self {
            layer,
            completions,
            commands,
        };
        Ok((daemon, handle))
    }

    /// Runs until shutdown is signalled or every handle is dropped.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Layer daemon starting");

        let Self {
            mut layer,
            mut completions,
            mut commands,
        } = self;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Layer daemon shutting down");
                    break;
                }

                command = commands.recv() => match command {
                    Some(command) => Self::handle_command(&mut layer, command),
                    None => {
                        debug!("All layer handles dropped");
                        break;
                    }
                },

                Some(completion) = completions.recv() => {
                    layer.handle_completion(completion);
                }
            }
        }

        let aborted = layer.abort_requests();
        info!(aborted, "Layer daemon stopped");
    }

    fn handle_command(layer: &mut TileLayer<C>, command: LayerCommand) {
        match command {
            LayerCommand::Update { viewport, reply } => {
                let result = layer.update(viewport);
                if let Err(e) = &result {
                    warn!(error = %e, zoom = viewport.zoom, "Layer update rejected");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            LayerCommand::Reset { reply } => {
                layer.reset();
                if let Some(reply) = reply {
                    let _ = reply.send(());
                }
            }
            LayerCommand::Rebuild { reply } => {
                let stats = layer.rebuild();
                if let Some(reply) = reply {
                    let _ = reply.send(stats);
                }
            }
        }
    }
}
