//! Fetch command - load a view through a layer daemon and write the aggregate.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use tilemerge::aggregate::AggregateFeatureCollection;
use tilemerge::config::ConfigFile;
use tilemerge::layer::{LayerConfig, LayerDaemon, LayerError, LayerEvent, LayerHandle, Viewport};
use tilemerge::provider::AsyncReqwestClient;
use tilemerge::union::PropertyPrecedence;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{parse_precedence, write_geojson, ViewArgs};
use crate::error::CliError;

/// Default time to wait for every tile to settle.
pub const DEFAULT_WAIT_SECS: u64 = 120;

/// Arguments for the fetch command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Group fragments by this property, overriding [features] merge_property
    #[arg(long)]
    pub merge_property: Option<String>,

    /// Attribute precedence for merged features: first, last or merge
    #[arg(long, value_parser = parse_precedence)]
    pub precedence: Option<PropertyPrecedence>,

    /// Give up if tiles have not settled after this many seconds
    #[arg(long, default_value_t = DEFAULT_WAIT_SECS)]
    pub wait_secs: u64,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the fetch command.
pub fn run(args: FetchArgs, mut config: ConfigFile) -> Result<(), CliError> {
    if let Some(property) = &args.merge_property {
        config.features.merge_property = Some(property.clone());
    }
    if let Some(precedence) = args.precedence {
        config.features.property_precedence = precedence;
    }
    let layer_config = config.to_layer_config(args.view.url.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let start = Instant::now();
    let aggregate = runtime.block_on(fetch(
        layer_config,
        args.view.viewport(),
        Duration::from_secs(args.wait_secs),
    ))?;
    info!(
        features = aggregate.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Fetch complete"
    );

    write_geojson(args.output.as_ref(), &aggregate.to_geojson())
}

/// Start a daemon, load one view, and stop the daemon again.
async fn fetch(
    config: LayerConfig,
    viewport: Viewport,
    wait: Duration,
) -> Result<Arc<AggregateFeatureCollection>, CliError> {
    let client = AsyncReqwestClient::with_options(config.request_timeout, &config.user_agent)?;
    let (daemon, handle) = LayerDaemon::new(config, Arc::new(client))?;

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(daemon.run(shutdown.clone()));

    let result = load(&handle, viewport, wait).await;

    shutdown.cancel();
    if let Err(e) = task.await {
        warn!(error = %e, "Layer daemon task failed");
    }
    result
}

async fn load(
    handle: &LayerHandle,
    viewport: Viewport,
    wait: Duration,
) -> Result<Arc<AggregateFeatureCollection>, CliError> {
    let mut events = handle.subscribe();
    let summary = handle.update(viewport).await?;
    info!(
        scheduled = summary.scheduled,
        pending = summary.pending,
        "Fetching tiles"
    );

    if summary.pending > 0 {
        let failed = tokio::time::timeout(wait, until_settled(&mut events))
            .await
            .map_err(|_| CliError::Timeout {
                secs: wait.as_secs(),
            })??;
        if failed > 0 {
            warn!(failed, "Some tiles failed and were left out");
        }
    }

    Ok(handle.aggregate())
}

/// Wait for `Settled`, returning how many tiles failed on the way.
async fn until_settled(events: &mut broadcast::Receiver<LayerEvent>) -> Result<usize, LayerError> {
    let mut failed = 0;
    loop {
        match events.recv().await {
            Ok(LayerEvent::Settled) => return Ok(failed),
            Ok(LayerEvent::TileError {
                coord, url, reason, ..
            }) => {
                warn!(tile = %coord, url = %url, error = %reason, "Tile failed");
                failed += 1;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed layer events");
            }
            Err(broadcast::error::RecvError::Closed) => return Err(LayerError::DaemonStopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemerge::coord::TileCoord;

    #[tokio::test]
    async fn test_until_settled_counts_failures() {
        let (tx, mut rx) = broadcast::channel(8);
        tx.send(LayerEvent::Loading).unwrap();
        tx.send(LayerEvent::TileError {
            coord: TileCoord::new(1, 0, 0),
            url: "http://t/1/0/0".to_string(),
            fallback_url: None,
            reason: "HTTP 500".to_string(),
        })
        .unwrap();
        tx.send(LayerEvent::Settled).unwrap();

        assert_eq!(until_settled(&mut rx).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_until_settled_reports_closed_channel() {
        let (tx, mut rx) = broadcast::channel::<LayerEvent>(8);
        drop(tx);

        assert!(matches!(
            until_settled(&mut rx).await,
            Err(LayerError::DaemonStopped)
        ));
    }
}
