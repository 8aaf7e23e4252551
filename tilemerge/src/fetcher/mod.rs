//! Tile fetching.
//!
//! The [`TileFetcher`] issues one request per scheduled tile, each on its
//! own tokio task, and reports every outcome back to the owning layer over
//! an mpsc channel. It also keeps the load counter: the number of requests
//! that have been issued but have not yet reached a terminal state.
//!
//! # Cancellation
//!
//! ```text
//! batch token ──┬── child token ── fetch task (0:0)
//!               ├── child token ── fetch task (1:0)
//!               └── child token ── fetch task (0:1)
//! ```
//!
//! Evicting one tile cancels its child token. A hard reset cancels the batch
//! token, which stops every outstanding task at once, and installs a fresh
//! batch token for the next generation. A task that finished just before it
//! was cancelled may still deliver a completion; [`TileFetcher::complete`]
//! rejects it because the request id is no longer in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::coord::{TileCoord, TileKey};
use crate::provider::{AsyncHttpClient, ProviderError};
use crate::tile::RequestId;

/// Result of one tile request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The server returned a body.
    Loaded(Vec<u8>),
    /// The request failed.
    Errored(ProviderError),
}

/// Message sent from a fetch task to the owning layer.
#[derive(Debug, Clone)]
pub struct FetchCompletion {
    /// Scheduled coordinate.
    pub coord: TileCoord,
    /// Request the completion belongs to.
    pub request_id: RequestId,
    /// URL that was requested.
    pub url: String,
    /// What happened.
    pub outcome: FetchOutcome,
    /// Time from spawn to completion.
    pub elapsed: Duration,
}

#[derive(Debug)]
struct InFlight {
    request_id: RequestId,
    token: CancellationToken,
}

/// Issues and tracks tile requests.
///
/// # Type Parameters
///
/// * `C` - HTTP client used for every request
pub struct TileFetcher<C>
where
    C: AsyncHttpClient + 'static,
{
    client: Arc<C>,
    batch: CancellationToken,
    in_flight: HashMap<TileKey, InFlight>,
    completion_tx: mpsc::UnboundedSender<FetchCompletion>,
}

impl<C> TileFetcher<C>
where
    C: AsyncHttpClient + 'static,
{
    /// Creates a fetcher and the receiver its completions arrive on.
    pub fn new(client: Arc<C>) -> (Self, mpsc::UnboundedReceiver<FetchCompletion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let fetcher = Self {
            client,
            batch: CancellationToken::new(),
            in_flight: HashMap::new(),
            completion_tx,
        };
        (fetcher, completion_rx)
    }

    /// Spawn a request for a tile.
    ///
    /// Must be called from within a tokio runtime. Replaces (and cancels)
    /// any request still in flight for the same key.
    pub fn fetch(&mut self, coord: TileCoord, request_id: RequestId, url: String) {
        let token = self.batch.child_token();
        if let Some(previous) = self.in_flight.insert(
            coord.key(),
            InFlight {
                request_id,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        let client = Arc::clone(&self.client);
        let completion_tx = self.completion_tx.clone();
        let start = Instant::now();

        trace!(tile = %coord, request = %request_id, url = %url, "Spawning tile fetch");

        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;

                _ = token.cancelled() => {
                    debug!(tile = %coord, request = %request_id, "Tile fetch cancelled");
                    return;
                }

                result = client.get(&url) => match result {
                    Ok(body) => FetchOutcome::Loaded(body),
                    Err(e) => FetchOutcome::Errored(e),
                },
            };

            // Receiver gone means the layer shut down; nothing left to tell.
            let _ = completion_tx.send(FetchCompletion {
                coord,
                request_id,
                url,
                outcome,
                elapsed: start.elapsed(),
            });
        });
    }

    /// Cancel the request for one tile.
    ///
    /// # Returns
    ///
    /// `true` if that request was still in flight (the load counter drops).
    pub fn cancel(&mut self, key: &TileKey, request_id: RequestId) -> bool {
        match self.in_flight.get(key) {
            Some(entry) if entry.request_id == request_id => {
                if let Some(entry) = self.in_flight.remove(key) {
                    entry.token.cancel();
                }
                true
            }
            _ => false,
        }
    }

    /// Cancel every outstanding request and start a new batch generation.
    ///
    /// # Returns
    ///
    /// The number of requests that were aborted.
    pub fn cancel_all(&mut self) -> usize {
        self.batch.cancel();
        self.batch = CancellationToken::new();
        let aborted = self.in_flight.len();
        self.in_flight.clear();
        if aborted > 0 {
            debug!(aborted, "Cancelled all in-flight tile fetches");
        }
        aborted
    }

    /// Accept a completion if it belongs to a request still in flight.
    ///
    /// # Returns
    ///
    /// `false` for stale completions (evicted, reset or superseded).
    pub fn complete(&mut self, key: &TileKey, request_id: RequestId) -> bool {
        match self.in_flight.get(key) {
            Some(entry) if entry.request_id == request_id => {
                self.in_flight.remove(key);
                true
            }
            _ => false,
        }
    }

    /// The load counter: requests issued and not yet settled.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether nothing is in flight.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }
}
