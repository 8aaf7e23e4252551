//! Layer lifecycle events.

use std::fmt;

use crate::coord::TileCoord;

/// Signals published by a layer on its broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerEvent {
    /// A batch of requests started while nothing else was in flight.
    Loading,
    /// Every scheduled request reached a terminal state.
    Settled,
    /// One tile failed. It contributes no features.
    TileError {
        coord: TileCoord,
        url: String,
        fallback_url: Option<String>,
        reason: String,
    },
    /// The aggregate was recomputed.
    AggregateRebuilt { features: usize },
}

impl fmt::Display for LayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Settled => write!(f, "settled"),
            Self::TileError { coord, url, .. } => write!(f, "tile error {} ({})", coord, url),
            Self::AggregateRebuilt { features } => {
                write!(f, "aggregate rebuilt ({} features)", features)
            }
        }
    }
}
