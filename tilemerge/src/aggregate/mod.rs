//! Aggregate feature collection assembly.
//!
//! After every tile load or eviction the layer hands its loaded tiles, in
//! key order, to the [`AggregateAssembler`]. The assembler rebuilds the
//! feature store from scratch, unions every merge group, and collects the
//! top-level payload members into one [`AggregateFeatureCollection`].

mod assembler;
mod collection;

pub use assembler::{AggregateAssembler, AggregateStats};
pub use collection::AggregateFeatureCollection;
