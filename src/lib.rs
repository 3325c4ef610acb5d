// lib.rs – crate root and public re-exports

//! Out-of-core conversion of dense vector corpora into deduplicated
//! Hamming-space codes, split into train and query sets.

pub mod centroid;
pub mod codec;
pub mod config;
pub mod dedup;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod sink;
pub mod split;
pub mod utils;

pub use centroid::{CentroidMode, StreamingCentroid};
pub use codec::{Codec, CodeLayout, ShardRouter};
pub use config::{ConvertConfig, DatasetProfile};
pub use dedup::{DedupSummary, Shard, ShardedDeduplicator};
pub use error::{ConvertError, Result};
pub use io::{ElementKind, PointFile};
pub use pipeline::{ConversionReport, Pipeline};
pub use sink::{ArraySink, ArrayStore};
pub use split::{QueryIndexSet, Splitter};
