//! Out-of-core generation and editing of very large simple graphs.
//!
//! Two algorithmic cores over shared external-memory primitives:
//!
//! - [`ConfigurationModel`] realizes a graphical degree sequence as a
//!   pseudo-random edge list by shuffling half-edges through external
//!   sorters (never holding them in RAM).
//! - [`EdgeSwapEngine`] applies a batch of inter-dependent edge swaps in
//!   four streaming passes, forwarding all coordination to future swaps
//!   through sorted message queues.
//!
//! Both operate with working sets bounded by caller-supplied byte budgets;
//! edge lists, swap batches, and results live in flat little-endian files.
//!
//! ```no_run
//! use gravel::{
//!     CmParams, ConfigurationModel, EdgeSwapEngine, PqPoolConfig, RandomSwapStream,
//!     SwapBatchFile, SwapParams,
//! };
//!
//! # fn main() -> gravel::Result<()> {
//! // Realize a degree sequence (placeholder edges from Havel-Hakimi).
//! let mut model = ConfigurationModel::new(CmParams::new(1, 1 << 20, 64 << 20))?;
//! model.run((0u64..1 << 20).map(|i| (i, (i + 1) % (1 << 20))))?;
//! let edges = model.materialize()?;
//!
//! // Randomize it further with a batch of edge swaps.
//! let swaps: Vec<_> = RandomSwapStream::new(7, edges.len(), 1 << 16).collect();
//! let batch = SwapBatchFile::from_descriptors(&swaps)?;
//! let params = SwapParams::new(64 << 20, PqPoolConfig::new(16 << 20, 16 << 20));
//! let mut engine = EdgeSwapEngine::new(edges, params);
//! let results = engine.run(&batch)?;
//! # let _ = results;
//! # Ok(())
//! # }
//! ```

pub use gravel_cm::{CmParams, ConfigurationModel, HalfEdgeHashOrder, HalfEdgeMsg};
pub use gravel_error::{GravelError, Result};
pub use gravel_extmem::{
    BoolStream, Compare, ExternalPriorityQueue, ExternalSorter, Lexicographic, MergeSource,
    PqPoolConfig, PqSorterMerger, Record,
};
pub use gravel_io::{
    EdgeListFile, EdgeListReader, EdgeListWriter, EdgeSource, EdgeUpdateStream, SwapBatchFile,
    SwapBatchReader, SwapResultFile, SwapResultReader, SwapResultWriter,
};
pub use gravel_swap::{EdgeSwapEngine, MonotonicUniformSampler, RandomSwapStream, SwapParams};
pub use gravel_types::{
    limits, node_in_range, swap_edges, Edge, EdgeId, Node, SwapDescriptor, SwapId, SwapResult,
};
