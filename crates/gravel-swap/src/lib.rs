//! Time-forward edge-swap engine.
//!
//! Given a sorted simple edge list and a batch of edge-swap requests with
//! inter-dependencies, decide for each swap — streaming, in batch order —
//! whether it is admissible (no self-loop, no parallel edge), and produce
//! the updated edge list. All coordination between dependent swaps flows
//! through external sorters and priority queues; nothing is ever looked up
//! by random access.
//!
//! The engine performs the batch it is given; scheduling batches (and any
//! claim about the mixing of the resulting Markov chain) is the caller's
//! business.

mod engine;
mod messages;
mod random;

pub use engine::{EdgeSwapEngine, SwapParams};
pub use random::{MonotonicUniformSampler, RandomSwapStream};
