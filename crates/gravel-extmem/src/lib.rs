//! External-memory primitives: sorter, priority queue, and their merger.
//!
//! Everything here operates with a working set bounded by a caller-supplied
//! byte budget, regardless of how many records pass through. Records spill to
//! anonymous temp files as fixed-size little-endian encodings and come back
//! through buffered, merge-ordered readers.
//!
//! The three public containers:
//!
//! - [`ExternalSorter`] — bulk insert, sort, then stream (rewindable).
//! - [`ExternalPriorityQueue`] — unbounded pushes at any time, minimum out.
//! - [`PqSorterMerger`] — one comparator over a static sorted stream and a
//!   dynamic queue fed during the same pass.

mod bool_stream;
mod merger;
mod pq;
mod record;
mod run;
mod sorter;

pub use bool_stream::BoolStream;
pub use merger::{MergeSource, PqSorterMerger};
pub use pq::{ExternalPriorityQueue, PqPoolConfig};
pub use record::{Compare, Lexicographic, Record};
pub use sorter::ExternalSorter;
