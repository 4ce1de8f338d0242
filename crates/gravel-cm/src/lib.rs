//! Configuration-model materializer.
//!
//! Takes the placeholder edge stream of a Havel–Hakimi realization and
//! produces a pseudo-random edge list with the same degree sequence, without
//! ever holding the half-edges in RAM: each edge becomes two keyed half-edge
//! records, an external sorter shuffles them under a seeded CRC order, and
//! adjacent records re-pair into output edges.

mod half_edge;
mod model;

pub use half_edge::{HalfEdgeHashOrder, HalfEdgeMsg};
pub use model::{CmParams, ConfigurationModel};
