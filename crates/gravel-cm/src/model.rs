//! The materializer: widen, shuffle, pair, sort.

use gravel_error::{GravelError, Result};
use gravel_extmem::{ExternalSorter, Lexicographic};
use gravel_io::{EdgeListFile, EdgeListWriter};
use gravel_types::limits::{HALF_EDGE_KEY_MASK, MAX_NODE, NODE_BITS};
use gravel_types::{Edge, Node};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, info_span};

use crate::half_edge::{HalfEdgeHashOrder, HalfEdgeMsg};

/// Caller-supplied parameters for one materializer run.
#[derive(Debug, Clone, Copy)]
pub struct CmParams {
    seed: u32,
    node_upperbound: u64,
    threshold: u64,
    max_degree: u64,
    nodes_above_threshold: u64,
    sorter_budget: usize,
}

impl CmParams {
    /// Parameters without high-degree widening.
    #[must_use]
    pub fn new(seed: u32, node_upperbound: u64, sorter_budget: usize) -> Self {
        Self {
            seed,
            node_upperbound,
            threshold: 0,
            max_degree: 0,
            nodes_above_threshold: 0,
            sorter_budget,
        }
    }

    /// Enable widening for the `nodes_above_threshold` leading placeholder
    /// edges, whose first endpoints carry degree above `threshold`.
    #[must_use]
    pub fn with_high_degree(
        mut self,
        threshold: u64,
        max_degree: u64,
        nodes_above_threshold: u64,
    ) -> Self {
        self.threshold = threshold;
        self.max_degree = max_degree;
        self.nodes_above_threshold = nodes_above_threshold;
        self
    }

    #[inline]
    #[must_use]
    pub const fn seed(self) -> u32 {
        self.seed
    }

    #[inline]
    #[must_use]
    pub const fn node_upperbound(self) -> u64 {
        self.node_upperbound
    }

    #[inline]
    #[must_use]
    pub const fn threshold(self) -> u64 {
        self.threshold
    }

    #[inline]
    #[must_use]
    pub const fn max_degree(self) -> u64 {
        self.max_degree
    }

    #[inline]
    #[must_use]
    pub const fn nodes_above_threshold(self) -> u64 {
        self.nodes_above_threshold
    }

    #[inline]
    #[must_use]
    pub const fn sorter_budget(self) -> usize {
        self.sorter_budget
    }
}

/// Realizes a graphical degree sequence as a pseudo-random edge list.
///
/// Input is the placeholder edge stream of a Havel–Hakimi generator; the
/// sequence is trusted to be graphical and is not re-verified. Output edges
/// are normalized and sorted; configuration-model pairing can produce loops
/// and parallel edges, which downstream rewiring removes.
pub struct ConfigurationModel {
    params: CmParams,
    high_degree_shift: u64,
    half_edges: ExternalSorter<HalfEdgeMsg, HalfEdgeHashOrder>,
    edges: ExternalSorter<Edge, Lexicographic>,
}

impl ConfigurationModel {
    pub fn new(params: CmParams) -> Result<Self> {
        if params.node_upperbound() > MAX_NODE + 1 {
            return Err(GravelError::invalid_input(format!(
                "node upper bound {} exceeds the 36-bit node space",
                params.node_upperbound()
            )));
        }
        let high_degree_shift = if params.nodes_above_threshold() > 0 {
            let headroom = (1u64 << NODE_BITS) - params.node_upperbound();
            let shift = (headroom / params.nodes_above_threshold()).saturating_sub(1);
            if shift < 1 {
                return Err(GravelError::invalid_input(format!(
                    "no virtual-id headroom above {} for {} high-degree nodes",
                    params.node_upperbound(),
                    params.nodes_above_threshold()
                )));
            }
            shift
        } else {
            0
        };
        Ok(Self {
            params,
            high_degree_shift,
            half_edges: ExternalSorter::new(
                HalfEdgeHashOrder::new(params.seed()),
                params.sorter_budget(),
            ),
            edges: ExternalSorter::new(Lexicographic, params.sorter_budget()),
        })
    }

    /// Shuffle the placeholder stream into a sorted edge list.
    ///
    /// Fails on an empty stream, endpoints at or above the node upper bound,
    /// or (fatally) an odd half-edge count.
    pub fn run(&mut self, input: impl IntoIterator<Item = (Node, Node)>) -> Result<()> {
        let span = info_span!(
            "configuration_model",
            seed = self.params.seed(),
            threshold = self.params.threshold(),
            max_degree = self.params.max_degree(),
        );
        let _guard = span.enter();

        let mut rng = StdRng::seed_from_u64(u64::from(self.params.seed()));
        let upperbound = self.params.node_upperbound();
        let widened = self.params.nodes_above_threshold();
        let mut count: u64 = 0;

        for (a, b) in input {
            if a >= upperbound || b >= upperbound {
                return Err(GravelError::invalid_input(format!(
                    "placeholder endpoint ({a}, {b}) at or above node upper bound {upperbound}"
                )));
            }
            let noise = rng.next_u64();

            if count < widened {
                // The first endpoints of the leading edges are the
                // high-degree nodes; spread their half-edges over distinct
                // virtual ids so the shuffle distributes incident edges.
                if a >= widened {
                    return Err(GravelError::invalid_input(format!(
                        "high-degree placeholder endpoint {a} not below {widened}"
                    )));
                }
                let shift = rng.gen_range(1..=self.high_degree_shift);
                let first = upperbound + shift * widened + a;
                self.half_edges
                    .push(HalfEdgeMsg::new((noise & HALF_EDGE_KEY_MASK) | first))?;

                if b < widened {
                    let shift = rng.gen_range(1..=self.high_degree_shift);
                    let second = upperbound + shift * widened + b;
                    self.half_edges
                        .push(HalfEdgeMsg::new((noise << NODE_BITS) | second))?;
                } else {
                    self.half_edges
                        .push(HalfEdgeMsg::new((noise << NODE_BITS) | b))?;
                }
            } else {
                self.half_edges
                    .push(HalfEdgeMsg::new((noise & HALF_EDGE_KEY_MASK) | a))?;
                self.half_edges
                    .push(HalfEdgeMsg::new((noise << NODE_BITS) | b))?;
            }
            count += 1;
        }

        if count == 0 {
            return Err(GravelError::invalid_input("empty placeholder edge stream"));
        }

        self.half_edges.sort()?;
        if self.half_edges.len() % 2 != 0 {
            return Err(GravelError::invariant("odd half-edge count"));
        }

        // Pair adjacent records of the shuffled stream.
        while let Some(first) = self.half_edges.next()? {
            let Some(second) = self.half_edges.next()? else {
                return Err(GravelError::invariant("half-edge stream drained mid-pair"));
            };
            let u = self.project(first.node());
            let v = self.project(second.node());
            self.edges.push(Edge::new(u, v))?;
        }
        self.edges.sort()?;
        debug!(
            placeholder_edges = count,
            edges = self.edges.len(),
            "materialized configuration-model edge list"
        );
        Ok(())
    }

    /// Map a widened virtual id back to its real node.
    fn project(&self, node: Node) -> Node {
        if self.params.nodes_above_threshold() > 0 && node >= self.params.node_upperbound() {
            (node - self.params.node_upperbound()) % self.params.nodes_above_threshold()
        } else {
            node
        }
    }

    /// Number of output edges.
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.edges.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The smallest unread output edge.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<Edge> {
        self.edges.peek()
    }

    /// Pop the next output edge.
    pub fn next(&mut self) -> Result<Option<Edge>> {
        self.edges.next()
    }

    /// Restart the output stream.
    pub fn rewind(&mut self) -> Result<()> {
        self.edges.rewind()
    }

    /// Drain the output stream into an edge-list file.
    pub fn materialize(&mut self) -> Result<EdgeListFile> {
        let mut writer = EdgeListWriter::create()?;
        while let Some(edge) = self.edges.next()? {
            writer.push(edge)?;
        }
        writer.finish()
    }
}
