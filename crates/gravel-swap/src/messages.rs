//! Message records passed between the engine's four passes.
//!
//! Each message type keeps its own comparator via its field order (or a
//! manual `Ord` where a pass needs a reversed component); they are distinct
//! types rather than one tagged sum because every pass wants an independent
//! sort order.

use std::cmp::Ordering;

use gravel_extmem::Record;
use gravel_types::encoding::{append_bool, append_u64_le, read_u64_le, read_u8};
use gravel_types::{Edge, EdgeId, SwapId};

fn read_edge(buf: &[u8]) -> Edge {
    let u = read_u64_le(buf).expect("record buffer sized by reader");
    let v = read_u64_le(&buf[8..]).expect("record buffer sized by reader");
    Edge { u, v }
}

/// Pass A input: "swap `swap_id` touches edge `edge_id`". Sorting groups all
/// accesses to an edge by increasing swap id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct SwapAccessMsg {
    pub edge_id: EdgeId,
    pub swap_id: SwapId,
}

impl Record for SwapAccessMsg {
    const ENCODED_LEN: usize = 16;

    fn encode(&self, buf: &mut Vec<u8>) {
        append_u64_le(buf, self.edge_id);
        append_u64_le(buf, self.swap_id);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            edge_id: read_u64_le(buf).expect("record buffer sized by reader"),
            swap_id: read_u64_le(&buf[8..]).expect("record buffer sized by reader"),
        }
    }
}

/// "When swap `swap_id` processes edge `edge_id`, one candidate pre-state is
/// `edge`."
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyChainEdgeMsg {
    pub swap_id: SwapId,
    pub edge_id: EdgeId,
    pub edge: Edge,
}

impl Record for DependencyChainEdgeMsg {
    const ENCODED_LEN: usize = 32;

    fn encode(&self, buf: &mut Vec<u8>) {
        append_u64_le(buf, self.swap_id);
        append_u64_le(buf, self.edge_id);
        append_u64_le(buf, self.edge.u);
        append_u64_le(buf, self.edge.v);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            swap_id: read_u64_le(buf).expect("record buffer sized by reader"),
            edge_id: read_u64_le(&buf[8..]).expect("record buffer sized by reader"),
            edge: read_edge(&buf[16..]),
        }
    }
}

/// "After `swap_id` finishes with `edge_id`, forward the result to
/// `successor`." Always `successor > swap_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyChainSuccessorMsg {
    pub swap_id: SwapId,
    pub edge_id: EdgeId,
    pub successor: SwapId,
}

impl Record for DependencyChainSuccessorMsg {
    const ENCODED_LEN: usize = 24;

    fn encode(&self, buf: &mut Vec<u8>) {
        append_u64_le(buf, self.swap_id);
        append_u64_le(buf, self.edge_id);
        append_u64_le(buf, self.successor);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            swap_id: read_u64_le(buf).expect("record buffer sized by reader"),
            edge_id: read_u64_le(&buf[8..]).expect("record buffer sized by reader"),
            successor: read_u64_le(&buf[16..]).expect("record buffer sized by reader"),
        }
    }
}

/// "Does `edge` exist at the time `swap_id` runs?" `forward_only` requests
/// come from existing source edges and chain without needing an answer.
///
/// Ordered by edge ascending, then swap id *descending*: the resolution scan
/// walks each edge's requesters from latest to earliest, so it ends on the
/// chain head that receives the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistenceRequestMsg {
    pub edge: Edge,
    pub swap_id: SwapId,
    pub forward_only: bool,
}

impl Ord for ExistenceRequestMsg {
    fn cmp(&self, other: &Self) -> Ordering {
        self.edge
            .cmp(&other.edge)
            .then_with(|| other.swap_id.cmp(&self.swap_id))
            .then_with(|| self.forward_only.cmp(&other.forward_only))
    }
}

impl PartialOrd for ExistenceRequestMsg {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Record for ExistenceRequestMsg {
    const ENCODED_LEN: usize = 25;

    fn encode(&self, buf: &mut Vec<u8>) {
        append_u64_le(buf, self.edge.u);
        append_u64_le(buf, self.edge.v);
        append_u64_le(buf, self.swap_id);
        append_bool(buf, self.forward_only);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            edge: read_edge(buf),
            swap_id: read_u64_le(&buf[16..]).expect("record buffer sized by reader"),
            forward_only: read_u8(&buf[24..]).expect("record buffer sized by reader") != 0,
        }
    }
}

/// Answer delivered to the earliest swap of a request chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExistenceInfoMsg {
    pub swap_id: SwapId,
    pub edge: Edge,
    pub exists: bool,
}

impl Record for ExistenceInfoMsg {
    const ENCODED_LEN: usize = 25;

    fn encode(&self, buf: &mut Vec<u8>) {
        append_u64_le(buf, self.swap_id);
        append_u64_le(buf, self.edge.u);
        append_u64_le(buf, self.edge.v);
        append_bool(buf, self.exists);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            swap_id: read_u64_le(buf).expect("record buffer sized by reader"),
            edge: read_edge(&buf[8..]),
            exists: read_u8(&buf[24..]).expect("record buffer sized by reader") != 0,
        }
    }
}

/// "After `swap_id` settles `edge`, forward its existence bit to
/// `successor`." Always `successor > swap_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExistenceSuccessorMsg {
    pub swap_id: SwapId,
    pub edge: Edge,
    pub successor: SwapId,
}

impl Record for ExistenceSuccessorMsg {
    const ENCODED_LEN: usize = 32;

    fn encode(&self, buf: &mut Vec<u8>) {
        append_u64_le(buf, self.swap_id);
        append_u64_le(buf, self.edge.u);
        append_u64_le(buf, self.edge.v);
        append_u64_le(buf, self.successor);
    }

    fn decode(buf: &[u8]) -> Self {
        Self {
            swap_id: read_u64_le(buf).expect("record buffer sized by reader"),
            edge: read_edge(&buf[8..]),
            successor: read_u64_le(&buf[24..]).expect("record buffer sized by reader"),
        }
    }
}
