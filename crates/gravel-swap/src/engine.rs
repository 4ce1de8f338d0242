//! The four-pass swap engine.
//!
//! Swaps are processed in batch order (`swap id`); every piece of auxiliary
//! information a later swap needs is forwarded to it through sorted message
//! streams instead of random access:
//!
//! 1. **Dependency chains** — for every edge touched by the batch, find the
//!    chain of swaps touching it; seed each chain head with the current edge.
//! 2. **Conflict candidates** — propagate every possible pre-state along the
//!    chains and request existence information for every edge a swap might
//!    create or keep.
//! 3. **Existence resolution** — answer the requests against the edge list
//!    in one interleaved scan, chaining later requesters per edge.
//! 4. **Execution** — decide each swap (no loop, no conflict), forward final
//!    states and existence bits to successors, emit the update run.
//!
//! Between sub-batches the update run is merged back into the edge list
//! under the validity mask produced by pass 1.

use gravel_error::{GravelError, Result};
use gravel_extmem::{
    BoolStream, ExternalPriorityQueue, ExternalSorter, Lexicographic, PqPoolConfig, PqSorterMerger,
};
use gravel_io::{
    EdgeListFile, EdgeSource, EdgeUpdateStream, SwapBatchFile, SwapBatchReader, SwapResultFile,
    SwapResultWriter,
};
use gravel_types::{swap_edges, Edge, SwapId, SwapResult};
use tracing::{debug, debug_span, info_span};

use crate::messages::{
    DependencyChainEdgeMsg, DependencyChainSuccessorMsg, ExistenceInfoMsg, ExistenceRequestMsg,
    ExistenceSuccessorMsg, SwapAccessMsg,
};

/// Caller-supplied resources for one engine.
#[derive(Debug, Clone, Copy)]
pub struct SwapParams {
    sorter_budget: usize,
    pq_pool: PqPoolConfig,
    sub_batch: Option<u64>,
}

impl SwapParams {
    /// Budgets for the message sorters and the two priority-queue pools.
    #[must_use]
    pub fn new(sorter_budget: usize, pq_pool: PqPoolConfig) -> Self {
        Self {
            sorter_budget,
            pq_pool,
            sub_batch: None,
        }
    }

    /// Split batches into sub-batches of `size` swaps, merging the edge list
    /// after each.
    #[must_use]
    pub fn with_sub_batch(mut self, size: u64) -> Self {
        assert!(size > 0, "sub-batch size must be > 0");
        self.sub_batch = Some(size);
        self
    }

    #[inline]
    #[must_use]
    pub const fn sorter_budget(self) -> usize {
        self.sorter_budget
    }

    #[inline]
    #[must_use]
    pub const fn pq_pool(self) -> PqPoolConfig {
        self.pq_pool
    }

    #[inline]
    #[must_use]
    pub const fn sub_batch(self) -> Option<u64> {
        self.sub_batch
    }
}

/// Streaming edge-swap engine over a sorted, simple edge list.
pub struct EdgeSwapEngine {
    edges: EdgeListFile,
    params: SwapParams,
}

impl EdgeSwapEngine {
    pub fn new(edges: EdgeListFile, params: SwapParams) -> Self {
        Self { edges, params }
    }

    /// The current edge list.
    #[inline]
    pub fn edges(&self) -> &EdgeListFile {
        &self.edges
    }

    /// Give up the engine and keep the (updated) edge list.
    #[must_use]
    pub fn into_edge_list(self) -> EdgeListFile {
        self.edges
    }

    /// Decide and apply a batch of swaps; returns the per-swap result stream.
    ///
    /// An empty batch leaves the edge list untouched. A rejected swap is
    /// reported, not an error; `Err` means the run aborted with no output
    /// published.
    pub fn run(&mut self, swaps: &SwapBatchFile) -> Result<SwapResultFile> {
        let total = swaps.len();
        let span = info_span!("edge_swap_batch", swaps = total, edges = self.edges.len());
        let _guard = span.enter();

        let mut results = SwapResultWriter::create()?;
        if total == 0 {
            debug!("empty batch, edge list unchanged");
            return results.finish();
        }

        let budget = self.params.sorter_budget();
        let mut dep_edge_sorter = ExternalSorter::new(Lexicographic, budget);
        let mut dep_succ_sorter = ExternalSorter::new(Lexicographic, budget);
        let mut exist_req_sorter = ExternalSorter::new(Lexicographic, budget);
        let mut exist_info_sorter = ExternalSorter::new(Lexicographic, budget);
        let mut exist_succ_sorter = ExternalSorter::new(Lexicographic, budget);
        let mut edge_update_sorter = ExternalSorter::<Edge, _>::new(Lexicographic, budget);

        let chunk = self.params.sub_batch().unwrap_or(total);
        let mut last_mask: Option<BoolStream> = None;
        let mut start = 0u64;

        while start < total {
            let end = total.min(start + chunk);
            debug!(start, end, "processing sub-batch");

            // Pass 1 also applies the previous sub-batch's updates: the
            // update stream is this sub-batch's edge source.
            let mut new_mask = BoolStream::new()?;
            {
                let mut batch = swaps.reader_range(start, end)?;
                match last_mask.take() {
                    None => {
                        let mut source = self.edges.reader()?;
                        compute_dependency_chain(
                            &mut source,
                            self.edges.len(),
                            &mut batch,
                            budget,
                            &mut dep_edge_sorter,
                            &mut dep_succ_sorter,
                            &mut new_mask,
                        )?;
                    }
                    Some(mut mask) => {
                        let mut stream = EdgeUpdateStream::new(
                            self.edges.reader()?,
                            &mut mask,
                            &mut edge_update_sorter,
                            self.edges.len(),
                        )?;
                        compute_dependency_chain(
                            &mut stream,
                            self.edges.len(),
                            &mut batch,
                            budget,
                            &mut dep_edge_sorter,
                            &mut dep_succ_sorter,
                            &mut new_mask,
                        )?;
                        self.edges = stream.finish()?;
                        edge_update_sorter.clear();
                    }
                }
            }
            last_mask = Some(new_mask);

            let mut batch = swaps.reader_range(start, end)?;
            compute_conflicts(
                &mut batch,
                &mut dep_edge_sorter,
                &mut dep_succ_sorter,
                &mut exist_req_sorter,
                self.params.pq_pool(),
            )?;

            process_existence_requests(
                &mut exist_req_sorter,
                &self.edges,
                &mut exist_succ_sorter,
                &mut exist_info_sorter,
            )?;

            let mut batch = swaps.reader_range(start, end)?;
            perform_swaps(
                &mut batch,
                &mut dep_edge_sorter,
                &mut dep_succ_sorter,
                &mut exist_info_sorter,
                &mut exist_succ_sorter,
                &mut edge_update_sorter,
                self.params.pq_pool(),
                &mut results,
            )?;

            dep_edge_sorter.clear();
            dep_succ_sorter.clear();
            exist_req_sorter.clear();
            exist_info_sorter.clear();
            exist_succ_sorter.clear();

            start = end;
        }

        let Some(mut mask) = last_mask else {
            return Err(GravelError::invariant("no update mask after the last pass"));
        };
        let stream = EdgeUpdateStream::new(
            self.edges.reader()?,
            &mut mask,
            &mut edge_update_sorter,
            self.edges.len(),
        )?;
        self.edges = stream.finish()?;

        #[cfg(debug_assertions)]
        self.edges.verify_simple()?;

        results.finish()
    }
}

/// Pass 1: group edge accesses by edge, seed each chain head with the
/// current edge value, link each accessor to the next, and emit the
/// validity mask.
fn compute_dependency_chain<S: EdgeSource>(
    edge_source: &mut S,
    edge_count: u64,
    swaps: &mut SwapBatchReader,
    sorter_budget: usize,
    dep_edge_sorter: &mut ExternalSorter<DependencyChainEdgeMsg, Lexicographic>,
    dep_succ_sorter: &mut ExternalSorter<DependencyChainSuccessorMsg, Lexicographic>,
    mask: &mut BoolStream,
) -> Result<()> {
    let _span = debug_span!("dependency_chain").entered();

    let mut access_sorter = ExternalSorter::<SwapAccessMsg, _>::new(Lexicographic, sorter_budget);
    let mut sid: SwapId = 0;
    while let Some(swap) = swaps.next()? {
        let [e0, e1] = swap.edges();
        if e1 >= edge_count {
            return Err(GravelError::invalid_input(format!(
                "swap {sid} references edge {e1}, but the list has {edge_count} edges"
            )));
        }
        access_sorter.push(SwapAccessMsg {
            edge_id: e0,
            swap_id: sid,
        })?;
        access_sorter.push(SwapAccessMsg {
            edge_id: e1,
            swap_id: sid,
        })?;
        sid += 1;
    }
    access_sorter.sort()?;

    // Merge-scan the grouped accesses with the edge list: the first accessor
    // of an edge receives its value, each later accessor is announced to its
    // predecessor.
    let mut eid: u64 = 0;
    let mut last_swap: SwapId = 0;
    let mut touched: u64 = 0;
    while let Some(msg) = access_sorter.next()? {
        while eid < msg.edge_id {
            if edge_source.next_edge()?.is_none() {
                return Err(GravelError::invariant("edge source ended before a requested edge"));
            }
            mask.push(true)?;
            eid += 1;
        }
        if eid == msg.edge_id {
            let Some(edge) = edge_source.next_edge()? else {
                return Err(GravelError::invariant("edge source ended before a requested edge"));
            };
            dep_edge_sorter.push(DependencyChainEdgeMsg {
                swap_id: msg.swap_id,
                edge_id: msg.edge_id,
                edge,
            })?;
            mask.push(false)?;
            eid += 1;
            touched += 1;
        } else {
            if msg.swap_id <= last_swap {
                return Err(GravelError::invariant(
                    "swap ids along a dependency chain must increase",
                ));
            }
            dep_succ_sorter.push(DependencyChainSuccessorMsg {
                swap_id: last_swap,
                edge_id: msg.edge_id,
                successor: msg.swap_id,
            })?;
        }
        last_swap = msg.swap_id;
    }
    while eid < edge_count {
        mask.push(true)?;
        eid += 1;
    }

    debug!(
        touched,
        accesses = access_sorter.len(),
        "dependency chains built"
    );
    dep_succ_sorter.sort()?;
    dep_edge_sorter.sort()?;
    mask.consume()?;
    Ok(())
}

/// Pass 2: drain each swap's possible pre-states, compute the cartesian
/// product of both sides, forward every candidate along the chains, and
/// request existence information.
fn compute_conflicts(
    swaps: &mut SwapBatchReader,
    dep_edge_sorter: &mut ExternalSorter<DependencyChainEdgeMsg, Lexicographic>,
    dep_succ_sorter: &mut ExternalSorter<DependencyChainSuccessorMsg, Lexicographic>,
    exist_req_sorter: &mut ExternalSorter<ExistenceRequestMsg, Lexicographic>,
    pq_pool: PqPoolConfig,
) -> Result<()> {
    let _span = debug_span!("conflict_candidates").entered();

    let pq = ExternalPriorityQueue::new(Lexicographic, pq_pool);
    let mut merger = PqSorterMerger::new(pq, dep_edge_sorter);

    let mut states: [Vec<Edge>; 2] = [Vec::new(), Vec::new()];
    let mut duplicates_dropped: u64 = 0;
    let mut max_state_product: usize = 0;
    let mut sid: SwapId = 0;

    while let Some(swap) = swaps.next()? {
        let eids = swap.edges();
        let mut successors: [Option<SwapId>; 2] = [None, None];

        for i in 0..2 {
            states[i].clear();

            if let Some(msg) = dep_succ_sorter.peek() {
                if msg.swap_id < sid {
                    return Err(GravelError::invariant("stale dependency successor message"));
                }
                if msg.swap_id == sid && msg.edge_id == eids[i] {
                    if msg.successor <= sid {
                        return Err(GravelError::invariant(
                            "successor swap id must exceed the current swap",
                        ));
                    }
                    successors[i] = Some(msg.successor);
                    dep_succ_sorter.next()?;
                }
            }

            // Candidates arrive sorted by (swap, edge, value), so equal
            // values are adjacent and the adjacent drop deduplicates.
            while let Some(msg) = merger.peek() {
                if msg.swap_id != sid || msg.edge_id != eids[i] {
                    break;
                }
                merger.next()?;
                if states[i].last() == Some(&msg.edge) {
                    duplicates_dropped += 1;
                } else {
                    states[i].push(msg.edge);
                }
            }
            if states[i].is_empty() {
                return Err(GravelError::invariant(format!(
                    "no pre-state delivered for swap {sid} edge {}",
                    eids[i]
                )));
            }
        }
        if let Some(msg) = merger.peek() {
            if msg.swap_id <= sid {
                return Err(GravelError::invariant(
                    "dependency-chain message left behind for the current swap",
                ));
            }
        }

        max_state_product = max_state_product.max(states[0].len() * states[1].len());

        for &e1 in &states[0] {
            for &e2 in &states[1] {
                let (n0, n1) = swap_edges(e1, e2, swap.direction());
                let new_edges = [n0, n1];
                for k in 0..2 {
                    if let Some(successor) = successors[k] {
                        merger.push(DependencyChainEdgeMsg {
                            swap_id: successor,
                            edge_id: eids[k],
                            edge: new_edges[k],
                        })?;
                    }
                    exist_req_sorter.push(ExistenceRequestMsg {
                        edge: new_edges[k],
                        swap_id: sid,
                        forward_only: false,
                    })?;
                }
            }
        }
        // Pre-states flow through unchanged in case the swap fails later.
        for k in 0..2 {
            for &edge in &states[k] {
                if let Some(successor) = successors[k] {
                    merger.push(DependencyChainEdgeMsg {
                        swap_id: successor,
                        edge_id: eids[k],
                        edge,
                    })?;
                }
                exist_req_sorter.push(ExistenceRequestMsg {
                    edge,
                    swap_id: sid,
                    forward_only: true,
                })?;
            }
        }

        sid += 1;
    }

    if !merger.is_empty() {
        return Err(GravelError::invariant(
            "undelivered dependency-chain state after the last swap",
        ));
    }
    merger.log_stats("conflict_candidates");
    debug!(
        duplicates_dropped,
        max_state_product, "conflict candidates propagated"
    );
    drop(merger);

    exist_req_sorter.sort()?;
    dep_succ_sorter.rewind()?;
    dep_edge_sorter.rewind()?;
    Ok(())
}

/// Pass 3: one interleaved scan of the sorted requests and the edge list.
/// Requests per edge arrive latest-first; the scan chains the requesters and
/// delivers the answer to the earliest one.
fn process_existence_requests(
    exist_req_sorter: &mut ExternalSorter<ExistenceRequestMsg, Lexicographic>,
    edges: &EdgeListFile,
    exist_succ_sorter: &mut ExternalSorter<ExistenceSuccessorMsg, Lexicographic>,
    exist_info_sorter: &mut ExternalSorter<ExistenceInfoMsg, Lexicographic>,
) -> Result<()> {
    let _span = debug_span!("existence_resolution").entered();

    let mut reader = edges.reader()?;
    let mut queried: u64 = 0;

    while let Some(first) = exist_req_sorter.peek() {
        let current = first.edge;
        queried += 1;

        let mut exists = false;
        while let Some(edge) = reader.peek() {
            if edge > current {
                break;
            }
            exists = edge == current;
            reader.next_edge()?;
        }

        let mut last_swap = first.swap_id;
        let mut found_target = false;
        while let Some(request) = exist_req_sorter.peek() {
            if request.edge != current {
                break;
            }
            exist_req_sorter.next()?;
            if last_swap != request.swap_id {
                if last_swap < request.swap_id {
                    return Err(GravelError::invariant("existence requests out of order"));
                }
                if found_target {
                    exist_succ_sorter.push(ExistenceSuccessorMsg {
                        swap_id: request.swap_id,
                        edge: current,
                        successor: last_swap,
                    })?;
                }
                last_swap = request.swap_id;
            }
            found_target = found_target || !request.forward_only;
        }

        if found_target {
            exist_info_sorter.push(ExistenceInfoMsg {
                swap_id: last_swap,
                edge: current,
                exists,
            })?;
        }
    }

    debug!(queried, "existence requests resolved");
    exist_req_sorter.clear();
    exist_succ_sorter.sort()?;
    exist_info_sorter.sort()?;
    Ok(())
}

/// Pass 4: decide each swap, forward final states and existence bits along
/// the chains, and emit the edge-update run.
#[allow(clippy::too_many_arguments)]
fn perform_swaps(
    swaps: &mut SwapBatchReader,
    dep_edge_sorter: &mut ExternalSorter<DependencyChainEdgeMsg, Lexicographic>,
    dep_succ_sorter: &mut ExternalSorter<DependencyChainSuccessorMsg, Lexicographic>,
    exist_info_sorter: &mut ExternalSorter<ExistenceInfoMsg, Lexicographic>,
    exist_succ_sorter: &mut ExternalSorter<ExistenceSuccessorMsg, Lexicographic>,
    edge_update_sorter: &mut ExternalSorter<Edge, Lexicographic>,
    pq_pool: PqPoolConfig,
    results: &mut SwapResultWriter,
) -> Result<()> {
    let _span = debug_span!("swap_execution").entered();

    // Both queues live at once; split the pool as the budget model requires.
    let half = pq_pool.halved();
    let mut edge_state = PqSorterMerger::new(
        ExternalPriorityQueue::new(Lexicographic, half),
        dep_edge_sorter,
    );
    let mut exist_info = PqSorterMerger::new(
        ExternalPriorityQueue::new(Lexicographic, half),
        exist_info_sorter,
    );

    let mut existing: Vec<Edge> = Vec::new();
    let mut missing: Vec<Edge> = Vec::new();
    let mut performed_count: u64 = 0;
    let mut sid: SwapId = 0;

    while let Some(swap) = swaps.next()? {
        let eids = swap.edges();

        // Exactly one chosen pre-state per side, guaranteed by pass 2.
        let mut old_edges = [Edge::new(0, 0); 2];
        for (i, old) in old_edges.iter_mut().enumerate() {
            let Some(msg) = edge_state.peek() else {
                return Err(GravelError::invariant(format!(
                    "missing pre-state for swap {sid}"
                )));
            };
            if msg.swap_id != sid || msg.edge_id != eids[i] {
                return Err(GravelError::invariant(format!(
                    "pre-state misdelivered for swap {sid} edge {}",
                    eids[i]
                )));
            }
            *old = msg.edge;
            edge_state.next()?;
        }

        let (n0, n1) = swap_edges(old_edges[0], old_edges[1], swap.direction());
        let new_edges = [n0, n1];

        existing.clear();
        missing.clear();
        while let Some(msg) = exist_info.peek() {
            if msg.swap_id != sid {
                if msg.swap_id < sid {
                    return Err(GravelError::invariant("stale existence info"));
                }
                break;
            }
            exist_info.next()?;
            if msg.exists {
                existing.push(msg.edge);
            } else {
                missing.push(msg.edge);
            }
        }

        let conflict = [
            existing.binary_search(&new_edges[0]).is_ok(),
            existing.binary_search(&new_edges[1]).is_ok(),
        ];
        debug_assert!(conflict[0] || missing.binary_search(&new_edges[0]).is_ok());
        debug_assert!(conflict[1] || missing.binary_search(&new_edges[1]).is_ok());

        let loop_detected = new_edges[0].is_loop() || new_edges[1].is_loop();
        let performed = !(conflict[0] || conflict[1] || loop_detected);
        performed_count += u64::from(performed);

        let mut result = SwapResult {
            performed,
            loop_detected,
            edges: new_edges,
            conflict,
        };
        result.normalize();
        results.push(&result)?;

        let finals = if performed { new_edges } else { old_edges };

        // Forward the settled state; sides without a successor go to the
        // update run.
        let mut successor_found = [false, false];
        while let Some(succ) = dep_succ_sorter.peek() {
            if succ.swap_id != sid {
                if succ.swap_id < sid {
                    return Err(GravelError::invariant(
                        "stale dependency successor in execution pass",
                    ));
                }
                break;
            }
            dep_succ_sorter.next()?;
            let side = if succ.edge_id == eids[0] {
                0
            } else if succ.edge_id == eids[1] {
                1
            } else {
                return Err(GravelError::invariant(
                    "successor message for an edge this swap does not touch",
                ));
            };
            if succ.successor <= sid {
                return Err(GravelError::invariant(
                    "successor swap id must exceed the current swap",
                ));
            }
            edge_state.push(DependencyChainEdgeMsg {
                swap_id: succ.successor,
                edge_id: succ.edge_id,
                edge: finals[side],
            })?;
            successor_found[side] = true;
        }
        for side in 0..2 {
            if !successor_found[side] {
                edge_update_sorter.push(finals[side])?;
            }
        }

        // Forward existence bits as they stand after this swap.
        while let Some(succ) = exist_succ_sorter.peek() {
            if succ.swap_id != sid {
                if succ.swap_id < sid {
                    return Err(GravelError::invariant("stale existence successor"));
                }
                break;
            }
            exist_succ_sorter.next()?;
            let exists_now = if succ.edge == finals[0] || succ.edge == finals[1] {
                true
            } else if succ.edge == old_edges[0] || succ.edge == old_edges[1] {
                false
            } else {
                existing.binary_search(&succ.edge).is_ok()
            };
            exist_info.push(ExistenceInfoMsg {
                swap_id: succ.successor,
                edge: succ.edge,
                exists: exists_now,
            })?;
        }

        sid += 1;
    }

    if dep_succ_sorter.peek().is_some() {
        return Err(GravelError::invariant(
            "dependency successors left after the last swap",
        ));
    }
    if exist_succ_sorter.peek().is_some() {
        return Err(GravelError::invariant(
            "existence successors left after the last swap",
        ));
    }
    if !edge_state.is_empty() {
        return Err(GravelError::invariant(
            "edge states left after the last swap",
        ));
    }
    if !exist_info.is_empty() {
        return Err(GravelError::invariant(
            "existence info left after the last swap",
        ));
    }
    edge_state.log_stats("edge_state");
    exist_info.log_stats("existence_info");
    debug!(performed = performed_count, swaps = sid, "swaps executed");
    drop(edge_state);
    drop(exist_info);

    edge_update_sorter.sort()?;
    Ok(())
}
