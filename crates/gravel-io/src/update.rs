//! Streaming merge of an edge list with its update run.

use gravel_error::{GravelError, Result};
use gravel_extmem::{BoolStream, ExternalSorter, Lexicographic};
use gravel_types::Edge;

use crate::edge_file::{EdgeListFile, EdgeListReader, EdgeListWriter, EdgeSource};

/// Merges the old edge list (filtered by the validity mask) with the sorted
/// update run, writing the next edge list while yielding each merged edge.
///
/// Serving the merged edges makes the stream usable as the dependency-chain
/// edge source of the following sub-batch, so the new list is produced in the
/// same scan that reads it — no second copy in RAM.
pub struct EdgeUpdateStream<'a> {
    base: EdgeListReader,
    mask: &'a mut BoolStream,
    updates: &'a mut ExternalSorter<Edge, Lexicographic>,
    out: EdgeListWriter,
    pending: Option<Edge>,
    expected_len: u64,
}

impl<'a> EdgeUpdateStream<'a> {
    /// Build the merge. `mask` must be consumed (readable) and `updates`
    /// sorted; `expected_len` is the old list's length, which the new list
    /// must match.
    pub fn new(
        base: EdgeListReader,
        mask: &'a mut BoolStream,
        updates: &'a mut ExternalSorter<Edge, Lexicographic>,
        expected_len: u64,
    ) -> Result<Self> {
        let mut stream = Self {
            base,
            mask,
            updates,
            out: EdgeListWriter::create()?,
            pending: None,
            expected_len,
        };
        stream.fetch_base()?;
        Ok(stream)
    }

    /// Advance to the next surviving old edge, consuming one mask bit per
    /// old edge.
    fn fetch_base(&mut self) -> Result<()> {
        self.pending = None;
        while let Some(edge) = self.base.next_edge()? {
            let Some(valid) = self.mask.next_bit()? else {
                return Err(GravelError::invariant("update mask shorter than edge list"));
            };
            if valid {
                self.pending = Some(edge);
                return Ok(());
            }
        }
        Ok(())
    }

    /// Drain the remainder and return the finished edge list.
    pub fn finish(mut self) -> Result<EdgeListFile> {
        while self.next_edge()?.is_some() {}
        let list = self.out.finish()?;
        if list.len() != self.expected_len {
            return Err(GravelError::invariant(format!(
                "edge update changed list length: {} -> {}",
                self.expected_len,
                list.len()
            )));
        }
        tracing::debug!(edges = list.len(), "edge list rewritten");
        Ok(list)
    }
}

impl EdgeSource for EdgeUpdateStream<'_> {
    fn next_edge(&mut self) -> Result<Option<Edge>> {
        let chosen = match (self.pending, self.updates.peek()) {
            (None, None) => return Ok(None),
            (Some(base), None) => {
                self.fetch_base()?;
                base
            }
            (None, Some(update)) => {
                self.updates.next()?;
                update
            }
            (Some(base), Some(update)) => {
                if base <= update {
                    self.fetch_base()?;
                    base
                } else {
                    self.updates.next()?;
                    update
                }
            }
        };
        self.out.push(chosen)?;
        Ok(Some(chosen))
    }
}
