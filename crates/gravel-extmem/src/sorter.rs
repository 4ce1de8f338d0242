//! The external sorter: bulk insert, sort, stream.

use std::mem;

use gravel_error::{GravelError, Result};
use tracing::debug;

use crate::record::{Compare, Record};
use crate::run::{Run, RunReader, RunWriter};

/// Write-buffer cap for spill files; small spills need not pin the whole
/// budget in a BufWriter.
const SPILL_WRITE_BUF: usize = 64 << 10;

enum State<T: Record> {
    /// Insert phase: pushes buffered, full buffers spilled as sorted runs.
    Filling { buf: Vec<T>, runs: Vec<Run<T>> },
    /// Stream phase over a fully in-memory buffer (nothing spilled).
    InMemory { buf: Vec<T>, pos: usize },
    /// Stream phase over a single merged run on disk.
    Spilled { reader: RunReader<T> },
}

/// External-memory sorter with a fixed byte budget.
///
/// Three phases: unbounded `push`es (buffered, spilled to sorted runs when
/// the budget fills), one `sort` (k-way merge of the runs), then a rewindable
/// `peek`/`next` stream. The working set never exceeds the budget; merging
/// more runs than the budget affords read buffers for fails with
/// [`GravelError::ResourceExhausted`].
pub struct ExternalSorter<T: Record, C: Compare<T>> {
    cmp: C,
    budget: usize,
    max_buffered: usize,
    total: u64,
    state: State<T>,
}

impl<T: Record, C: Compare<T>> ExternalSorter<T, C> {
    /// Create a sorter owning `budget_bytes` of RAM for its buffers.
    pub fn new(cmp: C, budget_bytes: usize) -> Self {
        let max_buffered = (budget_bytes / T::ENCODED_LEN).max(1);
        Self {
            cmp,
            budget: budget_bytes,
            max_buffered,
            total: 0,
            state: State::Filling {
                buf: Vec::new(),
                runs: Vec::new(),
            },
        }
    }

    /// Number of records pushed since creation or the last [`Self::clear`].
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.total
    }

    /// True if the stream head is exhausted (or the sorter is still filling).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.peek().is_none()
    }

    /// The comparator this sorter orders by.
    #[inline]
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Insert a record. Only valid in the insert phase.
    pub fn push(&mut self, item: T) -> Result<()> {
        let State::Filling { buf, runs } = &mut self.state else {
            return Err(GravelError::invariant("push into a sorter already sorted"));
        };
        buf.push(item);
        self.total += 1;
        if buf.len() >= self.max_buffered {
            let cmp = &self.cmp;
            buf.sort_unstable_by(|a, b| cmp.compare(a, b));
            let mut writer = RunWriter::with_capacity(SPILL_WRITE_BUF.min(self.budget))?;
            for item in buf.drain(..) {
                writer.push(&item)?;
            }
            runs.push(writer.finish()?);
        }
        Ok(())
    }

    /// End the insert phase and produce the sorted stream.
    pub fn sort(&mut self) -> Result<()> {
        if !matches!(self.state, State::Filling { .. }) {
            return Err(GravelError::invariant("sort called on a sorted sorter"));
        }
        let state = mem::replace(
            &mut self.state,
            State::InMemory {
                buf: Vec::new(),
                pos: 0,
            },
        );
        let State::Filling { mut buf, mut runs } = state else {
            unreachable!("state checked above");
        };
        let cmp = &self.cmp;
        buf.sort_unstable_by(|a, b| cmp.compare(a, b));

        if runs.is_empty() {
            self.state = State::InMemory { buf, pos: 0 };
            return Ok(());
        }

        if !buf.is_empty() {
            let mut writer = RunWriter::with_capacity(SPILL_WRITE_BUF.min(self.budget))?;
            for item in buf.drain(..) {
                writer.push(&item)?;
            }
            runs.push(writer.finish()?);
        }

        debug!(runs = runs.len(), records = self.total, "merging spill runs");
        let reader = merge_runs(runs, &self.cmp, self.budget)?;
        self.state = State::Spilled { reader };
        Ok(())
    }

    /// The current stream head, if any.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        match &self.state {
            State::Filling { .. } => None,
            State::InMemory { buf, pos } => buf.get(*pos).copied(),
            State::Spilled { reader } => reader.peek(),
        }
    }

    /// Pop the stream head and fetch the next record.
    pub fn next(&mut self) -> Result<Option<T>> {
        match &mut self.state {
            State::Filling { .. } => Ok(None),
            State::InMemory { buf, pos } => {
                let current = buf.get(*pos).copied();
                if current.is_some() {
                    *pos += 1;
                }
                Ok(current)
            }
            State::Spilled { reader } => reader.next(),
        }
    }

    /// Reset the stream to the start of the stream phase.
    pub fn rewind(&mut self) -> Result<()> {
        match &mut self.state {
            State::Filling { .. } => {
                Err(GravelError::invariant("rewind before sort"))
            }
            State::InMemory { pos, .. } => {
                *pos = 0;
                Ok(())
            }
            State::Spilled { reader } => reader.rewind(),
        }
    }

    /// Drop all contents and return to the insert phase.
    pub fn clear(&mut self) {
        self.total = 0;
        self.state = State::Filling {
            buf: Vec::new(),
            runs: Vec::new(),
        };
    }
}

/// K-way merge of sorted runs into one run, read back within `budget` bytes.
fn merge_runs<T: Record, C: Compare<T>>(
    runs: Vec<Run<T>>,
    cmp: &C,
    budget: usize,
) -> Result<RunReader<T>> {
    let ways = runs.len();
    let share = budget / (ways + 1);
    if share < T::ENCODED_LEN {
        return Err(GravelError::ResourceExhausted {
            budget,
            needed: (ways + 1) * T::ENCODED_LEN,
        });
    }

    let mut readers = Vec::with_capacity(ways);
    for run in runs {
        readers.push(run.reader(share)?);
    }
    let mut out = RunWriter::with_capacity(share)?;

    // Binary heap of reader indices keyed by each reader's head.
    let mut heap: Vec<usize> = (0..readers.len())
        .filter(|&i| readers[i].peek().is_some())
        .collect();
    let n = heap.len();
    for i in (0..n / 2).rev() {
        sift_down(&mut heap, &readers, cmp, i);
    }

    while let Some(&src) = heap.first() {
        let Some(item) = readers[src].next()? else {
            return Err(GravelError::invariant("exhausted run left in merge heap"));
        };
        out.push(&item)?;
        if readers[src].peek().is_none() {
            let last = heap.len() - 1;
            heap.swap(0, last);
            heap.pop();
        }
        if !heap.is_empty() {
            sift_down(&mut heap, &readers, cmp, 0);
        }
    }

    out.finish()?.reader(budget)
}

fn head_less<T: Record, C: Compare<T>>(
    readers: &[RunReader<T>],
    cmp: &C,
    a: usize,
    b: usize,
) -> bool {
    match (readers[a].peek(), readers[b].peek()) {
        (Some(x), Some(y)) => cmp.compare(&x, &y) == std::cmp::Ordering::Less,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn sift_down<T: Record, C: Compare<T>>(
    heap: &mut [usize],
    readers: &[RunReader<T>],
    cmp: &C,
    mut i: usize,
) {
    loop {
        let left = 2 * i + 1;
        let right = left + 1;
        let mut smallest = i;
        if left < heap.len() && head_less(readers, cmp, heap[left], heap[smallest]) {
            smallest = left;
        }
        if right < heap.len() && head_less(readers, cmp, heap[right], heap[smallest]) {
            smallest = right;
        }
        if smallest == i {
            break;
        }
        heap.swap(i, smallest);
        i = smallest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Lexicographic;
    use gravel_error::GravelError;

    fn drain(sorter: &mut ExternalSorter<u64, Lexicographic>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(v) = sorter.next().expect("stream") {
            out.push(v);
        }
        out
    }

    #[test]
    fn sorts_in_memory() {
        let mut sorter = ExternalSorter::new(Lexicographic, 1 << 20);
        for v in [9u64, 3, 7, 3, 1] {
            sorter.push(v).expect("push");
        }
        sorter.sort().expect("sort");
        assert_eq!(drain(&mut sorter), vec![1, 3, 3, 7, 9]);
    }

    #[test]
    fn sorts_across_spills() {
        // 32 records per run: 100 pushes spill three runs plus the tail.
        let mut sorter = ExternalSorter::new(Lexicographic, 256);
        let values: Vec<u64> = (0..100).map(|i| (i * 37) % 100).collect();
        for &v in &values {
            sorter.push(v).expect("push");
        }
        sorter.sort().expect("sort");
        let sorted = drain(&mut sorter);
        let mut expected = values;
        expected.sort_unstable();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn rewind_replays_identically() {
        let mut sorter = ExternalSorter::new(Lexicographic, 32);
        for v in [4u64, 2, 8, 6, 0, 9] {
            sorter.push(v).expect("push");
        }
        sorter.sort().expect("sort");
        let first = drain(&mut sorter);
        assert_eq!(first.len(), 6);
        sorter.rewind().expect("rewind");
        let second = drain(&mut sorter);
        assert_eq!(first, second);
    }

    #[test]
    fn merge_without_headroom_is_resource_exhausted() {
        // One record per run and no room for merge read buffers.
        let mut sorter = ExternalSorter::new(Lexicographic, 8);
        for v in [3u64, 1, 2, 5, 4] {
            sorter.push(v).expect("push");
        }
        assert!(matches!(
            sorter.sort(),
            Err(GravelError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn push_after_sort_is_an_invariant_error() {
        let mut sorter = ExternalSorter::new(Lexicographic, 64);
        sorter.push(1u64).expect("push");
        sorter.sort().expect("sort");
        assert!(matches!(
            sorter.push(2u64),
            Err(GravelError::Invariant { .. })
        ));
    }

    #[test]
    fn clear_returns_to_insert_phase() {
        let mut sorter = ExternalSorter::new(Lexicographic, 64);
        sorter.push(1u64).expect("push");
        sorter.sort().expect("sort");
        sorter.clear();
        assert_eq!(sorter.len(), 0);
        sorter.push(5u64).expect("push after clear");
        sorter.sort().expect("sort");
        assert_eq!(drain(&mut sorter), vec![5]);
    }

    #[test]
    fn empty_sorter_streams_nothing() {
        let mut sorter = ExternalSorter::<u64, _>::new(Lexicographic, 64);
        sorter.sort().expect("sort");
        assert!(sorter.is_empty());
        assert_eq!(sorter.next().expect("stream"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn matches_std_sort(
                values in proptest::collection::vec(any::<u64>(), 0..2000),
                budget in 2048usize..4096,
            ) {
                let mut sorter = ExternalSorter::new(Lexicographic, budget);
                for &v in &values {
                    sorter.push(v).expect("push");
                }
                sorter.sort().expect("sort");
                let sorted = drain(&mut sorter);
                let mut expected = values;
                expected.sort_unstable();
                prop_assert_eq!(sorted, expected);
            }
        }
    }
}
