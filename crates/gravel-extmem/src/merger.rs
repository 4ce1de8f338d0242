//! Merged view over a sorted stream and a priority queue.

use gravel_error::Result;
use tracing::debug;

use crate::pq::ExternalPriorityQueue;
use crate::record::{Compare, Record};
use crate::sorter::ExternalSorter;

/// Which source supplied the current head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSource {
    PriorityQueue,
    Sorter,
}

/// Couples one sorter (static, pre-sorted offline data) and one priority
/// queue (dynamic data produced during the same pass) under one comparator.
///
/// When a large portion of a pass's messages is known up front, keeping it in
/// a sorter and reserving the queue for the messages generated on the fly is
/// much cheaper than pushing everything through the queue.
///
/// The merger owns the queue, so every push goes through [`Self::push`] and
/// the cached head stays consistent; call [`Self::update`] after advancing
/// the sorter externally.
pub struct PqSorterMerger<'s, T: Record, C: Compare<T>> {
    pq: ExternalPriorityQueue<T, C>,
    sorter: &'s mut ExternalSorter<T, C>,
    current: Option<MergeSource>,
    from_pq: u64,
    from_sorter: u64,
    max_in_pq: u64,
}

impl<'s, T: Record, C: Compare<T>> PqSorterMerger<'s, T, C> {
    /// Build the merger over a queue and a sorter in its stream phase.
    pub fn new(pq: ExternalPriorityQueue<T, C>, sorter: &'s mut ExternalSorter<T, C>) -> Self {
        let mut merger = Self {
            pq,
            sorter,
            current: None,
            from_pq: 0,
            from_sorter: 0,
            max_in_pq: 0,
        };
        merger.update();
        merger
    }

    /// Re-select the head. Required after the sorter is changed externally.
    pub fn update(&mut self) {
        self.current = match (self.pq.peek(), self.sorter.peek()) {
            (None, None) => None,
            (Some(_), None) => Some(MergeSource::PriorityQueue),
            (None, Some(_)) => Some(MergeSource::Sorter),
            (Some(p), Some(s)) => {
                // The queue wins ties; callers only use the source for stats.
                if self
                    .pq
                    .comparator()
                    .compare(&s, &p)
                    == std::cmp::Ordering::Less
                {
                    Some(MergeSource::Sorter)
                } else {
                    Some(MergeSource::PriorityQueue)
                }
            }
        };
        self.max_in_pq = self.max_in_pq.max(self.pq.len());
    }

    /// True once both sources are exhausted.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// The smallest element across both sources.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        match self.current {
            Some(MergeSource::PriorityQueue) => self.pq.peek(),
            Some(MergeSource::Sorter) => self.sorter.peek(),
            None => None,
        }
    }

    /// The source of the current head.
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<MergeSource> {
        self.current
    }

    /// Pop the head from its source and fetch the next.
    pub fn next(&mut self) -> Result<Option<T>> {
        let Some(src) = self.current else {
            return Ok(None);
        };
        let item = match src {
            MergeSource::PriorityQueue => {
                self.from_pq += 1;
                self.pq.pop()?
            }
            MergeSource::Sorter => {
                self.from_sorter += 1;
                self.sorter.next()?
            }
        };
        self.update();
        Ok(item)
    }

    /// Push into the queue and refresh the head.
    pub fn push(&mut self, item: T) -> Result<()> {
        self.pq.push(item)?;
        self.update();
        Ok(())
    }

    /// Release the sorter borrow, returning the queue for final checks.
    #[must_use]
    pub fn into_pq(self) -> ExternalPriorityQueue<T, C> {
        self.pq
    }

    /// Emit consumption statistics at debug level.
    pub fn log_stats(&self, label: &str) {
        debug!(
            label,
            from_pq = self.from_pq,
            from_sorter = self.from_sorter,
            max_in_pq = self.max_in_pq,
            "merged-source statistics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pq::PqPoolConfig;
    use crate::record::Lexicographic;

    fn sorted(values: &[u64]) -> ExternalSorter<u64, Lexicographic> {
        let mut sorter = ExternalSorter::new(Lexicographic, 1024);
        for &v in values {
            sorter.push(v).expect("push");
        }
        sorter.sort().expect("sort");
        sorter
    }

    #[test]
    fn merges_two_sorted_sources() {
        let mut sorter = sorted(&[1, 4, 7]);
        let pq = ExternalPriorityQueue::new(Lexicographic, PqPoolConfig::new(256, 256));
        let mut merger = PqSorterMerger::new(pq, &mut sorter);
        merger.push(2).expect("push");
        merger.push(6).expect("push");

        let mut out = Vec::new();
        while let Some(v) = merger.next().expect("next") {
            out.push(v);
        }
        assert_eq!(out, vec![1, 2, 4, 6, 7]);
    }

    #[test]
    fn source_reports_the_winning_side_and_pq_wins_ties() {
        let mut sorter = sorted(&[3, 5]);
        let pq = ExternalPriorityQueue::new(Lexicographic, PqPoolConfig::new(256, 256));
        let mut merger = PqSorterMerger::new(pq, &mut sorter);
        merger.push(3).expect("push");

        assert_eq!(merger.source(), Some(MergeSource::PriorityQueue));
        assert_eq!(merger.next().expect("next"), Some(3));
        assert_eq!(merger.source(), Some(MergeSource::Sorter));
        assert_eq!(merger.next().expect("next"), Some(3));
        assert_eq!(merger.next().expect("next"), Some(5));
        assert!(merger.is_empty());
    }

    #[test]
    fn pushes_during_consumption_land_in_order() {
        let mut sorter = sorted(&[10, 30]);
        let pq = ExternalPriorityQueue::new(Lexicographic, PqPoolConfig::new(256, 256));
        let mut merger = PqSorterMerger::new(pq, &mut sorter);

        assert_eq!(merger.next().expect("next"), Some(10));
        merger.push(20).expect("push");
        assert_eq!(merger.next().expect("next"), Some(20));
        assert_eq!(merger.next().expect("next"), Some(30));
        assert_eq!(merger.next().expect("next"), None);
    }
}
