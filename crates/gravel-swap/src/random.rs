//! Random swap-batch generation.

use gravel_types::SwapDescriptor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Streams `count` uniform variates from (0, 1) in ascending order without
/// buffering them, via the order-statistics recurrence: each draw advances
/// the current minimum by the distribution of the next order statistic.
pub struct MonotonicUniformSampler {
    rng: StdRng,
    remaining: u64,
    current: f64,
}

impl MonotonicUniformSampler {
    #[must_use]
    pub fn new(count: u64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            remaining: count,
            current: 0.0,
        }
    }
}

impl Iterator for MonotonicUniformSampler {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.remaining == 0 {
            return None;
        }
        let draw: f64 = self.rng.gen();
        self.current =
            1.0 - (1.0 - self.current) * (1.0 - draw).powf(1.0 / self.remaining as f64);
        self.remaining -= 1;
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

/// Generates `count` random swaps over an edge list of `num_edges` edges.
///
/// One endpoint is drawn through the monotone sampler so batches stay
/// roughly aligned with the sorted edge list; the partner id and the
/// direction are uniform.
pub struct RandomSwapStream {
    lows: MonotonicUniformSampler,
    rng: StdRng,
    num_edges: u64,
}

impl RandomSwapStream {
    #[must_use]
    pub fn new(seed: u64, num_edges: u64, count: u64) -> Self {
        assert!(num_edges >= 2, "swaps need at least two edges");
        Self {
            lows: MonotonicUniformSampler::new(count, seed),
            rng: StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
            num_edges,
        }
    }
}

impl Iterator for RandomSwapStream {
    type Item = SwapDescriptor;

    fn next(&mut self) -> Option<SwapDescriptor> {
        let low = self.lows.next()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let e0 = ((low * self.num_edges as f64) as u64).min(self.num_edges - 1);
        loop {
            let e1 = self.rng.gen_range(0..self.num_edges);
            if e1 != e0 {
                let direction = self.rng.gen::<bool>();
                return SwapDescriptor::new(e0, e1, direction);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_is_sorted_and_in_range() {
        let values: Vec<f64> = MonotonicUniformSampler::new(500, 42).collect();
        assert_eq!(values.len(), 500);
        for pair in values.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        for &v in &values {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn sampler_is_deterministic_per_seed() {
        let one: Vec<f64> = MonotonicUniformSampler::new(50, 7).collect();
        let two: Vec<f64> = MonotonicUniformSampler::new(50, 7).collect();
        assert_eq!(one, two);
    }

    #[test]
    fn swap_stream_yields_valid_descriptors() {
        let swaps: Vec<SwapDescriptor> = RandomSwapStream::new(3, 100, 200).collect();
        assert_eq!(swaps.len(), 200);
        for swap in &swaps {
            let [e0, e1] = swap.edges();
            assert!(e0 < e1);
            assert!(e1 < 100);
        }
    }
}
