//! Cumulative latency histogram.
//!
//! Observations land in the first bucket whose upper bound is greater than
//! or equal to the value. Per-bucket counts are stored non-cumulatively and
//! summed when a snapshot is taken, so an observation costs one increment.
//! Values above the largest bound only reach the implicit `+Inf` bucket,
//! which is the total count.

use std::time::Duration;

use parking_lot::Mutex;

/// One latency series.
#[derive(Debug)]
pub struct Histogram {
    bounds: Vec<f64>,
    state: Mutex<HistogramState>,
}

#[derive(Debug, Clone)]
struct HistogramState {
    buckets: Vec<u64>,
    sum: f64,
    count: u64,
}

/// Consistent copy of a histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// `(upper_bound, cumulative_count)` in ascending bound order, excluding `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub sum: f64,
    /// Total observations; the `+Inf` bucket.
    pub count: u64,
}

impl Histogram {
    /// Create a histogram over the given upper bounds.
    ///
    /// Non-finite bounds are dropped (`+Inf` is implicit), the rest sorted and
    /// deduplicated.
    pub fn new(bounds: &[f64]) -> Self {
        let mut bounds: Vec<f64> = bounds.iter().copied().filter(|b| b.is_finite()).collect();
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();

        let state = HistogramState {
            buckets: vec![0; bounds.len()],
            sum: 0.0,
            count: 0,
        };
        Self {
            bounds,
            state: Mutex::new(state),
        }
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Record one value. NaN is ignored.
    pub fn observe(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        let idx = self.bounds.partition_point(|bound| *bound < value);

        let mut state = self.state.lock();
        if let Some(slot) = state.buckets.get_mut(idx) {
            *slot += 1;
        }
        state.sum += value;
        state.count += 1;
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_secs_f64());
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let state = self.state.lock().clone();

        let mut running = 0;
        let buckets = self
            .bounds
            .iter()
            .zip(state.buckets.iter())
            .map(|(bound, n)| {
                running += n;
                (*bound, running)
            })
            .collect();

        HistogramSnapshot {
            buckets,
            sum: state.sum,
            count: state.count,
        }
    }
}

impl HistogramSnapshot {
    /// Cumulative count for an exact bound, `+Inf` included.
    pub fn count_at(&self, bound: f64) -> Option<u64> {
        if bound == f64::INFINITY {
            return Some(self.count);
        }
        self.buckets
            .iter()
            .find(|(b, _)| *b == bound)
            .map(|(_, n)| *n)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}
