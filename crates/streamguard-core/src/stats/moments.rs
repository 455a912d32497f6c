use arrow_array::{ArrowNumericType, PrimitiveArray};
use num_traits::ToPrimitive;

/// Running count, mean and sum of squared deviations of a numeric stream.
///
/// Values are folded in with Welford's algorithm, so the accumulator uses
/// constant memory and stays numerically stable on long streams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamingMoments {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    non_finite: u64,
}

impl Default for StreamingMoments {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingMoments {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            non_finite: 0,
        }
    }

    /// Fold one observation into the running statistics.
    ///
    /// NaN and infinities are not folded in, only counted: a single one
    /// would turn the mean and variance into NaN.
    #[inline]
    pub fn update(&mut self, x: f64) {
        if !x.is_finite() {
            self.non_finite += 1;
            return;
        }
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;

        self.min = self.min.min(x);
        self.max = self.max.max(x);
    }

    /// Fold every valid value of an Arrow numeric array. Nulls are skipped,
    /// NaN and infinities are counted by [`non_finite`](Self::non_finite).
    pub fn update_array<T>(&mut self, array: &PrimitiveArray<T>)
    where
        T: ArrowNumericType,
        T::Native: ToPrimitive,
    {
        for value in array.iter().flatten() {
            if let Some(x) = value.to_f64() {
                self.update(x);
            }
        }
    }

    /// Finite observations folded in.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// NaN and infinite observations left out of the statistics.
    pub fn non_finite(&self) -> u64 {
        self.non_finite
    }

    /// Running mean, `None` before the first observation.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Population variance (`m2 / count`). Undefined below two observations.
    pub fn variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / self.count as f64)
    }

    /// Sample variance (`m2 / (count - 1)`). Undefined below two observations.
    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    /// Population standard deviation.
    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Combine two accumulators built over disjoint parts of a stream.
    ///
    /// Chan's parallel formula:
    /// - n_c = n_a + n_b
    /// - mu_c = (n_a * mu_a + n_b * mu_b) / n_c
    /// - M2_c = M2_a + M2_b + (mu_b - mu_a)^2 * n_a * n_b / n_c
    ///
    /// The weighted average of means is used rather than a delta update to
    /// limit drift when both sides are large.
    pub fn merge(&self, other: &StreamingMoments) -> StreamingMoments {
        let count = self.count + other.count;
        if count == 0 {
            return StreamingMoments {
                non_finite: self.non_finite + other.non_finite,
                ..StreamingMoments::new()
            };
        }
        let (na, nb, nc) = (self.count as f64, other.count as f64, count as f64);
        let mean = (na * self.mean + nb * other.mean) / nc;
        let delta = other.mean - self.mean;
        let m2 = self.m2 + other.m2 + delta * delta * na * nb / nc;

        StreamingMoments {
            count,
            mean,
            m2,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            non_finite: self.non_finite + other.non_finite,
        }
    }
}
