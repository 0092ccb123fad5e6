use arrow::array::{Array, Float64Array};

/// Divisor used for the standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deviation {
    /// Divide by `n` (z-score convention)
    Population,
    /// Divide by `n - 1` (summary statistics convention)
    Sample,
}

impl Deviation {
    fn min_count(self) -> usize {
        match self {
            Deviation::Population => 1,
            Deviation::Sample => 2,
        }
    }
}

/// Mean and standard deviation of a feature column
///
/// Nulls and NaN values are skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    /// Number of values that contributed
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Standard deviation
    pub std_dev: f64,
}

impl Moments {
    /// Estimate moments; `None` when too few values are usable
    pub fn from_values(values: &Float64Array, deviation: Deviation) -> Option<Self> {
        let usable: Vec<f64> = values
            .iter()
            .flatten()
            .filter(|v| !v.is_nan())
            .collect();
        Self::from_slice(&usable, deviation)
    }

    /// Estimate moments of a plain slice (no missing values)
    pub fn from_slice(values: &[f64], deviation: Deviation) -> Option<Self> {
        let count = values.len();
        if count < deviation.min_count() {
            return None;
        }

        let mean = values.iter().sum::<f64>() / count as f64;
        let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        let divisor = match deviation {
            Deviation::Population => count,
            Deviation::Sample => count - 1,
        };

        Some(Self {
            count,
            mean,
            std_dev: (sum_sq / divisor as f64).sqrt(),
        })
    }

    /// Number of values an estimate needs under `deviation`
    pub fn required(deviation: Deviation) -> usize {
        deviation.min_count()
    }

    /// Standardized score; `None` when the spread is zero
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.std_dev > 0.0 {
            Some((value - self.mean) / self.std_dev)
        } else {
            None
        }
    }
}

/// Standardized score of every row; nulls and zero spread give `None`
pub fn z_scores(values: &Float64Array, moments: &Moments) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            if values.is_valid(i) {
                moments.z_score(values.value(i))
            } else {
                None
            }
        })
        .collect()
}
