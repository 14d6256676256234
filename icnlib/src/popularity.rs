//! Content popularity and the Che approximation of LRU residency times.

use crate::error::StrategyError;

/// Zipf distribution truncated to the ranks `1..=n`
#[derive(Debug, Clone)]
pub struct TruncatedZipf {
    alpha: f64,
    pdf: Vec<f64>,
}

impl TruncatedZipf {
    pub fn new(alpha: f64, n: usize) -> Result<Self, StrategyError> {
        if !(alpha >= 0.0) || !alpha.is_finite() {
            return Err(StrategyError::invalid("alpha", alpha, "must be a non-negative number"));
        }
        if n == 0 {
            return Err(StrategyError::invalid("n_contents", n, "must be at least 1"));
        }
        let weights: Vec<f64> = (1..=n).map(|rank| (rank as f64).powf(-alpha)).collect();
        let norm: f64 = weights.iter().sum();
        Ok(Self {
            alpha,
            pdf: weights.into_iter().map(|w| w / norm).collect(),
        })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Probability of every rank, index `i` holding rank `i + 1`
    pub fn pdf(&self) -> &[f64] {
        &self.pdf
    }
}

/// The characteristic time of an LRU cache of `cache_size` entries under the Che approximation
///
/// Solves `Σ_{i ≠ target} (1 - exp(-pdf[i] · T)) = cache_size` for `T`. The left hand side grows
/// monotonically from 0 towards the number of items considered, so the root is bracketed by
/// doubling and then bisected. If the cache can hold every item considered, nothing is ever
/// evicted and the result is `f64::INFINITY`
///
/// # Examples
///
/// ```
/// use icnlib::popularity::che_characteristic_time;
/// // Two equally popular items, room for one: 2(1 - e^{-T/2}) = 1
/// let t = che_characteristic_time(&[0.5, 0.5], 1.0, None);
/// assert!((t - 2.0 * std::f64::consts::LN_2).abs() < 1e-9);
/// ```
pub fn che_characteristic_time(pdf: &[f64], cache_size: f64, target: Option<usize>) -> f64 {
    let considered = pdf.len() - usize::from(target.map_or(false, |t| t < pdf.len()));
    if cache_size <= 0.0 {
        return 0.0;
    }
    if cache_size >= considered as f64 {
        return f64::INFINITY;
    }
    let occupancy = |t: f64| -> f64 {
        pdf.iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != target)
            .map(|(_, p)| 1.0 - (-p * t).exp())
            .sum::<f64>()
            - cache_size
    };
    let mut low = 0.0;
    let mut high = cache_size.max(1.0);
    while occupancy(high) < 0.0 {
        low = high;
        high *= 2.0;
        if !high.is_finite() {
            return f64::INFINITY;
        }
    }
    for _ in 0..200 {
        let mid = 0.5 * (low + high);
        if occupancy(mid) < 0.0 {
            low = mid;
        } else {
            high = mid;
        }
        if high - low <= f64::EPSILON * high {
            break;
        }
    }
    0.5 * (low + high)
}
