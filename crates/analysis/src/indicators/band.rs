/// Moving average ± k standard deviations over the most recent `period`
/// closes (population standard deviation).
#[derive(Debug, Clone)]
pub struct BandModel {
    pub period: usize,
    pub multiplier: f64,
}

/// Band values at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Default for BandModel {
    fn default() -> Self {
        Self::new(20, 2.0)
    }
}

impl BandModel {
    pub fn new(period: usize, multiplier: f64) -> Self {
        assert!(period >= 1, "band period must be >= 1");
        Self { period, multiplier }
    }

    /// Band over the last `period` values of `closes` (oldest first).
    /// Returns `None` if there are fewer than `period` values.
    pub fn compute(&self, closes: &[f64]) -> Option<Band> {
        if closes.len() < self.period {
            return None;
        }
        Some(self.band_of(&closes[closes.len() - self.period..]))
    }

    /// Band ending at every index of `closes`. Entry `i` is `None` until
    /// `period` values are available.
    pub fn rolling(&self, closes: &[f64]) -> Vec<Option<Band>> {
        (0..closes.len())
            .map(|i| {
                if i + 1 < self.period {
                    None
                } else {
                    Some(self.band_of(&closes[i + 1 - self.period..=i]))
                }
            })
            .collect()
    }

    fn band_of(&self, window: &[f64]) -> Band {
        let n = window.len() as f64;
        let middle = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / n;
        let spread = self.multiplier * variance.sqrt();
        Band { upper: middle + spread, middle, lower: middle - spread }
    }
}
