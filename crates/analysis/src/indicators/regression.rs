/// How the channel half-width is derived from the fit residuals.
///
/// Both are `2 ×` a residual deviation; they differ only in the divisor.
/// Each detection path uses one variant consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelWidth {
    /// `2 × sqrt(SSR / n)`. Used by the chart and the potential-gain figure.
    #[default]
    PopulationStdDev,
    /// `2 × sqrt(SSR / (n - 2))`. Used by the channel-reclaim detector.
    StandardError,
}

/// Ordinary-least-squares line through a series against index positions
/// `0..n`, with a symmetric channel around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionChannel {
    pub slope: f64,
    pub intercept: f64,
    pub half_width: f64,
}

impl RegressionChannel {
    /// Fit `values` (oldest first). Returns `None` for fewer than two values.
    ///
    /// With the standard-error variant and exactly two points the residuals
    /// are zero by construction, so the half-width is zero rather than 0/0.
    pub fn fit(values: &[f64], width: ChannelWidth) -> Option<Self> {
        let n = values.len();
        if n < 2 {
            return None;
        }

        let nf = n as f64;
        let mean_x = (nf - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / nf;

        let (num, den) = values.iter().enumerate().fold((0.0, 0.0), |(num, den), (i, &y)| {
            let dx = i as f64 - mean_x;
            (num + dx * (y - mean_y), den + dx * dx)
        });

        let slope = if den != 0.0 { num / den } else { 0.0 };
        let intercept = mean_y - slope * mean_x;

        let ssr: f64 = values
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let r = y - (slope * i as f64 + intercept);
                r * r
            })
            .sum();

        let deviation = match width {
            ChannelWidth::PopulationStdDev => (ssr / nf).sqrt(),
            ChannelWidth::StandardError if n > 2 => (ssr / (nf - 2.0)).sqrt(),
            ChannelWidth::StandardError => 0.0,
        };

        Some(Self { slope, intercept, half_width: 2.0 * deviation })
    }

    /// Fitted value at index `x`; extrapolates beyond the fitted range.
    pub fn center(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn upper(&self, x: f64) -> f64 {
        self.center(x) + self.half_width
    }

    pub fn lower(&self, x: f64) -> f64 {
        self.center(x) - self.half_width
    }

    /// Full channel width relative to `price`, in percent.
    pub fn width_pct(&self, price: f64) -> f64 {
        if price == 0.0 {
            return 0.0;
        }
        2.0 * self.half_width / price * 100.0
    }
}
