/// Append-only record of per-iteration residuals.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceTracker {
    residuals: Vec<f64>,
    fixed_point_residuals: Vec<f64>,
}

impl ConvergenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ConvergenceTracker {
            residuals: Vec::with_capacity(capacity),
            fixed_point_residuals: Vec::with_capacity(capacity),
        }
    }

    /// Records the relative change of the iterate for one iteration.
    pub fn record(&mut self, residual: f64) {
        self.residuals.push(residual);
    }

    /// Records `||T(w) - w||^2`, kept for diagnostics only.
    pub fn record_fixed_point(&mut self, residual: f64) {
        self.fixed_point_residuals.push(residual);
    }

    /// Whether the latest recorded residual is below `tolerance`.
    pub fn should_stop(&self, tolerance: f64) -> bool {
        matches!(self.last(), Some(r) if r < tolerance)
    }

    pub fn last(&self) -> Option<f64> {
        self.residuals.last().copied()
    }

    pub fn len(&self) -> usize {
        self.residuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residuals.is_empty()
    }

    pub fn history(&self) -> &[f64] {
        &self.residuals
    }

    pub fn fixed_point_history(&self) -> &[f64] {
        &self.fixed_point_residuals
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.residuals, self.fixed_point_residuals)
    }
}

/// Relative change `||next - previous|| / (||previous|| + epsilon)` in the Frobenius norm.
pub fn relative_change<'a, I>(previous: I, next: I, epsilon: f64) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let (diff, norm) = previous
        .into_iter()
        .zip(next)
        .fold((0.0, 0.0), |(diff, norm), (&p, &n)| {
            (diff + (n - p) * (n - p), norm + p * p)
        });
    diff.sqrt() / (norm.sqrt() + epsilon)
}
