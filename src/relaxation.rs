use serde::{Deserialize, Serialize};

/// Which coefficient policy the splitting engine follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Static,
    Inertial,
}

/// Growth law of the inertial weight: a nondecreasing sequence in `[0, 1)` tending to 1.
pub type InertiaSchedule = fn(usize) -> f64;

/// `1 - 1/(k+1)`: zero on the first step, then increasing towards one.
pub fn harmonic_growth(k: usize) -> f64 {
    1.0 - 1.0 / (k as f64 + 1.0)
}

/// Coefficients of the (inertial) Krasnoselskii–Mann update
///
/// ```text
/// w_k     = z_k + inertia(k) * (z_k - z_{k-1})
/// z_{k+1} = w_k + alpha(k) * (T(w_k) - w_k)
/// ```
#[derive(Debug, Clone, Copy)]
pub enum Relaxation {
    /// Constant averaging coefficient, no extrapolation.
    Static { lambda: f64 },
    /// Constant averaging coefficient, extrapolation weight growing to `ceiling`.
    Inertial {
        lambda: f64,
        ceiling: f64,
        schedule: InertiaSchedule,
    },
}

impl Relaxation {
    pub fn new(mode: Mode, lambda: f64, rho: f64) -> Self {
        match mode {
            Mode::Static => Relaxation::Static { lambda },
            Mode::Inertial => Relaxation::inertial(lambda, rho, harmonic_growth),
        }
    }

    /// Inertial schedule whose ceiling is the critical inertia for `(rho, lambda)`.
    pub fn inertial(lambda: f64, rho: f64, schedule: InertiaSchedule) -> Self {
        Relaxation::Inertial {
            lambda,
            ceiling: critical_inertia(rho, 1.0, lambda),
            schedule,
        }
    }

    /// Averaging coefficient for iteration `k` (0-based).
    pub fn next_alpha(&self, _k: usize) -> f64 {
        match *self {
            Relaxation::Static { lambda } | Relaxation::Inertial { lambda, .. } => lambda,
        }
    }

    /// Extrapolation weight for iteration `k` (0-based).
    pub fn inertia(&self, k: usize) -> f64 {
        match *self {
            Relaxation::Static { .. } => 0.0,
            Relaxation::Inertial {
                ceiling, schedule, ..
            } => ceiling * schedule(k).clamp(0.0, 1.0),
        }
    }

    /// True when no iteration can ever move the iterate.
    pub fn is_stalled(&self) -> bool {
        // with alpha = 0 the extrapolation only ever replays z_k - z_{k-1} = 0
        self.next_alpha(0) == 0.0
    }
}

/// Largest inertia that keeps the inertial KM iteration convergent for an operator
/// built from a step `rho` and a gradient with Lipschitz constant `1/beta`.
///
/// Solves `(2 eta - 1) a^2 - (eta - 2) a + (eta - 1) = 0` for its admissible root,
/// with `eta = lambda * 2 beta / (4 beta - rho)`. Result is clamped to `[0, 1)`;
/// it is zero when `rho >= 4 beta`, where the operator is no longer averaged.
pub fn critical_inertia(rho: f64, beta: f64, lambda: f64) -> f64 {
    if rho >= 4.0 * beta {
        return 0.0;
    }
    let gamma = 2.0 * beta / (4.0 * beta - rho);
    let eta = lambda * gamma;
    let alpha = if (eta - 0.5).abs() < 1e-6 {
        1.0 / 3.0
    } else {
        let discriminant = (eta - 2.0).powi(2) - 4.0 * (eta - 1.0) * (2.0 * eta - 1.0);
        (eta - 2.0 + discriminant.max(0.0).sqrt()) / (2.0 * (2.0 * eta - 1.0))
    };
    if alpha.is_finite() {
        alpha.clamp(0.0, 1.0 - f64::EPSILON)
    } else {
        0.0
    }
}
