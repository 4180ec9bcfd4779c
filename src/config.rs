use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::relaxation::{critical_inertia, Mode};

/// Parameters of one solve.
///
/// Validated once by [`SolverConfig::validate`]; the engine refuses to start
/// with a configuration that fails validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Weight of the nuclear norm of the wide `(H, 3W)` unfolding
    pub weight_f: f64,
    /// Weight of the nuclear norm of the tall `(3H, W)` unfolding
    pub weight_g: f64,
    /// Step size
    pub rho: f64,
    /// Krasnoselskii–Mann averaging coefficient
    pub lambda: f64,
    pub mode: Mode,
    pub max_iterations: usize,
    /// Bound on the relative change of the iterate
    pub tolerance: f64,
    /// Guard added to the norm in the relative change
    pub epsilon: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            weight_f: 0.1,
            weight_g: 0.1,
            rho: 1.0,
            lambda: 0.5,
            mode: Mode::Static,
            max_iterations: 500,
            tolerance: 1e-3,
            epsilon: 1e-12,
        }
    }
}

impl SolverConfig {
    /// Reads a JSON configuration; missing fields fall back to the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: SolverConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rho > 0.0 && self.rho.is_finite()) {
            return Err(Error::invalid(
                "rho",
                format!("must be a positive finite number, got {}", self.rho),
            ));
        }
        for (name, weight) in [("weight_f", self.weight_f), ("weight_g", self.weight_g)] {
            if !(weight >= 0.0 && weight.is_finite()) {
                return Err(Error::invalid(
                    name,
                    format!("must be non-negative and finite, got {}", weight),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(Error::invalid(
                "lambda",
                format!("must lie in [0, 1], got {}", self.lambda),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::invalid("max_iterations", "must be at least 1"));
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(Error::invalid(
                "tolerance",
                format!("must be a positive finite number, got {}", self.tolerance),
            ));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(Error::invalid(
                "epsilon",
                format!("must be a positive finite number, got {}", self.epsilon),
            ));
        }
        for warning in self.warnings() {
            log::warn!("{}", warning);
        }
        Ok(())
    }

    /// Accepted settings under which convergence is no longer guaranteed.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.rho >= 2.0 {
            warnings.push(format!(
                "rho = {} is outside (0, 2); convergence is not guaranteed",
                self.rho
            ));
        }
        if self.lambda == 0.0 || self.lambda == 1.0 {
            warnings.push(format!(
                "lambda = {} is outside (0, 1); convergence is not guaranteed",
                self.lambda
            ));
        }
        if self.mode == Mode::Inertial && critical_inertia(self.rho, 1.0, self.lambda) == 0.0 {
            warnings.push(format!(
                "no inertia is admissible for rho = {}, lambda = {}; inertial mode behaves like static",
                self.rho, self.lambda
            ));
        }
        warnings
    }
}
