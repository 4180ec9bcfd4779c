//! Color image inpainting by low-rank tensor completion.
//!
//! An `H x W x 3` image with erased pixels is recovered by minimizing the
//! weighted nuclear norms of two matrix unfoldings plus a quadratic fit to the
//! observed pixels. The problem is solved with three-operator (Davis–Yin)
//! splitting wrapped in a static or inertial Krasnoselskii–Mann iteration.

pub mod config;
pub mod convergence;
pub mod engine;
pub mod error;
pub mod image;
pub mod initial_guess;
pub mod mask;
pub mod print_image;
pub mod prox;
pub mod relaxation;
pub mod sampling;
pub mod unfold;

pub use config::SolverConfig;
pub use convergence::ConvergenceTracker;
pub use engine::{solve, Solution, SolveState, SplittingEngine};
pub use error::{Error, ErrorKind, Result};
pub use relaxation::{Mode, Relaxation};
pub use sampling::SamplingOperator;
