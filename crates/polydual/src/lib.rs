//! Dual-representation convex polytopes in runtime dimension.
//!
//! A polytope is held as vertices (V-representation), as halfspaces
//! `n·x + o <= 0` (H-representation), or both. The missing side is derived
//! at construction: points through hull enumeration, halfspaces through a
//! feasibility QP plus the polar dual. `polytope::ConvexPolytope` is the
//! entry point; the other modules are its building blocks and are public
//! for callers needing finer control.
//!
//! Capabilities (hull enumeration, QP solving) sit behind traits so callers
//! can swap implementations; `hull::QuickHull` and `qp::GoldfarbIdnani` are
//! the shipped defaults.

pub mod dual;
pub mod feasible;
pub mod hull;
pub mod polytope;
pub mod qp;
pub mod samples;
pub mod types;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Input errors surfaced by the lower-level pipelines. The facade never
/// returns these; it degrades to the empty polytope instead.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// A halfspace with a zero or non-finite normal.
    #[error("degenerate halfspace constraint (zero or non-finite normal)")]
    DegenerateConstraint,
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Hull(#[from] hull::HullError),
}

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::dual::{halfspace_intersection, Intersection};
    pub use crate::feasible::{feasible_point, is_nonredundant, prune_redundant};
    pub use crate::hull::{ConvexHull, HullOracle, QuickHull};
    pub use crate::polytope::{BuildOpts, ConvexPolytope};
    pub use crate::qp::{GoldfarbIdnani, QpSolver};
    pub use crate::types::Halfspace;
    pub use nalgebra::{DMatrix, DVector};
}
