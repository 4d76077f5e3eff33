//! Basic types shared by every component: halfspaces and tolerances.
//!
//! Purpose
//! - `Halfspace`: closed halfspace `n·x + o <= 0` in runtime dimension.
//! - `normalize_halfspaces`: unit-normal form, the precondition for any
//!   distance-vs-tolerance comparison downstream.
//!
//! Conventions
//! - Signed distance of `p` from the boundary is `n·p + o`; negative means
//!   inside. This is only a Euclidean distance once `‖n‖ = 1`.
//! - Dimension is data (`DVector`), validated at construction sites; there is
//!   no compile-time dimension specialization.

use nalgebra::DVector;

use crate::Error;

/// Closed halfspace `{ x : normal·x + offset <= 0 }` in R^d.
///
/// Invariants:
/// - `normal` is not required to be unit length on input; components that
///   compare distances against tolerances normalize first and reject
///   `‖normal‖ = 0` as a degenerate constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct Halfspace {
    pub normal: DVector<f64>,
    pub offset: f64,
}

impl Halfspace {
    #[inline]
    pub fn new(normal: DVector<f64>, offset: f64) -> Self {
        Self { normal, offset }
    }

    /// Ambient dimension.
    #[inline]
    pub fn dim(&self) -> usize {
        self.normal.len()
    }

    /// `n·p + o`; a signed Euclidean distance when `‖n‖ = 1`.
    #[inline]
    pub fn signed_distance(&self, p: &DVector<f64>) -> f64 {
        self.normal.dot(p) + self.offset
    }

    /// Membership with slack: `n·p + o <= -offset_slack`.
    #[inline]
    pub fn contains(&self, p: &DVector<f64>, offset_slack: f64) -> bool {
        self.signed_distance(p) <= -offset_slack
    }

    /// Unit-normal form `(n/‖n‖, o/‖n‖)`.
    ///
    /// Fails only for `‖n‖ = 0` (or non-finite), which signals an invalid
    /// constraint that must be rejected before use.
    pub fn normalized(&self) -> Result<Halfspace, Error> {
        let norm = self.normal.norm();
        if !norm.is_finite() || norm <= 0.0 {
            return Err(Error::DegenerateConstraint);
        }
        Ok(Halfspace {
            normal: &self.normal / norm,
            offset: self.offset / norm,
        })
    }

    /// The complementary halfspace `{ x : n·x + o >= 0 }` as `-n·x - o <= 0`.
    #[inline]
    pub fn negated(&self) -> Halfspace {
        Halfspace {
            normal: -&self.normal,
            offset: -self.offset,
        }
    }
}

/// Rescale every halfspace to unit-normal form.
///
/// Rejects the whole set on the first zero-norm normal; callers are expected
/// to filter such constraints out before building geometry from them.
pub fn normalize_halfspaces(halfspaces: &[Halfspace]) -> Result<Vec<Halfspace>, Error> {
    halfspaces.iter().map(Halfspace::normalized).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn normalization_rescales_normal_and_offset() {
        let h = Halfspace::new(dvector![3.0, 4.0], 10.0);
        let n = h.normalized().unwrap();
        assert!((n.normal.norm() - 1.0).abs() < 1e-12);
        assert!((n.offset - 2.0).abs() < 1e-12);
        // Same halfspace: signed distances scale by 1/‖n‖.
        let p = dvector![1.0, 1.0];
        assert_eq!(h.signed_distance(&p) > 0.0, n.signed_distance(&p) > 0.0);
    }

    #[test]
    fn zero_normal_is_degenerate() {
        let h = Halfspace::new(dvector![0.0, 0.0], 1.0);
        assert!(matches!(h.normalized(), Err(Error::DegenerateConstraint)));
    }

    #[test]
    fn membership_with_slack() {
        let h = Halfspace::new(dvector![1.0, 0.0], -1.0); // x <= 1
        assert!(h.contains(&dvector![0.5, 3.0], 0.0));
        assert!(!h.contains(&dvector![0.99, 0.0], 0.1));
    }
}
