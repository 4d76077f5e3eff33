//! Interior-point search and constraint pruning over halfspace sets.
//!
//! Purpose
//! - `feasible_point`: a Chebyshev-center-style QP that finds a point
//!   maximizing its minimum signed margin to every halfspace. When the
//!   intersection is unbounded the margin maximizer runs off to infinity;
//!   a single recursive tightening pass pulls the answer back to a strictly
//!   interior point at finite distance.
//! - `is_nonredundant`: reuses the same normalize/center/precondition/QP
//!   pipeline, but aims the objective at pushing past one specific halfspace
//!   boundary. Constraints that cannot be pushed past are implied by the
//!   rest and can be dropped before hull enumeration.
//!
//! Why a regularized QP
//! - The quadratic term is the Gram matrix of the (homogeneous) constraint
//!   rows, which is rank deficient whenever there are few constraints. Its
//!   spectrum is floored at `dist_tol²` so the solver always sees a strictly
//!   convex problem; the floor only perturbs directions the constraints do
//!   not pin down.
//!
//! Problem layout (both solves)
//! - Unknowns `[x; h; s]` in R^(d+2): the point, a homogeneous coordinate
//!   pinned to 1 by the single equality constraint, and a slack margin.
//! - One inequality column per halfspace, `-n·x - o·h - s >= 0`, plus one
//!   extra column keeping `s >= 0` during redundancy tests (the margin may
//!   go negative in the feasibility solve: that is how infeasibility shows).

use nalgebra::{DMatrix, DVector};

use crate::qp::QpSolver;
use crate::types::{normalize_halfspaces, Halfspace};
use crate::Error;

/// Find a strictly feasible point of `∩ { n_i·x + o_i <= 0 }`.
///
/// Returns `Ok(None)` when the intersection is empty (or when no halfspaces
/// are given; the whole space has no meaningful interior point here).
///
/// With `force_strictly_interior`, an unbounded intersection (detected by a
/// vanishing optimal margin) triggers one tightening pass: every constraint
/// tight at the first solution is mirrored and pushed away, and the solve
/// reruns once with the bound disabled. Recursion depth is exactly one.
pub fn feasible_point(
    halfspaces: &[Halfspace],
    dim: usize,
    dist_tol: f64,
    force_strictly_interior: bool,
    qp: &dyn QpSolver,
) -> Result<Option<DVector<f64>>, Error> {
    if halfspaces.is_empty() {
        return Ok(None);
    }
    let data = normalized_with_dim(halfspaces, dim)?;
    let m = data.len();

    // Center: shift by the |offset|-weighted mean of the normals, then scale
    // offsets into [-1, 1]. Both are undone on the way out.
    let mut t = DVector::<f64>::zeros(dim);
    for h in &data {
        t += &h.normal * h.offset.abs();
    }
    t /= m as f64;
    let mut data: Vec<Halfspace> = data
        .into_iter()
        .map(|h| {
            let o = h.offset - t.dot(&h.normal);
            Halfspace::new(h.normal, o)
        })
        .collect();
    let max_abs = data.iter().fold(0.0_f64, |acc, h| acc.max(h.offset.abs()));
    let scale = if max_abs < dist_tol { 1.0 } else { 1.0 / max_abs };
    for h in &mut data {
        h.offset *= scale;
    }

    let x = match solve_margin_qp(&data, dim, dist_tol, qp) {
        Some(x) => x,
        None => return Ok(None),
    };
    let fp = x.rows(0, dim).into_owned();

    if force_strictly_interior && x[dim + 1] < dist_tol {
        // Margin ~ 0 at the optimum: the region is unbounded (or degenerate)
        // and the Chebyshev objective stalled on its tight constraints.
        let tight: Vec<usize> = (0..m)
            .filter(|&i| (data[i].normal.dot(&fp) + data[i].offset * x[dim]).abs() < dist_tol)
            .collect();
        if !tight.is_empty() {
            let push = (m - 1) as f64;
            let mut augmented = data.clone();
            for &i in &tight {
                let mut mirrored = data[i].negated();
                mirrored.offset -= push;
                augmented.push(mirrored);
            }
            let inner = feasible_point(&augmented, dim, dist_tol, false, qp)?;
            return Ok(inner.map(|p| p / scale - &t));
        }
    }

    Ok(Some(fp / scale - &t))
}

/// True iff `test` is *not* implied by `others`: some point satisfying all
/// of `others` lies at least `dist_tol` past the boundary of `test`, on the
/// violating side. `feasible` must satisfy every halfspace of `others`.
///
/// A divergent solve keeps the constraint (returns true); dropping a
/// constraint on solver failure could change the region, keeping one never
/// does.
pub fn is_nonredundant(
    test: &Halfspace,
    others: &[Halfspace],
    feasible: &DVector<f64>,
    dist_tol: f64,
    qp: &dyn QpSolver,
) -> Result<bool, Error> {
    let dim = feasible.len();
    let mut data = normalized_with_dim(others, dim)?;
    let mut test = test.normalized()?;
    if test.dim() != dim {
        return Err(Error::DimensionMismatch {
            expected: dim,
            got: test.dim(),
        });
    }

    // Recenter at the feasible point, scale offsets into [-1, 1].
    for h in &mut data {
        h.offset += feasible.dot(&h.normal);
    }
    test.offset += feasible.dot(&test.normal);
    let max_abs = data.iter().fold(0.0_f64, |acc, h| acc.max(h.offset.abs()));
    let scale = if max_abs < dist_tol { 1.0 } else { 1.0 / max_abs };
    for h in &mut data {
        h.offset *= scale;
    }
    test.offset *= scale;

    let n = dim + 2;

    // Rank-one preconditioner along the tested constraint's homogeneous row.
    let mut g = DMatrix::<f64>::zeros(n, n);
    let row = homogeneous(&test, dim);
    for r in 0..=dim {
        for c in 0..=dim {
            g[(r, c)] = row[r] * row[c];
        }
    }
    let g = floor_spectrum(g, dist_tol * dist_tol);

    // Drive n_test·x towards the violating side; penalize the slack.
    let mut g0 = DVector::<f64>::zeros(n);
    for k in 0..dim {
        g0[k] = -test.normal[k];
    }
    g0[dim + 1] = 1.0;

    let (ce, ce0) = pin_homogeneous(dim);
    let (ci, ci0) = constraint_columns(&data, dim);

    match qp.solve(&g, &g0, &ce, &ce0, &ci, &ci0) {
        Err(_) => Ok(true),
        Ok(sol) => {
            let reach = sol.x.rows(0, dim).dot(&test.normal) + test.offset;
            if !reach.is_finite() {
                return Ok(true);
            }
            Ok(reach >= dist_tol)
        }
    }
}

/// Drop every halfspace implied by the rest of the set.
///
/// Sequential: each constraint is tested against the survivors plus the not
/// yet visited ones, and removed immediately when implied. This way exact
/// duplicates lose exactly one copy instead of both.
pub fn prune_redundant(
    halfspaces: &[Halfspace],
    feasible: &DVector<f64>,
    dist_tol: f64,
    qp: &dyn QpSolver,
) -> Result<Vec<Halfspace>, Error> {
    let mut kept: Vec<Halfspace> = halfspaces.to_vec();
    let mut i = 0;
    while i < kept.len() {
        let mut others = Vec::with_capacity(kept.len() - 1);
        others.extend_from_slice(&kept[..i]);
        others.extend_from_slice(&kept[i + 1..]);
        if others.is_empty() {
            break;
        }
        if is_nonredundant(&kept[i], &others, feasible, dist_tol, qp)? {
            i += 1;
        } else {
            kept.remove(i);
        }
    }
    Ok(kept)
}

/// Margin-maximization QP over `[x; h; s]`; returns the raw solution vector
/// in the centered/scaled frame, or `None` on divergence.
fn solve_margin_qp(
    data: &[Halfspace],
    dim: usize,
    dist_tol: f64,
    qp: &dyn QpSolver,
) -> Option<DVector<f64>> {
    let n = dim + 2;

    // Gram matrix of the homogeneous constraint rows, spectrum floored.
    let mut g = DMatrix::<f64>::zeros(n, n);
    for h in data {
        let row = homogeneous(h, dim);
        for r in 0..=dim {
            for c in 0..=dim {
                g[(r, c)] += row[r] * row[c];
            }
        }
    }
    g[(dim + 1, dim + 1)] = 1.0;
    let g = floor_spectrum(g, dist_tol * dist_tol);

    // Maximize the slack margin.
    let mut g0 = DVector::<f64>::zeros(n);
    g0[dim + 1] = -1.0;

    let (ce, ce0) = pin_homogeneous(dim);
    let (ci, ci0) = constraint_columns(data, dim);

    let sol = qp.solve(&g, &g0, &ce, &ce0, &ci, &ci0).ok()?;
    if sol.x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(sol.x)
}

#[inline]
fn homogeneous(h: &Halfspace, dim: usize) -> DVector<f64> {
    let mut row = DVector::<f64>::zeros(dim + 1);
    row.rows_mut(0, dim).copy_from(&h.normal);
    row[dim] = h.offset;
    row
}

/// The single equality constraint pinning the homogeneous coordinate to 1.
fn pin_homogeneous(dim: usize) -> (DMatrix<f64>, DVector<f64>) {
    let mut ce = DMatrix::<f64>::zeros(dim + 2, 1);
    ce[(dim, 0)] = 1.0;
    let mut ce0 = DVector::<f64>::zeros(1);
    ce0[0] = -1.0;
    (ce, ce0)
}

/// One column `-n_i·x - o_i·h - s >= 0` per halfspace, plus `s >= 0`.
fn constraint_columns(data: &[Halfspace], dim: usize) -> (DMatrix<f64>, DVector<f64>) {
    let n = dim + 2;
    let m = data.len();
    let mut ci = DMatrix::<f64>::zeros(n, m + 1);
    for (i, h) in data.iter().enumerate() {
        for k in 0..dim {
            ci[(k, i)] = -h.normal[k];
        }
        ci[(dim, i)] = -h.offset;
        ci[(dim + 1, i)] = -1.0;
    }
    ci[(dim + 1, m)] = 1.0;
    let ci0 = DVector::<f64>::zeros(m + 1);
    (ci, ci0)
}

/// Symmetric PSD repair: floor the singular values at `floor` and recompose.
fn floor_spectrum(g: DMatrix<f64>, floor: f64) -> DMatrix<f64> {
    let n = g.nrows();
    let svd = nalgebra::SVD::new(g, true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        // SVD of a finite symmetric matrix does not fail; fall back to the
        // floor alone if it ever does.
        _ => return DMatrix::identity(n, n) * floor,
    };
    let s = DVector::from_iterator(n, svd.singular_values.iter().map(|&v| v.max(floor)));
    &u * DMatrix::from_diagonal(&s) * v_t
}

pub(crate) fn normalized_with_dim(
    halfspaces: &[Halfspace],
    dim: usize,
) -> Result<Vec<Halfspace>, Error> {
    for h in halfspaces {
        if h.dim() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: h.dim(),
            });
        }
    }
    normalize_halfspaces(halfspaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qp::GoldfarbIdnani;
    use nalgebra::dvector;

    fn qp() -> GoldfarbIdnani {
        GoldfarbIdnani::default()
    }

    fn unit_cube(dim: usize) -> Vec<Halfspace> {
        // -1 <= x_k <= 1 for every coordinate.
        let mut hs = Vec::new();
        for k in 0..dim {
            let mut n = DVector::<f64>::zeros(dim);
            n[k] = 1.0;
            hs.push(Halfspace::new(n.clone(), -1.0));
            hs.push(Halfspace::new(-n, -1.0));
        }
        hs
    }

    #[test]
    fn cube_center_is_found() {
        let tol = 1e-9;
        let hs = unit_cube(3);
        let p = feasible_point(&hs, 3, tol, true, &qp()).unwrap().unwrap();
        assert!(p.norm() < 1e-6);
        // Margin to every face is ~1.
        for h in &hs {
            assert!(h.signed_distance(&p) <= -(1.0 - 1e-6));
        }
    }

    #[test]
    fn empty_intersection_is_reported() {
        // x <= -1 and x >= 1.
        let hs = vec![
            Halfspace::new(dvector![1.0, 0.0], 1.0),
            Halfspace::new(dvector![-1.0, 0.0], 1.0),
        ];
        let res = feasible_point(&hs, 2, 1e-9, true, &qp()).unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn no_halfspaces_no_interior() {
        assert!(feasible_point(&[], 2, 1e-9, true, &qp()).unwrap().is_none());
    }

    #[test]
    fn unbounded_region_yields_strict_interior() {
        // Quadrant x <= 0, y <= 0: unbounded, every margin maximizer sits at
        // infinity. The tightening pass must still return a strict interior
        // point at finite distance.
        let hs = vec![
            Halfspace::new(dvector![1.0, 0.0], 0.0),
            Halfspace::new(dvector![0.0, 1.0], 0.0),
        ];
        let p = feasible_point(&hs, 2, 1e-9, true, &qp()).unwrap().unwrap();
        assert!(p.iter().all(|v| v.is_finite()));
        for h in &hs {
            assert!(h.signed_distance(&p) < -1e-9);
        }
    }

    #[test]
    fn implied_constraint_is_redundant() {
        // x <= 2 adds nothing to the unit cube.
        let hs = unit_cube(2);
        let center = dvector![0.0, 0.0];
        let test = Halfspace::new(dvector![1.0, 0.0], -2.0);
        assert!(!is_nonredundant(&test, &hs, &center, 1e-9, &qp()).unwrap());
    }

    #[test]
    fn cutting_constraint_is_kept() {
        // x + y <= 1 cuts a corner off the [-1, 1]^2 square.
        let hs = unit_cube(2);
        let center = dvector![0.0, 0.0];
        let test = Halfspace::new(dvector![1.0, 1.0], -1.0);
        assert!(is_nonredundant(&test, &hs, &center, 1e-9, &qp()).unwrap());
    }

    #[test]
    fn supporting_constraint_is_redundant() {
        // x <= 1 duplicates an existing face of the square.
        let hs = unit_cube(2);
        let center = dvector![0.0, 0.0];
        let test = Halfspace::new(dvector![1.0, 0.0], -1.0);
        assert!(!is_nonredundant(&test, &hs, &center, 1e-9, &qp()).unwrap());
    }

    #[test]
    fn pruning_keeps_facets_and_drops_implied() {
        let mut hs = unit_cube(2);
        hs.push(Halfspace::new(dvector![1.0, 0.0], -2.0)); // x <= 2, implied
        let center = dvector![0.0, 0.0];
        let kept = prune_redundant(&hs, &center, 1e-9, &qp()).unwrap();
        assert_eq!(kept.len(), 4);
        // All four cube faces survive.
        for h in unit_cube(2) {
            assert!(kept.iter().any(|k| (&k.normal - &h.normal).norm() < 1e-12
                && (k.offset - h.offset).abs() < 1e-12));
        }
    }

    #[test]
    fn pruning_duplicates_loses_one_copy() {
        let mut hs = unit_cube(2);
        hs.push(hs[0].clone());
        let center = dvector![0.0, 0.0];
        let kept = prune_redundant(&hs, &center, 1e-9, &qp()).unwrap();
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let hs = vec![Halfspace::new(dvector![1.0, 0.0, 0.0], 0.0)];
        assert!(matches!(
            feasible_point(&hs, 2, 1e-9, true, &qp()),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
