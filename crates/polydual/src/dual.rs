//! H-representation to V-representation via polar duality.
//!
//! Purpose
//! - `halfspace_intersection`: turn a halfspace set into the vertex set of
//!   its intersection region, by the classical polar construction. With the
//!   region recentred so an interior point sits at the origin, each facet
//!   halfspace `(n, o)` with `o < 0` becomes the dual point `-n/o`; the dual
//!   point set's convex hull has one facet per primal vertex, and that
//!   facet's hyperplane `(n_f, o_f)` maps back to the primal vertex
//!   `-n_f/o_f` (plus the recentring shift).
//!
//! Unboundedness
//! - A recentred halfspace with `o >= 0` has its boundary passing through or
//!   beyond the interior point: the region extends to infinity on that side
//!   and the dual point does not exist. Likewise a dual facet with
//!   `o_f >= 0` corresponds to a primal "vertex at infinity". Both are
//!   reported as unboundedness, never as failure; the finite vertices are
//!   still returned.

use nalgebra::DVector;

use crate::feasible::{feasible_point, normalized_with_dim, prune_redundant};
use crate::hull::{ConvexHull, HullError, HullOracle, QuickHull};
use crate::qp::QpSolver;
use crate::types::Halfspace;
use crate::Error;

/// Outcome of evaluating a halfspace intersection.
#[derive(Clone, Debug)]
pub enum Intersection {
    /// No feasible point: the intersection has no interior.
    Empty,
    /// The region extends to infinity; only its finite vertices are listed
    /// (possibly none).
    Unbounded {
        vertices: Vec<DVector<f64>>,
        interior_point: DVector<f64>,
    },
    /// A bounded region with at least `d + 1` vertices.
    Bounded {
        vertices: Vec<DVector<f64>>,
        interior_point: DVector<f64>,
    },
}

/// Enumerate the vertices of `∩ { n_i·x + o_i <= 0 }`.
///
/// `interior_point`, when given, must be strictly inside the region; when
/// absent the feasibility solver finds one (and its failure classifies the
/// region as empty).
pub fn halfspace_intersection(
    halfspaces: &[Halfspace],
    interior_point: Option<DVector<f64>>,
    dim: usize,
    dist_tol: f64,
    merge_tol: f64,
    oracle: &dyn HullOracle,
    qp: &dyn QpSolver,
) -> Result<Intersection, Error> {
    let data = normalized_with_dim(halfspaces, dim)?;
    let ip = match interior_point {
        Some(p) => p,
        None => match feasible_point(halfspaces, dim, dist_tol, true, qp)? {
            Some(p) => p,
            None => return Ok(Intersection::Empty),
        },
    };
    // Implied constraints produce dual points interior to the dual hull at
    // best and degenerate duplicates at worst; drop them up front.
    let data = prune_redundant(&data, &ip, dist_tol, qp)?;

    // Recenter at the interior point and collect the finite dual points.
    let mut bounded = true;
    let mut dual_points: Vec<DVector<f64>> = Vec::with_capacity(data.len());
    for h in &data {
        let o = h.offset + h.normal.dot(&ip);
        if o >= 0.0 {
            bounded = false;
        } else {
            dual_points.push(-&h.normal / o);
        }
    }
    if dual_points.len() < dim + 1 {
        // Too few facets to close the region in any orientation.
        return Ok(Intersection::Unbounded {
            vertices: vec![],
            interior_point: ip,
        });
    }

    // Merged facets, not simplicial: a primal vertex incident to more than
    // `d` facets is a dual facet with more than `d` vertices, and
    // triangulating it would map the same primal vertex back once per
    // triangle.
    let dual_hull = match ConvexHull::from_points(oracle, &dual_points, dim, false, merge_tol) {
        Ok(hull) => hull,
        // A degenerate dual point set means the primal facet normals do not
        // positively span R^d; the region is open in some direction.
        Err(HullError::Degenerate) | Err(HullError::TooFewPoints) => {
            return Ok(Intersection::Unbounded {
                vertices: vec![],
                interior_point: ip,
            })
        }
        Err(e) => return Err(Error::Hull(e)),
    };

    // Dual facets map back to primal vertices.
    let mut vertices = Vec::with_capacity(dual_hull.halfspaces.len());
    for h in &dual_hull.halfspaces {
        if h.offset < 0.0 {
            vertices.push(-&h.normal / h.offset + &ip);
        } else {
            bounded = false;
        }
    }

    if bounded {
        Ok(Intersection::Bounded {
            vertices,
            interior_point: ip,
        })
    } else {
        Ok(Intersection::Unbounded {
            vertices,
            interior_point: ip,
        })
    }
}

/// `halfspace_intersection` with the crate's shipped oracle.
pub fn halfspace_intersection_default(
    halfspaces: &[Halfspace],
    interior_point: Option<DVector<f64>>,
    dim: usize,
    dist_tol: f64,
    merge_tol: f64,
    qp: &dyn QpSolver,
) -> Result<Intersection, Error> {
    halfspace_intersection(
        halfspaces,
        interior_point,
        dim,
        dist_tol,
        merge_tol,
        &QuickHull,
        qp,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qp::GoldfarbIdnani;
    use nalgebra::dvector;

    fn qp() -> GoldfarbIdnani {
        GoldfarbIdnani::default()
    }

    fn square() -> Vec<Halfspace> {
        vec![
            Halfspace::new(dvector![1.0, 0.0], -1.0),
            Halfspace::new(dvector![-1.0, 0.0], -1.0),
            Halfspace::new(dvector![0.0, 1.0], -1.0),
            Halfspace::new(dvector![0.0, -1.0], -1.0),
        ]
    }

    fn has_vertex(vertices: &[DVector<f64>], v: &DVector<f64>) -> bool {
        vertices.iter().any(|w| (w - v).norm() < 1e-6)
    }

    #[test]
    fn square_vertices_from_halfspaces() {
        let res =
            halfspace_intersection_default(&square(), None, 2, 1e-9, 0.0, &qp()).unwrap();
        let vertices = match res {
            Intersection::Bounded { vertices, .. } => vertices,
            other => panic!("expected bounded, got {other:?}"),
        };
        assert_eq!(vertices.len(), 4);
        for corner in [
            dvector![1.0, 1.0],
            dvector![1.0, -1.0],
            dvector![-1.0, 1.0],
            dvector![-1.0, -1.0],
        ] {
            assert!(has_vertex(&vertices, &corner));
        }
    }

    #[test]
    fn known_interior_point_is_honored() {
        // An off-center interior point must give the same vertex set.
        let ip = dvector![0.25, -0.5];
        let res =
            halfspace_intersection_default(&square(), Some(ip), 2, 1e-9, 0.0, &qp()).unwrap();
        let vertices = match res {
            Intersection::Bounded { vertices, .. } => vertices,
            other => panic!("expected bounded, got {other:?}"),
        };
        assert_eq!(vertices.len(), 4);
        assert!(has_vertex(&vertices, &dvector![-1.0, -1.0]));
    }

    #[test]
    fn empty_intersection() {
        let hs = vec![
            Halfspace::new(dvector![1.0, 0.0], 1.0),  // x <= -1
            Halfspace::new(dvector![-1.0, 0.0], 1.0), // x >= 1
        ];
        let res = halfspace_intersection_default(&hs, None, 2, 1e-9, 0.0, &qp()).unwrap();
        assert!(matches!(res, Intersection::Empty));
    }

    #[test]
    fn slab_is_unbounded() {
        // -1 <= x <= 1 with y free.
        let hs = vec![
            Halfspace::new(dvector![1.0, 0.0], -1.0),
            Halfspace::new(dvector![-1.0, 0.0], -1.0),
        ];
        let res = halfspace_intersection_default(&hs, None, 2, 1e-9, 0.0, &qp()).unwrap();
        assert!(matches!(res, Intersection::Unbounded { .. }));
    }

    #[test]
    fn single_halfspace_is_unbounded() {
        let hs = vec![Halfspace::new(dvector![1.0, 0.0], 0.0)];
        let res = halfspace_intersection_default(&hs, None, 2, 1e-9, 0.0, &qp()).unwrap();
        assert!(matches!(res, Intersection::Unbounded { .. }));
    }

    #[test]
    fn octahedron_vertices_are_not_duplicated() {
        // |x| + |y| + |z| <= 1: every vertex is incident to four facets, so
        // the dual hull's facets are quads that must stay merged. Triangulated
        // dual facets would map each vertex back twice.
        let mut hs = Vec::new();
        for sx in [-1.0, 1.0] {
            for sy in [-1.0, 1.0] {
                for sz in [-1.0, 1.0] {
                    hs.push(Halfspace::new(dvector![sx, sy, sz], -1.0));
                }
            }
        }
        let res = halfspace_intersection_default(&hs, None, 3, 1e-9, 0.0, &qp()).unwrap();
        let vertices = match res {
            Intersection::Bounded { vertices, .. } => vertices,
            other => panic!("expected bounded, got {other:?}"),
        };
        assert_eq!(vertices.len(), 6);
        for k in 0..3 {
            let mut plus = DVector::<f64>::zeros(3);
            plus[k] = 1.0;
            let minus = -&plus;
            assert!(has_vertex(&vertices, &plus));
            assert!(has_vertex(&vertices, &minus));
        }
    }

    #[test]
    fn tetrahedron_in_3d() {
        // x, y, z >= 0 and x + y + z <= 1.
        let hs = vec![
            Halfspace::new(dvector![-1.0, 0.0, 0.0], 0.0),
            Halfspace::new(dvector![0.0, -1.0, 0.0], 0.0),
            Halfspace::new(dvector![0.0, 0.0, -1.0], 0.0),
            Halfspace::new(dvector![1.0, 1.0, 1.0], -1.0),
        ];
        let res = halfspace_intersection_default(&hs, None, 3, 1e-9, 0.0, &qp()).unwrap();
        let (vertices, ip) = match res {
            Intersection::Bounded {
                vertices,
                interior_point,
            } => (vertices, interior_point),
            other => panic!("expected bounded, got {other:?}"),
        };
        assert_eq!(vertices.len(), 4);
        assert!(has_vertex(&vertices, &dvector![0.0, 0.0, 0.0]));
        assert!(has_vertex(&vertices, &dvector![1.0, 0.0, 0.0]));
        // The interior point really is interior.
        for h in &hs {
            assert!(h.signed_distance(&ip) < 0.0);
        }
    }
}
