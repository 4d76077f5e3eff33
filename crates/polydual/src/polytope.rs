//! The convex polytope facade over both representations.
//!
//! Purpose
//! - `ConvexPolytope` owns a V-representation (vertices), an
//!   H-representation (halfspaces), or both, and derives whichever is
//!   missing at construction time: points go through the hull oracle,
//!   halfspaces through the feasibility solver and the polar dual.
//! - Construction never fails. Degenerate input collapses to the empty
//!   polytope; an unbounded intersection is a first-class outcome with
//!   infinite measures and whatever finite vertices exist. Neither of those
//!   ever carries facet/vertex topology.
//!
//! State, by field combination
//! - empty: `is_empty`, zero measures, interior point all-NaN.
//! - bounded without topology: vertices + halfspaces, adjacency arrays
//!   empty.
//! - bounded with topology: everything populated, halfspaces in hull facet
//!   order.
//! - unbounded: `is_bounded == false`, infinite measures, finite vertices
//!   only.

use nalgebra::{DMatrix, DVector};

use crate::dual::{halfspace_intersection, Intersection};
use crate::feasible::normalized_with_dim;
use crate::hull::{ConvexHull, HullOracle, QuickHull};
use crate::qp::{GoldfarbIdnani, QpSolver};
use crate::types::Halfspace;

/// Construction knobs, shared by every entry point.
#[derive(Clone, Copy, Debug)]
pub struct BuildOpts {
    /// Keep facet vertex cycles and adjacency arrays.
    pub compute_topology: bool,
    /// Triangulate facets instead of merging coplanar ones.
    pub simplicial_facets: bool,
    /// Coplanarity threshold for facet merging, forwarded to the oracle.
    pub merge_tol: f64,
    /// Distance tolerance for feasibility and boundedness predicates.
    pub dist_tol: f64,
}

impl Default for BuildOpts {
    fn default() -> Self {
        Self {
            compute_topology: false,
            simplicial_facets: false,
            merge_tol: 0.0,
            dist_tol: 1e-9,
        }
    }
}

/// A convex polytope in R^d, runtime-dimensioned.
#[derive(Clone, Debug)]
pub struct ConvexPolytope {
    dim: usize,
    is_empty: bool,
    is_bounded: bool,
    area: f64,
    volume: f64,
    vertices: Vec<DVector<f64>>,
    halfspaces: Vec<Halfspace>,
    interior_point: DVector<f64>,
    faces: Vec<Vec<usize>>,
    vertex_neighbor_faces: Vec<Vec<usize>>,
    face_neighbor_faces: Vec<Vec<usize>>,
    vertex_point_indices: Vec<usize>,
}

impl Default for ConvexPolytope {
    fn default() -> Self {
        Self::empty(2)
    }
}

impl ConvexPolytope {
    /// The empty polytope. Its halfspace set is a deliberately contradictory
    /// slab along the first axis (`x_0 <= -1` and `x_0 >= 1`), a placeholder
    /// that satisfies no point so every query behaves consistently.
    pub fn empty(dim: usize) -> Self {
        let mut lo = DVector::<f64>::zeros(dim);
        lo[0] = 1.0;
        let mut hi = DVector::<f64>::zeros(dim);
        hi[0] = -1.0;
        Self {
            dim,
            is_empty: true,
            is_bounded: true,
            area: 0.0,
            volume: 0.0,
            vertices: Vec::new(),
            halfspaces: vec![Halfspace::new(lo, 1.0), Halfspace::new(hi, 1.0)],
            interior_point: DVector::from_element(dim, f64::NAN),
            faces: Vec::new(),
            vertex_neighbor_faces: Vec::new(),
            face_neighbor_faces: Vec::new(),
            vertex_point_indices: Vec::new(),
        }
    }

    /// Hull of a point set, with the crate's shipped oracle.
    ///
    /// The shipped oracle handles `dim >= 2`; one-dimensional input degrades
    /// to the empty polytope like any other enumeration failure.
    pub fn from_points(points: &[DVector<f64>], dim: usize, opts: &BuildOpts) -> Self {
        Self::from_points_with(&QuickHull, points, dim, opts)
    }

    /// Hull of a point set with a caller-supplied oracle. Non-full-dimensional
    /// or undersized input gives the empty polytope.
    pub fn from_points_with(
        oracle: &dyn HullOracle,
        points: &[DVector<f64>],
        dim: usize,
        opts: &BuildOpts,
    ) -> Self {
        match ConvexHull::from_points(oracle, points, dim, opts.simplicial_facets, opts.merge_tol)
        {
            Ok(hull) => Self::from_hull(hull, dim, opts.compute_topology),
            Err(e) => {
                log::debug!("hull construction failed ({e}), yielding the empty polytope");
                Self::empty(dim)
            }
        }
    }

    /// Intersection of a halfspace set, with the crate's shipped oracle and
    /// QP solver.
    ///
    /// The shipped oracle handles `dim >= 2`; a one-dimensional constraint
    /// set degrades to the empty polytope.
    pub fn from_halfspaces(halfspaces: &[Halfspace], dim: usize, opts: &BuildOpts) -> Self {
        Self::from_halfspaces_with(&QuickHull, &GoldfarbIdnani::default(), halfspaces, dim, opts)
    }

    /// Intersection of a halfspace set with caller-supplied capabilities.
    pub fn from_halfspaces_with(
        oracle: &dyn HullOracle,
        qp: &dyn QpSolver,
        halfspaces: &[Halfspace],
        dim: usize,
        opts: &BuildOpts,
    ) -> Self {
        let normalized = match normalized_with_dim(halfspaces, dim) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("invalid halfspace set ({e}), yielding the empty polytope");
                return Self::empty(dim);
            }
        };
        let outcome = halfspace_intersection(
            &normalized,
            None,
            dim,
            opts.dist_tol,
            opts.merge_tol,
            oracle,
            qp,
        );
        match outcome {
            Err(e) => {
                log::debug!("halfspace intersection failed ({e}), yielding the empty polytope");
                Self::empty(dim)
            }
            Ok(Intersection::Empty) => {
                let mut p = Self::empty(dim);
                p.halfspaces = normalized;
                p
            }
            Ok(Intersection::Unbounded {
                vertices,
                interior_point,
            }) => Self {
                dim,
                is_empty: false,
                is_bounded: false,
                area: f64::INFINITY,
                volume: f64::INFINITY,
                vertices,
                halfspaces: normalized,
                interior_point,
                faces: Vec::new(),
                vertex_neighbor_faces: Vec::new(),
                face_neighbor_faces: Vec::new(),
                vertex_point_indices: Vec::new(),
            },
            Ok(Intersection::Bounded {
                vertices,
                interior_point,
            }) => {
                if opts.compute_topology {
                    // Re-hull the vertex set: facet cycles, adjacency, and a
                    // pruned halfspace set in facet order.
                    return Self::from_points_with(oracle, &vertices, dim, opts);
                }
                // No topology requested: keep the caller's halfspaces and
                // measure the region off a throwaway simplicial hull.
                match ConvexHull::from_points(oracle, &vertices, dim, true, opts.merge_tol) {
                    Ok(hull) => Self {
                        dim,
                        is_empty: false,
                        is_bounded: true,
                        area: hull.area,
                        volume: hull.volume,
                        vertices,
                        halfspaces: normalized,
                        interior_point,
                        faces: Vec::new(),
                        vertex_neighbor_faces: Vec::new(),
                        face_neighbor_faces: Vec::new(),
                        vertex_point_indices: Vec::new(),
                    },
                    Err(e) => {
                        log::debug!("measuring hull failed ({e}), yielding the empty polytope");
                        Self::empty(dim)
                    }
                }
            }
        }
    }

    fn from_hull(hull: ConvexHull, dim: usize, with_topology: bool) -> Self {
        let mut interior = DVector::<f64>::zeros(dim);
        for v in &hull.vertices {
            interior += v;
        }
        interior /= hull.vertices.len() as f64;
        Self {
            dim,
            is_empty: false,
            is_bounded: true,
            area: hull.area,
            volume: hull.volume,
            vertices: hull.vertices,
            halfspaces: hull.halfspaces,
            interior_point: interior,
            faces: if with_topology { hull.faces } else { Vec::new() },
            vertex_neighbor_faces: if with_topology {
                hull.vertex_neighbor_faces
            } else {
                Vec::new()
            },
            face_neighbor_faces: if with_topology {
                hull.face_neighbor_faces
            } else {
                Vec::new()
            },
            vertex_point_indices: if with_topology {
                hull.vertex_point_indices
            } else {
                Vec::new()
            },
        }
    }

    /// Intersection as the union of the two constraint sets; always
    /// re-enters construction from halfspaces.
    pub fn intersection_with(&self, other: &ConvexPolytope, opts: &BuildOpts) -> ConvexPolytope {
        if self.dim != other.dim {
            log::debug!(
                "intersecting polytopes of dimension {} and {}, yielding the empty polytope",
                self.dim,
                other.dim
            );
            return Self::empty(self.dim);
        }
        let mut combined = self.halfspaces.clone();
        combined.extend(other.halfspaces.iter().cloned());
        Self::from_halfspaces(&combined, self.dim, opts)
    }

    /// Rigid (or any invertible affine) motion `x -> R x + t`, in place.
    ///
    /// Vertices and the interior point map directly; a halfspace `(n, o)`
    /// maps to `(R n, o - (R n)·t)`. Topology is combinatorial and survives
    /// untouched. No-op on the empty polytope.
    pub fn transform(&mut self, rotation: &DMatrix<f64>, translation: &DVector<f64>) -> &mut Self {
        if self.is_empty {
            return self;
        }
        for v in &mut self.vertices {
            *v = rotation * &*v + translation;
        }
        self.interior_point = rotation * &self.interior_point + translation;
        for h in &mut self.halfspaces {
            let n = rotation * &h.normal;
            h.offset -= n.dot(translation);
            h.normal = n;
        }
        self
    }

    /// `transform` from a `(d+1) x (d+1)` homogeneous matrix.
    pub fn transform_homogeneous(&mut self, tf: &DMatrix<f64>) -> &mut Self {
        let d = self.dim;
        let rotation = tf.view((0, 0), (d, d)).into_owned();
        let translation: DVector<f64> = tf.view((0, d), (d, 1)).column(0).into_owned();
        self.transform(&rotation, &translation)
    }

    /// Membership with slack: inside iff every halfspace holds with margin
    /// `offset`.
    pub fn contains_point(&self, point: &DVector<f64>, offset: f64) -> bool {
        self.halfspaces.iter().all(|h| h.contains(point, offset))
    }

    /// Facets-by-points matrix of signed distances `n_i·p_j + o_i`.
    pub fn signed_distances_from_facets(&self, points: &[DVector<f64>]) -> DMatrix<f64> {
        let mut out = DMatrix::<f64>::zeros(self.halfspaces.len(), points.len());
        for (i, h) in self.halfspaces.iter().enumerate() {
            for (j, p) in points.iter().enumerate() {
                out[(i, j)] = h.signed_distance(p);
            }
        }
        out
    }

    /// Indices of the points inside the polytope (with margin `offset`).
    pub fn interior_point_indices(&self, points: &[DVector<f64>], offset: f64) -> Vec<usize> {
        (0..points.len())
            .filter(|&i| self.contains_point(&points[i], offset))
            .collect()
    }

    /// Per-point membership mask (with margin `offset`).
    pub fn interior_point_mask(&self, points: &[DVector<f64>], offset: f64) -> Vec<bool> {
        points
            .iter()
            .map(|p| self.contains_point(p, offset))
            .collect()
    }

    #[inline]
    pub fn space_dimension(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.is_empty
    }

    #[inline]
    pub fn is_bounded(&self) -> bool {
        self.is_bounded
    }

    /// Boundary measure: perimeter in 2D, surface area in 3D, and so on.
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Enclosed d-dimensional measure.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    #[inline]
    pub fn vertices(&self) -> &[DVector<f64>] {
        &self.vertices
    }

    #[inline]
    pub fn facet_hyperplanes(&self) -> &[Halfspace] {
        &self.halfspaces
    }

    /// NaN-filled for the empty polytope.
    #[inline]
    pub fn interior_point(&self) -> &DVector<f64> {
        &self.interior_point
    }

    /// Facet vertex cycles; empty unless built with topology.
    #[inline]
    pub fn facet_vertex_indices(&self) -> &[Vec<usize>] {
        &self.faces
    }

    #[inline]
    pub fn vertex_neighbor_facets(&self) -> &[Vec<usize>] {
        &self.vertex_neighbor_faces
    }

    #[inline]
    pub fn facet_neighbor_facets(&self) -> &[Vec<usize>] {
        &self.face_neighbor_faces
    }

    /// For each vertex, the index of the input point it came from; empty
    /// unless built with topology.
    #[inline]
    pub fn vertex_point_indices(&self) -> &[usize] {
        &self.vertex_point_indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn square_points() -> Vec<DVector<f64>> {
        vec![
            dvector![0.0, 0.0],
            dvector![1.0, 0.0],
            dvector![1.0, 1.0],
            dvector![0.0, 1.0],
            dvector![0.4, 0.6], // interior
        ]
    }

    fn topo_opts() -> BuildOpts {
        BuildOpts {
            compute_topology: true,
            ..BuildOpts::default()
        }
    }

    #[test]
    fn empty_polytope_contains_nothing() {
        let p = ConvexPolytope::empty(3);
        assert!(p.is_empty());
        assert!(p.is_bounded());
        assert_eq!(p.area(), 0.0);
        assert_eq!(p.volume(), 0.0);
        assert!(p.interior_point().iter().all(|v| v.is_nan()));
        assert!(!p.contains_point(&dvector![0.0, 0.0, 0.0], 0.0));
        assert_eq!(p.facet_hyperplanes().len(), 2);
    }

    #[test]
    fn from_points_satisfies_all_halfspaces() {
        let pts = square_points();
        let p = ConvexPolytope::from_points(&pts, 2, &topo_opts());
        assert!(!p.is_empty());
        assert!(p.is_bounded());
        for q in &pts {
            for h in p.facet_hyperplanes() {
                assert!(h.signed_distance(q) <= 1e-9);
            }
        }
        // Every vertex is one of the input points.
        for (v, &src) in p.vertices().iter().zip(p.vertex_point_indices()) {
            assert!((v - &pts[src]).norm() < 1e-12);
        }
        assert_relative_eq!(p.volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_points_give_empty() {
        let pts = vec![dvector![0.0, 0.0], dvector![1.0, 1.0], dvector![2.0, 2.0]];
        let p = ConvexPolytope::from_points(&pts, 2, &BuildOpts::default());
        assert!(p.is_empty());
    }

    #[test]
    fn halfspace_round_trip_recovers_vertices() {
        let pts = square_points();
        let from_pts = ConvexPolytope::from_points(&pts, 2, &topo_opts());
        let from_hs = ConvexPolytope::from_halfspaces(
            from_pts.facet_hyperplanes(),
            2,
            &topo_opts(),
        );
        assert!(!from_hs.is_empty());
        assert_eq!(from_hs.vertices().len(), from_pts.vertices().len());
        for v in from_pts.vertices() {
            assert!(from_hs.vertices().iter().any(|w| (w - v).norm() < 1e-6));
        }
        assert!((from_hs.volume() - from_pts.volume()).abs() < 1e-6);
    }

    #[test]
    fn simplex_halfspaces_are_bounded_one_sided_is_not() {
        // x, y >= 0 and x + y <= 1: normals positively span R^2.
        let simplex = vec![
            Halfspace::new(dvector![-1.0, 0.0], 0.0),
            Halfspace::new(dvector![0.0, -1.0], 0.0),
            Halfspace::new(dvector![1.0, 1.0], -1.0),
        ];
        let p = ConvexPolytope::from_halfspaces(&simplex, 2, &BuildOpts::default());
        assert!(!p.is_empty());
        assert!(p.is_bounded());

        let one_sided = vec![Halfspace::new(dvector![1.0, 0.0], 0.0)];
        let q = ConvexPolytope::from_halfspaces(&one_sided, 2, &BuildOpts::default());
        assert!(!q.is_empty());
        assert!(!q.is_bounded());
        assert!(q.volume().is_infinite());
    }

    #[test]
    fn intersection_with_halfplane_halves_the_square() {
        let square = ConvexPolytope::from_points(&square_points(), 2, &topo_opts());
        // x >= 0.5 as a single-halfspace (unbounded) polytope.
        let halfplane = ConvexPolytope::from_halfspaces(
            &[Halfspace::new(dvector![-1.0, 0.0], 0.5)],
            2,
            &BuildOpts::default(),
        );
        let cut = square.intersection_with(&halfplane, &topo_opts());
        assert!(!cut.is_empty());
        assert!(cut.is_bounded());
        assert_relative_eq!(cut.volume(), 0.5, epsilon = 1e-6);
        assert!(cut.contains_point(&dvector![0.75, 0.5], 0.0));
        assert!(!cut.contains_point(&dvector![0.25, 0.5], 0.0));
    }

    #[test]
    fn disjoint_intersection_is_empty() {
        let square = ConvexPolytope::from_points(&square_points(), 2, &topo_opts());
        let far = ConvexPolytope::from_halfspaces(
            &[Halfspace::new(dvector![-1.0, 0.0], 5.0)], // x >= 5
            2,
            &BuildOpts::default(),
        );
        let isect = square.intersection_with(&far, &BuildOpts::default());
        assert!(isect.is_empty());
    }

    #[test]
    fn identity_transform_is_idempotent() {
        let mut p = ConvexPolytope::from_points(&square_points(), 2, &topo_opts());
        let before_vertices = p.vertices().to_vec();
        let before_area = p.area();
        let before_volume = p.volume();
        p.transform(&DMatrix::identity(2, 2), &DVector::zeros(2));
        for (a, b) in p.vertices().iter().zip(&before_vertices) {
            assert!((a - b).norm() < 1e-12);
        }
        assert_relative_eq!(p.area(), before_area, epsilon = 1e-12);
        assert_relative_eq!(p.volume(), before_volume, epsilon = 1e-12);
    }

    #[test]
    fn homogeneous_transform_matches_explicit_form() {
        let rot = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 1.0, 0.0]);
        let t = dvector![3.0, 0.0];
        let mut explicit = ConvexPolytope::from_points(&square_points(), 2, &topo_opts());
        let mut homogeneous = explicit.clone();
        explicit.transform(&rot, &t);

        let mut tf = DMatrix::<f64>::identity(3, 3);
        tf.view_mut((0, 0), (2, 2)).copy_from(&rot);
        tf.view_mut((0, 2), (2, 1)).copy_from(&t);
        homogeneous.transform_homogeneous(&tf);

        for (a, b) in explicit.vertices().iter().zip(homogeneous.vertices()) {
            assert!((a - b).norm() < 1e-12);
        }
        for (a, b) in explicit
            .facet_hyperplanes()
            .iter()
            .zip(homogeneous.facet_hyperplanes())
        {
            assert!((&a.normal - &b.normal).norm() < 1e-12);
            assert!((a.offset - b.offset).abs() < 1e-12);
        }
        assert!((explicit.interior_point() - homogeneous.interior_point()).norm() < 1e-12);
    }

    #[test]
    fn one_dimensional_input_degrades_to_empty() {
        // The interval [-1, 1]; the shipped oracle starts at dim 2, so the
        // facade falls back to the empty polytope.
        let hs = vec![
            Halfspace::new(dvector![1.0], -1.0),
            Halfspace::new(dvector![-1.0], -1.0),
        ];
        let p = ConvexPolytope::from_halfspaces(&hs, 1, &BuildOpts::default());
        assert!(p.is_empty());
    }

    #[test]
    fn rigid_transform_moves_the_region() {
        let mut p = ConvexPolytope::from_points(&square_points(), 2, &topo_opts());
        // Rotate 90 degrees counterclockwise, then shift.
        let rot = DMatrix::from_row_slice(2, 2, &[0.0, -1.0, 1.0, 0.0]);
        let t = dvector![3.0, 0.0];
        p.transform(&rot, &t);
        // (0.5, 0.5) maps to (2.5, 0.5).
        assert!(p.contains_point(&dvector![2.5, 0.5], 0.0));
        assert!(!p.contains_point(&dvector![0.5, 0.5], 0.0));
        // The interior point moved along.
        assert!(p.contains_point(p.interior_point(), 0.0));
    }

    #[test]
    fn signed_distance_matrix_shape_and_sign() {
        let p = ConvexPolytope::from_points(&square_points(), 2, &topo_opts());
        let queries = vec![dvector![0.5, 0.5], dvector![2.0, 0.5]];
        let d = p.signed_distances_from_facets(&queries);
        assert_eq!(d.nrows(), p.facet_hyperplanes().len());
        assert_eq!(d.ncols(), 2);
        // Interior point: all distances negative; outside point: some
        // positive.
        assert!(d.column(0).iter().all(|&v| v < 0.0));
        assert!(d.column(1).iter().any(|&v| v > 0.0));
    }

    #[test]
    fn interior_point_queries() {
        let p = ConvexPolytope::from_points(&square_points(), 2, &BuildOpts::default());
        let queries = vec![
            dvector![0.5, 0.5],
            dvector![2.0, 2.0],
            dvector![0.99, 0.01],
        ];
        assert_eq!(p.interior_point_indices(&queries, 0.0), vec![0, 2]);
        assert_eq!(p.interior_point_mask(&queries, 0.0), vec![true, false, true]);
        // A margin excludes near-boundary points.
        assert_eq!(p.interior_point_indices(&queries, 0.1), vec![0]);
    }
}
