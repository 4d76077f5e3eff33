//! Hull enumeration capability and its index-remapping adapter.
//!
//! Purpose
//! - `HullOracle`: the facet-enumeration capability. The core specifies only
//!   this input/output contract; any enumerator (incremental, gift wrapping,
//!   an external binding) can stand behind it.
//! - `RawHull`: the oracle's answer in its *native* identifier space. Facet
//!   ids come from the enumerator's internal arena and carry holes from
//!   deleted facets; vertex ids are input point ids. Neither is dense.
//! - `ConvexHull::from_raw`: the adapter. Builds two max-id-sized lookup
//!   tables once per call and rewrites everything into dense 0-based indices
//!   in the oracle's traversal order. This is the only place the native id
//!   space is visible.
//!
//! Winding
//! - Facet vertex cycles in the dense output wind consistently outward. The
//!   oracle marks facets whose stored cycle is reverse-wound; the adapter
//!   reverses those.

mod quickhull;

pub use quickhull::QuickHull;

use nalgebra::DVector;

use crate::types::Halfspace;

/// Failure modes of hull enumeration. All of them surface as an empty
/// polytope at the facade, never as a panic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HullError {
    #[error("fewer than dim + 1 input points")]
    TooFewPoints,
    #[error("input points are not full-dimensional")]
    Degenerate,
    #[error("input point dimension does not match the requested dimension")]
    DimensionMismatch,
    #[error("hull enumeration failed to converge")]
    RoundOff,
}

/// One facet in the oracle's native identifier space.
#[derive(Clone, Debug)]
pub struct RawFacet {
    /// Native facet id (arena key; not dense, not stable across runs).
    pub id: usize,
    /// Native vertex ids (= input point indices), in stored cycle order.
    pub vertex_ids: Vec<usize>,
    /// Native ids of facets sharing a ridge with this one.
    pub neighbor_ids: Vec<usize>,
    /// Outward unit normal of the facet hyperplane `n·x + o = 0`.
    pub normal: DVector<f64>,
    pub offset: f64,
    /// Stored cycle winds inward; reverse it for outward orientation.
    pub reverse_oriented: bool,
}

/// Bounded hull in the oracle's native identifier space, facets and vertices
/// listed in the oracle's traversal order.
#[derive(Clone, Debug)]
pub struct RawHull {
    pub facets: Vec<RawFacet>,
    /// Native vertex ids in traversal order (first occurrence wins).
    pub vertex_ids: Vec<usize>,
    /// Per entry of `vertex_ids`: native ids of incident facets.
    pub vertex_neighbor_ids: Vec<Vec<usize>>,
    /// Total facet surface measure (perimeter in 2D, area in 3D, ...).
    pub area: f64,
    /// Enclosed d-dimensional measure.
    pub volume: f64,
}

/// Facet enumeration capability.
///
/// `points` are columns of R^dim; `simplicial_facets` requests triangulated
/// output, otherwise near-coplanar facets are merged using `merge_tol` as
/// the coplanarity threshold (an oracle may floor it at its own internal
/// scale-relative tolerance).
pub trait HullOracle {
    fn build_hull(
        &self,
        points: &[DVector<f64>],
        dim: usize,
        simplicial_facets: bool,
        merge_tol: f64,
    ) -> Result<RawHull, HullError>;
}

/// Dense, consistently wound hull: the adapter output the rest of the crate
/// works with.
#[derive(Clone, Debug)]
pub struct ConvexHull {
    /// Hull vertices (extreme points only), oracle traversal order.
    pub vertices: Vec<DVector<f64>>,
    /// One supporting halfspace per facet, `n·x + o <= 0` for the hull.
    pub halfspaces: Vec<Halfspace>,
    /// Per facet: dense vertex indices, consistently wound outward.
    pub faces: Vec<Vec<usize>>,
    /// Per vertex: dense indices of incident facets.
    pub vertex_neighbor_faces: Vec<Vec<usize>>,
    /// Per facet: dense indices of ridge-sharing facets.
    pub face_neighbor_faces: Vec<Vec<usize>>,
    /// Per vertex: index of the original input point it came from.
    pub vertex_point_indices: Vec<usize>,
    pub area: f64,
    pub volume: f64,
}

impl ConvexHull {
    /// Run the oracle and remap its native ids into dense indices.
    pub fn from_points(
        oracle: &dyn HullOracle,
        points: &[DVector<f64>],
        dim: usize,
        simplicial_facets: bool,
        merge_tol: f64,
    ) -> Result<Self, HullError> {
        let raw = oracle.build_hull(points, dim, simplicial_facets, merge_tol)?;
        Ok(Self::from_raw(points, &raw))
    }

    /// The identifier translation step: two dense lookup tables, built once.
    fn from_raw(points: &[DVector<f64>], raw: &RawHull) -> Self {
        // Native vertex id -> dense vertex index.
        let max_vid = raw.vertex_ids.iter().copied().max().unwrap_or(0);
        let mut vid_to_idx = vec![usize::MAX; max_vid + 1];
        for (k, &vid) in raw.vertex_ids.iter().enumerate() {
            vid_to_idx[vid] = k;
        }
        // Native facet id -> dense facet index.
        let max_fid = raw.facets.iter().map(|f| f.id).max().unwrap_or(0);
        let mut fid_to_idx = vec![usize::MAX; max_fid + 1];
        for (k, f) in raw.facets.iter().enumerate() {
            fid_to_idx[f.id] = k;
        }

        let vertices: Vec<DVector<f64>> = raw
            .vertex_ids
            .iter()
            .map(|&vid| points[vid].clone())
            .collect();
        let vertex_point_indices = raw.vertex_ids.clone();
        let vertex_neighbor_faces: Vec<Vec<usize>> = raw
            .vertex_neighbor_ids
            .iter()
            .map(|ids| ids.iter().map(|&fid| fid_to_idx[fid]).collect())
            .collect();

        let mut halfspaces = Vec::with_capacity(raw.facets.len());
        let mut faces = Vec::with_capacity(raw.facets.len());
        let mut face_neighbor_faces = Vec::with_capacity(raw.facets.len());
        for f in &raw.facets {
            halfspaces.push(Halfspace::new(f.normal.clone(), f.offset));
            let mut cycle: Vec<usize> = f.vertex_ids.iter().map(|&vid| vid_to_idx[vid]).collect();
            if f.reverse_oriented {
                cycle.reverse();
            }
            faces.push(cycle);
            face_neighbor_faces.push(f.neighbor_ids.iter().map(|&fid| fid_to_idx[fid]).collect());
        }

        ConvexHull {
            vertices,
            halfspaces,
            faces,
            vertex_neighbor_faces,
            face_neighbor_faces,
            vertex_point_indices,
            area: raw.area,
            volume: raw.volume,
        }
    }
}
