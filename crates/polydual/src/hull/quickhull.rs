//! Incremental (quickhull-style) facet enumeration in runtime dimension.
//!
//! Purpose
//! - The shipped `HullOracle`: beneath-beyond insertion with an outside-set
//!   per facet, a horizon walk over facet adjacency, and simplicial facets.
//!   Optionally merges near-coplanar facets into general polytopal facets.
//!
//! Native identifiers
//! - Facets live in an append-only arena; deleting a facet leaves a hole, so
//!   live facet ids are *not* dense. Vertex ids are input point indices, also
//!   not dense on the hull. The adapter in `hull::mod` owns the translation
//!   to dense indices; nothing here depends on density.
//!
//! Numerics
//! - "Above" tests use an absolute threshold scaled by the input extent.
//! - Facet hyperplanes come from an SVD nullspace, oriented so a fixed
//!   interior reference point (the initial simplex centroid) is below.

use std::collections::{HashMap, HashSet};

use nalgebra::{DMatrix, DVector};

use super::{HullError, HullOracle, RawFacet, RawHull};

/// Quickhull-style enumerator; stateless apart from configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuickHull;

struct Facet {
    /// Input point indices, `dim` of them while simplicial.
    vertices: Vec<usize>,
    /// Unit outward normal of `n·x + o = 0`.
    normal: DVector<f64>,
    offset: f64,
    /// Arena keys of ridge-sharing facets.
    neighbors: Vec<usize>,
    /// Unassigned points strictly above this facet, with their heights.
    outside: Vec<(usize, f64)>,
    alive: bool,
    reverse_oriented: bool,
}

impl Facet {
    #[inline]
    fn height(&self, p: &DVector<f64>) -> f64 {
        self.normal.dot(p) + self.offset
    }
}

impl HullOracle for QuickHull {
    fn build_hull(
        &self,
        points: &[DVector<f64>],
        dim: usize,
        simplicial_facets: bool,
        merge_tol: f64,
    ) -> Result<RawHull, HullError> {
        if dim < 2 || points.iter().any(|p| p.len() != dim) {
            return Err(HullError::DimensionMismatch);
        }
        if points.len() < dim + 1 {
            return Err(HullError::TooFewPoints);
        }
        let scale = points
            .iter()
            .flat_map(|p| p.iter())
            .fold(1.0_f64, |acc, &c| acc.max(c.abs()));
        let tol = 1e-9 * scale;

        let hull = build_simplicial(points, dim, tol)?;
        let (area, volume) = measure(&hull.arena, points, &hull.interior, dim);
        log::debug!(
            "quickhull: {} live facets, area {:.6e}, volume {:.6e}",
            hull.arena.iter().filter(|f| f.alive).count(),
            area,
            volume
        );

        let facets = if simplicial_facets {
            collect_simplicial(&hull.arena)
        } else {
            merge_coplanar(&hull.arena, points, merge_tol.max(tol), dim)
        };
        let (vertex_ids, vertex_neighbor_ids) = collect_vertices(&facets);
        Ok(RawHull {
            facets,
            vertex_ids,
            vertex_neighbor_ids,
            area,
            volume,
        })
    }
}

struct SimplicialHull {
    arena: Vec<Facet>,
    interior: DVector<f64>,
}

/// Hyperplane through `dim` affinely independent points, via the SVD
/// nullspace of the edge matrix. Returns a unit normal (sign unspecified).
fn hyperplane_through(
    points: &[DVector<f64>],
    ids: &[usize],
    dim: usize,
) -> Option<(DVector<f64>, f64)> {
    let p0 = &points[ids[0]];
    let mut m = DMatrix::<f64>::zeros(dim, dim);
    for (r, &id) in ids[1..].iter().enumerate() {
        m.row_mut(r).copy_from(&(&points[id] - p0).transpose());
    }
    let svd = nalgebra::SVD::new(m, false, true);
    let v_t = svd.v_t?;
    let sv = &svd.singular_values;
    // Rank must be exactly dim - 1 (the zero row contributes nothing).
    if sv[dim - 2] <= 1e-12 * sv[0].max(1.0) {
        return None;
    }
    let n: DVector<f64> = v_t.row(dim - 1).transpose();
    let o = -n.dot(p0);
    Some((n, o))
}

/// Orientation parity of the stored cycle against the outward normal:
/// positive iff `det[n, w1-w0, ..., w_{d-1}-w0] > 0`. With the normal in the
/// leading column this is counterclockwise boundary order in 2D and the
/// right-handed `cross(e1, e2)·n > 0` convention in 3D.
fn cycle_is_outward(points: &[DVector<f64>], ids: &[usize], normal: &DVector<f64>) -> bool {
    let dim = normal.len();
    let p0 = &points[ids[0]];
    let mut m = DMatrix::<f64>::zeros(dim, dim);
    m.column_mut(0).copy_from(normal);
    for (c, &id) in ids[1..].iter().enumerate() {
        m.column_mut(c + 1).copy_from(&(&points[id] - p0));
    }
    m.determinant() > 0.0
}

/// Build a facet over `ids`, oriented away from `interior`.
fn make_facet(
    points: &[DVector<f64>],
    mut ids: Vec<usize>,
    interior: &DVector<f64>,
    dim: usize,
) -> Option<Facet> {
    let (mut n, mut o) = hyperplane_through(points, &ids, dim)?;
    if n.dot(interior) + o > 0.0 {
        n = -n;
        o = -o;
    }
    let mut reverse_oriented = false;
    if !cycle_is_outward(points, &ids, &n) {
        if dim <= 3 {
            // Reversing an edge or triangle cycle flips its orientation.
            reverse_oriented = true;
        } else {
            // In higher dimensions list reversal may be an even permutation;
            // swap one pair instead.
            ids.swap(dim - 2, dim - 1);
        }
    }
    Some(Facet {
        vertices: ids,
        normal: n,
        offset: o,
        neighbors: Vec::new(),
        outside: Vec::new(),
        alive: true,
        reverse_oriented,
    })
}

/// Greedy affinely independent seed: extreme pair on the widest coordinate,
/// then repeatedly the point farthest from the current affine span.
fn initial_simplex(points: &[DVector<f64>], dim: usize, tol: f64) -> Result<Vec<usize>, HullError> {
    let mut best_spread = -1.0;
    let mut pair = (0, 0);
    for axis in 0..dim {
        let (mut lo, mut hi) = (0, 0);
        for (i, p) in points.iter().enumerate() {
            if p[axis] < points[lo][axis] {
                lo = i;
            }
            if p[axis] > points[hi][axis] {
                hi = i;
            }
        }
        let spread = points[hi][axis] - points[lo][axis];
        if spread > best_spread {
            best_spread = spread;
            pair = (lo, hi);
        }
    }
    if best_spread <= tol {
        return Err(HullError::Degenerate);
    }
    let mut simplex = vec![pair.0, pair.1];
    let p0 = points[pair.0].clone();
    let mut basis: Vec<DVector<f64>> = vec![(&points[pair.1] - &p0).normalize()];
    while simplex.len() < dim + 1 {
        let mut best = (0usize, -1.0_f64);
        for (i, p) in points.iter().enumerate() {
            if simplex.contains(&i) {
                continue;
            }
            let mut r = p - &p0;
            for b in &basis {
                let c = b.dot(&r);
                r -= b * c;
            }
            let rn = r.norm();
            if rn > best.1 {
                best = (i, rn);
            }
        }
        if best.1 <= tol {
            return Err(HullError::Degenerate);
        }
        let mut r = &points[best.0] - &p0;
        for b in &basis {
            let c = b.dot(&r);
            r -= b * c;
        }
        basis.push(r.normalize());
        simplex.push(best.0);
    }
    Ok(simplex)
}

fn build_simplicial(
    points: &[DVector<f64>],
    dim: usize,
    tol: f64,
) -> Result<SimplicialHull, HullError> {
    let simplex = initial_simplex(points, dim, tol)?;
    let mut interior = DVector::<f64>::zeros(dim);
    for &i in &simplex {
        interior += &points[i];
    }
    interior /= simplex.len() as f64;

    let mut arena: Vec<Facet> = Vec::new();
    for skip in 0..simplex.len() {
        let ids: Vec<usize> = simplex
            .iter()
            .enumerate()
            .filter(|&(k, _)| k != skip)
            .map(|(_, &v)| v)
            .collect();
        let f = make_facet(points, ids, &interior, dim).ok_or(HullError::Degenerate)?;
        arena.push(f);
    }
    // Every pair of simplex facets shares a ridge.
    let nf = arena.len();
    for i in 0..nf {
        arena[i].neighbors = (0..nf).filter(|&j| j != i).collect();
    }

    // Assign every non-seed point to the first facet it lies above.
    for (i, p) in points.iter().enumerate() {
        if simplex.contains(&i) {
            continue;
        }
        for f in arena.iter_mut() {
            let h = f.height(p);
            if h > tol {
                f.outside.push((i, h));
                break;
            }
        }
    }

    let mut pending: Vec<usize> = (0..arena.len())
        .filter(|&fid| !arena[fid].outside.is_empty())
        .collect();
    let mut steps = 0usize;
    let step_cap = points.len() + dim + 16;
    while let Some(fid) = pending.pop() {
        if !arena[fid].alive || arena[fid].outside.is_empty() {
            continue;
        }
        steps += 1;
        if steps > step_cap {
            return Err(HullError::RoundOff);
        }
        let &(apex, _) = arena[fid]
            .outside
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or(HullError::RoundOff)?;
        let p = &points[apex];

        // Walk the visible region; record (visible, hidden) horizon pairs.
        let mut visible: HashSet<usize> = HashSet::new();
        let mut horizon: Vec<(usize, usize)> = Vec::new();
        let mut stack = vec![fid];
        visible.insert(fid);
        while let Some(v) = stack.pop() {
            for &nb in &arena[v].neighbors {
                if visible.contains(&nb) {
                    continue;
                }
                if arena[nb].height(p) > tol {
                    visible.insert(nb);
                    stack.push(nb);
                } else {
                    horizon.push((v, nb));
                }
            }
        }

        // One new facet per horizon ridge, apex attached.
        let mut new_ids: Vec<usize> = Vec::with_capacity(horizon.len());
        for &(vis, hid) in &horizon {
            let ridge: Vec<usize> = arena[vis]
                .vertices
                .iter()
                .copied()
                .filter(|v| arena[hid].vertices.contains(v))
                .collect();
            debug_assert_eq!(ridge.len(), dim - 1);
            let mut ids = ridge;
            ids.push(apex);
            let mut f = make_facet(points, ids, &interior, dim).ok_or(HullError::RoundOff)?;
            f.neighbors.push(hid);
            let new_id = arena.len();
            for nb in arena[hid].neighbors.iter_mut() {
                if *nb == vis {
                    *nb = new_id;
                }
            }
            arena.push(f);
            new_ids.push(new_id);
        }

        // Link the new facets to each other across their apex ridges.
        let mut ridge_map: HashMap<Vec<usize>, usize> = HashMap::new();
        for &nid in &new_ids {
            let verts = arena[nid].vertices.clone();
            for &w in verts.iter().filter(|&&w| w != apex) {
                let mut key: Vec<usize> = verts.iter().copied().filter(|&v| v != w).collect();
                key.sort_unstable();
                match ridge_map.remove(&key) {
                    Some(other) => {
                        arena[nid].neighbors.push(other);
                        arena[other].neighbors.push(nid);
                    }
                    None => {
                        ridge_map.insert(key, nid);
                    }
                }
            }
        }

        // Repartition the outside points of the discarded facets.
        let mut orphans: Vec<usize> = Vec::new();
        for &v in &visible {
            for (idx, _) in std::mem::take(&mut arena[v].outside) {
                if idx != apex {
                    orphans.push(idx);
                }
            }
            arena[v].alive = false;
        }
        for idx in orphans {
            let q = &points[idx];
            for &nid in &new_ids {
                let h = arena[nid].height(q);
                if h > tol {
                    arena[nid].outside.push((idx, h));
                    break;
                }
            }
        }
        for &nid in &new_ids {
            if !arena[nid].outside.is_empty() {
                pending.push(nid);
            }
        }
    }

    Ok(SimplicialHull { arena, interior })
}

/// Surface measure and enclosed volume from the simplicial facet set:
/// each facet contributes a Gram-determinant simplex measure and the volume
/// of its cone over the interior reference point.
fn measure(
    arena: &[Facet],
    points: &[DVector<f64>],
    interior: &DVector<f64>,
    dim: usize,
) -> (f64, f64) {
    let fact: f64 = (1..dim).map(|k| k as f64).product();
    let mut area = 0.0;
    let mut volume = 0.0;
    for f in arena.iter().filter(|f| f.alive) {
        let p0 = &points[f.vertices[0]];
        let mut e = DMatrix::<f64>::zeros(dim, dim - 1);
        for (c, &v) in f.vertices[1..].iter().enumerate() {
            e.column_mut(c).copy_from(&(&points[v] - p0));
        }
        let gram = e.transpose() * &e;
        let facet_area = gram.determinant().max(0.0).sqrt() / fact;
        let height = -(f.normal.dot(interior) + f.offset);
        area += facet_area;
        volume += facet_area * height / dim as f64;
    }
    (area, volume)
}

fn collect_simplicial(arena: &[Facet]) -> Vec<RawFacet> {
    arena
        .iter()
        .enumerate()
        .filter(|(_, f)| f.alive)
        .map(|(id, f)| RawFacet {
            id,
            vertex_ids: f.vertices.clone(),
            neighbor_ids: f.neighbors.clone(),
            normal: f.normal.clone(),
            offset: f.offset,
            reverse_oriented: f.reverse_oriented,
        })
        .collect()
}

/// Group near-coplanar neighboring facets and emit one polytopal facet per
/// group. Group ids are the smallest member id, so they stay valid arena
/// keys (non-dense, like the simplicial ids).
fn merge_coplanar(
    arena: &[Facet],
    points: &[DVector<f64>],
    mtol: f64,
    dim: usize,
) -> Vec<RawFacet> {
    let centroid = |f: &Facet| -> DVector<f64> {
        let mut c = DVector::<f64>::zeros(dim);
        for &v in &f.vertices {
            c += &points[v];
        }
        c / f.vertices.len() as f64
    };
    let coplanar = |a: &Facet, b: &Facet| -> bool {
        a.height(&centroid(b)).abs() <= mtol && b.height(&centroid(a)).abs() <= mtol
    };

    // Flood-fill groups over the adjacency graph.
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for seed in (0..arena.len()).filter(|&i| arena[i].alive) {
        if group_of.contains_key(&seed) {
            continue;
        }
        let g = groups.len();
        let mut members = vec![seed];
        group_of.insert(seed, g);
        let mut stack = vec![seed];
        while let Some(i) = stack.pop() {
            for &nb in &arena[i].neighbors {
                if group_of.contains_key(&nb) || !arena[nb].alive {
                    continue;
                }
                if coplanar(&arena[seed], &arena[nb]) {
                    group_of.insert(nb, g);
                    members.push(nb);
                    stack.push(nb);
                }
            }
        }
        members.sort_unstable();
        groups.push(members);
    }
    let leader: Vec<usize> = groups.iter().map(|m| m[0]).collect();

    let mut facets = Vec::with_capacity(groups.len());
    for (g, members) in groups.iter().enumerate() {
        let mut normal = DVector::<f64>::zeros(dim);
        for &m in members {
            normal += &arena[m].normal;
        }
        let normal = normal.normalize();

        let mut vertex_ids: Vec<usize> = Vec::new();
        for &m in members {
            for &v in &arena[m].vertices {
                if !vertex_ids.contains(&v) {
                    vertex_ids.push(v);
                }
            }
        }
        let mut center = DVector::<f64>::zeros(dim);
        for &v in &vertex_ids {
            center += &points[v];
        }
        center /= vertex_ids.len() as f64;
        let offset = -normal.dot(&center);
        order_facet_cycle(&mut vertex_ids, points, &normal, &center, dim);

        let mut neighbor_ids: Vec<usize> = Vec::new();
        for &m in members {
            for &nb in &arena[m].neighbors {
                let ng = leader[group_of[&nb]];
                if ng != leader[g] && !neighbor_ids.contains(&ng) {
                    neighbor_ids.push(ng);
                }
            }
        }

        facets.push(RawFacet {
            id: leader[g],
            vertex_ids,
            neighbor_ids,
            normal,
            offset,
            reverse_oriented: false,
        });
    }
    facets.sort_by_key(|f| f.id);
    facets
}

/// Order a merged facet's vertices into an outward cycle where that is
/// meaningful: counterclockwise around the outward normal for `dim == 3`,
/// along the edge tangent for `dim == 2`. Higher dimensions keep the
/// first-seen order; a polytopal cell has no canonical vertex cycle there.
fn order_facet_cycle(
    vertex_ids: &mut [usize],
    points: &[DVector<f64>],
    normal: &DVector<f64>,
    center: &DVector<f64>,
    dim: usize,
) {
    match dim {
        2 => {
            // Counterclockwise boundary direction for outward normal n.
            let t = DVector::from_vec(vec![-normal[1], normal[0]]);
            vertex_ids.sort_by(|&a, &b| {
                let ta = t.dot(&(&points[a] - center));
                let tb = t.dot(&(&points[b] - center));
                ta.total_cmp(&tb)
            });
        }
        3 => {
            // In-plane frame (u, v) with u x v = n, so ascending angle is
            // counterclockwise seen from outside.
            let seed = if normal[0].abs() < 0.9 {
                DVector::from_vec(vec![1.0, 0.0, 0.0])
            } else {
                DVector::from_vec(vec![0.0, 1.0, 0.0])
            };
            let u = (&seed - normal * normal.dot(&seed)).normalize();
            let v = DVector::from_vec(vec![
                normal[1] * u[2] - normal[2] * u[1],
                normal[2] * u[0] - normal[0] * u[2],
                normal[0] * u[1] - normal[1] * u[0],
            ]);
            vertex_ids.sort_by(|&a, &b| {
                let ra = &points[a] - center;
                let rb = &points[b] - center;
                let aa = f64::atan2(v.dot(&ra), u.dot(&ra));
                let ab = f64::atan2(v.dot(&rb), u.dot(&rb));
                aa.total_cmp(&ab)
            });
        }
        _ => {}
    }
}

fn collect_vertices(facets: &[RawFacet]) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut order: Vec<usize> = Vec::new();
    let mut neighbor: HashMap<usize, Vec<usize>> = HashMap::new();
    for f in facets {
        for &v in &f.vertex_ids {
            neighbor
                .entry(v)
                .or_insert_with(|| {
                    order.push(v);
                    Vec::new()
                })
                .push(f.id);
        }
    }
    let nbrs = order.iter().map(|v| neighbor[v].clone()).collect();
    (order, nbrs)
}
