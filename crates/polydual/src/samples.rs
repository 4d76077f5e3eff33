//! Deterministic random inputs for tests and benchmarks.
//!
//! Purpose
//! - Small, seed-driven samplers for point clouds, rotations, and halfspace
//!   sets in runtime dimension. Every draw is a pure function of its
//!   configuration and seed, so failures replay exactly.
//!
//! Model
//! - Point clouds are uniform in an axis-aligned cube, with the cube's
//!   corners always included so the hull is full-dimensional by
//!   construction.
//! - Rotations are products of random Givens rotations over all coordinate
//!   planes; orthogonal with determinant one by construction.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Halfspace;

/// Point-cloud sampler configuration.
#[derive(Clone, Copy, Debug)]
pub struct CloudCfg {
    pub dim: usize,
    /// Interior points drawn on top of the `2^dim` cube corners.
    pub count: usize,
    /// Half-extent of the sampling cube.
    pub radius: f64,
}

impl Default for CloudCfg {
    fn default() -> Self {
        Self {
            dim: 3,
            count: 32,
            radius: 1.0,
        }
    }
}

/// Uniform cloud in `[-radius, radius]^dim`, corners included first.
pub fn draw_point_cloud(cfg: &CloudCfg, seed: u64) -> Vec<DVector<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut points = Vec::with_capacity((1 << cfg.dim) + cfg.count);
    for corner in 0..(1u32 << cfg.dim) {
        let v = DVector::from_fn(cfg.dim, |k, _| {
            if corner >> k & 1 == 1 {
                cfg.radius
            } else {
                -cfg.radius
            }
        });
        points.push(v);
    }
    for _ in 0..cfg.count {
        points.push(DVector::from_fn(cfg.dim, |_, _| {
            rng.gen_range(-cfg.radius..=cfg.radius)
        }));
    }
    points
}

/// Random rotation: compose Givens rotations with random angles over every
/// coordinate plane.
pub fn draw_rotation(dim: usize, seed: u64) -> DMatrix<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rot = DMatrix::<f64>::identity(dim, dim);
    for i in 0..dim {
        for j in (i + 1)..dim {
            let theta: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
            let (s, c) = theta.sin_cos();
            let mut plane = DMatrix::<f64>::identity(dim, dim);
            plane[(i, i)] = c;
            plane[(j, j)] = c;
            plane[(i, j)] = -s;
            plane[(j, i)] = s;
            rot = plane * rot;
        }
    }
    rot
}

/// Halfspace set tangent to the sphere of the given radius: random unit
/// normals `n`, constraints `n·x <= radius`. With enough draws the normals
/// positively span and the intersection is a bounded region around the
/// origin.
pub fn draw_tangent_halfspaces(
    dim: usize,
    count: usize,
    radius: f64,
    seed: u64,
) -> Vec<Halfspace> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(count + 2 * dim);
    // Axis-aligned box faces guarantee boundedness regardless of the draw.
    for k in 0..dim {
        let mut n = DVector::<f64>::zeros(dim);
        n[k] = 1.0;
        out.push(Halfspace::new(n.clone(), -radius));
        out.push(Halfspace::new(-n, -radius));
    }
    while out.len() < count + 2 * dim {
        let v = DVector::from_fn(dim, |_, _| rng.gen_range(-1.0..=1.0_f64));
        let norm = v.norm();
        if norm < 1e-3 {
            continue;
        }
        out.push(Halfspace::new(v / norm, -radius));
    }
    out
}
