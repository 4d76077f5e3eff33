//! Strictly convex quadratic programming (dual active-set method).
//!
//! Purpose
//! - `QpSolver`: the capability the feasibility and redundancy pipelines talk
//!   to. The core never assumes a particular algorithm, only this contract.
//! - `GoldfarbIdnani`: the shipped implementation, a dual active-set method
//!   (Goldfarb & Idnani 1983). The problem layout follows the common
//!   `solve_quadprog` convention: constraints are *columns* of `CE`/`CI`.
//!
//! Problem form
//! ```text
//! min  0.5 x' G x + g0' x
//! s.t. CE' x + ce0  = 0
//!      CI' x + ci0 >= 0
//! ```
//! `G` must be symmetric positive definite; callers in this crate guarantee
//! that by flooring singular values before building `G`.
//!
//! Divergence is a deterministic failure (`Divergent`), detected from
//! non-finite iterates, an infeasible dual step, or the iteration cap. There
//! is no timeout concept.

use nalgebra::{DMatrix, DVector};

/// Result of a successful solve.
#[derive(Clone, Debug)]
pub struct QpSolution {
    pub x: DVector<f64>,
    pub objective: f64,
}

/// The solve did not converge to a finite optimum (infeasible, unbounded, or
/// numerically degenerate problem).
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("quadratic program diverged")]
pub struct Divergent;

/// Strictly convex QP capability.
///
/// Implementations must be pure functions of their inputs; the core calls
/// them from otherwise stateless pipelines.
pub trait QpSolver {
    fn solve(
        &self,
        g: &DMatrix<f64>,
        g0: &DVector<f64>,
        ce: &DMatrix<f64>,
        ce0: &DVector<f64>,
        ci: &DMatrix<f64>,
        ci0: &DVector<f64>,
    ) -> Result<QpSolution, Divergent>;
}

/// Dual active-set solver for strictly convex QPs.
#[derive(Clone, Copy, Debug)]
pub struct GoldfarbIdnani {
    /// Hard cap on outer iterations; hit => `Divergent`. The dual method
    /// terminates finitely on non-degenerate problems, so the cap only
    /// guards cycling on degenerate input.
    pub max_iter: usize,
}

impl Default for GoldfarbIdnani {
    fn default() -> Self {
        Self { max_iter: 500 }
    }
}

impl QpSolver for GoldfarbIdnani {
    fn solve(
        &self,
        g: &DMatrix<f64>,
        g0: &DVector<f64>,
        ce: &DMatrix<f64>,
        ce0: &DVector<f64>,
        ci: &DMatrix<f64>,
        ci0: &DVector<f64>,
    ) -> Result<QpSolution, Divergent> {
        solve_quadprog(g, g0, ce, ce0, ci, ci0, self.max_iter)
    }
}

#[inline]
fn hypot(a: f64, b: f64) -> f64 {
    a.hypot(b)
}

/// `d = J' np`.
#[inline]
fn compute_d(d: &mut DVector<f64>, j: &DMatrix<f64>, np: &DVector<f64>) {
    *d = j.transpose() * np;
}

/// `z = J2 d2` (step direction in primal space).
#[inline]
fn update_z(z: &mut DVector<f64>, j: &DMatrix<f64>, d: &DVector<f64>, iq: usize) {
    let n = j.nrows();
    *z = j.columns(iq, n - iq) * d.rows(iq, n - iq);
}

/// `r = R^{-1} d1` (negative step direction in dual space).
fn update_r(r_mat: &DMatrix<f64>, r: &mut DVector<f64>, d: &DVector<f64>, iq: usize) {
    // Back-substitution on the leading iq x iq upper triangle.
    for i in (0..iq).rev() {
        let mut sum = d[i];
        for k in (i + 1)..iq {
            sum -= r_mat[(i, k)] * r[k];
        }
        r[i] = sum / r_mat[(i, i)];
    }
}

/// Annihilate the trailing components of `d` with Givens rotations, carrying
/// `J` along, then append the rotated `d` as a new column of `R`.
fn add_constraint(
    r_mat: &mut DMatrix<f64>,
    j: &mut DMatrix<f64>,
    d: &mut DVector<f64>,
    iq: &mut usize,
    r_norm: &mut f64,
) -> bool {
    let n = j.nrows();
    for jj in ((*iq + 1)..n).rev() {
        let cc = d[jj - 1];
        let ss = d[jj];
        let h = hypot(cc, ss);
        if h == 0.0 {
            continue;
        }
        d[jj] = 0.0;
        let mut ss = ss / h;
        let mut cc = cc / h;
        if cc < 0.0 {
            cc = -cc;
            ss = -ss;
            d[jj - 1] = -h;
        } else {
            d[jj - 1] = h;
        }
        let xny = ss / (1.0 + cc);
        for k in 0..n {
            let t1 = j[(k, jj - 1)];
            let t2 = j[(k, jj)];
            j[(k, jj - 1)] = t1 * cc + t2 * ss;
            j[(k, jj)] = xny * (t1 + j[(k, jj - 1)]) - t2;
        }
    }
    *iq += 1;
    for i in 0..*iq {
        r_mat[(i, *iq - 1)] = d[i];
    }
    if d[*iq - 1].abs() <= f64::EPSILON * *r_norm {
        // Constraint linearly dependent on the active set.
        return false;
    }
    *r_norm = r_norm.max(d[*iq - 1].abs());
    true
}

/// Drop inequality constraint `l` from the active set, restoring the
/// triangular structure of `R` with Givens rotations.
fn delete_constraint(
    r_mat: &mut DMatrix<f64>,
    j: &mut DMatrix<f64>,
    a: &mut [i64],
    u: &mut DVector<f64>,
    p: usize,
    iq: &mut usize,
    l: i64,
) {
    let n = j.nrows();
    let mut qq = *iq; // position of l in the active set
    for i in p..*iq {
        if a[i] == l {
            qq = i;
            break;
        }
    }
    for i in qq..(*iq - 1) {
        a[i] = a[i + 1];
        u[i] = u[i + 1];
        for k in 0..n {
            r_mat[(k, i)] = r_mat[(k, i + 1)];
        }
    }
    a[*iq - 1] = 0;
    u[*iq - 1] = 0.0;
    for jj in 0..*iq {
        r_mat[(jj, *iq - 1)] = 0.0;
    }
    *iq -= 1;
    if *iq == 0 {
        return;
    }
    for jj in qq..*iq {
        let cc = r_mat[(jj, jj)];
        let ss = r_mat[(jj + 1, jj)];
        let h = hypot(cc, ss);
        if h == 0.0 {
            continue;
        }
        let mut cc = cc / h;
        let mut ss = ss / h;
        r_mat[(jj + 1, jj)] = 0.0;
        if cc < 0.0 {
            r_mat[(jj, jj)] = -h;
            cc = -cc;
            ss = -ss;
        } else {
            r_mat[(jj, jj)] = h;
        }
        let xny = ss / (1.0 + cc);
        for k in (jj + 1)..*iq {
            let t1 = r_mat[(jj, k)];
            let t2 = r_mat[(jj + 1, k)];
            r_mat[(jj, k)] = t1 * cc + t2 * ss;
            r_mat[(jj + 1, k)] = xny * (t1 + r_mat[(jj, k)]) - t2;
        }
        for k in 0..n {
            let t1 = j[(k, jj)];
            let t2 = j[(k, jj + 1)];
            j[(k, jj)] = t1 * cc + t2 * ss;
            j[(k, jj + 1)] = xny * (j[(k, jj)] + t1) - t2;
        }
    }
}

fn solve_quadprog(
    g: &DMatrix<f64>,
    g0: &DVector<f64>,
    ce: &DMatrix<f64>,
    ce0: &DVector<f64>,
    ci: &DMatrix<f64>,
    ci0: &DVector<f64>,
    max_iter: usize,
) -> Result<QpSolution, Divergent> {
    let n = g0.len();
    let me = ce0.len();
    let mi = ci0.len();
    debug_assert_eq!(g.nrows(), n);
    debug_assert_eq!(g.ncols(), n);
    debug_assert_eq!(ce.nrows(), n);
    debug_assert_eq!(ci.nrows(), n);

    let c1 = g.trace();
    let chol = nalgebra::Cholesky::new(g.clone()).ok_or(Divergent)?;

    // J = L^{-T}: solve L' J = I by back-substitution.
    let lt = chol.l().transpose();
    let mut j_mat = DMatrix::<f64>::identity(n, n);
    for col in 0..n {
        let mut jc = j_mat.column_mut(col);
        for i in (0..n).rev() {
            let mut sum = jc[i];
            for k in (i + 1)..n {
                sum -= lt[(i, k)] * jc[k];
            }
            jc[i] = sum / lt[(i, i)];
        }
    }
    let c2 = j_mat.trace();

    let mut r_mat = DMatrix::<f64>::zeros(n, n);
    let mut r_norm = 1.0_f64;

    // Unconstrained minimizer x = -G^{-1} g0 (feasible in the dual space).
    let mut x = -chol.solve(g0);
    let mut f_value = 0.5 * g0.dot(&x);

    let mut d = DVector::<f64>::zeros(n);
    let mut z = DVector::<f64>::zeros(n);
    let mut np = DVector::<f64>::zeros(n);
    let mut s = DVector::<f64>::zeros(mi);
    let mut r = DVector::<f64>::zeros(mi + me);
    let mut u = DVector::<f64>::zeros(mi + me);
    let mut a = vec![0_i64; mi + me];
    let mut iai = vec![0_i64; mi];
    let mut iaexcl = vec![true; mi];
    let mut iq = 0usize;

    // Add equality constraints with full steps.
    for i in 0..me {
        np.copy_from(&ce.column(i));
        compute_d(&mut d, &j_mat, &np);
        update_z(&mut z, &j_mat, &d, iq);
        update_r(&r_mat, &mut r, &d, iq);

        let zz = z.dot(&z);
        let t2 = if zz.abs() > f64::EPSILON {
            (-np.dot(&x) - ce0[i]) / z.dot(&np)
        } else {
            0.0
        };
        x += &z * t2;
        u[iq] = t2;
        for k in 0..iq {
            u[k] -= t2 * r[k];
        }
        f_value += 0.5 * t2 * t2 * z.dot(&np);
        a[i] = -(i as i64) - 1;
        if !add_constraint(&mut r_mat, &mut j_mat, &mut d, &mut iq, &mut r_norm) {
            // Linearly dependent equality constraints.
            return Err(Divergent);
        }
    }

    for (i, v) in iai.iter_mut().enumerate() {
        *v = i as i64;
    }

    let mut u_old = DVector::<f64>::zeros(mi + me);
    let mut a_old = vec![0_i64; mi + me];
    let mut x_old = DVector::<f64>::zeros(n);

    let mut iter = 0usize;
    'outer: loop {
        iter += 1;
        if iter > max_iter {
            log::debug!("qp: iteration cap {max_iter} hit, reporting divergence");
            return Err(Divergent);
        }
        for i in me..iq {
            let ip = a[i];
            if ip >= 0 {
                iai[ip as usize] = -1;
            }
        }
        // Violations s(x) = CI' x + ci0 over inactive constraints.
        let mut psi = 0.0;
        for i in 0..mi {
            iaexcl[i] = true;
            let sum = ci.column(i).dot(&x) + ci0[i];
            s[i] = sum;
            psi += sum.min(0.0);
        }
        if psi.abs() <= mi as f64 * f64::EPSILON * c1 * c2 * 100.0 {
            if !f_value.is_finite() || x.iter().any(|v| !v.is_finite()) {
                return Err(Divergent);
            }
            return Ok(QpSolution {
                x,
                objective: f_value,
            });
        }
        for k in 0..iq {
            u_old[k] = u[k];
            a_old[k] = a[k];
        }
        x_old.copy_from(&x);

        let mut ss = 0.0_f64;
        let mut ip = 0usize;
        'refresh: loop {
            // Most violated constraint among the admissible ones.
            for i in 0..mi {
                if s[i] < ss && iai[i] != -1 && iaexcl[i] {
                    ss = s[i];
                    ip = i;
                }
            }
            if ss >= 0.0 {
                if !f_value.is_finite() || x.iter().any(|v| !v.is_finite()) {
                    return Err(Divergent);
                }
                return Ok(QpSolution {
                    x,
                    objective: f_value,
                });
            }
            np.copy_from(&ci.column(ip));
            u[iq] = 0.0;
            a[iq] = ip as i64;

            loop {
                // Step direction in primal (z) and dual (r) space.
                compute_d(&mut d, &j_mat, &np);
                update_z(&mut z, &j_mat, &d, iq);
                update_r(&r_mat, &mut r, &d, iq);

                // Partial step length t1: largest dual-feasible step.
                let mut t1 = f64::INFINITY;
                let mut l = 0_i64;
                for k in me..iq {
                    if r[k] > 0.0 {
                        let tmp = u[k] / r[k];
                        if tmp < t1 {
                            t1 = tmp;
                            l = a[k];
                        }
                    }
                }
                // Full step length t2: step making constraint ip feasible.
                let t2 = if z.dot(&z).abs() > f64::EPSILON {
                    -s[ip] / z.dot(&np)
                } else {
                    f64::INFINITY
                };
                let t = t1.min(t2);
                if t >= f64::INFINITY {
                    // No step in primal or dual space: QP infeasible.
                    return Err(Divergent);
                }
                if t2 >= f64::INFINITY {
                    // Step in dual space only: drop the blocking constraint.
                    for k in 0..iq {
                        u[k] -= t * r[k];
                    }
                    u[iq] += t;
                    iai[l as usize] = l;
                    delete_constraint(&mut r_mat, &mut j_mat, &mut a, &mut u, me, &mut iq, l);
                    continue;
                }
                // Step in both spaces.
                x += &z * t;
                f_value += t * z.dot(&np) * (0.5 * t + u[iq]);
                for k in 0..iq {
                    u[k] -= t * r[k];
                }
                u[iq] += t;

                if t == t2 {
                    // Full step: activate constraint ip.
                    if add_constraint(&mut r_mat, &mut j_mat, &mut d, &mut iq, &mut r_norm) {
                        iai[ip] = -1;
                        continue 'outer;
                    }
                    // Degenerate: exclude ip, roll back, pick another pair.
                    iaexcl[ip] = false;
                    delete_constraint(
                        &mut r_mat, &mut j_mat, &mut a, &mut u, me, &mut iq, ip as i64,
                    );
                    for (i, v) in iai.iter_mut().enumerate() {
                        *v = i as i64;
                    }
                    for i in 0..iq {
                        a[i] = a_old[i];
                        u[i] = u_old[i];
                        if a[i] >= 0 {
                            iai[a[i] as usize] = -1;
                        }
                    }
                    x.copy_from(&x_old);
                    continue 'refresh;
                }
                // Partial step: drop the blocking constraint and retry ip.
                iai[l as usize] = l;
                delete_constraint(&mut r_mat, &mut j_mat, &mut a, &mut u, me, &mut iq, l);
                s[ip] = ci.column(ip).dot(&x) + ci0[ip];
            }
        }
    }
}
