//! Sparse recovery of spectrally sparse signals.
//!
//! Solves y = A*x for a k-sparse x from m < n linear measurements. Four
//! solvers share the same problem shape: greedy pursuit (OMP, CoSaMP) when
//! the sparsity level is known, and l1 relaxation (coordinate-descent LASSO,
//! FISTA) when only a regularization weight is. Measurement vectors are real;
//! complex captures enter as magnitudes on the caller side.
//!
//! Key applications: sub-Nyquist spectrum reconstruction, sparse channel
//! estimation, wideband activity detection from compressive front ends.
//!
//! ## Example
//!
//! ```
//! use sigsift_core::sparse_recovery::{omp, SensingMatrix};
//!
//! // Seeded 4x8 Gaussian sensing of a 1-sparse vector.
//! let a = SensingMatrix::random_gaussian(4, 8, 1);
//! let mut x = vec![0.0; 8];
//! x[3] = 2.0;
//! let y = a.apply(&x);
//!
//! let result = omp(&a, &y, 1, 10).unwrap();
//! assert_eq!(result.support, vec![3]);
//! assert!((result.coefficients[3] - 2.0).abs() < 1e-6);
//! ```

use crate::types::{SignalError, SignalResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Entries at or below this magnitude are treated as zero when reporting
/// support sets.
const SUPPORT_EPS: f64 = 1e-10;

/// Cholesky pivots below this are clamped instead of failing, so nearly
/// dependent support columns still yield a usable estimate.
const PIVOT_FLOOR: f64 = 1e-10;

/// Residuals below this count as an exact fit for the greedy solvers.
const RESIDUAL_EPS: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Sensing matrix
// ---------------------------------------------------------------------------

/// Real m x n measurement matrix, stored flat row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensingMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl SensingMatrix {
    /// Wraps a flat row-major buffer; `data.len()` must equal `rows * cols`.
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> SignalResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(SignalError::EmptyInput {
                context: "sensing matrix",
            });
        }
        if data.len() != rows * cols {
            return Err(SignalError::DimensionMismatch {
                context: "sensing matrix",
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { data, rows, cols })
    }

    /// Builds from nested rows, validating that they are rectangular.
    pub fn from_rows(rows_in: &[Vec<f64>]) -> SignalResult<Self> {
        let rows = rows_in.len();
        if rows == 0 {
            return Err(SignalError::EmptyInput {
                context: "sensing matrix",
            });
        }
        let cols = rows_in[0].len();
        let mut data = Vec::with_capacity(rows * cols);
        for row in rows_in {
            if row.len() != cols {
                return Err(SignalError::DimensionMismatch {
                    context: "sensing matrix row",
                    expected: cols,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { data, rows, cols })
    }

    /// Seeded Gaussian matrix with unit-norm columns. Deterministic for a
    /// given seed, suitable for tests and simulated front ends.
    pub fn random_gaussian(rows: usize, cols: usize, seed: u64) -> Self {
        let mut state = seed;
        let mut data: Vec<f64> = (0..rows * cols).map(|_| lcg_gaussian(&mut state)).collect();
        for c in 0..cols {
            let norm = (0..rows)
                .map(|r| data[r * cols + c] * data[r * cols + c])
                .sum::<f64>()
                .sqrt()
                .max(1e-12);
            for r in 0..rows {
                data[r * cols + c] /= norm;
            }
        }
        Self { data, rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn column(&self, c: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, c)).collect()
    }

    /// y = A * x
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        (0..self.rows)
            .map(|r| self.row(r).iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }

    /// Aᵀ * r, the correlation of every column with a residual.
    pub fn correlate(&self, r: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.cols];
        for (row_idx, &ri) in r.iter().enumerate() {
            for (o, &a) in out.iter_mut().zip(self.row(row_idx)) {
                *o += a * ri;
            }
        }
        out
    }

    fn column_energy(&self, c: usize) -> f64 {
        (0..self.rows).map(|r| self.get(r, c) * self.get(r, c)).sum()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of a recovery run. `converged` is false when the iteration budget
/// expired before the stopping rule fired; the best estimate is still
/// returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseResult {
    /// Recovered length-n coefficient vector
    pub coefficients: Vec<f64>,
    /// Sorted indices of non-negligible coefficients
    pub support: Vec<usize>,
    /// Iterations actually run
    pub iterations: usize,
    /// Final l2 residual ||y - A*x||
    pub residual_norm: f64,
    /// Whether the stopping rule fired inside the budget
    pub converged: bool,
}

impl SparseResult {
    fn build(a: &SensingMatrix, y: &[f64], x: Vec<f64>, iterations: usize, converged: bool) -> Self {
        let residual_norm = norm2(&subtract(y, &a.apply(&x)));
        let support = support_of(&x);
        SparseResult {
            coefficients: x,
            support,
            iterations,
            residual_norm,
            converged,
        }
    }
}

fn support_of(x: &[f64]) -> Vec<usize> {
    x.iter()
        .enumerate()
        .filter(|(_, v)| v.abs() > SUPPORT_EPS)
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Greedy pursuit
// ---------------------------------------------------------------------------

/// Orthogonal Matching Pursuit.
///
/// Adds one column per iteration: the one most correlated with the current
/// residual (ties go to the lowest index), then re-solves the restricted
/// least-squares problem and updates the residual. Stops once the support
/// holds `sparsity` columns or the budget runs out.
pub fn omp(
    a: &SensingMatrix,
    y: &[f64],
    sparsity: usize,
    max_iterations: usize,
) -> SignalResult<SparseResult> {
    validate_problem(a, y)?;
    validate_sparsity(a, sparsity)?;

    let mut support: Vec<usize> = Vec::with_capacity(sparsity);
    let mut x = vec![0.0; a.cols];
    let mut residual = y.to_vec();
    let mut iterations = 0;
    let mut exact = false;

    for _ in 0..max_iterations {
        iterations += 1;
        let corr = a.correlate(&residual);
        let mut best = 0usize;
        let mut best_mag = -1.0f64;
        for (j, c) in corr.iter().enumerate() {
            if c.abs() > best_mag {
                best_mag = c.abs();
                best = j;
            }
        }
        if !support.contains(&best) {
            support.push(best);
        }

        let coeffs = solve_restricted(a, y, &support);
        x.fill(0.0);
        for (&idx, &v) in support.iter().zip(&coeffs) {
            x[idx] = v;
        }
        residual = subtract(y, &a.apply(&x));

        if norm2(&residual) < RESIDUAL_EPS {
            exact = true;
            break;
        }
        if support.len() >= sparsity {
            break;
        }
    }

    let converged = exact || support.len() >= sparsity;
    log::debug!(
        "omp finished after {iterations} iterations, support {}",
        support.len()
    );
    Ok(SparseResult::build(a, y, x, iterations, converged))
}

/// Compressive Sampling Matching Pursuit.
///
/// Per iteration: correlate to form a signal proxy, merge the strongest 2k
/// proxy coordinates with the current support, least-squares on the union,
/// keep the k largest coefficients, update the residual. Early-stops when
/// the residual drops below `tolerance`.
pub fn cosamp(
    a: &SensingMatrix,
    y: &[f64],
    sparsity: usize,
    max_iterations: usize,
    tolerance: f64,
) -> SignalResult<SparseResult> {
    validate_problem(a, y)?;
    validate_sparsity(a, sparsity)?;

    let mut x = vec![0.0; a.cols];
    let mut residual = y.to_vec();
    let mut support: Vec<usize> = Vec::new();
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..max_iterations {
        iterations += 1;
        let proxy = a.correlate(&residual);
        let mut candidates = top_indices(&proxy, 2 * sparsity);
        candidates.extend(support.iter().copied());
        candidates.sort_unstable();
        candidates.dedup();

        let coeffs = solve_restricted(a, y, &candidates);

        // Prune: keep the k largest-magnitude coefficients from the union fit.
        let mut ranked: Vec<(usize, f64)> = candidates
            .iter()
            .zip(&coeffs)
            .map(|(&idx, &v)| (idx, v))
            .collect();
        ranked.sort_by(|p, q| q.1.abs().total_cmp(&p.1.abs()));
        ranked.truncate(sparsity);

        x.fill(0.0);
        for &(idx, v) in &ranked {
            x[idx] = v;
        }
        support = ranked.iter().map(|&(idx, _)| idx).collect();
        support.sort_unstable();

        residual = subtract(y, &a.apply(&x));
        if norm2(&residual) < tolerance {
            converged = true;
            break;
        }
    }

    log::debug!("cosamp finished after {iterations} iterations, converged {converged}");
    Ok(SparseResult::build(a, y, x, iterations, converged))
}

fn top_indices(values: &[f64], count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].abs().total_cmp(&values[i].abs()));
    order.truncate(count.min(values.len()));
    order
}

// ---------------------------------------------------------------------------
// l1 relaxation
// ---------------------------------------------------------------------------

/// `signum(x) * max(|x| - tau, 0)`, the proximal operator of the l1 norm.
pub fn soft_threshold(x: f64, tau: f64) -> f64 {
    x.signum() * (x.abs() - tau).max(0.0)
}

/// LASSO objective `0.5*||y - A*x||^2 + lambda*||x||_1`.
pub fn lasso_objective(
    a: &SensingMatrix,
    y: &[f64],
    x: &[f64],
    lambda: f64,
) -> SignalResult<f64> {
    validate_problem(a, y)?;
    if x.len() != a.cols {
        return Err(SignalError::DimensionMismatch {
            context: "solution vector",
            expected: a.cols,
            actual: x.len(),
        });
    }
    Ok(objective(a, y, x, lambda))
}

fn objective(a: &SensingMatrix, y: &[f64], x: &[f64], lambda: f64) -> f64 {
    let r = subtract(y, &a.apply(x));
    0.5 * r.iter().map(|v| v * v).sum::<f64>() + lambda * x.iter().map(|v| v.abs()).sum::<f64>()
}

/// Coordinate-descent LASSO.
///
/// Precomputes the AᵀA diagonal and Aᵀy, then sweeps coordinates with
/// soft-thresholding, rebuilding the needed Gram row on the fly. Converges
/// when the l2 norm of a full sweep's step drops below `tolerance`.
pub fn lasso_cd(
    a: &SensingMatrix,
    y: &[f64],
    lambda: f64,
    max_iterations: usize,
    tolerance: f64,
) -> SignalResult<SparseResult> {
    validate_problem(a, y)?;
    validate_lambda(lambda)?;

    let n = a.cols;
    let aty = a.correlate(y);
    let diag: Vec<f64> = (0..n).map(|j| a.column_energy(j)).collect();

    let mut x = vec![0.0; n];
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..max_iterations {
        iterations += 1;
        let mut step_sq = 0.0;
        for j in 0..n {
            if diag[j] <= SUPPORT_EPS {
                continue; // dead column
            }
            let mut rho = aty[j];
            for k in 0..n {
                if k == j || x[k] == 0.0 {
                    continue;
                }
                let mut gram = 0.0;
                for r in 0..a.rows {
                    gram += a.get(r, j) * a.get(r, k);
                }
                rho -= gram * x[k];
            }
            let updated = soft_threshold(rho, lambda) / diag[j];
            let delta = updated - x[j];
            step_sq += delta * delta;
            x[j] = updated;
        }
        if step_sq.sqrt() < tolerance {
            converged = true;
            break;
        }
    }

    log::debug!("lasso_cd finished after {iterations} iterations, converged {converged}");
    Ok(SparseResult::build(a, y, x, iterations, converged))
}

/// FISTA with a monotone safeguard.
///
/// Proximal-gradient steps of size 1/L (L = largest column energy, a cheap
/// Lipschitz surrogate) accelerated by Nesterov momentum
/// `t' = (1 + sqrt(1 + 4t^2))/2`. A candidate iterate is only accepted when
/// it does not increase the LASSO objective; momentum still advances through
/// rejected candidates, so the reported objective never goes up.
pub fn fista(
    a: &SensingMatrix,
    y: &[f64],
    lambda: f64,
    max_iterations: usize,
    tolerance: f64,
) -> SignalResult<SparseResult> {
    validate_problem(a, y)?;
    validate_lambda(lambda)?;

    let n = a.cols;
    let lipschitz = (0..n)
        .map(|j| a.column_energy(j))
        .fold(0.0f64, f64::max)
        .max(1e-12);
    let step = 1.0 / lipschitz;

    let mut x = vec![0.0; n];
    let mut best_obj = objective(a, y, &x, lambda);
    let mut momentum = x.clone();
    let mut t = 1.0f64;
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..max_iterations {
        iterations += 1;

        // Gradient at the momentum point, then shrink.
        let grad = gradient(a, y, &momentum);
        let candidate: Vec<f64> = (0..n)
            .map(|j| soft_threshold(momentum[j] - step * grad[j], lambda * step))
            .collect();
        let cand_obj = objective(a, y, &candidate, lambda);

        let t_next = (1.0 + (1.0 + 4.0 * t * t).sqrt()) / 2.0;
        let previous = x.clone();
        let accepted = cand_obj <= best_obj;
        if accepted {
            x = candidate.clone();
            best_obj = cand_obj;
        }
        for j in 0..n {
            momentum[j] = candidate[j] + ((t - 1.0) / t_next) * (candidate[j] - previous[j]);
        }
        t = t_next;

        if accepted {
            let step_norm = x
                .iter()
                .zip(&previous)
                .map(|(new, old)| (new - old) * (new - old))
                .sum::<f64>()
                .sqrt();
            if step_norm < tolerance {
                converged = true;
                break;
            }
        }
    }

    log::debug!("fista finished after {iterations} iterations, converged {converged}");
    Ok(SparseResult::build(a, y, x, iterations, converged))
}

/// Aᵀ(A*z - y)
fn gradient(a: &SensingMatrix, y: &[f64], z: &[f64]) -> Vec<f64> {
    let fitted = a.apply(z);
    let diff: Vec<f64> = fitted.iter().zip(y).map(|(f, yy)| f - yy).collect();
    a.correlate(&diff)
}

// ---------------------------------------------------------------------------
// Restricted least squares
// ---------------------------------------------------------------------------

/// Least squares on the support columns through the normal equations,
/// factoring the restricted Gram matrix with Cholesky.
fn solve_restricted(a: &SensingMatrix, y: &[f64], support: &[usize]) -> Vec<f64> {
    let k = support.len();
    let mut gram = vec![0.0; k * k];
    let mut rhs = vec![0.0; k];
    for (si, &ci) in support.iter().enumerate() {
        for (sj, &cj) in support.iter().enumerate().skip(si) {
            let mut dot = 0.0;
            for r in 0..a.rows {
                dot += a.get(r, ci) * a.get(r, cj);
            }
            gram[si * k + sj] = dot;
            gram[sj * k + si] = dot;
        }
        let mut dot = 0.0;
        for r in 0..a.rows {
            dot += a.get(r, ci) * y[r];
        }
        rhs[si] = dot;
    }
    cholesky_solve(&mut gram, &rhs, k)
}

/// In-place Cholesky solve of an SPD k x k system. Pivots that collapse
/// toward zero are clamped to [`PIVOT_FLOOR`] rather than aborting.
fn cholesky_solve(gram: &mut [f64], rhs: &[f64], k: usize) -> Vec<f64> {
    for i in 0..k {
        for j in 0..=i {
            let mut sum = gram[i * k + j];
            for p in 0..j {
                sum -= gram[i * k + p] * gram[j * k + p];
            }
            if i == j {
                let mut pivot = sum;
                if pivot < PIVOT_FLOOR {
                    log::warn!("cholesky pivot {pivot:.3e} clamped to {PIVOT_FLOOR:.0e}");
                    pivot = PIVOT_FLOOR;
                }
                gram[i * k + i] = pivot.sqrt();
            } else {
                gram[i * k + j] = sum / gram[j * k + j];
            }
        }
    }

    let mut z = vec![0.0; k];
    for i in 0..k {
        let mut sum = rhs[i];
        for p in 0..i {
            sum -= gram[i * k + p] * z[p];
        }
        z[i] = sum / gram[i * k + i];
    }
    let mut x = vec![0.0; k];
    for i in (0..k).rev() {
        let mut sum = z[i];
        for p in i + 1..k {
            sum -= gram[p * k + i] * x[p];
        }
        x[i] = sum / gram[i * k + i];
    }
    x
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn validate_problem(a: &SensingMatrix, y: &[f64]) -> SignalResult<()> {
    if y.len() != a.rows {
        return Err(SignalError::DimensionMismatch {
            context: "measurement vector",
            expected: a.rows,
            actual: y.len(),
        });
    }
    Ok(())
}

fn validate_sparsity(a: &SensingMatrix, sparsity: usize) -> SignalResult<()> {
    if sparsity == 0 || sparsity > a.cols {
        return Err(SignalError::SparsityOutOfRange {
            sparsity,
            dimension: a.cols,
        });
    }
    Ok(())
}

fn validate_lambda(lambda: f64) -> SignalResult<()> {
    if !(lambda >= 0.0) {
        return Err(SignalError::InvalidParameter {
            name: "lambda",
            reason: "must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn subtract(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

fn norm2(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn lcg_next(state: &mut u64) -> f64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    (*state >> 33) as f64 / (1u64 << 31) as f64
}

fn lcg_gaussian(state: &mut u64) -> f64 {
    let u1 = lcg_next(state).max(1e-12);
    let u2 = lcg_next(state);
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sparse_vector(n: usize, entries: &[(usize, f64)]) -> Vec<f64> {
        let mut x = vec![0.0; n];
        for &(idx, v) in entries {
            x[idx] = v;
        }
        x
    }

    fn identity_matrix(n: usize) -> SensingMatrix {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        SensingMatrix::new(data, n, n).unwrap()
    }

    #[test]
    fn test_omp_exact_recovery() {
        let a = SensingMatrix::random_gaussian(32, 64, 7);
        let x_true = sparse_vector(64, &[(5, 1.5), (20, -2.0), (41, 0.75)]);
        let y = a.apply(&x_true);

        let result = omp(&a, &y, 3, 10).unwrap();
        assert!(result.converged);
        assert_eq!(result.support, vec![5, 20, 41]);
        assert!(result.residual_norm < 1e-6, "residual {}", result.residual_norm);
        for (got, want) in result.coefficients.iter().zip(&x_true) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_omp_support_never_exceeds_sparsity() {
        let a = SensingMatrix::random_gaussian(16, 40, 3);
        let x_true = sparse_vector(40, &[(1, 1.0), (8, 2.0), (30, -1.0)]);
        let y = a.apply(&x_true);

        for k in 1..=5 {
            let result = omp(&a, &y, k, 20).unwrap();
            assert!(result.support.len() <= k, "k={k}");
        }
    }

    #[test]
    fn test_omp_tie_break_prefers_lower_index() {
        // Columns 1 and 2 correlate equally with y; the scan keeps the first.
        let a = identity_matrix(4);
        let y = vec![0.0, 1.0, 1.0, 0.0];
        let result = omp(&a, &y, 1, 5).unwrap();
        assert_eq!(result.support, vec![1]);
    }

    #[test]
    fn test_cosamp_exact_recovery() {
        let a = SensingMatrix::random_gaussian(32, 64, 11);
        let x_true = sparse_vector(64, &[(2, 1.0), (17, -1.25), (50, 2.5)]);
        let y = a.apply(&x_true);

        let result = cosamp(&a, &y, 3, 30, 1e-8).unwrap();
        assert!(result.converged);
        assert!(result.support.len() <= 3);
        assert_eq!(result.support, vec![2, 17, 50]);
        for (got, want) in result.coefficients.iter().zip(&x_true) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_lasso_identity_solution() {
        // With an identity sensing matrix the minimizer is the elementwise
        // soft threshold of y.
        let a = identity_matrix(6);
        let y = vec![2.0, -1.0, 0.05, 0.0, 0.8, -0.3];
        let lambda = 0.5;
        let result = lasso_cd(&a, &y, lambda, 100, 1e-10).unwrap();
        assert!(result.converged);
        for (xi, yi) in result.coefficients.iter().zip(&y) {
            assert!((xi - soft_threshold(*yi, lambda)).abs() < 1e-8);
        }
        assert_eq!(result.support, vec![0, 1, 4]);
    }

    #[test]
    fn test_fista_identity_solution() {
        let a = identity_matrix(6);
        let y = vec![2.0, -1.0, 0.05, 0.0, 0.8, -0.3];
        let lambda = 0.5;
        let result = fista(&a, &y, lambda, 500, 1e-10).unwrap();
        assert!(result.converged);
        for (xi, yi) in result.coefficients.iter().zip(&y) {
            assert!((xi - soft_threshold(*yi, lambda)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_fista_objective_non_increasing() {
        let a = SensingMatrix::random_gaussian(16, 32, 5);
        let x_true = sparse_vector(32, &[(4, 2.0), (19, -1.0)]);
        let y = a.apply(&x_true);
        let lambda = 0.05;

        let mut previous = f64::INFINITY;
        for budget in 1..=15 {
            let result = fista(&a, &y, lambda, budget, 0.0).unwrap();
            let obj = lasso_objective(&a, &y, &result.coefficients, lambda).unwrap();
            assert!(
                obj <= previous + 1e-12,
                "objective rose at budget {budget}: {obj} > {previous}"
            );
            previous = obj;
        }
    }

    #[test]
    fn test_soft_threshold_values() {
        assert!((soft_threshold(0.5, 0.3) - 0.2).abs() < 1e-12);
        assert!((soft_threshold(-0.5, 0.3) + 0.2).abs() < 1e-12);
        assert_eq!(soft_threshold(0.2, 0.3), 0.0);
        assert_eq!(soft_threshold(0.0, 0.3), 0.0);
    }

    #[test]
    fn test_sparsity_validation() {
        let a = SensingMatrix::random_gaussian(8, 16, 1);
        let y = vec![0.0; 8];
        assert!(matches!(
            omp(&a, &y, 0, 5),
            Err(SignalError::SparsityOutOfRange { sparsity: 0, .. })
        ));
        assert!(matches!(
            cosamp(&a, &y, 17, 5, 1e-6),
            Err(SignalError::SparsityOutOfRange { sparsity: 17, .. })
        ));
    }

    #[test]
    fn test_measurement_dimension_validation() {
        let a = SensingMatrix::random_gaussian(8, 16, 1);
        let y = vec![0.0; 7];
        assert!(matches!(
            omp(&a, &y, 2, 5),
            Err(SignalError::DimensionMismatch { expected: 8, actual: 7, .. })
        ));
    }

    #[test]
    fn test_lambda_validation() {
        let a = identity_matrix(4);
        let y = vec![1.0; 4];
        assert!(lasso_cd(&a, &y, -0.1, 10, 1e-6).is_err());
        assert!(fista(&a, &y, f64::NAN, 10, 1e-6).is_err());
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = SensingMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, SignalError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_random_matrix_deterministic() {
        let a = SensingMatrix::random_gaussian(8, 12, 99);
        let b = SensingMatrix::random_gaussian(8, 12, 99);
        let c = SensingMatrix::random_gaussian(8, 12, 100);
        assert_eq!(a.data, b.data);
        assert_ne!(a.data, c.data);

        // Unit-norm columns.
        for j in 0..12 {
            assert!((a.column_energy(j) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_result_wire_names() {
        let a = identity_matrix(3);
        let y = vec![1.0, 0.0, 0.0];
        let result = omp(&a, &y, 1, 5).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"residualNorm\""));
        assert!(json.contains("\"support\""));
        assert!(json.contains("\"converged\""));
    }
}
