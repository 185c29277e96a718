//! Blind source separation for co-channel signals.
//!
//! Complex FastICA pulls statistically independent emitters out of
//! multi-channel captures, and non-negative matrix factorization splits a
//! magnitude spectrogram into additive spectral parts. Both are
//! deterministic: initial states come from an explicit seed, so a run can
//! be reproduced exactly.
//!
//! The ICA preprocessing is deliberately light. Channels are centered and
//! scaled to unit variance but not jointly decorrelated, so heavily
//! correlated mixtures separate only approximately. That trade keeps the
//! routine allocation-light and has proven adequate for the mild mixing
//! seen between nearby antenna elements.
//!
//! ## Example
//!
//! ```
//! use num_complex::Complex64;
//! use sigsift_core::source_separation::FastIca;
//! use std::f64::consts::PI;
//!
//! let s1: Vec<Complex64> = (0..256)
//!     .map(|t| Complex64::from_polar(1.0, 2.0 * PI * t as f64 / 16.0))
//!     .collect();
//! let s2: Vec<Complex64> = (0..256)
//!     .map(|t| Complex64::from_polar(1.0, 2.0 * PI * t as f64 / 4.0))
//!     .collect();
//! let x1: Vec<Complex64> = s1.iter().zip(&s2).map(|(a, b)| a + 0.2 * b).collect();
//! let x2: Vec<Complex64> = s1.iter().zip(&s2).map(|(a, b)| 0.3 * a + b).collect();
//!
//! let result = FastIca::new(2).seed(7).separate(&[x1, x2]).unwrap();
//! assert_eq!(result.sources.len(), 2);
//! assert_eq!(result.sources[0].len(), 256);
//! ```

use crate::fft::{fft_in_place, fft_shift, validate_fft_len, window, WindowKind};
use crate::types::{check_input_len, SignalError, SignalResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

const VARIANCE_FLOOR: f64 = 1e-12;
const MODULUS_FLOOR: f64 = 1e-12;
const NMF_EPS: f64 = 1e-10;

// ---------------------------------------------------------------------------
// FastICA
// ---------------------------------------------------------------------------

/// Complex FastICA with a tanh nonlinearity and symmetric Gram-Schmidt
/// re-orthonormalization.
#[derive(Debug, Clone)]
pub struct FastIca {
    num_components: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
}

impl FastIca {
    pub fn new(num_components: usize) -> Self {
        FastIca {
            num_components,
            max_iterations: 200,
            tolerance: 1e-6,
            seed: 1,
        }
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Separates `mixtures` (one inner vector per receive channel) into
    /// independent components.
    pub fn separate(&self, mixtures: &[Vec<Complex64>]) -> SignalResult<SeparationResult> {
        let channels = mixtures.len();
        if channels == 0 {
            return Err(SignalError::EmptyInput {
                context: "ica mixtures",
            });
        }
        let samples = mixtures[0].len();
        check_input_len(samples, "ica mixtures")?;
        for m in mixtures {
            if m.len() != samples {
                return Err(SignalError::DimensionMismatch {
                    context: "mixture channels",
                    expected: samples,
                    actual: m.len(),
                });
            }
        }
        if self.num_components == 0 || self.num_components > channels {
            return Err(SignalError::InvalidParameter {
                name: "num_components",
                reason: format!(
                    "must be between 1 and the channel count {channels}, got {}",
                    self.num_components
                ),
            });
        }

        // Center each channel and scale it to unit variance; the scales are
        // kept so the mixing estimate can be mapped back.
        let mut x: Vec<Vec<Complex64>> = Vec::with_capacity(channels);
        let mut scales = Vec::with_capacity(channels);
        for m in mixtures {
            let mean = m.iter().sum::<Complex64>() / samples as f64;
            let variance =
                m.iter().map(|v| (v - mean).norm_sqr()).sum::<f64>() / samples as f64;
            let std = variance.sqrt().max(VARIANCE_FLOOR);
            scales.push(std);
            x.push(m.iter().map(|v| (v - mean) / std).collect());
        }

        let mut seed = self.seed;
        let mut w: Vec<Vec<Complex64>> = (0..self.num_components)
            .map(|_| (0..channels).map(|_| lcg_complex(&mut seed)).collect())
            .collect();
        orthonormalize(&mut w);

        let k = self.num_components;
        let mut iterations = 0;
        let mut converged = false;
        let mut final_delta = f64::INFINITY;

        for _ in 0..self.max_iterations {
            iterations += 1;
            let mut w_new: Vec<Vec<Complex64>> = Vec::with_capacity(k);
            for wc in &w {
                let mut acc = vec![Complex64::new(0.0, 0.0); channels];
                let mut beta = 0.0;
                for t in 0..samples {
                    let y = project(wc, &x, t);
                    let m = y.norm();
                    let factor = if m > MODULUS_FLOOR { m.tanh() / m } else { 1.0 };
                    let g = y * factor;
                    let th = m.tanh();
                    beta += 1.0 - th * th;
                    for (a, ch) in acc.iter_mut().zip(&x) {
                        *a += ch[t] * g.conj();
                    }
                }
                beta /= samples as f64;
                let row: Vec<Complex64> = acc
                    .iter()
                    .zip(wc)
                    .map(|(a, wi)| a / samples as f64 - beta * wi)
                    .collect();
                w_new.push(row);
            }
            orthonormalize(&mut w_new);

            final_delta = w_new
                .iter()
                .zip(&w)
                .map(|(new, old)| 1.0 - dot_h(new, old).norm())
                .fold(0.0, f64::max);
            w = w_new;
            if final_delta < self.tolerance {
                converged = true;
                break;
            }
        }
        log::debug!("fastica finished after {iterations} iterations, delta {final_delta:.3e}");

        let sources: Vec<Vec<Complex64>> = w
            .iter()
            .map(|wc| (0..samples).map(|t| project(wc, &x, t)).collect())
            .collect();

        // In the scaled space the unmixing rows are orthonormal, so the
        // mixing matrix is their conjugate transpose, undone by the scales.
        let mut mixing_matrix = Vec::with_capacity(channels * k);
        for (ch, scale) in scales.iter().enumerate() {
            for wc in &w {
                mixing_matrix.push(wc[ch] * scale);
            }
        }

        Ok(SeparationResult {
            sources,
            mixing_matrix,
            num_channels: channels,
            num_components: k,
            iterations,
            converged,
            final_delta,
        })
    }
}

/// Separated components plus the estimated mixing model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparationResult {
    /// One recovered component per inner vector, unit variance, arbitrary
    /// order and phase
    pub sources: Vec<Vec<Complex64>>,
    /// Estimated mixing matrix, `num_channels` x `num_components`,
    /// row-major
    pub mixing_matrix: Vec<Complex64>,
    pub num_channels: usize,
    pub num_components: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Last orthonormal-update change, the convergence measure
    pub final_delta: f64,
}

fn project(wc: &[Complex64], x: &[Vec<Complex64>], t: usize) -> Complex64 {
    wc.iter()
        .zip(x)
        .map(|(wi, ch)| wi.conj() * ch[t])
        .sum()
}

fn dot_h(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(ai, bi)| ai * bi.conj()).sum()
}

/// Gram-Schmidt over the Hermitian inner product, in place.
fn orthonormalize(w: &mut [Vec<Complex64>]) {
    for i in 0..w.len() {
        for j in 0..i {
            let prev = w[j].clone();
            let proj = dot_h(&w[i], &prev);
            for (wi, pj) in w[i].iter_mut().zip(&prev) {
                *wi -= proj * pj;
            }
        }
        let norm = w[i].iter().map(|v| v.norm_sqr()).sum::<f64>().sqrt();
        let inv = 1.0 / norm.max(VARIANCE_FLOOR);
        for wi in w[i].iter_mut() {
            *wi *= inv;
        }
    }
}

fn lcg_complex(seed: &mut u64) -> Complex64 {
    let mut next = || {
        *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        (*seed >> 33) as f64 / (1u64 << 31) as f64 - 0.5
    };
    Complex64::new(next(), next())
}

// ---------------------------------------------------------------------------
// Non-negative matrix factorization
// ---------------------------------------------------------------------------

/// NMF by multiplicative updates, for decomposing magnitude spectrograms.
#[derive(Debug, Clone)]
pub struct Nmf {
    rank: usize,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
}

impl Nmf {
    pub fn new(rank: usize) -> Self {
        Nmf {
            rank,
            max_iterations: 200,
            tolerance: 1e-5,
            seed: 1,
        }
    }

    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    /// Stop once the relative reconstruction error improves by less than
    /// this between sweeps.
    pub fn tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Factorizes a non-negative `rows` x `cols` row-major matrix into
    /// `basis * activations`.
    pub fn factorize(&self, matrix: &[f64], rows: usize, cols: usize) -> SignalResult<NmfResult> {
        if matrix.len() != rows * cols {
            return Err(SignalError::DimensionMismatch {
                context: "nmf matrix",
                expected: rows * cols,
                actual: matrix.len(),
            });
        }
        check_input_len(matrix.len(), "nmf matrix")?;
        if self.rank == 0 || self.rank > rows.min(cols) {
            return Err(SignalError::InvalidParameter {
                name: "rank",
                reason: format!(
                    "must be between 1 and min(rows, cols) = {}, got {}",
                    rows.min(cols),
                    self.rank
                ),
            });
        }
        if matrix.iter().any(|v| *v < 0.0 || !v.is_finite()) {
            return Err(SignalError::InvalidParameter {
                name: "matrix",
                reason: "entries must be finite and non-negative".to_string(),
            });
        }

        let r = self.rank;
        let mut seed = self.seed;
        let mut uniform = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 33) as f64 / (1u64 << 31) as f64 + 0.1
        };
        let mut basis: Vec<f64> = (0..rows * r).map(|_| uniform()).collect();
        let mut activations: Vec<f64> = (0..r * cols).map(|_| uniform()).collect();

        let v_norm = matrix.iter().map(|v| v * v).sum::<f64>().sqrt().max(NMF_EPS);
        let mut error = reconstruction_error(matrix, &basis, &activations, rows, r, cols, v_norm);
        let mut iterations = 0;
        let mut converged = false;

        for _ in 0..self.max_iterations {
            iterations += 1;

            // H <- H * (W^T V) / (W^T W H)
            let wt = transpose(&basis, rows, r);
            let wt_v = matmul(&wt, r, rows, matrix, cols);
            let wt_w = matmul(&wt, r, rows, &basis, r);
            let wt_w_h = matmul(&wt_w, r, r, &activations, cols);
            for ((h, n), d) in activations.iter_mut().zip(&wt_v).zip(&wt_w_h) {
                *h *= n / (d + NMF_EPS);
            }

            // W <- W * (V H^T) / (W H H^T)
            let ht = transpose(&activations, r, cols);
            let v_ht = matmul(matrix, rows, cols, &ht, r);
            let h_ht = matmul(&activations, r, cols, &ht, r);
            let w_h_ht = matmul(&basis, rows, r, &h_ht, r);
            for ((w, n), d) in basis.iter_mut().zip(&v_ht).zip(&w_h_ht) {
                *w *= n / (d + NMF_EPS);
            }

            let next = reconstruction_error(matrix, &basis, &activations, rows, r, cols, v_norm);
            let improvement = error - next;
            error = next;
            if improvement.abs() < self.tolerance {
                converged = true;
                break;
            }
        }
        log::debug!("nmf finished after {iterations} iterations, error {error:.3e}");

        Ok(NmfResult {
            basis,
            activations,
            rows,
            cols,
            rank: r,
            iterations,
            converged,
            reconstruction_error: error,
        })
    }
}

/// An NMF factorization; `basis` is `rows` x `rank`, `activations` is
/// `rank` x `cols`, both row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NmfResult {
    pub basis: Vec<f64>,
    pub activations: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    pub rank: usize,
    pub iterations: usize,
    pub converged: bool,
    /// Relative Frobenius reconstruction error of the final factors
    pub reconstruction_error: f64,
}

fn reconstruction_error(
    v: &[f64],
    w: &[f64],
    h: &[f64],
    rows: usize,
    rank: usize,
    cols: usize,
    v_norm: f64,
) -> f64 {
    let wh = matmul(w, rows, rank, h, cols);
    let diff = v
        .iter()
        .zip(&wh)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    diff / v_norm
}

/// `a` is `ar` x `ac`, `b` is `ac` x `bc`; returns `ar` x `bc`.
fn matmul(a: &[f64], ar: usize, ac: usize, b: &[f64], bc: usize) -> Vec<f64> {
    let mut out = vec![0.0; ar * bc];
    for i in 0..ar {
        for l in 0..ac {
            let ail = a[i * ac + l];
            if ail == 0.0 {
                continue;
            }
            for j in 0..bc {
                out[i * bc + j] += ail * b[l * bc + j];
            }
        }
    }
    out
}

fn transpose(a: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = a[i * cols + j];
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Spectrogram and quality measures
// ---------------------------------------------------------------------------

/// Non-negative magnitude spectrogram, `rows` frequency bins (zero
/// frequency centered) by `cols` frames, row-major. Shaped to feed
/// [`Nmf::factorize`] directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnitudeSpectrogram {
    pub data: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
}

impl MagnitudeSpectrogram {
    pub fn get(&self, bin: usize, frame: usize) -> f64 {
        self.data[bin * self.cols + frame]
    }
}

/// Hann-windowed STFT magnitudes.
pub fn magnitude_spectrogram(
    signal: &[Complex64],
    nfft: usize,
    hop: usize,
) -> SignalResult<MagnitudeSpectrogram> {
    validate_fft_len(nfft)?;
    check_input_len(signal.len(), "spectrogram input")?;
    if hop == 0 {
        return Err(SignalError::InvalidParameter {
            name: "hop",
            reason: "must be at least 1".to_string(),
        });
    }
    if signal.len() < nfft {
        return Err(SignalError::InvalidParameter {
            name: "nfft",
            reason: format!(
                "window of {nfft} samples exceeds the {} sample signal",
                signal.len()
            ),
        });
    }

    let win = window(WindowKind::Hann, nfft);
    let frames = (signal.len() - nfft) / hop + 1;
    let mut data = vec![0.0; nfft * frames];
    for frame in 0..frames {
        let start = frame * hop;
        let mut buf: Vec<Complex64> = signal[start..start + nfft]
            .iter()
            .zip(&win)
            .map(|(c, w)| c * w)
            .collect();
        fft_in_place(&mut buf, false);
        let shifted = fft_shift(&buf);
        for (bin, c) in shifted.iter().enumerate() {
            data[bin * frames + frame] = c.norm();
        }
    }

    Ok(MagnitudeSpectrogram {
        data,
        rows: nfft,
        cols: frames,
    })
}

/// Excess kurtosis of the modulus distribution; 0 for circular Gaussian
/// noise, -1 for a constant envelope.
pub fn kurtosis(signal: &[Complex64]) -> f64 {
    if signal.is_empty() {
        return 0.0;
    }
    let n = signal.len() as f64;
    let p2 = signal.iter().map(|c| c.norm_sqr()).sum::<f64>() / n;
    if p2 < VARIANCE_FLOOR {
        return 0.0;
    }
    let p4 = signal.iter().map(|c| c.norm_sqr().powi(2)).sum::<f64>() / n;
    p4 / (p2 * p2) - 2.0
}

/// Magnitude of the normalized Hermitian inner product, 1 when the inputs
/// match up to amplitude and phase, 0 when orthogonal.
pub fn correlation(a: &[Complex64], b: &[Complex64]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }
    let inner = a[..len]
        .iter()
        .zip(&b[..len])
        .map(|(x, y)| x * y.conj())
        .sum::<Complex64>()
        .norm();
    let na = a[..len].iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    let nb = b[..len].iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    inner / (na * nb).max(VARIANCE_FLOOR)
}
