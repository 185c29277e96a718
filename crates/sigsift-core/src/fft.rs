//! Radix-2 FFT primitive and window vectors.
//!
//! Iterative Cooley-Tukey with an explicit bit-reversal permutation followed
//! by in-place butterfly passes. Lengths must be powers of two; anything else
//! fails fast with a validation error rather than silently padding. Every
//! other module in the crate routes its transforms through here.
//!
//! ## Example
//!
//! ```
//! use num_complex::Complex64;
//! use sigsift_core::fft::{fft, ifft};
//!
//! let impulse = vec![
//!     Complex64::new(1.0, 0.0),
//!     Complex64::new(0.0, 0.0),
//!     Complex64::new(0.0, 0.0),
//!     Complex64::new(0.0, 0.0),
//! ];
//! let spectrum = fft(&impulse).unwrap();
//! assert!(spectrum.iter().all(|c| (c.re - 1.0).abs() < 1e-12));
//!
//! let back = ifft(&spectrum).unwrap();
//! assert!((back[0].re - 1.0).abs() < 1e-12);
//! ```

use crate::types::{SignalError, SignalResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Forward transform. The input length must be a power of two.
pub fn fft(input: &[Complex64]) -> SignalResult<Vec<Complex64>> {
    validate_fft_len(input.len())?;
    let mut buf = input.to_vec();
    fft_in_place(&mut buf, false);
    Ok(buf)
}

/// Inverse transform, scaled by 1/n so `ifft(fft(x)) == x`.
pub fn ifft(input: &[Complex64]) -> SignalResult<Vec<Complex64>> {
    validate_fft_len(input.len())?;
    let mut buf = input.to_vec();
    fft_in_place(&mut buf, true);
    Ok(buf)
}

pub(crate) fn validate_fft_len(n: usize) -> SignalResult<()> {
    if n == 0 {
        return Err(SignalError::EmptyInput { context: "fft" });
    }
    if !n.is_power_of_two() {
        return Err(SignalError::NotPowerOfTwo(n));
    }
    Ok(())
}

/// In-place transform. The length must already be validated as a power of
/// two; internal callers share this to avoid one copy per slice.
pub(crate) fn fft_in_place(buf: &mut [Complex64], inverse: bool) {
    let n = buf.len();
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            buf.swap(i, j);
        }
    }

    // Butterfly passes, doubling the sub-transform length each time.
    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let angle = sign * 2.0 * PI / len as f64;
        let w_len = Complex64::new(angle.cos(), angle.sin());
        for start in (0..n).step_by(len) {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..len / 2 {
                let a = buf[start + k];
                let b = buf[start + k + len / 2] * w;
                buf[start + k] = a + b;
                buf[start + k + len / 2] = a - b;
                w *= w_len;
            }
        }
        len <<= 1;
    }

    if inverse {
        let scale = 1.0 / n as f64;
        for v in buf.iter_mut() {
            *v *= scale;
        }
    }
}

/// Rotates a spectrum so the zero-frequency bin lands at the array center.
pub fn fft_shift<T: Clone>(spectrum: &[T]) -> Vec<T> {
    let n = spectrum.len();
    let mid = (n + 1) / 2;
    let mut out = Vec::with_capacity(n);
    out.extend_from_slice(&spectrum[mid..]);
    out.extend_from_slice(&spectrum[..mid]);
    out
}

/// Per-bin power in dB with a -200 dB floor.
pub fn power_db(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum
        .iter()
        .map(|c| 10.0 * c.norm_sqr().max(1e-20).log10())
        .collect()
}

/// Window function families used around the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Hamming,
    Hann,
    Blackman,
}

/// Periodic window coefficients of the given length.
pub fn window(kind: WindowKind, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / n as f64;
            match kind {
                WindowKind::Hamming => 0.54 - 0.46 * x.cos(),
                WindowKind::Hann => 0.5 * (1.0 - x.cos()),
                WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            }
        })
        .collect()
}
