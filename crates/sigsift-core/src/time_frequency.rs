//! Quadratic time-frequency distributions.
//!
//! Wigner-Ville and its smoothed relatives share one kernel: at each analyzed
//! time point build the instantaneous autocorrelation
//! `x(t + tau) * conj(x(t - tau))` across an nfft-lag window, weight the lags
//! per variant, FFT the slice, and keep the magnitude with zero frequency
//! shifted to the array center. Note the usual discrete-WVD convention: a
//! tone at normalized frequency f concentrates at 2f on the frequency axis.
//!
//! Time is decimated by 4, and points closer than nfft/2 to either signal
//! boundary are skipped rather than partial-windowed, so short signals can
//! legitimately produce an empty surface.
//!
//! Key applications: chirp and frequency-hop tracking, LPI waveform analysis,
//! transient localization in forensic captures.
//!
//! ## Example
//!
//! ```
//! use num_complex::Complex64;
//! use sigsift_core::time_frequency::wvd;
//! use std::f64::consts::PI;
//!
//! let signal: Vec<Complex64> = (0..256)
//!     .map(|t| Complex64::from_polar(1.0, 2.0 * PI * 0.0625 * t as f64))
//!     .collect();
//! let surface = wvd(&signal, 64).unwrap();
//! assert_eq!(surface.freq_axis.len(), 64);
//! assert!(surface.num_frames() > 0);
//! ```

use crate::fft::{fft_in_place, fft_shift, validate_fft_len};
use crate::types::{check_input_len, SignalError, SignalResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One surface frame per this many input samples.
const TIME_DECIMATION: usize = 4;

/// Magnitude floor applied by [`TfSurface::to_db`].
const DB_FLOOR: f64 = 1e-10;

/// Denominator guard in the Choi-Williams kernel.
const KERNEL_EPS: f64 = 1e-10;

/// Time-frequency magnitude surface, flat row-major `[frame][bin]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TfSurface {
    /// Magnitude grid, `num_frames * nfft` values
    pub grid: Vec<f64>,
    /// Sample index of each analyzed frame
    pub time_axis: Vec<f64>,
    /// Normalized frequencies in [-0.5, 0.5), zero at the center
    pub freq_axis: Vec<f64>,
    /// Frequency bins per frame
    pub nfft: usize,
}

impl TfSurface {
    pub fn num_frames(&self) -> usize {
        self.time_axis.len()
    }

    pub fn get(&self, frame: usize, bin: usize) -> f64 {
        self.grid[frame * self.nfft + bin]
    }

    pub fn frame(&self, frame: usize) -> &[f64] {
        &self.grid[frame * self.nfft..(frame + 1) * self.nfft]
    }

    /// Returns `(frame, bin, value)` of the strongest cell, or `None` for an
    /// empty surface.
    pub fn find_peak(&self) -> Option<(usize, usize, f64)> {
        let mut peak: Option<(usize, usize, f64)> = None;
        for frame in 0..self.num_frames() {
            for bin in 0..self.nfft {
                let v = self.get(frame, bin);
                if peak.map_or(true, |(_, _, best)| v > best) {
                    peak = Some((frame, bin, v));
                }
            }
        }
        peak
    }

    /// New surface with every cell converted to `10*log10(max(v, 1e-10))`.
    pub fn to_db(&self) -> TfSurface {
        TfSurface {
            grid: self
                .grid
                .iter()
                .map(|&v| 10.0 * v.max(DB_FLOOR).log10())
                .collect(),
            time_axis: self.time_axis.clone(),
            freq_axis: self.freq_axis.clone(),
            nfft: self.nfft,
        }
    }
}

/// Wigner-Ville distribution, no lag weighting.
pub fn wvd(signal: &[Complex64], nfft: usize) -> SignalResult<TfSurface> {
    cohen_surface(signal, nfft, |_, _| 1.0)
}

/// Pseudo-WVD: Hamming lag taper of `window_size` lags centered on tau = 0.
/// Lags beyond the taper half-width are zeroed.
pub fn pseudo_wvd(
    signal: &[Complex64],
    nfft: usize,
    window_size: usize,
) -> SignalResult<TfSurface> {
    let taper = lag_taper(window_size)?;
    cohen_surface(signal, nfft, move |_, tau| {
        taper.get(tau).copied().unwrap_or(0.0)
    })
}

/// Smoothed pseudo-WVD: PWVD frames averaged across a centered window along
/// the time axis (truncated at the surface edges). The window always spans
/// an odd count, `2 * (time_window_size / 2) + 1` frames, so an even
/// `time_window_size` widens to the next odd value.
pub fn smoothed_pseudo_wvd(
    signal: &[Complex64],
    nfft: usize,
    window_size: usize,
    time_window_size: usize,
) -> SignalResult<TfSurface> {
    if time_window_size == 0 {
        return Err(SignalError::InvalidParameter {
            name: "time_window_size",
            reason: "must be positive".to_string(),
        });
    }
    let base = pseudo_wvd(signal, nfft, window_size)?;
    if time_window_size == 1 {
        return Ok(base);
    }

    let frames = base.num_frames();
    let half = time_window_size / 2;
    let mut grid = vec![0.0; base.grid.len()];
    for frame in 0..frames {
        let lo = frame.saturating_sub(half);
        let hi = (frame + half).min(frames - 1);
        let scale = 1.0 / (hi - lo + 1) as f64;
        for bin in 0..base.nfft {
            let mut acc = 0.0;
            for f in lo..=hi {
                acc += base.get(f, bin);
            }
            grid[frame * base.nfft + bin] = acc * scale;
        }
    }
    Ok(TfSurface { grid, ..base })
}

/// Choi-Williams distribution: lags weighted by
/// `exp(-sigma * tau^2 / (t^2 + eps))`.
pub fn choi_williams(signal: &[Complex64], nfft: usize, sigma: f64) -> SignalResult<TfSurface> {
    if !(sigma > 0.0) {
        return Err(SignalError::InvalidParameter {
            name: "sigma",
            reason: "must be positive".to_string(),
        });
    }
    cohen_surface(signal, nfft, move |t, tau| {
        let t2 = (t * t) as f64 + KERNEL_EPS;
        (-sigma * (tau * tau) as f64 / t2).exp()
    })
}

/// Born-Jordan distribution: lags weighted by the normalized sinc
/// `sinc(tau/nfft)`, with weight 1 at tau = 0.
pub fn born_jordan(signal: &[Complex64], nfft: usize) -> SignalResult<TfSurface> {
    cohen_surface(signal, nfft, move |_, tau| sinc(tau as f64 / nfft as f64))
}

// ---------------------------------------------------------------------------
// Shared kernel
// ---------------------------------------------------------------------------

fn cohen_surface(
    signal: &[Complex64],
    nfft: usize,
    weight: impl Fn(usize, usize) -> f64,
) -> SignalResult<TfSurface> {
    validate_fft_len(nfft)?;
    check_input_len(signal.len(), "time-frequency input")?;

    let n = signal.len();
    let half = nfft / 2;
    let freq_axis: Vec<f64> = (0..nfft)
        .map(|i| (i as f64 - half as f64) / nfft as f64)
        .collect();

    let mut grid = Vec::new();
    let mut time_axis = Vec::new();
    let mut slice = vec![Complex64::new(0.0, 0.0); nfft];

    for t in (0..n).step_by(TIME_DECIMATION) {
        // No partial windows near the boundaries.
        if t < half || t + half >= n {
            continue;
        }

        slice.fill(Complex64::new(0.0, 0.0));
        slice[0] = signal[t] * signal[t].conj() * weight(t, 0);
        for tau in 1..half {
            let v = signal[t + tau] * signal[t - tau].conj() * weight(t, tau);
            slice[tau] = v;
            slice[nfft - tau] = v.conj();
        }

        fft_in_place(&mut slice, false);
        let magnitudes: Vec<f64> = slice.iter().map(|c| c.norm()).collect();
        grid.extend(fft_shift(&magnitudes));
        time_axis.push(t as f64);
    }

    log::debug!(
        "time-frequency surface: {} frames x {nfft} bins from {n} samples",
        time_axis.len()
    );
    Ok(TfSurface {
        grid,
        time_axis,
        freq_axis,
        nfft,
    })
}

/// Hamming taper over lag magnitude, peak 1 at tau = 0, indexed by |tau|.
fn lag_taper(window_size: usize) -> SignalResult<Vec<f64>> {
    if window_size == 0 {
        return Err(SignalError::InvalidParameter {
            name: "window_size",
            reason: "must be positive".to_string(),
        });
    }
    let half = (window_size / 2).max(1);
    Ok((0..=half)
        .map(|tau| 0.54 + 0.46 * (PI * tau as f64 / half as f64).cos())
        .collect())
}

fn sinc(x: f64) -> f64 {
    if x.abs() < 1e-12 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(n: usize, freq: f64) -> Vec<Complex64> {
        (0..n)
            .map(|t| Complex64::from_polar(1.0, 2.0 * PI * freq * t as f64))
            .collect()
    }

    fn two_tones(n: usize, f1: f64, f2: f64) -> Vec<Complex64> {
        (0..n)
            .map(|t| {
                Complex64::from_polar(1.0, 2.0 * PI * f1 * t as f64)
                    + Complex64::from_polar(1.0, 2.0 * PI * f2 * t as f64)
            })
            .collect()
    }

    /// Shifted bin index where a tone at normalized frequency f lands
    /// (doubled by the autocorrelation convention).
    fn expected_bin(freq: f64, nfft: usize) -> usize {
        let doubled = 2.0 * freq * nfft as f64;
        nfft / 2 + doubled.round() as usize
    }

    #[test]
    fn test_wvd_tone_concentrates_at_doubled_bin() {
        let nfft = 64;
        let signal = tone(256, 0.0625);
        let surface = wvd(&signal, nfft).unwrap();

        assert_eq!(surface.freq_axis.len(), nfft);
        assert!(surface.grid.iter().all(|v| v.is_finite() && *v >= 0.0));

        let (_, bin, value) = surface.find_peak().unwrap();
        assert_eq!(bin, expected_bin(0.0625, nfft));
        assert!(value > 0.0);
    }

    #[test]
    fn test_edge_policy_and_time_axis() {
        let surface = wvd(&tone(256, 0.1), 64).unwrap();
        // Valid frames: t in [32, 223], decimated by 4 starting from 0.
        assert_eq!(surface.num_frames(), 48);
        assert_eq!(surface.time_axis[0], 32.0);
        assert_eq!(*surface.time_axis.last().unwrap(), 220.0);
        assert_eq!(surface.grid.len(), 48 * 64);
    }

    #[test]
    fn test_short_signal_yields_empty_surface() {
        let surface = wvd(&tone(32, 0.1), 64).unwrap();
        assert_eq!(surface.num_frames(), 0);
        assert!(surface.grid.is_empty());
        assert_eq!(surface.freq_axis.len(), 64);
        assert!(surface.find_peak().is_none());
    }

    #[test]
    fn test_nfft_validation() {
        assert!(matches!(
            wvd(&tone(128, 0.1), 48),
            Err(SignalError::NotPowerOfTwo(48))
        ));
        assert!(matches!(
            choi_williams(&tone(128, 0.1), 64, 0.0),
            Err(SignalError::InvalidParameter { name: "sigma", .. })
        ));
    }

    #[test]
    fn test_freq_axis_normalized() {
        let surface = wvd(&tone(128, 0.1), 32).unwrap();
        assert_eq!(surface.freq_axis[0], -0.5);
        assert_eq!(surface.freq_axis[16], 0.0);
        assert!(*surface.freq_axis.last().unwrap() < 0.5);
    }

    #[test]
    fn test_pwvd_suppresses_cross_terms() {
        let nfft = 64;
        let signal = two_tones(512, 0.0625, 0.15625);
        let plain = wvd(&signal, nfft).unwrap();
        let tapered = pseudo_wvd(&signal, nfft, 16).unwrap();

        // The cross term oscillates at the mean frequency, bin 46 after
        // doubling and shifting.
        let cross_bin = expected_bin((0.0625 + 0.15625) / 2.0, nfft);
        let mean_at = |s: &TfSurface| {
            (0..s.num_frames()).map(|f| s.get(f, cross_bin)).sum::<f64>() / s.num_frames() as f64
        };
        assert!(mean_at(&tapered) < mean_at(&plain));
    }

    #[test]
    fn test_spwvd_bounded_by_pwvd_max() {
        let signal = two_tones(512, 0.0625, 0.15625);
        let pwvd = pseudo_wvd(&signal, 64, 16).unwrap();
        let spwvd = smoothed_pseudo_wvd(&signal, 64, 16, 5).unwrap();

        assert_eq!(spwvd.num_frames(), pwvd.num_frames());
        for bin in 0..64 {
            let max_p = (0..pwvd.num_frames())
                .map(|f| pwvd.get(f, bin))
                .fold(0.0f64, f64::max);
            let max_s = (0..spwvd.num_frames())
                .map(|f| spwvd.get(f, bin))
                .fold(0.0f64, f64::max);
            assert!(max_s <= max_p + 1e-12, "bin {bin}");
        }
    }

    #[test]
    fn test_spwvd_unit_time_window_is_pwvd() {
        let signal = tone(256, 0.05);
        let pwvd = pseudo_wvd(&signal, 64, 16).unwrap();
        let spwvd = smoothed_pseudo_wvd(&signal, 64, 16, 1).unwrap();
        assert_eq!(pwvd.grid, spwvd.grid);
    }

    #[test]
    fn test_spwvd_even_time_window_widens_to_odd() {
        // A window of 2 cannot stay centered; it averages three frames,
        // exactly as a window of 3 does.
        let signal = two_tones(512, 0.0625, 0.15625);
        let even = smoothed_pseudo_wvd(&signal, 64, 16, 2).unwrap();
        let odd = smoothed_pseudo_wvd(&signal, 64, 16, 3).unwrap();
        assert_eq!(even.grid, odd.grid);
    }

    #[test]
    fn test_kernel_variants_preserve_tone_peak() {
        let nfft = 64;
        let signal = tone(256, 0.0625);
        let expected = expected_bin(0.0625, nfft);

        let cwd = choi_williams(&signal, nfft, 1.0).unwrap();
        assert!(cwd.grid.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_eq!(cwd.find_peak().unwrap().1, expected);

        let bjd = born_jordan(&signal, nfft).unwrap();
        assert!(bjd.grid.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert_eq!(bjd.find_peak().unwrap().1, expected);
    }

    #[test]
    fn test_to_db_floor() {
        let surface = wvd(&tone(256, 0.0625), 64).unwrap();
        let db = surface.to_db();
        assert_eq!(db.num_frames(), surface.num_frames());
        for v in &db.grid {
            assert!(*v >= -100.0 - 1e-9);
        }
        // The peak sits well above the floor.
        assert!(db.find_peak().unwrap().2 > -100.0);
    }

    #[test]
    fn test_surface_wire_names() {
        let surface = wvd(&tone(128, 0.1), 32).unwrap();
        let json = serde_json::to_string(&surface).unwrap();
        assert!(json.contains("\"timeAxis\""));
        assert!(json.contains("\"freqAxis\""));
        assert!(json.contains("\"grid\""));
    }
}
