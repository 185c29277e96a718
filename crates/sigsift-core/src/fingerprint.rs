//! RF-DNA device fingerprinting.
//!
//! Transmitters leave measurable manufacturing artifacts in their turn-on
//! transient and spectral shape. The engine locates the transient, derives
//! three domain sequences from it (instantaneous amplitude, unwrapped phase,
//! instantaneous frequency), compresses each into a fixed 60-entry statistic
//! vector, and pairs the 180-feature fingerprint with Welch-PSD band ratios.
//! Matching against a reference set is plain nearest-neighbor with an
//! exponential confidence mapping.
//!
//! ## Example
//!
//! ```
//! use num_complex::Complex64;
//! use sigsift_core::fingerprint::{match_fingerprint, FingerprintEngine};
//! use std::f64::consts::PI;
//!
//! // Quiet lead-in, then a strong tone: a crude power-up burst.
//! let fs = 1e6;
//! let burst: Vec<Complex64> = (0..4096)
//!     .map(|t| {
//!         let amp = if t < 1024 { 0.001 } else { 1.0 };
//!         Complex64::from_polar(amp, 2.0 * PI * 0.1 * t as f64)
//!     })
//!     .collect();
//!
//! let engine = FingerprintEngine::new(fs);
//! let print = engine.extract(&burst, "dev-a", "beacon", 0.0).unwrap();
//! assert_eq!(print.feature_count(), 180);
//!
//! let matches = match_fingerprint(&print, &[print.clone()], 0.5);
//! assert_eq!(matches[0].confidence, 1.0);
//! ```

use crate::fft::{fft_in_place, fft_shift, validate_fft_len, window, WindowKind};
use crate::types::{check_input_len, SignalError, SignalResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Entries per domain vector. 36 are computed, the rest stay zero so the
/// schema is fixed regardless of transient length.
pub const FEATURES_PER_DOMAIN: usize = 60;

const AUTOCORR_LAGS: usize = 10;
const ENERGY_BINS: usize = 10;

/// Distance scale of the exponential confidence mapping.
const CONFIDENCE_SCALE: f64 = 10.0;

// ---------------------------------------------------------------------------
// Engine and parameters
// ---------------------------------------------------------------------------

/// Transient detector settings, all in seconds except the threshold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransientParams {
    /// Leading span used to estimate the noise floor
    pub noise_span: f64,
    /// Onset trips when instantaneous power exceeds this multiple of the floor
    pub threshold_factor: f64,
    /// Transient window length; the window ends at the detected onset
    pub window_span: f64,
}

impl Default for TransientParams {
    fn default() -> Self {
        TransientParams {
            noise_span: 100e-6,
            threshold_factor: 10.0,
            window_span: 1e-3,
        }
    }
}

/// Fingerprint extractor bound to a capture's sample rate.
#[derive(Debug, Clone)]
pub struct FingerprintEngine {
    sample_rate: f64,
    center_freq: f64,
    transient: TransientParams,
    psd_nfft: usize,
}

impl FingerprintEngine {
    pub fn new(sample_rate: f64) -> Self {
        FingerprintEngine {
            sample_rate,
            center_freq: 0.0,
            transient: TransientParams::default(),
            psd_nfft: 256,
        }
    }

    /// Carrier frequency recorded in extracted fingerprints.
    pub fn center_freq(mut self, hz: f64) -> Self {
        self.center_freq = hz;
        self
    }

    pub fn transient_params(mut self, params: TransientParams) -> Self {
        self.transient = params;
        self
    }

    /// Welch segment length; must be a power of two.
    pub fn psd_nfft(mut self, nfft: usize) -> Self {
        self.psd_nfft = nfft;
        self
    }

    /// Extracts a full fingerprint from one capture.
    pub fn extract(
        &self,
        samples: &[Complex64],
        device_id: &str,
        device_type: &str,
        timestamp: f64,
    ) -> SignalResult<RfFingerprint> {
        check_input_len(samples.len(), "fingerprint input")?;
        validate_fft_len(self.psd_nfft)?;
        if !(self.sample_rate > 0.0) {
            return Err(SignalError::InvalidParameter {
                name: "sample_rate",
                reason: "must be positive".to_string(),
            });
        }

        let transient = self.transient_window(samples)?;
        let (amplitude, phase, frequency) = domain_sequences(&transient);

        let psd = welch_psd(samples, self.psd_nfft)?;
        let spectral_regrowth = spectral_regrowth(&psd);
        let adjacent_channel_power = adjacent_channel_power(&psd);

        Ok(RfFingerprint {
            device_id: device_id.to_string(),
            device_type: device_type.to_string(),
            amplitude_features: domain_features(&amplitude),
            phase_features: domain_features(&phase),
            frequency_features: domain_features(&frequency),
            psd,
            spectral_regrowth,
            adjacent_channel_power,
            center_freq: self.center_freq,
            sample_rate: self.sample_rate,
            timestamp,
        })
    }

    /// Locates the turn-on transient.
    ///
    /// The noise floor is the mean instantaneous power over the leading
    /// `noise_span`; the onset is the first sample whose power exceeds
    /// `threshold_factor` times that floor. The returned window is the
    /// `window_span`-long stretch ending at the onset (clamped at the buffer
    /// start), which holds the sub-threshold turn-on ramp.
    pub fn transient_window(&self, samples: &[Complex64]) -> SignalResult<Vec<Complex64>> {
        let noise_len = ((self.transient.noise_span * self.sample_rate) as usize)
            .clamp(1, samples.len());
        let floor = samples[..noise_len]
            .iter()
            .map(|c| c.norm_sqr())
            .sum::<f64>()
            / noise_len as f64;
        let threshold = floor * self.transient.threshold_factor;

        let onset = samples
            .iter()
            .position(|c| c.norm_sqr() > threshold)
            .ok_or(SignalError::OnsetNotFound {
                threshold_factor: self.transient.threshold_factor,
            })?;

        let window_len = ((self.transient.window_span * self.sample_rate).round() as usize).max(1);
        let start = onset.saturating_sub(window_len);
        let end = (start + window_len).min(samples.len());
        log::debug!("transient onset at sample {onset}, window [{start}, {end})");
        Ok(samples[start..end].to_vec())
    }
}

// ---------------------------------------------------------------------------
// Domain sequences and statistics
// ---------------------------------------------------------------------------

fn domain_sequences(transient: &[Complex64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = transient.len();
    let amplitude: Vec<f64> = transient.iter().map(|c| c.norm()).collect();

    let mut phase = Vec::with_capacity(n);
    if let Some(first) = transient.first() {
        phase.push(first.arg());
    }
    for i in 1..n {
        let delta = wrap_pi(transient[i].arg() - transient[i - 1].arg());
        phase.push(phase[i - 1] + delta);
    }

    // Instantaneous frequency as the wrapped phase increment, one entry
    // shorter than the window.
    let frequency: Vec<f64> = (1..n)
        .map(|i| wrap_pi(transient[i].arg() - transient[i - 1].arg()))
        .collect();

    (amplitude, phase, frequency)
}

fn wrap_pi(x: f64) -> f64 {
    let mut y = x % (2.0 * PI);
    if y > PI {
        y -= 2.0 * PI;
    } else if y < -PI {
        y += 2.0 * PI;
    }
    y
}

/// Fixed 60-entry statistic vector. Order: mean, std, variance, skewness,
/// excess kurtosis, min, max, range, the 10/25/50/75/90th percentiles, mean
/// absolute first and second derivative, zero-crossing rate, autocorrelation
/// at lags 1..=10, then the mean energies of 10 equal sub-bins. Anything the
/// window is too short to support contributes 0, as do the reserved tail
/// slots.
fn domain_features(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![0.0; FEATURES_PER_DOMAIN];
    }

    let mut features = Vec::with_capacity(FEATURES_PER_DOMAIN);
    let mean = x.iter().sum::<f64>() / n as f64;
    let variance = x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    let std = variance.sqrt();
    let (skewness, kurtosis) = if std > 1e-12 {
        let m3 = x.iter().map(|v| ((v - mean) / std).powi(3)).sum::<f64>() / n as f64;
        let m4 = x.iter().map(|v| ((v - mean) / std).powi(4)).sum::<f64>() / n as f64;
        (m3, m4 - 3.0)
    } else {
        (0.0, 0.0)
    };
    let min = x.iter().copied().fold(f64::INFINITY, f64::min);
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    features.extend_from_slice(&[mean, std, variance, skewness, kurtosis, min, max, max - min]);

    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    for p in [10.0, 25.0, 50.0, 75.0, 90.0] {
        features.push(percentile(&sorted, p));
    }

    features.push(mean_abs_first_diff(x));
    features.push(mean_abs_second_diff(x));
    features.push(zero_crossing_rate(x));
    for lag in 1..=AUTOCORR_LAGS {
        features.push(autocorrelation(x, mean, variance, lag));
    }
    features.extend_from_slice(&binned_energies(x));

    features.resize(FEATURES_PER_DOMAIN, 0.0);
    features
}

/// Nearest-rank percentile on a pre-sorted window.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn mean_abs_first_diff(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    (1..x.len()).map(|i| (x[i] - x[i - 1]).abs()).sum::<f64>() / (x.len() - 1) as f64
}

fn mean_abs_second_diff(x: &[f64]) -> f64 {
    if x.len() < 3 {
        return 0.0;
    }
    (2..x.len())
        .map(|i| (x[i] - 2.0 * x[i - 1] + x[i - 2]).abs())
        .sum::<f64>()
        / (x.len() - 2) as f64
}

fn zero_crossing_rate(x: &[f64]) -> f64 {
    if x.len() < 2 {
        return 0.0;
    }
    (1..x.len()).filter(|&i| x[i - 1] * x[i] < 0.0).count() as f64 / (x.len() - 1) as f64
}

/// Biased normalized autocorrelation; 0 when the lag is out of range or the
/// window is flat.
fn autocorrelation(x: &[f64], mean: f64, variance: f64, lag: usize) -> f64 {
    let n = x.len();
    if lag >= n || variance <= 1e-20 {
        return 0.0;
    }
    let cov = (0..n - lag)
        .map(|i| (x[i] - mean) * (x[i + lag] - mean))
        .sum::<f64>()
        / n as f64;
    cov / variance
}

fn binned_energies(x: &[f64]) -> [f64; ENERGY_BINS] {
    let n = x.len();
    let mut out = [0.0; ENERGY_BINS];
    for (b, slot) in out.iter_mut().enumerate() {
        let lo = b * n / ENERGY_BINS;
        let hi = ((b + 1) * n / ENERGY_BINS).min(n);
        if hi > lo {
            *slot = x[lo..hi].iter().map(|v| v * v).sum::<f64>() / (hi - lo) as f64;
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Spectral features
// ---------------------------------------------------------------------------

/// Welch PSD: Hamming-windowed segments, 50% overlap, averaged periodograms,
/// zero frequency at the array center. Buffers shorter than one segment are
/// zero-padded into a single segment.
pub fn welch_psd(samples: &[Complex64], nfft: usize) -> SignalResult<Vec<f64>> {
    validate_fft_len(nfft)?;
    check_input_len(samples.len(), "welch psd input")?;

    let win = window(WindowKind::Hamming, nfft);
    let win_power: f64 = win.iter().map(|w| w * w).sum();
    let mut acc = vec![0.0; nfft];
    let mut segments = 0usize;

    if samples.len() >= nfft {
        let step = nfft / 2;
        let count = (samples.len() - nfft) / step + 1;
        for s in 0..count {
            let start = s * step;
            let mut buf: Vec<Complex64> = samples[start..start + nfft]
                .iter()
                .zip(&win)
                .map(|(c, w)| c * w)
                .collect();
            fft_in_place(&mut buf, false);
            for (a, c) in acc.iter_mut().zip(&buf) {
                *a += c.norm_sqr();
            }
            segments += 1;
        }
    } else {
        let mut buf = vec![Complex64::new(0.0, 0.0); nfft];
        for (i, c) in samples.iter().enumerate() {
            buf[i] = c * win[i];
        }
        fft_in_place(&mut buf, false);
        for (a, c) in acc.iter_mut().zip(&buf) {
            *a += c.norm_sqr();
        }
        segments = 1;
    }

    let scale = 1.0 / (segments as f64 * win_power);
    let linear: Vec<f64> = acc.iter().map(|a| a * scale).collect();
    Ok(fft_shift(&linear))
}

/// Out-of-band to in-band power ratio; in-band is the center 20% of bins.
fn spectral_regrowth(psd: &[f64]) -> f64 {
    let n = psd.len();
    let lo = (n as f64 * 0.4) as usize;
    let hi = (n as f64 * 0.6) as usize;
    let in_band: f64 = psd[lo..hi].iter().sum();
    let out_band: f64 = psd[..lo].iter().sum::<f64>() + psd[hi..].iter().sum::<f64>();
    if in_band > 1e-20 {
        out_band / in_band
    } else {
        0.0
    }
}

/// Power in the 60-80% band fraction relative to the in-band power.
fn adjacent_channel_power(psd: &[f64]) -> f64 {
    let n = psd.len();
    let adj: f64 = psd[(n as f64 * 0.6) as usize..(n as f64 * 0.8) as usize].iter().sum();
    let in_band: f64 = psd[(n as f64 * 0.4) as usize..(n as f64 * 0.6) as usize].iter().sum();
    if in_band > 1e-20 {
        adj / in_band
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Fingerprints and matching
// ---------------------------------------------------------------------------

/// A device fingerprint: 3 x 60 transient statistics plus spectral features
/// and capture metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfFingerprint {
    pub device_id: String,
    pub device_type: String,
    pub amplitude_features: Vec<f64>,
    pub phase_features: Vec<f64>,
    pub frequency_features: Vec<f64>,
    /// Welch PSD, linear power, zero frequency centered
    pub psd: Vec<f64>,
    pub spectral_regrowth: f64,
    pub adjacent_channel_power: f64,
    pub center_freq: f64,
    pub sample_rate: f64,
    pub timestamp: f64,
}

impl RfFingerprint {
    /// Total feature count across the three domains.
    pub fn feature_count(&self) -> usize {
        self.amplitude_features.len() + self.phase_features.len() + self.frequency_features.len()
    }

    /// Mean of the three per-domain Euclidean distances.
    pub fn distance(&self, other: &RfFingerprint) -> f64 {
        (euclidean(&self.amplitude_features, &other.amplitude_features)
            + euclidean(&self.phase_features, &other.phase_features)
            + euclidean(&self.frequency_features, &other.frequency_features))
            / 3.0
    }
}

/// One candidate from a reference-set match, strongest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintMatch {
    pub device_id: String,
    pub device_type: String,
    pub distance: f64,
    pub confidence: f64,
}

/// Matches a query fingerprint against a reference set.
///
/// Confidence is `exp(-distance/10)`; candidates below `threshold` are
/// dropped and the rest are sorted by descending confidence. A self-match
/// therefore scores distance 0, confidence 1.
pub fn match_fingerprint(
    query: &RfFingerprint,
    references: &[RfFingerprint],
    threshold: f64,
) -> Vec<FingerprintMatch> {
    let mut matches: Vec<FingerprintMatch> = references
        .iter()
        .map(|reference| {
            let distance = query.distance(reference);
            FingerprintMatch {
                device_id: reference.device_id.clone(),
                device_type: reference.device_type.clone(),
                distance,
                confidence: (-distance / CONFIDENCE_SCALE).exp().clamp(0.0, 1.0),
            }
        })
        .filter(|m| m.confidence >= threshold)
        .collect();
    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matches
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
