//! # Signal Forensics DSP Library
//!
//! This crate provides the core algorithms for forensic analysis of captured
//! I/Q baseband recordings: who transmitted, where from, and what was
//! overlapping in the band.
//!
//! ## Overview
//!
//! Everything operates on in-memory buffers of `Complex64` samples and is
//! deterministic end to end; routines that need randomness take an explicit
//! seed. The library covers:
//!
//! - **Spectral tools**: radix-2 FFT/IFFT, analysis windows, Welch PSD
//! - **Sparse recovery**: OMP, CoSaMP, LASSO coordinate descent, FISTA
//! - **Time-frequency analysis**: Wigner-Ville and its smoothed and kernel
//!   variants (PWVD, SPWVD, Choi-Williams, Born-Jordan)
//! - **RF-DNA fingerprinting**: transient detection, per-domain statistics,
//!   spectral features, reference-set matching
//! - **Geolocation**: TDOA, AOA, RSS and hybrid fixes with quality figures
//! - **Source separation**: complex FastICA and NMF over spectrograms
//!
//! ## Example
//!
//! ```rust
//! use sigsift_core::prelude::*;
//!
//! // Four ci16 I/Q pairs straight off the wire: a tone at fs/4.
//! let bytes = [0u8, 64, 0, 0, 0, 0, 0, 64, 0, 192, 0, 0, 0, 0, 0, 192];
//! let samples = decode_bytes(&bytes, SampleFormat::Ci16Le).unwrap();
//! assert_eq!(samples.len(), 4);
//!
//! let spectrum = fft(&samples).unwrap();
//! assert!((spectrum[1].norm() - 2.0).abs() < 1e-12);
//! ```

pub mod fft;
pub mod fingerprint;
pub mod geolocation;
pub mod source_separation;
pub mod sparse_recovery;
pub mod time_frequency;
pub mod types;

// Re-export main types
pub use fft::{fft, fft_shift, ifft, power_db, window, WindowKind};
pub use fingerprint::{
    match_fingerprint, welch_psd, FingerprintEngine, FingerprintMatch, RfFingerprint,
    TransientParams,
};
pub use geolocation::{
    compute_gdop, estimate_delay, locate_aoa, locate_hybrid, locate_rss, locate_tdoa, GeoMethod,
    GeolocationResult, Position, RssParams, SensorPosition, SPEED_OF_LIGHT,
};
pub use source_separation::{
    correlation, kurtosis, magnitude_spectrogram, FastIca, MagnitudeSpectrogram, Nmf, NmfResult,
    SeparationResult,
};
pub use sparse_recovery::{
    cosamp, fista, lasso_cd, lasso_objective, omp, soft_threshold, SensingMatrix, SparseResult,
};
pub use time_frequency::{
    born_jordan, choi_williams, pseudo_wvd, smoothed_pseudo_wvd, wvd, TfSurface,
};
pub use types::{
    decode_bytes, from_interleaved, from_split, Complex, IqBuffer, IqSample, Sample, SampleFormat,
    SignalError, SignalResult, MAX_INPUT_SAMPLES,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fft::{fft, fft_shift, ifft, window, WindowKind};
    pub use crate::fingerprint::{match_fingerprint, FingerprintEngine, RfFingerprint};
    pub use crate::geolocation::{
        locate_aoa, locate_hybrid, locate_rss, locate_tdoa, GeolocationResult, SensorPosition,
    };
    pub use crate::source_separation::{FastIca, Nmf};
    pub use crate::sparse_recovery::{cosamp, fista, lasso_cd, omp, SensingMatrix, SparseResult};
    pub use crate::time_frequency::{pseudo_wvd, wvd, TfSurface};
    pub use crate::types::{
        decode_bytes, Complex, IqBuffer, IqSample, SampleFormat, SignalError, SignalResult,
    };
}
