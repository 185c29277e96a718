//! Core types shared across the library.
//!
//! Every algorithm works on complex baseband samples (`Complex64`), so the
//! aliases here are the common currency: an [`IqBuffer`] is what callers
//! build from a capture and hand to the analysis entry points. Construction
//! covers the usual wire forms (split I/Q, interleaved, raw capture bytes in
//! the standard SDR sample formats) and normalizes everything to `f64` in
//! [-1, 1).
//!
//! ## Example
//!
//! ```
//! use sigsift_core::types::{from_split, SampleFormat, decode_bytes};
//!
//! let buf = from_split(&[1.0, 0.0], &[0.0, -1.0]).unwrap();
//! assert_eq!(buf.len(), 2);
//!
//! // Two cu8 samples: (128, 128) maps to 0 + 0i.
//! let raw = decode_bytes(&[128, 128], SampleFormat::Cu8).unwrap();
//! assert_eq!(raw[0].re, 0.0);
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complex sample type used throughout
pub type Complex = Complex64;
/// A single I/Q sample
pub type IqSample = Complex64;
/// Real-valued sample
pub type Sample = f64;
/// Buffer of I/Q samples
pub type IqBuffer = Vec<IqSample>;
/// Result type for all fallible operations
pub type SignalResult<T> = Result<T, SignalError>;

/// Largest accepted input length, in complex samples. The quadratic
/// time-frequency and recovery costs make anything beyond this impractical.
pub const MAX_INPUT_SAMPLES: usize = 1_000_000;

/// Errors raised by malformed inputs or parameters. Numerical trouble inside
/// an algorithm never surfaces here; solvers clamp, degrade confidence, or
/// report `converged = false` instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("I/Q length mismatch: {i_len} in-phase vs {q_len} quadrature samples")]
    LengthMismatch { i_len: usize, q_len: usize },

    #[error("Interleaved I/Q buffer has odd length {0}")]
    OddInterleaved(usize),

    #[error("FFT length {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("{context}: input is empty")]
    EmptyInput { context: &'static str },

    #[error("Input too long: {actual} samples exceeds the {max} sample cap")]
    TooLong { actual: usize, max: usize },

    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Sparsity {sparsity} out of range for a {dimension}-column matrix")]
    SparsityOutOfRange { sparsity: usize, dimension: usize },

    #[error("{method} requires at least {required} sensors, got {provided}")]
    InsufficientSensors {
        method: &'static str,
        required: usize,
        provided: usize,
    },

    #[error("No transient onset found above {threshold_factor}x the noise floor")]
    OnsetNotFound { threshold_factor: f64 },

    #[error("Byte buffer length {len} is not a multiple of the {frame}-byte {format} frame")]
    RaggedByteBuffer {
        format: &'static str,
        frame: usize,
        len: usize,
    },
}

/// Raw capture sample formats accepted by [`decode_bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Interleaved little-endian `f32` pairs, already normalized
    Cf32Le,
    /// Interleaved little-endian `i16` pairs, scaled by 1/32768
    Ci16Le,
    /// Interleaved `i8` pairs, scaled by 1/128
    Ci8,
    /// Interleaved offset-binary `u8` pairs, mapped (v - 128)/128
    Cu8,
}

impl SampleFormat {
    /// Bytes per complex sample.
    pub fn frame_size(&self) -> usize {
        match self {
            SampleFormat::Cf32Le => 8,
            SampleFormat::Ci16Le => 4,
            SampleFormat::Ci8 | SampleFormat::Cu8 => 2,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            SampleFormat::Cf32Le => "cf32_le",
            SampleFormat::Ci16Le => "ci16_le",
            SampleFormat::Ci8 => "ci8",
            SampleFormat::Cu8 => "cu8",
        }
    }
}

/// Builds a buffer from separate in-phase and quadrature sequences.
pub fn from_split(i: &[f64], q: &[f64]) -> SignalResult<IqBuffer> {
    if i.len() != q.len() {
        return Err(SignalError::LengthMismatch {
            i_len: i.len(),
            q_len: q.len(),
        });
    }
    check_input_len(i.len(), "i/q buffer")?;
    Ok(i.iter()
        .zip(q)
        .map(|(&re, &im)| Complex64::new(re, im))
        .collect())
}

/// Builds a buffer from an interleaved I/Q sequence (I first).
pub fn from_interleaved(samples: &[f64]) -> SignalResult<IqBuffer> {
    if samples.len() % 2 != 0 {
        return Err(SignalError::OddInterleaved(samples.len()));
    }
    check_input_len(samples.len() / 2, "i/q buffer")?;
    Ok(samples
        .chunks_exact(2)
        .map(|c| Complex64::new(c[0], c[1]))
        .collect())
}

/// Decodes raw capture bytes into a normalized buffer.
///
/// All integer formats land in [-1, 1): `ci16_le` divides by 32768, `ci8` by
/// 128, and `cu8` removes the 128 offset before dividing by 128.
pub fn decode_bytes(bytes: &[u8], format: SampleFormat) -> SignalResult<IqBuffer> {
    let frame = format.frame_size();
    if bytes.len() % frame != 0 {
        return Err(SignalError::RaggedByteBuffer {
            format: format.name(),
            frame,
            len: bytes.len(),
        });
    }
    check_input_len(bytes.len() / frame, "raw capture")?;
    let buf = match format {
        SampleFormat::Cf32Le => bytes
            .chunks_exact(8)
            .map(|c| {
                let re = f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64;
                let im = f32::from_le_bytes([c[4], c[5], c[6], c[7]]) as f64;
                Complex64::new(re, im)
            })
            .collect(),
        SampleFormat::Ci16Le => bytes
            .chunks_exact(4)
            .map(|c| {
                let re = i16::from_le_bytes([c[0], c[1]]) as f64 / 32768.0;
                let im = i16::from_le_bytes([c[2], c[3]]) as f64 / 32768.0;
                Complex64::new(re, im)
            })
            .collect(),
        SampleFormat::Ci8 => bytes
            .chunks_exact(2)
            .map(|c| {
                let re = c[0] as i8 as f64 / 128.0;
                let im = c[1] as i8 as f64 / 128.0;
                Complex64::new(re, im)
            })
            .collect(),
        SampleFormat::Cu8 => bytes
            .chunks_exact(2)
            .map(|c| {
                let re = (c[0] as f64 - 128.0) / 128.0;
                let im = (c[1] as f64 - 128.0) / 128.0;
                Complex64::new(re, im)
            })
            .collect(),
    };
    Ok(buf)
}

/// Rejects empty and oversized inputs up front.
pub(crate) fn check_input_len(len: usize, context: &'static str) -> SignalResult<()> {
    if len == 0 {
        return Err(SignalError::EmptyInput { context });
    }
    if len > MAX_INPUT_SAMPLES {
        return Err(SignalError::TooLong {
            actual: len,
            max: MAX_INPUT_SAMPLES,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_split_happy_path() {
        let buf = from_split(&[1.0, 2.0, 3.0], &[-1.0, 0.0, 1.0]).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(buf[0], Complex64::new(1.0, -1.0));
        assert_eq!(buf[2], Complex64::new(3.0, 1.0));
    }

    #[test]
    fn test_from_split_length_mismatch() {
        let err = from_split(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err, SignalError::LengthMismatch { i_len: 2, q_len: 1 });
    }

    #[test]
    fn test_from_interleaved() {
        let buf = from_interleaved(&[0.5, -0.5, 0.25, 0.75]).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf[1], Complex64::new(0.25, 0.75));

        assert!(matches!(
            from_interleaved(&[1.0, 2.0, 3.0]),
            Err(SignalError::OddInterleaved(3))
        ));
    }

    #[test]
    fn test_decode_ci16_le() {
        // 16384 = 0x4000 little-endian, -32768 = 0x8000.
        let bytes = [0x00, 0x40, 0x00, 0x80];
        let buf = decode_bytes(&bytes, SampleFormat::Ci16Le).unwrap();
        assert_eq!(buf.len(), 1);
        assert!((buf[0].re - 0.5).abs() < 1e-12);
        assert!((buf[0].im + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_decode_ci8_and_cu8() {
        let signed = decode_bytes(&[64u8, 0x80], SampleFormat::Ci8).unwrap();
        assert!((signed[0].re - 0.5).abs() < 1e-12);
        assert!((signed[0].im + 1.0).abs() < 1e-12);

        let offset = decode_bytes(&[192u8, 0], SampleFormat::Cu8).unwrap();
        assert!((offset[0].re - 0.5).abs() < 1e-12);
        assert!((offset[0].im + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_decode_cf32_passthrough() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.75f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.25f32).to_le_bytes());
        let buf = decode_bytes(&bytes, SampleFormat::Cf32Le).unwrap();
        assert!((buf[0].re - 0.75).abs() < 1e-12);
        assert!((buf[0].im + 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_decode_ragged_buffer() {
        let err = decode_bytes(&[1, 2, 3], SampleFormat::Ci16Le).unwrap_err();
        assert!(matches!(err, SignalError::RaggedByteBuffer { frame: 4, .. }));
    }

    #[test]
    fn test_input_cap() {
        assert!(check_input_len(MAX_INPUT_SAMPLES, "cap").is_ok());
        let err = check_input_len(MAX_INPUT_SAMPLES + 1, "cap").unwrap_err();
        assert!(matches!(err, SignalError::TooLong { .. }));
    }

    #[test]
    fn test_sample_format_wire_names() {
        assert_eq!(
            serde_json::to_string(&SampleFormat::Ci16Le).unwrap(),
            "\"ci16_le\""
        );
        assert_eq!(serde_json::to_string(&SampleFormat::Cu8).unwrap(), "\"cu8\"");
    }

    #[test]
    fn test_error_display() {
        let err = SignalError::InsufficientSensors {
            method: "tdoa",
            required: 3,
            provided: 2,
        };
        assert_eq!(err.to_string(), "tdoa requires at least 3 sensors, got 2");
    }
}
