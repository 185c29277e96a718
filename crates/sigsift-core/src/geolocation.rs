//! Passive emitter geolocation.
//!
//! Four estimators over a common sensor model: TDOA multilateration
//! (Gauss-Newton on range differences), AOA triangulation (linear least
//! squares on bearing lines), RSS ranging (log-distance inversion followed
//! by Gauss-Newton), and a hybrid mode that fuses the TDOA and AOA solutions
//! weighted by their confidences. A cross-correlation delay estimator is
//! included for producing TDOA measurements from raw captures.
//!
//! All estimators degrade instead of failing: a solution that stops
//! improving or runs into a singular geometry comes back with
//! `converged: false` and a reduced confidence, never an error. Errors are
//! reserved for malformed input such as too few sensors.
//!
//! ## Example
//!
//! ```
//! use sigsift_core::geolocation::{locate_tdoa, SensorPosition, SPEED_OF_LIGHT};
//!
//! let sensors = vec![
//!     SensorPosition::new("s0", 0.0, 0.0),
//!     SensorPosition::new("s1", 100.0, 0.0),
//!     SensorPosition::new("s2", 0.0, 100.0),
//! ];
//! // Arrival times for an emitter at (50, 50), arbitrary clock offset.
//! let toas: Vec<f64> = sensors
//!     .iter()
//!     .map(|s| ((50.0 - s.x).hypot(50.0 - s.y)) / SPEED_OF_LIGHT + 1e-3)
//!     .collect();
//!
//! let fix = locate_tdoa(&sensors, &toas).unwrap();
//! assert!((fix.position.x - 50.0).abs() < 1e-2);
//! assert!((fix.position.y - 50.0).abs() < 1e-2);
//! assert!(fix.converged);
//! ```

use crate::fft::fft_in_place;
use crate::types::{check_input_len, SignalError, SignalResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

const MAX_ITERATIONS: usize = 20;
const STEP_TOLERANCE: f64 = 1e-3;
const RIDGE: f64 = 1e-10;
const MIN_RANGE: f64 = 1e-6;

/// Circular-error-probable factor applied to the rms range residual.
const CEP_FACTOR: f64 = 0.675;

/// Base confidence of an RSS fix; the path-loss model is too coarse for a
/// residual-driven figure.
const RSS_CONFIDENCE: f64 = 0.6;

// ---------------------------------------------------------------------------
// Sensor model and results
// ---------------------------------------------------------------------------

/// A receiving sensor at a known location, meters in a local frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPosition {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl SensorPosition {
    pub fn new(id: &str, x: f64, y: f64) -> Self {
        SensorPosition {
            id: id.to_string(),
            x,
            y,
            z: 0.0,
        }
    }

    pub fn new_3d(id: &str, x: f64, y: f64, z: f64) -> Self {
        SensorPosition {
            id: id.to_string(),
            x,
            y,
            z,
        }
    }

    /// Euclidean distance from this sensor to a candidate fix.
    pub fn distance_to(&self, p: &Position) -> f64 {
        let dx = self.x - p.x;
        let dy = self.y - p.y;
        let dz = self.z - p.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoMethod {
    Tdoa,
    Aoa,
    Rss,
    Hybrid,
}

/// An emitter fix with its quality figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationResult {
    pub position: Position,
    /// 0 to 1; halved when the solver did not converge
    pub confidence: f64,
    pub method: GeoMethod,
    /// Dilution of precision of the unit line-of-sight geometry at the
    /// fix, the same figure [`compute_gdop`] reports
    pub gdop: f64,
    /// Estimated horizontal error, meters
    pub horizontal_error: f64,
    /// Estimated vertical error, meters; 0 for planar solutions
    pub vertical_error: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Log-distance path-loss model for RSS ranging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssParams {
    /// Transmit power at the reference distance, dBm
    pub tx_power_dbm: f64,
    pub path_loss_exponent: f64,
    /// Reference distance of the model, meters
    pub reference_distance: f64,
}

impl Default for RssParams {
    fn default() -> Self {
        RssParams {
            tx_power_dbm: 0.0,
            path_loss_exponent: 2.0,
            reference_distance: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// TDOA
// ---------------------------------------------------------------------------

/// Locates an emitter from per-sensor arrival times.
///
/// The first sensor is the timing reference, so any clock offset common to
/// all `toas_seconds` cancels. Needs at least 3 sensors; a fourth with
/// altitude diversity switches the solve to 3D.
pub fn locate_tdoa(
    sensors: &[SensorPosition],
    toas_seconds: &[f64],
) -> SignalResult<GeolocationResult> {
    require_sensors("tdoa", sensors, 3)?;
    require_measurements("toa measurements", sensors.len(), toas_seconds.len())?;

    let range_diffs: Vec<f64> = toas_seconds[1..]
        .iter()
        .map(|t| (t - toas_seconds[0]) * SPEED_OF_LIGHT)
        .collect();

    let dims = solve_dims(sensors, sensors.len() - 1);
    let mut p = centroid(sensors);
    let mut iterations = 0;
    let mut converged = false;
    let mut rows: Vec<[f64; 3]> = Vec::new();
    let mut residuals: Vec<f64> = Vec::new();

    for _ in 0..MAX_ITERATIONS {
        iterations += 1;
        rows.clear();
        residuals.clear();
        let (u0, d0) = unit_and_range(&p, &sensors[0]);
        for (s, rd) in sensors[1..].iter().zip(&range_diffs) {
            let (u, d) = unit_and_range(&p, s);
            rows.push([u[0] - u0[0], u[1] - u0[1], u[2] - u0[2]]);
            residuals.push((d - d0) - rd);
        }

        let Some(step) = solve_normal(&rows, &residuals, dims) else {
            log::warn!("tdoa geometry is degenerate, stopping at iteration {iterations}");
            break;
        };
        p.x -= step[0];
        p.y -= step[1];
        p.z -= step[2];
        if step_norm(&step) < STEP_TOLERANCE {
            converged = true;
            break;
        }
    }

    Ok(finish_fix(
        GeoMethod::Tdoa,
        p,
        sensors,
        &residuals,
        dims,
        iterations,
        converged,
        None,
    ))
}

// ---------------------------------------------------------------------------
// AOA
// ---------------------------------------------------------------------------

/// Triangulates an emitter from per-sensor bearings, radians
/// counterclockwise from the +x axis. Planar only; needs at least 2 sensors.
///
/// Confidence reflects the bearing geometry: `sin` of the mean pairwise line
/// separation, so perpendicular baselines score 1 and near-parallel ones
/// score near 0. Fully parallel bearings have no intersection; the fix
/// falls back to the sensor centroid with zero confidence.
pub fn locate_aoa(
    sensors: &[SensorPosition],
    bearings_rad: &[f64],
) -> SignalResult<GeolocationResult> {
    require_sensors("aoa", sensors, 2)?;
    require_measurements("bearing measurements", sensors.len(), bearings_rad.len())?;

    // Each bearing constrains the emitter to the line
    // sin(b)*(x - sx) - cos(b)*(y - sy) = 0.
    let rows: Vec<[f64; 3]> = bearings_rad
        .iter()
        .map(|b| [b.sin(), -b.cos(), 0.0])
        .collect();
    let rhs: Vec<f64> = sensors
        .iter()
        .zip(bearings_rad)
        .map(|(s, b)| b.sin() * s.x - b.cos() * s.y)
        .collect();

    let spread = bearing_spread(bearings_rad);
    let degenerate = gram_det2(&rows) < 1e-9 * (rows.len() as f64).powi(2);

    let (position, converged, confidence) = if degenerate {
        (centroid(sensors), false, 0.0)
    } else {
        match solve_normal(&rows, &rhs, 2) {
            Some(sol) => {
                let p = Position::new(sol[0], sol[1], 0.0);
                (p, true, spread.sin().clamp(0.0, 1.0))
            }
            None => (centroid(sensors), false, 0.0),
        }
    };

    let residuals: Vec<f64> = rows
        .iter()
        .zip(&rhs)
        .map(|(r, b)| r[0] * position.x + r[1] * position.y - b)
        .collect();

    let gdop = los_gdop(sensors, &position, 2);
    let rms = rms(&residuals);
    Ok(GeolocationResult {
        position,
        confidence,
        method: GeoMethod::Aoa,
        gdop,
        horizontal_error: CEP_FACTOR * rms,
        vertical_error: 0.0,
        iterations: 1,
        converged,
    })
}

/// Mean pairwise separation between bearing lines, folded to [0, pi/2].
fn bearing_spread(bearings: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..bearings.len() {
        for j in i + 1..bearings.len() {
            let mut d = (bearings[i] - bearings[j]).abs() % std::f64::consts::PI;
            if d > std::f64::consts::FRAC_PI_2 {
                d = std::f64::consts::PI - d;
            }
            sum += d;
            pairs += 1;
        }
    }
    if pairs == 0 {
        0.0
    } else {
        sum / pairs as f64
    }
}

// ---------------------------------------------------------------------------
// RSS
// ---------------------------------------------------------------------------

/// Locates an emitter from received signal strengths, dBm.
///
/// Each RSS is inverted to a range through the log-distance model in
/// `params`, then the ranges are intersected with Gauss-Newton. Needs at
/// least 3 sensors.
pub fn locate_rss(
    sensors: &[SensorPosition],
    rssi_dbm: &[f64],
    params: RssParams,
) -> SignalResult<GeolocationResult> {
    require_sensors("rss", sensors, 3)?;
    require_measurements("rssi measurements", sensors.len(), rssi_dbm.len())?;
    if !(params.path_loss_exponent > 0.0) {
        return Err(SignalError::InvalidParameter {
            name: "path_loss_exponent",
            reason: "must be positive".to_string(),
        });
    }

    let ranges: Vec<f64> = rssi_dbm
        .iter()
        .map(|rssi| {
            params.reference_distance
                * 10f64.powf((params.tx_power_dbm - rssi) / (10.0 * params.path_loss_exponent))
        })
        .collect();

    let dims = solve_dims(sensors, sensors.len());
    let mut p = centroid(sensors);
    let mut iterations = 0;
    let mut converged = false;
    let mut rows: Vec<[f64; 3]> = Vec::new();
    let mut residuals: Vec<f64> = Vec::new();

    for _ in 0..MAX_ITERATIONS {
        iterations += 1;
        rows.clear();
        residuals.clear();
        for (s, range) in sensors.iter().zip(&ranges) {
            let (u, d) = unit_and_range(&p, s);
            rows.push(u);
            residuals.push(d - range);
        }

        let Some(step) = solve_normal(&rows, &residuals, dims) else {
            log::warn!("rss geometry is degenerate, stopping at iteration {iterations}");
            break;
        };
        p.x -= step[0];
        p.y -= step[1];
        p.z -= step[2];
        if step_norm(&step) < STEP_TOLERANCE {
            converged = true;
            break;
        }
    }

    Ok(finish_fix(
        GeoMethod::Rss,
        p,
        sensors,
        &residuals,
        dims,
        iterations,
        converged,
        Some(RSS_CONFIDENCE),
    ))
}

// ---------------------------------------------------------------------------
// Hybrid
// ---------------------------------------------------------------------------

/// Fuses independent TDOA and AOA solutions.
///
/// The two fixes are averaged with their confidences as weights; the fused
/// confidence is the geometric mean, so either method doubting itself pulls
/// the combined figure down.
pub fn locate_hybrid(
    tdoa_sensors: &[SensorPosition],
    toas_seconds: &[f64],
    aoa_sensors: &[SensorPosition],
    bearings_rad: &[f64],
) -> SignalResult<GeolocationResult> {
    let t = locate_tdoa(tdoa_sensors, toas_seconds)?;
    let a = locate_aoa(aoa_sensors, bearings_rad)?;

    let wt = t.confidence.max(1e-6);
    let wa = a.confidence.max(1e-6);
    let total = wt + wa;
    let blend = |x: f64, y: f64| (wt * x + wa * y) / total;

    Ok(GeolocationResult {
        position: Position::new(
            blend(t.position.x, a.position.x),
            blend(t.position.y, a.position.y),
            blend(t.position.z, a.position.z),
        ),
        confidence: (t.confidence * a.confidence).sqrt(),
        method: GeoMethod::Hybrid,
        gdop: blend(t.gdop, a.gdop),
        horizontal_error: blend(t.horizontal_error, a.horizontal_error),
        vertical_error: blend(t.vertical_error, a.vertical_error),
        iterations: t.iterations + a.iterations,
        converged: t.converged && a.converged,
    })
}

// ---------------------------------------------------------------------------
// Delay estimation
// ---------------------------------------------------------------------------

/// Estimates how many samples `delayed` lags `reference`, with sub-sample
/// resolution from parabolic interpolation around the cross-correlation
/// peak. Negative values mean `delayed` actually leads.
pub fn estimate_delay(reference: &[Complex64], delayed: &[Complex64]) -> SignalResult<f64> {
    check_input_len(reference.len(), "delay reference")?;
    check_input_len(delayed.len(), "delay input")?;

    let n = (reference.len() + delayed.len()).next_power_of_two();
    let mut fa = vec![Complex64::new(0.0, 0.0); n];
    fa[..reference.len()].copy_from_slice(reference);
    fft_in_place(&mut fa, false);

    let mut fb = vec![Complex64::new(0.0, 0.0); n];
    fb[..delayed.len()].copy_from_slice(delayed);
    fft_in_place(&mut fb, false);

    // Circular cross-correlation; the zero pad keeps it linear.
    let mut cross: Vec<Complex64> = fb.iter().zip(&fa).map(|(b, a)| b * a.conj()).collect();
    fft_in_place(&mut cross, true);
    let mag: Vec<f64> = cross.iter().map(|c| c.norm()).collect();

    let peak = mag
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    let prev = mag[(peak + n - 1) % n];
    let here = mag[peak];
    let next = mag[(peak + 1) % n];
    let denom = prev - 2.0 * here + next;
    let offset = if denom.abs() > 1e-20 {
        (0.5 * (prev - next) / denom).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    let lag = if peak > n / 2 {
        peak as f64 - n as f64
    } else {
        peak as f64
    };
    Ok(lag + offset)
}

// ---------------------------------------------------------------------------
// Shared geometry helpers
// ---------------------------------------------------------------------------

/// GDOP from the unit line-of-sight rows at a candidate fix.
pub fn compute_gdop(sensors: &[SensorPosition], position: &Position) -> f64 {
    los_gdop(sensors, position, solve_dims(sensors, sensors.len()))
}

fn los_gdop(sensors: &[SensorPosition], position: &Position, dims: usize) -> f64 {
    let rows: Vec<[f64; 3]> = sensors
        .iter()
        .map(|s| unit_and_range(position, s).0)
        .collect();
    gdop_from_rows(&rows, dims)
}

fn require_sensors(
    method: &'static str,
    sensors: &[SensorPosition],
    required: usize,
) -> SignalResult<()> {
    if sensors.len() < required {
        return Err(SignalError::InsufficientSensors {
            method,
            required,
            provided: sensors.len(),
        });
    }
    Ok(())
}

fn require_measurements(
    context: &'static str,
    expected: usize,
    actual: usize,
) -> SignalResult<()> {
    if expected != actual {
        return Err(SignalError::DimensionMismatch {
            context,
            expected,
            actual,
        });
    }
    Ok(())
}

/// 3 when the network has altitude diversity and enough equations, else 2.
fn solve_dims(sensors: &[SensorPosition], equations: usize) -> usize {
    let z_min = sensors.iter().map(|s| s.z).fold(f64::INFINITY, f64::min);
    let z_max = sensors
        .iter()
        .map(|s| s.z)
        .fold(f64::NEG_INFINITY, f64::max);
    if z_max - z_min > 1e-9 && equations >= 3 {
        3
    } else {
        2
    }
}

fn centroid(sensors: &[SensorPosition]) -> Position {
    let n = sensors.len() as f64;
    Position::new(
        sensors.iter().map(|s| s.x).sum::<f64>() / n,
        sensors.iter().map(|s| s.y).sum::<f64>() / n,
        sensors.iter().map(|s| s.z).sum::<f64>() / n,
    )
}

/// Unit vector from the sensor toward `p` and the range, floored to avoid a
/// blowup when the iterate lands on a sensor.
fn unit_and_range(p: &Position, s: &SensorPosition) -> ([f64; 3], f64) {
    let dx = p.x - s.x;
    let dy = p.y - s.y;
    let dz = p.z - s.z;
    let d = (dx * dx + dy * dy + dz * dz).sqrt().max(MIN_RANGE);
    ([dx / d, dy / d, dz / d], d)
}

/// Solves `(H^T H + ridge) step = H^T f` over the first `dims` coordinates.
fn solve_normal(rows: &[[f64; 3]], f: &[f64], dims: usize) -> Option<[f64; 3]> {
    let mut hth = [[0.0f64; 3]; 3];
    let mut htf = [0.0f64; 3];
    for (row, fi) in rows.iter().zip(f) {
        for a in 0..dims {
            htf[a] += row[a] * fi;
            for b in 0..dims {
                hth[a][b] += row[a] * row[b];
            }
        }
    }
    for (a, col) in hth.iter_mut().enumerate().take(dims) {
        col[a] += RIDGE;
    }

    if dims == 2 {
        let inv = invert_2x2([[hth[0][0], hth[0][1]], [hth[1][0], hth[1][1]]])?;
        Some([
            inv[0][0] * htf[0] + inv[0][1] * htf[1],
            inv[1][0] * htf[0] + inv[1][1] * htf[1],
            0.0,
        ])
    } else {
        let inv = invert_3x3(hth)?;
        Some([
            inv[0][0] * htf[0] + inv[0][1] * htf[1] + inv[0][2] * htf[2],
            inv[1][0] * htf[0] + inv[1][1] * htf[1] + inv[1][2] * htf[2],
            inv[2][0] * htf[0] + inv[2][1] * htf[1] + inv[2][2] * htf[2],
        ])
    }
}

/// Determinant of the 2x2 Gram matrix of the first two row coordinates.
fn gram_det2(rows: &[[f64; 3]]) -> f64 {
    let mut g = [[0.0f64; 2]; 2];
    for row in rows {
        for a in 0..2 {
            for b in 0..2 {
                g[a][b] += row[a] * row[b];
            }
        }
    }
    (g[0][0] * g[1][1] - g[0][1] * g[1][0]).abs()
}

fn gdop_from_rows(rows: &[[f64; 3]], dims: usize) -> f64 {
    let mut hth = [[0.0f64; 3]; 3];
    for row in rows {
        for a in 0..dims {
            for b in 0..dims {
                hth[a][b] += row[a] * row[b];
            }
        }
    }
    let trace_inv = if dims == 2 {
        invert_2x2([[hth[0][0], hth[0][1]], [hth[1][0], hth[1][1]]])
            .map(|inv| inv[0][0] + inv[1][1])
    } else {
        invert_3x3(hth).map(|inv| inv[0][0] + inv[1][1] + inv[2][2])
    };
    match trace_inv {
        Some(t) if t >= 0.0 => t.sqrt(),
        _ => f64::INFINITY,
    }
}

fn invert_2x2(m: [[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det.abs() < 1e-12 {
        return None;
    }
    Some([
        [m[1][1] / det, -m[0][1] / det],
        [-m[1][0] / det, m[0][0] / det],
    ])
}

fn invert_3x3(m: [[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let c00 = m[1][1] * m[2][2] - m[1][2] * m[2][1];
    let c01 = m[1][2] * m[2][0] - m[1][0] * m[2][2];
    let c02 = m[1][0] * m[2][1] - m[1][1] * m[2][0];
    let det = m[0][0] * c00 + m[0][1] * c01 + m[0][2] * c02;
    if det.abs() < 1e-12 {
        return None;
    }
    Some([
        [
            c00 / det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) / det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) / det,
        ],
        [
            c01 / det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) / det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) / det,
        ],
        [
            c02 / det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) / det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) / det,
        ],
    ])
}

fn step_norm(step: &[f64; 3]) -> f64 {
    (step[0] * step[0] + step[1] * step[1] + step[2] * step[2]).sqrt()
}

fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

#[allow(clippy::too_many_arguments)]
fn finish_fix(
    method: GeoMethod,
    position: Position,
    sensors: &[SensorPosition],
    residuals: &[f64],
    dims: usize,
    iterations: usize,
    converged: bool,
    fixed_confidence: Option<f64>,
) -> GeolocationResult {
    let gdop = los_gdop(sensors, &position, dims);
    let mut confidence =
        fixed_confidence.unwrap_or_else(|| (1.0 - gdop / 10.0).clamp(0.0, 1.0));
    if !converged {
        confidence *= 0.5;
    }
    let horizontal_error = CEP_FACTOR * rms(residuals);
    GeolocationResult {
        position,
        confidence,
        method,
        gdop,
        horizontal_error,
        vertical_error: if dims == 3 { horizontal_error } else { 0.0 },
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_4, PI};

    fn triangle() -> Vec<SensorPosition> {
        vec![
            SensorPosition::new("s0", 0.0, 0.0),
            SensorPosition::new("s1", 100.0, 0.0),
            SensorPosition::new("s2", 0.0, 100.0),
        ]
    }

    fn toas_for(sensors: &[SensorPosition], emitter: &Position, bias: f64) -> Vec<f64> {
        sensors
            .iter()
            .map(|s| s.distance_to(emitter) / SPEED_OF_LIGHT + bias)
            .collect()
    }

    #[test]
    fn test_tdoa_triangle_fix() {
        let sensors = triangle();
        let emitter = Position::new(50.0, 50.0, 0.0);
        let fix = locate_tdoa(&sensors, &toas_for(&sensors, &emitter, 0.0)).unwrap();
        assert!(fix.converged);
        assert_eq!(fix.method, GeoMethod::Tdoa);
        assert!((fix.position.x - 50.0).abs() < 1e-2);
        assert!((fix.position.y - 50.0).abs() < 1e-2);
        assert!(fix.iterations <= 20);
        assert!(fix.gdop.is_finite());
        assert!(fix.confidence > 0.0 && fix.confidence <= 1.0);
        assert_eq!(fix.vertical_error, 0.0);
    }

    #[test]
    fn test_tdoa_clock_bias_cancels() {
        let sensors = triangle();
        let emitter = Position::new(30.0, 70.0, 0.0);
        let a = locate_tdoa(&sensors, &toas_for(&sensors, &emitter, 0.0)).unwrap();
        let b = locate_tdoa(&sensors, &toas_for(&sensors, &emitter, 1e-3)).unwrap();
        assert!(a.position.distance_to(&b.position) < 1e-6);
    }

    #[test]
    fn test_tdoa_3d_fix() {
        let sensors = vec![
            SensorPosition::new_3d("a", 0.0, 0.0, 0.0),
            SensorPosition::new_3d("b", 100.0, 0.0, 0.0),
            SensorPosition::new_3d("c", 0.0, 100.0, 0.0),
            SensorPosition::new_3d("d", 0.0, 0.0, 100.0),
            SensorPosition::new_3d("e", 100.0, 100.0, 50.0),
        ];
        let emitter = Position::new(30.0, 40.0, 20.0);
        let fix = locate_tdoa(&sensors, &toas_for(&sensors, &emitter, 0.0)).unwrap();
        assert!(fix.converged);
        assert!(fix.position.distance_to(&emitter) < 1e-2);
        assert!(fix.vertical_error >= 0.0);
    }

    #[test]
    fn test_tdoa_needs_three_sensors() {
        let sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
        ];
        let err = locate_tdoa(&sensors, &[0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientSensors {
                method: "tdoa",
                required: 3,
                provided: 2,
            }
        ));
    }

    #[test]
    fn test_tdoa_measurement_count_must_match() {
        let err = locate_tdoa(&triangle(), &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SignalError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_aoa_perpendicular_bearings() {
        let sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
        ];
        // Both sensors sight an emitter at (50, 50).
        let fix = locate_aoa(&sensors, &[FRAC_PI_4, 3.0 * FRAC_PI_4]).unwrap();
        assert!(fix.converged);
        assert!((fix.position.x - 50.0).abs() < 1e-6);
        assert!((fix.position.y - 50.0).abs() < 1e-6);
        assert!((fix.confidence - 1.0).abs() < 1e-9);
        assert!((fix.horizontal_error).abs() < 1e-6);
    }

    #[test]
    fn test_aoa_parallel_bearings_degrade() {
        let sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
        ];
        let fix = locate_aoa(&sensors, &[FRAC_PI_4, FRAC_PI_4]).unwrap();
        assert!(!fix.converged);
        assert_eq!(fix.confidence, 0.0);
        // Falls back to the centroid rather than erroring.
        assert!((fix.position.x - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_aoa_needs_two_sensors() {
        let err = locate_aoa(&[SensorPosition::new("a", 0.0, 0.0)], &[0.0]).unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientSensors {
                method: "aoa",
                required: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_rss_square_fix() {
        let sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
            SensorPosition::new("c", 100.0, 100.0),
            SensorPosition::new("d", 0.0, 100.0),
        ];
        let emitter = Position::new(30.0, 60.0, 0.0);
        let params = RssParams::default();
        let rssi: Vec<f64> = sensors
            .iter()
            .map(|s| {
                let d = s.distance_to(&emitter);
                params.tx_power_dbm
                    - 10.0 * params.path_loss_exponent * (d / params.reference_distance).log10()
            })
            .collect();

        let fix = locate_rss(&sensors, &rssi, params).unwrap();
        assert!(fix.converged);
        assert_eq!(fix.method, GeoMethod::Rss);
        assert!(fix.position.distance_to(&emitter) < 1e-2);
        assert!((fix.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rss_needs_three_sensors() {
        let sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
        ];
        let err = locate_rss(&sensors, &[-40.0, -40.0], RssParams::default()).unwrap_err();
        assert!(matches!(
            err,
            SignalError::InsufficientSensors {
                method: "rss",
                required: 3,
                provided: 2,
            }
        ));
    }

    #[test]
    fn test_hybrid_fuses_both_fixes() {
        let tdoa_sensors = triangle();
        let emitter = Position::new(50.0, 50.0, 0.0);
        let toas = toas_for(&tdoa_sensors, &emitter, 0.0);

        let aoa_sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
        ];
        let fix =
            locate_hybrid(&tdoa_sensors, &toas, &aoa_sensors, &[FRAC_PI_4, 3.0 * FRAC_PI_4])
                .unwrap();
        assert_eq!(fix.method, GeoMethod::Hybrid);
        assert!(fix.converged);
        assert!(fix.position.distance_to(&emitter) < 1e-2);
        assert!(fix.confidence > 0.0 && fix.confidence <= 1.0);
    }

    #[test]
    fn test_gdop_square_geometry() {
        let sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
            SensorPosition::new("c", 100.0, 100.0),
            SensorPosition::new("d", 0.0, 100.0),
        ];
        let gdop = compute_gdop(&sensors, &Position::new(50.0, 50.0, 0.0));
        assert!((gdop - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reported_gdop_matches_compute_gdop() {
        let sensors = triangle();
        let emitter = Position::new(50.0, 50.0, 0.0);
        let fix = locate_tdoa(&sensors, &toas_for(&sensors, &emitter, 0.0)).unwrap();
        assert!((fix.gdop - compute_gdop(&sensors, &fix.position)).abs() < 1e-12);

        let aoa_sensors = vec![
            SensorPosition::new("a", 0.0, 0.0),
            SensorPosition::new("b", 100.0, 0.0),
        ];
        let aoa = locate_aoa(&aoa_sensors, &[FRAC_PI_4, 3.0 * FRAC_PI_4]).unwrap();
        assert!((aoa.gdop - compute_gdop(&aoa_sensors, &aoa.position)).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_delay_integer_lag() {
        let mut seed = 99u64;
        let mut noise = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 33) as f64 / (1u64 << 31) as f64 - 0.5
        };
        let a: Vec<Complex64> = (0..256).map(|_| Complex64::new(noise(), noise())).collect();
        let mut b = vec![Complex64::new(0.0, 0.0); 256];
        for t in 5..256 {
            b[t] = a[t - 5];
        }

        let d = estimate_delay(&a, &b).unwrap();
        assert!((d - 5.0).abs() < 0.1, "d={d}");
        let back = estimate_delay(&b, &a).unwrap();
        assert!((back + 5.0).abs() < 0.1, "back={back}");
    }

    #[test]
    fn test_result_wire_names() {
        let sensors = triangle();
        let emitter = Position::new(50.0, 50.0, 0.0);
        let fix = locate_tdoa(&sensors, &toas_for(&sensors, &emitter, 0.0)).unwrap();
        let json = serde_json::to_string(&fix).unwrap();
        assert!(json.contains("\"horizontalError\""));
        assert!(json.contains("\"verticalError\""));
        assert!(json.contains("\"gdop\""));
        assert!(json.contains("\"method\":\"tdoa\""));
    }
}
