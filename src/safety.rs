//! Safe-distance calculation.
//!
//! Pure functions of the operator speed (km/h) and the live weight. The
//! arithmetic order is fixed so results are reproducible bit for bit.

use crate::config;

/// km/h to m/s.
pub fn scale_speed(speed_kmh: f64) -> f64 {
    speed_kmh * 1000.0 / 3600.0
}

/// Safe distance for `speed_kmh` and `weight`.
///
/// `None` when either input is zero or not finite: the braking term divides
/// by `weight * speed`.
pub fn safe_distance(speed_kmh: f64, weight: f64) -> Option<f64> {
    if !speed_kmh.is_finite() || !weight.is_finite() || speed_kmh == 0.0 || weight == 0.0 {
        return None;
    }
    let scaled = scale_speed(speed_kmh);
    let distance = scaled * 2.5 + (0.5 * weight * (scaled * scaled) / ((weight * speed_kmh) / 10.0));
    distance.is_finite().then_some(distance)
}

/// Clamp to the slider range and quantise to its step.
///
/// Non-finite input falls back to the default speed.
pub fn clamp_speed(speed_kmh: f64) -> f64 {
    if !speed_kmh.is_finite() {
        return config::DEFAULT_SPEED_KMH;
    }
    let clamped = speed_kmh.clamp(config::SPEED_MIN_KMH, config::SPEED_MAX_KMH);
    (clamped * config::SPEED_STEPS_PER_KMH).round() / config::SPEED_STEPS_PER_KMH
}

/// Operator speed and the distance derived from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivedMetrics {
    pub speed: f64,
    pub safe_distance: Option<f64>,
}

impl DerivedMetrics {
    pub fn compute(speed_kmh: f64, weight: f64) -> Self {
        Self {
            speed: speed_kmh,
            safe_distance: safe_distance(speed_kmh, weight),
        }
    }
}

impl Default for DerivedMetrics {
    fn default() -> Self {
        Self::compute(config::DEFAULT_SPEED_KMH, 0.0)
    }
}
