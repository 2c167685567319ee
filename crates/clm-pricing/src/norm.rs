//! Scalar building blocks shared by every updater.
//!
//! All functions here are pure and total: missing observations and zero
//! baselines map to the neutral point instead of failing.

/// The neutral normalized value.
pub const NEUTRAL: f64 = 0.5;

/// Position of `x` relative to twice its baseline, clamped to [0,1].
///
/// - `x` absent (or non-finite) => exactly 0.5
/// - `media <= 0` => 0.5 for every observation
/// - `x == media` => 0.5
pub fn norm_vs_media(x: Option<f64>, media: f64) -> f64 {
    match x {
        Some(v) if v.is_finite() && media.is_finite() && media > 0.0 => {
            (v / (2.0 * media)).clamp(0.0, 1.0)
        }
        _ => NEUTRAL,
    }
}

/// Exam urgency in [0,1] from days remaining.
///
/// Beyond `clamp_days` there is no urgency; at one day or less urgency is
/// maximal; in between a logistic curve centred on `d0` with steepness `k`.
/// Non-increasing in `days` for `k >= 0`.
pub fn ex_from_days(days: f64, d0: f64, k: f64, clamp_days: f64) -> f64 {
    if days >= clamp_days {
        return 0.0;
    }
    if days <= 1.0 {
        return 1.0;
    }
    1.0 / (1.0 + (k * (days - d0)).exp())
}

/// Signed deviation from neutral.
#[inline]
pub fn dev(z: f64) -> f64 {
    z - NEUTRAL
}

/// Exponential smoothing of `raw` toward `prev`.
#[inline]
pub fn ema(prev: f64, raw: f64, alpha: f64) -> f64 {
    prev + alpha * (raw - prev)
}

/// Limit `target` to `[prev·(1−pct), prev·(1+pct)]`.
pub fn clamp_move(prev: f64, target: f64, pct: f64) -> f64 {
    let lo = prev * (1.0 - pct);
    let hi = prev * (1.0 + pct);
    target.max(lo).min(hi)
}
