//! Parameter limits for filter frequency, resonance and gain
//!
//! Every setter on the filter engine passes its value through these
//! sanitisers, so NaN or out-of-range input never reaches a coefficient
//! calculation.

/// Lowest cutoff frequency in Hz
pub const LOW_FREQUENCY: f64 = 20.0;
/// Highest cutoff frequency in Hz (before the sample-rate dependent limit)
pub const HIGH_FREQUENCY: f64 = 20000.0;
/// Fraction of the sample rate the cutoff may reach
pub const MAX_FREQUENCY_RATIO: f64 = 0.49;

pub const LOW_Q: f64 = 0.3;
pub const HIGH_Q: f64 = 9.999;

/// Gain range in dB; gains are stored as linear factors
pub const LOW_GAIN_DB: f64 = -18.0;
pub const HIGH_GAIN_DB: f64 = 18.0;

pub const DEFAULT_FREQUENCY: f64 = 1000.0;
pub const DEFAULT_Q: f64 = 1.0;
pub const DEFAULT_GAIN: f64 = 1.0;

/// Clamp helpers for filter parameters
pub struct FilterLimits;

impl FilterLimits {
    /// Clamp `value` into `[min, max]`, mapping NaN to `fallback`
    #[inline]
    pub fn limit(min: f64, max: f64, value: f64, fallback: f64) -> f64 {
        if value.is_nan() {
            fallback.clamp(min, max)
        } else {
            value.clamp(min, max)
        }
    }

    /// Upper frequency bound for a sample rate
    #[inline]
    pub fn max_frequency(sample_rate: f64) -> f64 {
        if sample_rate > 0.0 && sample_rate.is_finite() {
            (sample_rate * MAX_FREQUENCY_RATIO).clamp(LOW_FREQUENCY, HIGH_FREQUENCY)
        } else {
            HIGH_FREQUENCY
        }
    }

    #[inline]
    pub fn limit_frequency(freq: f64, sample_rate: f64) -> f64 {
        Self::limit(LOW_FREQUENCY, Self::max_frequency(sample_rate), freq, DEFAULT_FREQUENCY)
    }

    #[inline]
    pub fn limit_q(q: f64) -> f64 {
        Self::limit(LOW_Q, HIGH_Q, q, DEFAULT_Q)
    }

    #[inline]
    pub fn min_gain() -> f64 {
        10.0_f64.powf(LOW_GAIN_DB / 20.0)
    }

    #[inline]
    pub fn max_gain() -> f64 {
        10.0_f64.powf(HIGH_GAIN_DB / 20.0)
    }

    /// Clamp a linear gain factor to the ±18 dB range
    #[inline]
    pub fn limit_gain(gain: f64) -> f64 {
        Self::limit(Self::min_gain(), Self::max_gain(), gain, DEFAULT_GAIN)
    }

    #[inline]
    pub fn limit_gain_db(gain_db: f64) -> f64 {
        Self::limit(LOW_GAIN_DB, HIGH_GAIN_DB, gain_db, 0.0)
    }
}
