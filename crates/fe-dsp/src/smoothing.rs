//! Parameter Smoothing
//!
//! Linear ramps for filter parameters:
//! - Ramp length fixed in real time, independent of sample rate
//! - Block-rate advance (`skip`) for coefficient recomputation
//! - Zero allocation in audio thread

/// Default ramp length in seconds
pub const DEFAULT_SMOOTHING_TIME: f64 = 0.03;

/// Linearly ramped parameter value
///
/// A new target restarts the ramp from the current value; the ramp always
/// spans `ramp_seconds * sample_rate` samples.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    /// Current smoothed value
    current: f64,
    /// Ramp destination
    target: f64,
    /// Step size per sample
    step: f64,
    /// Remaining samples of the active ramp
    remaining: usize,
    /// Ramp length in samples
    ramp_samples: usize,
}

impl SmoothedValue {
    pub fn new(initial_value: f64) -> Self {
        Self {
            current: initial_value,
            target: initial_value,
            step: 0.0,
            remaining: 0,
            ramp_samples: 0,
        }
    }

    /// Reconfigure the ramp length and jump to the target
    pub fn reset(&mut self, sample_rate: f64, ramp_seconds: f64) {
        let samples = (sample_rate * ramp_seconds.max(0.0)).round();
        self.ramp_samples = if samples.is_finite() { samples as usize } else { 0 };
        self.set_immediate(self.target);
    }

    /// Start a ramp towards `value`
    #[inline]
    pub fn set_target(&mut self, value: f64) {
        if value == self.target {
            return;
        }

        self.target = value;

        if self.ramp_samples == 0 {
            self.set_immediate(value);
            return;
        }

        self.remaining = self.ramp_samples;
        self.step = (self.target - self.current) / self.ramp_samples as f64;
    }

    /// Set current value immediately (no ramp)
    pub fn set_immediate(&mut self, value: f64) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.remaining = 0;
    }

    /// Advance one sample
    #[inline]
    pub fn next(&mut self) -> f64 {
        self.skip(1)
    }

    /// Advance `num_samples` samples and return the new value
    #[inline]
    pub fn skip(&mut self, num_samples: usize) -> f64 {
        if self.remaining == 0 {
            return self.current;
        }

        if num_samples >= self.remaining {
            self.current = self.target;
            self.remaining = 0;
        } else {
            self.current += self.step * num_samples as f64;
            self.remaining -= num_samples;
        }

        self.current
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Check if a ramp is in progress
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    /// Ramp length in samples
    #[inline]
    pub fn ramp_samples(&self) -> usize {
        self.ramp_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_smoothing() {
        let mut value = SmoothedValue::new(0.0);
        value.reset(1000.0, 0.01);
        value.set_target(1.0);

        assert_eq!(value.ramp_samples(), 10);
        assert_relative_eq!(value.next(), 0.1, epsilon = 1e-12);
        assert_relative_eq!(value.skip(4), 0.5, epsilon = 1e-12);
        assert!(value.is_smoothing());

        assert_eq!(value.skip(100), 1.0);
        assert!(!value.is_smoothing());
    }

    #[test]
    fn test_no_ramp_when_time_is_zero() {
        let mut value = SmoothedValue::new(2.0);
        value.reset(48000.0, 0.0);
        value.set_target(5.0);

        assert!(!value.is_smoothing());
        assert_eq!(value.current(), 5.0);
    }

    #[test]
    fn test_retarget_mid_ramp() {
        let mut value = SmoothedValue::new(0.0);
        value.reset(100.0, 0.1);
        value.set_target(10.0);
        value.skip(5);

        value.set_target(0.0);
        assert_relative_eq!(value.current(), 5.0, epsilon = 1e-12);
        assert_eq!(value.skip(10), 0.0);
    }

    #[test]
    fn test_reset_lands_on_target() {
        let mut value = SmoothedValue::new(0.0);
        value.reset(44100.0, DEFAULT_SMOOTHING_TIME);
        value.set_target(1000.0);
        value.skip(10);

        value.reset(96000.0, DEFAULT_SMOOTHING_TIME);
        assert_eq!(value.current(), 1000.0);
        assert_eq!(value.ramp_samples(), 2880);
    }
}
