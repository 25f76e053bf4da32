//! Ring modulator with an internal sine oscillator

use std::f64::consts::TAU;

use fe_core::{ChannelBuffer, Decibels, FilterLimits, HIGH_GAIN_DB, LOW_GAIN_DB};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels};

/// Sine ring modulator
///
/// `frequency` sets the oscillator rate. The gain sets its depth: the
/// -18..+18 dB gain range maps linearly onto 0..1, so 0 dB is half depth
/// and a linear gain of 0 leaves the signal dry. The oscillator phase is
/// shared by all channels.
#[derive(Debug, Clone, Default)]
pub struct RingMod {
    phase: f64,
    phase_delta: f64,
    depth: f64,
}

impl RingMod {
    fn depth_for_gain(gain: f64) -> f64 {
        let depth = (Decibels::from_gain(gain).0 - LOW_GAIN_DB) / (HIGH_GAIN_DB - LOW_GAIN_DB);
        if depth.is_nan() { 0.0 } else { depth.clamp(0.0, 1.0) }
    }

    #[inline]
    fn advance(&mut self) {
        self.phase += self.phase_delta;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
    }
}

impl FilterTopology for RingMod {
    const ID: &'static str = "ring_mod";
    const MODES: &'static [&'static str] = &["RingMod"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] = &[CoefficientType::AllPass];

    fn set_sub_type(&mut self, _sub_type: usize) {}

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, _q: f64, gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);

        self.phase_delta = frequency / sample_rate * TAU;
        self.depth = Self::depth_for_gain(gain);
    }

    fn reset(&mut self, _num_channels: usize) {
        self.phase = 0.0;
    }

    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        let dry = 1.0 - self.depth;
        let num_channels = active_channels(buffer);

        for i in start_sample..start_sample + num_samples {
            let osc = self.depth * self.phase.sin();

            for c in 0..num_channels {
                let input = buffer.get_sample(c, i);
                buffer.set_sample(c, i, dry * input + input * osc);
            }

            self.advance();
        }
    }

    fn process_frame(&mut self, frame: &mut [f64]) {
        let dry = 1.0 - self.depth;
        let osc = self.depth * self.phase.sin();

        for x in frame.iter_mut().take(MAX_CHANNELS) {
            *x = dry * *x + *x * osc;
        }

        self.advance();
    }
}
