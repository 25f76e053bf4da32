//! Trapezoidal state variable filter
//!
//! One TPT integrator pair per channel produces every output at once, so
//! sub-types differ only in the output mix. Coefficients can be swept
//! without the zipper noise of direct-form biquads.

use std::f64::consts::PI;

use fe_core::{ChannelBuffer, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels, flush_denormal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum SvfMode {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    Notch,
    AllPass,
    Peak,
}

/// Integrator state (`ic1eq`, `ic2eq`)
#[derive(Debug, Clone, Copy, Default)]
struct SvfState {
    ic1eq: f64,
    ic2eq: f64,
}

#[derive(Debug, Clone)]
pub struct StateVariable {
    state: [SvfState; MAX_CHANNELS],
    mode: SvfMode,
    k: f64,
    a1: f64,
    a2: f64,
    a3: f64,
}

impl Default for StateVariable {
    fn default() -> Self {
        let mut svf = Self {
            state: [SvfState::default(); MAX_CHANNELS],
            mode: SvfMode::LowPass,
            k: 1.0,
            a1: 1.0,
            a2: 0.0,
            a3: 0.0,
        };
        svf.update_coefficients(44100.0, 1000.0, 1.0, 1.0);
        svf
    }
}

impl StateVariable {
    #[inline]
    fn process_sample(&self, s: &mut SvfState, v0: f64) -> f64 {
        let v3 = v0 - s.ic2eq;
        let v1 = self.a1 * s.ic1eq + self.a2 * v3;
        let v2 = s.ic2eq + self.a2 * s.ic1eq + self.a3 * v3;

        s.ic1eq = flush_denormal(2.0 * v1 - s.ic1eq);
        s.ic2eq = flush_denormal(2.0 * v2 - s.ic2eq);

        match self.mode {
            SvfMode::LowPass => v2,
            SvfMode::HighPass => v0 - self.k * v1 - v2,
            SvfMode::BandPass => v1,
            SvfMode::Notch => v0 - self.k * v1,
            SvfMode::AllPass => v0 - 2.0 * self.k * v1,
            SvfMode::Peak => v2 - (v0 - self.k * v1 - v2),
        }
    }
}

impl FilterTopology for StateVariable {
    const ID: &'static str = "svf";
    const MODES: &'static [&'static str] = &["LP", "HP", "BP", "Notch", "Allpass", "Peak"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] = &[
        CoefficientType::LowPassReso,
        CoefficientType::HighPass,
        CoefficientType::BandPass,
        CoefficientType::BandPass,
        CoefficientType::AllPass,
        CoefficientType::Peak,
    ];

    fn set_sub_type(&mut self, sub_type: usize) {
        self.mode = match sub_type {
            0 => SvfMode::LowPass,
            1 => SvfMode::HighPass,
            2 => SvfMode::BandPass,
            3 => SvfMode::Notch,
            4 => SvfMode::AllPass,
            5 => SvfMode::Peak,
            _ => return,
        };
    }

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, q: f64, _gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);
        let scaled_q = (q * 0.1).clamp(0.0, 0.9999);

        let g = (PI * frequency / sample_rate).tan();
        self.k = 1.0 - 0.99 * scaled_q;

        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    fn reset(&mut self, num_channels: usize) {
        for s in self.state.iter_mut().take(num_channels.min(MAX_CHANNELS)) {
            *s = SvfState::default();
        }
    }

    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        for c in 0..active_channels(buffer) {
            let mut s = self.state[c];

            for x in buffer.range_mut(c, start_sample, num_samples) {
                *x = self.process_sample(&mut s, *x);
            }

            self.state[c] = s;
        }
    }

    fn process_frame(&mut self, frame: &mut [f64]) {
        for (c, x) in frame.iter_mut().take(MAX_CHANNELS).enumerate() {
            let mut s = self.state[c];
            *x = self.process_sample(&mut s, *x);
            self.state[c] = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::test_support::{assert_frames_match_block, decay_tail, is_flushed};

    fn last_dc_output(sub_type: usize) -> f64 {
        let mut svf = StateVariable::default();
        svf.set_sub_type(sub_type);
        svf.update_coefficients(44100.0, 1000.0, 1.0, 1.0);

        let mut buffer = ChannelBuffer::from_channels(vec![vec![1.0; 20_000]]);
        svf.process_samples(&mut buffer, 0, 20_000);
        buffer.get_sample(0, 19_999)
    }

    #[test]
    fn test_dc_response_per_mode() {
        assert!((last_dc_output(0) - 1.0).abs() < 1e-6, "lowpass");
        assert!(last_dc_output(1).abs() < 1e-6, "highpass");
        assert!(last_dc_output(2).abs() < 1e-6, "bandpass");
        assert!((last_dc_output(3) - 1.0).abs() < 1e-6, "notch");
        assert!((last_dc_output(4) - 1.0).abs() < 1e-6, "allpass");
        assert!((last_dc_output(5) - 1.0).abs() < 1e-6, "peak");
    }

    #[test]
    fn test_modes_share_state() {
        let mut svf = StateVariable::default();
        svf.update_coefficients(48000.0, 500.0, 2.0, 1.0);

        let mut buffer = ChannelBuffer::from_channels(vec![vec![0.5; 256]]);
        svf.process_samples(&mut buffer, 0, 128);
        svf.set_sub_type(1);
        svf.process_samples(&mut buffer, 128, 128);

        assert!(buffer.channel(0).iter().all(|x| x.is_finite()));
        assert_ne!(svf.state[0].ic2eq, 0.0);
    }

    #[test]
    fn test_integrators_never_go_subnormal() {
        let mut svf = StateVariable::default();
        svf.update_coefficients(44100.0, 8000.0, 20.0, 1.0);

        decay_tail(&mut svf, 400_000, |f| {
            assert!(is_flushed(f.state[0].ic1eq));
            assert!(is_flushed(f.state[0].ic2eq));
        });
    }

    #[test]
    fn test_frame_output_matches_block_output() {
        let mut svf = StateVariable::default();
        svf.set_sub_type(3);
        svf.update_coefficients(44100.0, 1500.0, 4.0, 1.0);

        assert_frames_match_block(svf.clone(), svf);
    }
}
