//! 4th-order Linkwitz-Riley crossover
//!
//! Lowpass and highpass run in parallel on every sample; the allpass output
//! is their sum, so switching between outputs never leaves stale history.

use std::f64::consts::{PI, SQRT_2};

use fe_core::{ChannelBuffer, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels, flush_denormal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CrossoverOutput {
    #[default]
    LowPass,
    HighPass,
    AllPass,
}

/// Direct form I history of one 4th-order section
#[derive(Debug, Clone, Copy, Default)]
struct Section {
    x: [f64; 4],
    y: [f64; 4],
}

impl Section {
    #[inline]
    fn process(&mut self, input: f64, b: &[f64; 5], a: &[f64; 4]) -> f64 {
        let output = flush_denormal(
            b[0] * input + b[1] * self.x[0] + b[2] * self.x[1] + b[3] * self.x[2] + b[4] * self.x[3]
                - a[0] * self.y[0]
                - a[1] * self.y[1]
                - a[2] * self.y[2]
                - a[3] * self.y[3],
        );

        self.x = [input, self.x[0], self.x[1], self.x[2]];
        self.y = [output, self.y[0], self.y[1], self.y[2]];
        output
    }
}

#[derive(Debug, Clone)]
pub struct LinkwitzRiley {
    lowpass: [Section; MAX_CHANNELS],
    highpass: [Section; MAX_CHANNELS],
    output: CrossoverOutput,
    lp_b: [f64; 5],
    hp_b: [f64; 5],
    /// Shared denominator
    a: [f64; 4],
}

impl Default for LinkwitzRiley {
    fn default() -> Self {
        let mut lr = Self {
            lowpass: [Section::default(); MAX_CHANNELS],
            highpass: [Section::default(); MAX_CHANNELS],
            output: CrossoverOutput::LowPass,
            lp_b: [0.0; 5],
            hp_b: [0.0; 5],
            a: [0.0; 4],
        };
        lr.update_coefficients(44100.0, 1000.0, 1.0, 1.0);
        lr
    }
}

impl LinkwitzRiley {
    #[inline]
    fn process_sample(&mut self, channel: usize, input: f64) -> f64 {
        let lp = self.lowpass[channel].process(input, &self.lp_b, &self.a);
        let hp = self.highpass[channel].process(input, &self.hp_b, &self.a);

        match self.output {
            CrossoverOutput::LowPass => lp,
            CrossoverOutput::HighPass => hp,
            CrossoverOutput::AllPass => lp + hp,
        }
    }
}

impl FilterTopology for LinkwitzRiley {
    const ID: &'static str = "linkwitzriley";
    const MODES: &'static [&'static str] = &["LP", "HP", "AP"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] = &[
        CoefficientType::LowPass,
        CoefficientType::HighPass,
        CoefficientType::AllPass,
    ];

    fn set_sub_type(&mut self, sub_type: usize) {
        self.output = match sub_type {
            0 => CrossoverOutput::LowPass,
            1 => CrossoverOutput::HighPass,
            2 => CrossoverOutput::AllPass,
            _ => return,
        };
    }

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, _q: f64, _gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);

        let wc = 2.0 * PI * frequency;
        let wc2 = wc * wc;
        let wc3 = wc2 * wc;
        let wc4 = wc2 * wc2;
        let k = wc / (PI * frequency / sample_rate).tan();
        let k2 = k * k;
        let k3 = k2 * k;
        let k4 = k2 * k2;
        let sq_tmp1 = SQRT_2 * wc3 * k;
        let sq_tmp2 = SQRT_2 * wc * k3;
        let a_tmp = 4.0 * wc2 * k2 + 2.0 * sq_tmp1 + k4 + 2.0 * sq_tmp2 + wc4;

        self.a = [
            (4.0 * (wc4 + sq_tmp1 - k4 - sq_tmp2)) / a_tmp,
            (6.0 * wc4 - 8.0 * wc2 * k2 + 6.0 * k4) / a_tmp,
            (4.0 * (wc4 - sq_tmp1 + sq_tmp2 - k4)) / a_tmp,
            (k4 - 2.0 * sq_tmp1 + wc4 - 2.0 * sq_tmp2 + 4.0 * wc2 * k2) / a_tmp,
        ];

        let lp = wc4 / a_tmp;
        self.lp_b = [lp, 4.0 * lp, 6.0 * lp, 4.0 * lp, lp];

        let hp = k4 / a_tmp;
        self.hp_b = [hp, -4.0 * hp, 6.0 * hp, -4.0 * hp, hp];
    }

    fn reset(&mut self, num_channels: usize) {
        let n = num_channels.min(MAX_CHANNELS);
        self.lowpass[..n].fill(Section::default());
        self.highpass[..n].fill(Section::default());
    }

    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        for c in 0..active_channels(buffer) {
            for x in buffer.range_mut(c, start_sample, num_samples) {
                *x = self.process_sample(c, *x);
            }
        }
    }

    fn process_frame(&mut self, frame: &mut [f64]) {
        for (c, x) in frame.iter_mut().take(MAX_CHANNELS).enumerate() {
            *x = self.process_sample(c, *x);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::test_support::{assert_frames_match_block, decay_tail, is_flushed};

    fn dc_output(sub_type: usize) -> f64 {
        let mut lr = LinkwitzRiley::default();
        lr.set_sub_type(sub_type);
        lr.update_coefficients(48000.0, 500.0, 1.0, 1.0);

        let mut buffer = ChannelBuffer::from_channels(vec![vec![1.0; 20_000]]);
        lr.process_samples(&mut buffer, 0, 20_000);
        buffer.get_sample(0, 19_999)
    }

    #[test]
    fn test_crossover_outputs_at_dc() {
        assert!((dc_output(0) - 1.0).abs() < 1e-6);
        assert!(dc_output(1).abs() < 1e-6);
        assert!((dc_output(2) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bands_are_in_phase_at_crossover() {
        let sr = 48000.0;
        let mut lr = LinkwitzRiley::default();
        lr.update_coefficients(sr, 1000.0, 1.0, 1.0);

        // Both outputs sit at -6 dB at the crossover frequency
        let mut lp = ChannelBuffer::new(1, 48_000);
        for i in 0..48_000 {
            lp.set_sample(0, i, (2.0 * PI * 1000.0 * i as f64 / sr).sin());
        }
        let mut hp = lp.clone();

        lr.process_samples(&mut lp, 0, 48_000);
        lr.reset(1);
        lr.set_sub_type(1);
        lr.process_samples(&mut hp, 0, 48_000);

        let peak = |b: &ChannelBuffer| b.channel(0)[24_000..].iter().fold(0.0_f64, |m, x| m.max(x.abs()));
        assert!((peak(&lp) - 0.5).abs() < 0.01);
        assert!((peak(&hp) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_section_history_never_goes_subnormal() {
        let mut lr = LinkwitzRiley::default();
        lr.set_sub_type(2);
        lr.update_coefficients(44100.0, 16000.0, 1.0, 1.0);

        decay_tail(&mut lr, 100_000, |f| {
            let (lp, hp) = (&f.lowpass[0], &f.highpass[0]);
            assert!(lp.y.iter().chain(&hp.y).all(|&y| is_flushed(y)));
        });
    }

    #[test]
    fn test_frame_output_matches_block_output() {
        let mut lr = LinkwitzRiley::default();
        lr.set_sub_type(1);
        lr.update_coefficients(48000.0, 2500.0, 1.0, 1.0);

        assert_frames_match_block(lr.clone(), lr);
    }
}
