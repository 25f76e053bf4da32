//! Four-pole ladder (LP24 / HP24)

use std::f64::consts::PI;

use fe_core::{ChannelBuffer, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels, flush_denormal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum LadderMode {
    #[default]
    LowPass,
    HighPass,
}

/// Simple four stage ladder with resonance feedback from the last stage
#[derive(Debug, Clone)]
pub struct Ladder {
    stages: [[f64; 4]; MAX_CHANNELS],
    mode: LadderMode,
    cut: f64,
    res: f64,
}

impl Default for Ladder {
    fn default() -> Self {
        Self {
            stages: [[0.0; 4]; MAX_CHANNELS],
            mode: LadderMode::LowPass,
            cut: 0.0,
            res: 0.3,
        }
    }
}

impl Ladder {
    #[inline]
    fn process_sample(&self, s: &mut [f64; 4], input: f64) -> f64 {
        let input = input - s[3] * self.res;

        s[0] = flush_denormal(s[0] + (input - s[0]) * self.cut);
        s[1] = flush_denormal(s[1] + (s[0] - s[1]) * self.cut);
        s[2] = flush_denormal(s[2] + (s[1] - s[2]) * self.cut);
        s[3] = flush_denormal(s[3] + (s[2] - s[3]) * self.cut);

        match self.mode {
            LadderMode::LowPass => 2.0 * s[3],
            // Binomial mix of the stage outputs: (1 - H)^4
            LadderMode::HighPass => 2.0 * (input - 4.0 * s[0] + 6.0 * s[1] - 4.0 * s[2] + s[3]),
        }
    }
}

impl FilterTopology for Ladder {
    const ID: &'static str = "ladder";
    const MODES: &'static [&'static str] = &["LP24", "HP24"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] =
        &[CoefficientType::LowPassReso, CoefficientType::HighPass];

    fn set_sub_type(&mut self, sub_type: usize) {
        self.mode = match sub_type {
            0 => LadderMode::LowPass,
            1 => LadderMode::HighPass,
            _ => return,
        };
    }

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, q: f64, _gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);

        self.cut = (2.0 * PI * frequency / sample_rate).clamp(0.0, 0.8);
        self.res = (q / 2.0).clamp(0.3, 4.0);
    }

    fn reset(&mut self, num_channels: usize) {
        for s in self.stages.iter_mut().take(num_channels.min(MAX_CHANNELS)) {
            *s = [0.0; 4];
        }
    }

    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        for c in 0..active_channels(buffer) {
            let mut s = self.stages[c];

            for x in buffer.range_mut(c, start_sample, num_samples) {
                *x = self.process_sample(&mut s, *x);
            }

            self.stages[c] = s;
        }
    }

    fn process_frame(&mut self, frame: &mut [f64]) {
        for (c, x) in frame.iter_mut().take(MAX_CHANNELS).enumerate() {
            let mut s = self.stages[c];
            *x = self.process_sample(&mut s, *x);
            self.stages[c] = s;
        }
    }
}
