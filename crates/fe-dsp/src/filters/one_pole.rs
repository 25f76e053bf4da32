//! Single-pole lowpass/highpass

use std::f64::consts::PI;

use fe_core::{ChannelBuffer, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels, flush_denormal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OnePoleMode {
    #[default]
    LowPass,
    HighPass,
}

#[derive(Debug, Clone)]
pub struct OnePole {
    last: [f64; MAX_CHANNELS],
    mode: OnePoleMode,
    a0: f64,
    b1: f64,
}

impl Default for OnePole {
    fn default() -> Self {
        Self {
            last: [0.0; MAX_CHANNELS],
            mode: OnePoleMode::LowPass,
            a0: 1.0,
            b1: 0.0,
        }
    }
}

impl FilterTopology for OnePole {
    const ID: &'static str = "one_pole";
    const MODES: &'static [&'static str] = &["LP", "HP"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] =
        &[CoefficientType::LowPass, CoefficientType::HighPass];

    fn set_sub_type(&mut self, sub_type: usize) {
        self.mode = match sub_type {
            0 => OnePoleMode::LowPass,
            1 => OnePoleMode::HighPass,
            _ => return,
        };
    }

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, _q: f64, _gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);
        let x = (-2.0 * PI * frequency / sample_rate).exp();

        self.a0 = 1.0 - x;
        self.b1 = -x;
    }

    fn reset(&mut self, num_channels: usize) {
        for last in self.last.iter_mut().take(num_channels.min(MAX_CHANNELS)) {
            *last = 0.0;
        }
    }

    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        let (a0, b1) = (self.a0, self.b1);

        for c in 0..active_channels(buffer) {
            let mut last = self.last[c];
            let samples = buffer.range_mut(c, start_sample, num_samples);

            match self.mode {
                OnePoleMode::LowPass => {
                    for x in samples {
                        last = flush_denormal(a0 * *x - b1 * last);
                        *x = last;
                    }
                }
                OnePoleMode::HighPass => {
                    for x in samples {
                        last = flush_denormal(a0 * *x - b1 * last);
                        *x -= last;
                    }
                }
            }

            self.last[c] = last;
        }
    }

    fn process_frame(&mut self, frame: &mut [f64]) {
        for (x, last) in frame.iter_mut().zip(self.last.iter_mut()) {
            *last = flush_denormal(self.a0 * *x - self.b1 * *last);

            match self.mode {
                OnePoleMode::LowPass => *x = *last,
                OnePoleMode::HighPass => *x -= *last,
            }
        }
    }
}
