//! Moog-style four stage ladder with 1, 2 and 4 pole outputs

use fe_core::{ChannelBuffer, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels, flush_denormal};

/// Highest resonance before the feedback loop stops decaying
const MAX_RESONANCE: f64 = 4.0;

/// Normalised cutoff ceiling that keeps the stage recursion stable
const MAX_CUTOFF: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default)]
struct MoogState {
    input: [f64; 4],
    output: [f64; 4],
}

/// Moog ladder filter
///
/// The four one-pole stages always run and feed back from the last stage;
/// the sub-type selects which stage output is tapped.
#[derive(Debug, Clone)]
pub struct Moog {
    state: [MoogState; MAX_CHANNELS],
    poles: usize,
    /// Input scaling (0.35013 * f^4)
    input_gain: f64,
    inv_f: f64,
    feedback: f64,
    /// DC normalisation of the tapped stage relative to the fourth
    tap_gain: f64,
    f: f64,
}

impl Default for Moog {
    fn default() -> Self {
        let mut moog = Self {
            state: [MoogState::default(); MAX_CHANNELS],
            poles: 4,
            input_gain: 0.0,
            inv_f: 1.0,
            feedback: 0.0,
            tap_gain: 1.0,
            f: 0.0,
        };
        moog.update_coefficients(44100.0, 20000.0, 1.0, 1.0);
        moog
    }
}

impl Moog {
    fn update_tap_gain(&mut self) {
        let stages_skipped = 4 - self.poles as i32;
        self.tap_gain = if self.f > 0.0 {
            (1.3 / self.f).powi(stages_skipped)
        } else {
            1.0
        };
    }

    #[inline]
    fn process_sample(&self, s: &mut MoogState, sample: f64) -> f64 {
        let mut input = flush_denormal((sample - s.output[3] * self.feedback) * self.input_gain);

        for stage in 0..4 {
            s.output[stage] = flush_denormal(input + 0.3 * s.input[stage] + self.inv_f * s.output[stage]);
            s.input[stage] = input;
            input = s.output[stage];
        }

        2.0 * s.output[self.poles - 1] * self.tap_gain
    }
}

impl FilterTopology for Moog {
    const ID: &'static str = "moog";
    const MODES: &'static [&'static str] = &["One Pole", "Two Poles", "Four Poles"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] = &[
        CoefficientType::LowPassReso,
        CoefficientType::LowPassReso,
        CoefficientType::LowPassReso,
    ];

    fn set_sub_type(&mut self, sub_type: usize) {
        self.poles = match sub_type {
            0 => 1,
            1 => 2,
            2 => 4,
            _ => return,
        };
        self.update_tap_gain();
    }

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, q: f64, _gain: f64) {
        let fc = FilterLimits::limit_frequency(frequency, sample_rate) / (0.5 * sample_rate);
        let res = (q / 2.0).clamp(0.0, MAX_RESONANCE);

        let f = (fc * 1.16).min(MAX_CUTOFF);
        let fss = (f * f) * (f * f);

        self.f = f;
        self.input_gain = 0.35013 * fss;
        self.inv_f = 1.0 - f;
        self.feedback = res * (1.0 - 0.15 * f * f);
        self.update_tap_gain();
    }

    fn reset(&mut self, num_channels: usize) {
        for s in self.state.iter_mut().take(num_channels.min(MAX_CHANNELS)) {
            *s = MoogState::default();
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
