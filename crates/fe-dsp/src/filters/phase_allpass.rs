//! Six-stage phaser allpass network
//!
//! Not an EQ shape: the output is the dry signal plus a feedback allpass
//! chain, which produces the notches of a phaser.

use fe_core::{ChannelBuffer, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels, flush_denormal};

const NUM_STAGES: usize = 6;
const MAX_FEEDBACK: f64 = 0.99;

#[derive(Debug, Clone, Copy, Default)]
struct PhaserState {
    stages: [f64; NUM_STAGES],
    last_output: f64,
}

#[derive(Debug, Clone)]
pub struct PhaseAllpass {
    state: [PhaserState; MAX_CHANNELS],
    /// First-order allpass coefficient shared by every stage
    delay: f64,
    feedback: f64,
}

impl Default for PhaseAllpass {
    fn default() -> Self {
        Self {
            state: [PhaserState::default(); MAX_CHANNELS],
            delay: 0.0,
            feedback: 0.0,
        }
    }
}

impl PhaseAllpass {
    /// Allpass coefficient for a normalised delay (0..1 of Nyquist)
    #[inline]
    fn delay_coefficient(normalised: f64) -> f64 {
        (1.0 - normalised) / (1.0 + normalised)
    }

    #[inline]
    fn process_sample(&self, s: &mut PhaserState, input: f64) -> f64 {
        let mut x = input + s.last_output * self.feedback;

        for z in s.stages.iter_mut().rev() {
            let y = x * -self.delay + *z;
            *z = flush_denormal(y * self.delay + x);
            x = y;
        }

        s.last_output = flush_denormal(x);
        input + x
    }
}

impl FilterTopology for PhaseAllpass {
    const ID: &'static str = "allpass";
    const MODES: &'static [&'static str] = &["All Pass"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] = &[CoefficientType::AllPass];

    fn set_sub_type(&mut self, _sub_type: usize) {}

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, q: f64, _gain: f64) {
        if sample_rate <= 0.0 {
            return;
        }

        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);
        self.delay = Self::delay_coefficient(frequency / (sample_rate / 2.0));

        // Q 0.3..9.9 maps onto 0..0.99 feedback
        let feedback = (q - 0.3) / (9.9 - 0.3) * MAX_FEEDBACK;
        self.feedback = feedback.clamp(0.0, MAX_FEEDBACK);
    }

    fn reset(&mut self, num_channels: usize) {
        for s in self.state.iter_mut().take(num_channels.min(MAX_CHANNELS)) {
            *s = PhaserState::default();
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
