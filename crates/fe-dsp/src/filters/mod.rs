//! Multi-Mode Filters
//!
//! A closed set of filter topologies behind one render contract:
//! - `FilterTopology` kernels (Moog, ladder, SVF, biquad, one-pole, phaser
//!   allpass, ring modulator, Linkwitz-Riley)
//! - `MultiChannelFilter` adds parameter smoothing and lazy coefficient updates
//! - `FilterBank` selects topology and mono/polyphonic storage at runtime
//!
//! Per-channel state lives in fixed arrays sized `MAX_CHANNELS`; nothing on
//! the render path allocates.

mod bank;
mod ladder;
mod linkwitz_riley;
mod moog;
mod multi_channel;
mod one_pole;
mod phase_allpass;
mod ringmod;
mod static_biquad;
mod svf;

pub use bank::{FilterAttribute, FilterBank, FilterMode, TopologyKind};
pub use ladder::Ladder;
pub use linkwitz_riley::LinkwitzRiley;
pub use moog::Moog;
pub use multi_channel::{FRAME_UPDATE_INTERVAL, MultiChannelFilter};
pub use one_pole::OnePole;
pub use phase_allpass::PhaseAllpass;
pub use ringmod::RingMod;
pub use static_biquad::StaticBiquad;
pub use svf::StateVariable;

use fe_core::{ChannelBuffer, Decibels};

use crate::biquad::BiquadCoeffs;

/// Maximum channel count a filter instance keeps state for
pub const MAX_CHANNELS: usize = 16;

/// Recursive state below this magnitude is flushed to zero
const DENORMAL_THRESHOLD: f64 = 1e-30;

/// Zero values that would otherwise decay into subnormal range
#[inline(always)]
pub(crate) fn flush_denormal(x: f64) -> f64 {
    if x.abs() < DENORMAL_THRESHOLD { 0.0 } else { x }
}

/// Biquad prototype used to plot a topology's response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientType {
    LowPass,
    HighPass,
    LowShelf,
    HighShelf,
    Peak,
    LowPassReso,
    BandPass,
    AllPass,
}

impl CoefficientType {
    /// Biquad approximation for the given parameters (`gain` is linear)
    pub fn design(self, sample_rate: f64, frequency: f64, q: f64, gain: f64) -> BiquadCoeffs {
        let gain_db = Decibels::from_gain(gain).0.max(-144.0);

        match self {
            Self::LowPass => BiquadCoeffs::lowpass_butterworth(frequency, sample_rate),
            Self::HighPass => BiquadCoeffs::highpass(frequency, q, sample_rate),
            Self::LowShelf => BiquadCoeffs::low_shelf(frequency, q, gain_db, sample_rate),
            Self::HighShelf => BiquadCoeffs::high_shelf(frequency, q, gain_db, sample_rate),
            Self::Peak => BiquadCoeffs::peaking(frequency, q, gain_db, sample_rate),
            Self::LowPassReso => BiquadCoeffs::lowpass(frequency, q, sample_rate),
            Self::BandPass => BiquadCoeffs::bandpass(frequency, q, sample_rate),
            Self::AllPass => BiquadCoeffs::allpass(frequency, q, sample_rate),
        }
    }
}

/// Per-block render arguments
///
/// Modulation values come from outside the filter once per block:
/// `freq_mod_value`, `gain_mod_value` and `q_mod_value` are multipliers
/// (1.0 = none) and `bipolar_delta` shifts the normalised frequency.
#[derive(Debug)]
pub struct RenderData<'a> {
    pub buffer: &'a mut ChannelBuffer,
    pub start_sample: usize,
    pub num_samples: usize,
    /// Voice slot for polyphonic banks
    pub voice_index: Option<usize>,
    pub freq_mod_value: f64,
    pub gain_mod_value: f64,
    pub q_mod_value: f64,
    pub bipolar_delta: f64,
}

impl<'a> RenderData<'a> {
    pub fn new(buffer: &'a mut ChannelBuffer, start_sample: usize, num_samples: usize) -> Self {
        Self {
            buffer,
            start_sample,
            num_samples,
            voice_index: None,
            freq_mod_value: 1.0,
            gain_mod_value: 1.0,
            q_mod_value: 1.0,
            bipolar_delta: 0.0,
        }
    }

    /// Render the whole buffer
    pub fn whole(buffer: &'a mut ChannelBuffer) -> Self {
        let num_samples = buffer.num_samples();
        Self::new(buffer, 0, num_samples)
    }

    pub fn with_voice(mut self, voice_index: usize) -> Self {
        self.voice_index = Some(voice_index);
        self
    }

    pub fn with_modulation(mut self, freq_mod_value: f64, gain_mod_value: f64, q_mod_value: f64) -> Self {
        self.freq_mod_value = freq_mod_value;
        self.gain_mod_value = gain_mod_value;
        self.q_mod_value = q_mod_value;
        self
    }

    pub fn with_bipolar_delta(mut self, delta: f64) -> Self {
        self.bipolar_delta = delta;
        self
    }

    /// Apply frequency modulation in the normalised 20 Hz..20 kHz domain
    #[inline]
    pub fn modulate_frequency(&self, frequency: f64) -> f64 {
        if self.freq_mod_value == 1.0 && self.bipolar_delta == 0.0 {
            return frequency;
        }

        let span = fe_core::HIGH_FREQUENCY - fe_core::LOW_FREQUENCY;
        let normalised = (frequency - fe_core::LOW_FREQUENCY) / span;

        (normalised + self.bipolar_delta) * self.freq_mod_value * span + fe_core::LOW_FREQUENCY
    }
}

/// A filter kernel: coefficient calculation plus per-channel recursion
///
/// Implementations never allocate. The owning wrapper guarantees `reset` is
/// called before the channel count of `process_samples` changes.
pub trait FilterTopology: Default + Send + Sync {
    /// Stable identifier of the topology family
    const ID: &'static str;

    /// Display names of the sub-types, indexed by sub-type
    const MODES: &'static [&'static str];

    /// Plotting prototype per sub-type
    const COEFFICIENT_TYPES: &'static [CoefficientType];

    /// Select a sub-type; out-of-range values are ignored
    fn set_sub_type(&mut self, sub_type: usize);

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, q: f64, gain: f64);

    /// Zero the history of the first `num_channels` channels
    fn reset(&mut self, num_channels: usize);

    /// Filter `num_samples` samples of every channel in place
    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize);

    /// Filter one interleaved frame, one sample per channel
    fn process_frame(&mut self, frame: &mut [f64]);
}

/// Channel count a kernel may touch for this buffer
#[inline]
pub(crate) fn active_channels(buffer: &ChannelBuffer) -> usize {
    buffer.num_channels().min(MAX_CHANNELS)
}
