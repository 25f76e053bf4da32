//! Smoothing, channel adaptation and lazy coefficient updates around a
//! filter topology

use fe_core::{DEFAULT_FREQUENCY, DEFAULT_GAIN, DEFAULT_Q, FilterLimits, Sample};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, RenderData};
use crate::biquad::BiquadCoeffs;
use crate::smoothing::{DEFAULT_SMOOTHING_TIME, SmoothedValue};
use crate::{Processor, ProcessorConfig};

const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Frames between coefficient refreshes on the per-frame path
pub const FRAME_UPDATE_INTERVAL: usize = 64;

/// A filter topology with smoothed frequency, Q and gain
///
/// Setters only move the smoothing targets. `render` advances the ramps by
/// the block length, applies the block's modulation and recomputes the
/// coefficients at most once before running the kernel. `process_frame`
/// does the same every `FRAME_UPDATE_INTERVAL` frames.
#[derive(Debug, Clone)]
pub struct MultiChannelFilter<T: FilterTopology> {
    topology: T,
    sub_type: usize,
    sample_rate: f64,
    smoothing_time: f64,
    num_channels: usize,

    frequency: SmoothedValue,
    q: SmoothedValue,
    gain: SmoothedValue,

    /// Values passed to the last coefficient update
    current_frequency: f64,
    current_q: f64,
    current_gain: f64,

    dirty: bool,
    /// Frames left until the per-frame path refreshes the coefficients
    frame_counter: usize,
}

impl<T: FilterTopology> Default for MultiChannelFilter<T> {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl<T: FilterTopology> MultiChannelFilter<T> {
    pub fn new(sample_rate: f64) -> Self {
        let mut filter = Self {
            topology: T::default(),
            sub_type: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            smoothing_time: DEFAULT_SMOOTHING_TIME,
            num_channels: 2,
            frequency: SmoothedValue::new(DEFAULT_FREQUENCY),
            q: SmoothedValue::new(DEFAULT_Q),
            gain: SmoothedValue::new(DEFAULT_GAIN),
            current_frequency: DEFAULT_FREQUENCY,
            current_q: DEFAULT_Q,
            current_gain: DEFAULT_GAIN,
            dirty: true,
            frame_counter: 0,
        };
        filter.set_sample_rate(sample_rate);
        filter
    }

    /// Identifier of the topology family
    pub fn id(&self) -> &'static str {
        T::ID
    }

    /// Names of the selectable sub-types
    pub fn modes(&self) -> &'static [&'static str] {
        T::MODES
    }

    /// Select a sub-type of the topology; coefficients are recomputed on the
    /// next render
    pub fn set_type(&mut self, sub_type: usize) {
        if sub_type >= T::MODES.len() {
            log::warn!("[MultiChannelFilter] {} ignoring unknown sub-type {}", T::ID, sub_type);
            return;
        }

        if self.sub_type != sub_type {
            self.sub_type = sub_type;
            self.topology.set_sub_type(sub_type);
            self.clear_coefficients();
        }
    }

    pub fn sub_type(&self) -> usize {
        self.sub_type
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency
            .set_target(FilterLimits::limit_frequency(frequency, self.sample_rate));
    }

    pub fn set_q(&mut self, q: f64) {
        self.q.set_target(FilterLimits::limit_q(q));
    }

    /// Set the gain as a linear factor
    pub fn set_gain(&mut self, gain: f64) {
        self.gain.set_target(FilterLimits::limit_gain(gain));
    }

    /// Target frequency (not the smoothed value)
    pub fn frequency(&self) -> f64 {
        self.frequency.target()
    }

    pub fn q(&self) -> f64 {
        self.q.target()
    }

    pub fn gain(&self) -> f64 {
        self.gain.target()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Change the ramp length (seconds) and restart the smoothers
    pub fn set_smoothing_time(&mut self, seconds: f64) {
        self.smoothing_time = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.set_sample_rate(self.sample_rate);
    }

    /// Adapt to a new channel count; clears history
    pub fn set_num_channels(&mut self, num_channels: usize) {
        self.num_channels = num_channels.min(MAX_CHANNELS);
        self.reset();
        self.clear_coefficients();
    }

    /// True while any parameter ramp is in progress
    pub fn is_smoothing(&self) -> bool {
        self.frequency.is_smoothing() || self.q.is_smoothing() || self.gain.is_smoothing()
    }

    /// Biquad approximation of the response at the target parameters
    pub fn approximate_coefficients(&self) -> BiquadCoeffs {
        self.design(self.frequency.target(), self.q.target(), self.gain.target())
    }

    /// Biquad approximation of the response at the last rendered parameters,
    /// modulation included
    pub fn current_coefficients(&self) -> BiquadCoeffs {
        self.design(self.current_frequency, self.current_q, self.current_gain)
    }

    fn design(&self, frequency: f64, q: f64, gain: f64) -> BiquadCoeffs {
        T::COEFFICIENT_TYPES
            .get(self.sub_type)
            .copied()
            .unwrap_or(CoefficientType::LowPass)
            .design(self.sample_rate, frequency, q, gain)
    }

    /// Force a coefficient update on the next render
    #[inline]
    fn clear_coefficients(&mut self) {
        self.dirty = true;
    }

    #[inline]
    fn compare_and_set(value: &mut f64, new_value: f64) -> bool {
        let changed = *value != new_value;
        *value = new_value;
        changed
    }

    /// Advance the smoothers by one block and refresh the coefficients if
    /// anything moved
    fn update(&mut self, r: &RenderData<'_>, num_samples: usize) {
        let frequency = r.modulate_frequency(self.frequency.skip(num_samples));
        let gain = r.gain_mod_value * self.gain.skip(num_samples);
        let q = self.q.skip(num_samples) * r.q_mod_value;

        self.apply(frequency, q, gain);
    }

    /// Clamp the effective parameters and recompute on any change
    fn apply(&mut self, frequency: f64, q: f64, gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, self.sample_rate);
        let q = FilterLimits::limit_q(q);

        self.dirty |= Self::compare_and_set(&mut self.current_frequency, frequency);
        self.dirty |= Self::compare_and_set(&mut self.current_gain, gain);
        self.dirty |= Self::compare_and_set(&mut self.current_q, q);

        if self.dirty {
            self.topology.update_coefficients(self.sample_rate, frequency, q, gain);
            self.dirty = false;
        }
    }

    /// Render one block in place
    pub fn render(&mut self, r: &mut RenderData<'_>) {
        let (start, num_samples) = r.buffer.clamp_range(r.start_sample, r.num_samples);
        let channels = r.buffer.num_channels().min(MAX_CHANNELS);

        if channels != self.num_channels {
            self.set_num_channels(channels);
        }

        self.update(r, num_samples);

        if num_samples > 0 {
            self.topology.process_samples(r.buffer, start, num_samples);
        }
    }

    /// Filter one interleaved frame in place, one sample per channel
    ///
    /// No modulation is applied. Every `FRAME_UPDATE_INTERVAL` frames the
    /// smoothers advance by that many samples and the coefficients are
    /// refreshed if anything moved.
    pub fn process_frame(&mut self, frame: &mut [Sample]) {
        let channels = frame.len().min(MAX_CHANNELS);

        if channels != self.num_channels {
            self.set_num_channels(channels);
        }

        if self.frame_counter == 0 {
            self.frame_counter = FRAME_UPDATE_INTERVAL;

            let frequency = self.frequency.skip(FRAME_UPDATE_INTERVAL);
            let q = self.q.skip(FRAME_UPDATE_INTERVAL);
            let gain = self.gain.skip(FRAME_UPDATE_INTERVAL);
            self.apply(frequency, q, gain);
        }

        self.frame_counter -= 1;
        self.topology.process_frame(&mut frame[..channels]);
    }

    /// Direct access to the kernel
    pub fn topology(&self) -> &T {
        &self.topology
    }
}

impl<T: FilterTopology> Processor for MultiChannelFilter<T> {
    /// Jump every smoother to its target and clear the channel history
    fn reset(&mut self) {
        self.frequency.set_immediate(self.frequency.target());
        self.q.set_immediate(self.q.target());
        self.gain.set_immediate(self.gain.target());

        self.topology.reset(self.num_channels);
    }
}

impl<T: FilterTopology> ProcessorConfig for MultiChannelFilter<T> {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            log::warn!("[MultiChannelFilter] {} ignoring invalid sample rate {}", T::ID, sample_rate);
            return;
        }

        self.sample_rate = sample_rate;

        self.frequency.reset(sample_rate, self.smoothing_time);
        self.q.reset(sample_rate, self.smoothing_time);
        self.gain.reset(sample_rate, self.smoothing_time);

        // Targets clamped for the old rate may sit above the new limit
        let frequency = FilterLimits::limit_frequency(self.frequency.target(), sample_rate);
        self.frequency.set_immediate(frequency);

        self.reset();
        self.clear_coefficients();
    }
}
