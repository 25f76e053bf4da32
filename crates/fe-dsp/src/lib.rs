//! fe-dsp: real-time filter engine
//!
//! ## Modules
//! - `biquad` - RBJ biquad coefficients and a TDF-II biquad
//! - `smoothing` - block-rate linear parameter ramps
//! - `filters` - filter topologies, `MultiChannelFilter` and `FilterBank`
//! - `curve_eq` - ordered multi-band stereo EQ with spectrum capture
//! - `analyser` - single-writer ring buffer feeding the display readers
//! - `spectrum` - FFT, oscilloscope and goniometer readers
//! - `config` - engine configuration

pub mod analyser;
pub mod biquad;
pub mod config;
pub mod curve_eq;
pub mod filters;
pub mod smoothing;
pub mod spectrum;

pub use analyser::{AnalyserRingBuffer, ResizeOutcome, RingBufferSnapshot};
pub use config::EngineConfig;
pub use curve_eq::{BandParameter, CurveEq, EqBandType, EqEvent, EqState};
pub use filters::{FilterBank, FilterMode, MultiChannelFilter, RenderData};
pub use spectrum::{Goniometer, Oscilloscope, PhasePoint, SpectrumAnalyser, SpectrumCapture};

use fe_core::Sample;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Mono processor trait
pub trait MonoProcessor: Processor {
    /// Process a single sample
    fn process_sample(&mut self, input: Sample) -> Sample;

    /// Process a block of samples
    fn process_block(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}

/// Processor configuration for sample rate changes
pub trait ProcessorConfig {
    fn set_sample_rate(&mut self, sample_rate: f64);
}
