//! Curve EQ
//!
//! Ordered list of stereo biquad bands applied in sequence:
//! - Bands render in list order over fixed-size sub-blocks, so swept
//!   parameters update at sub-block rate
//! - Band list mutations and rendering share one lock
//! - Processed audio optionally feeds the analyser ring buffer
//! - Integer attribute protocol (`band * 5 + parameter`) for hosts and
//!   persistence

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender};
use fe_core::{ChannelBuffer, DEFAULT_Q, Decibels, FeError, FeResult, FilterLimits};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::analyser::AnalyserRingBuffer;
use crate::biquad::BiquadCoeffs;
use crate::config::EngineConfig;
use crate::filters::{MultiChannelFilter, RenderData, StaticBiquad};
use crate::{Processor, ProcessorConfig};

/// Response shape of an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EqBandType {
    LowPass = 0,
    HighPass,
    LowShelf,
    HighShelf,
    #[default]
    Peak,
}

impl EqBandType {
    pub const ALL: [EqBandType; 5] = [
        EqBandType::LowPass,
        EqBandType::HighPass,
        EqBandType::LowShelf,
        EqBandType::HighShelf,
        EqBandType::Peak,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-band attribute; `band * BandParameter::COUNT + parameter` is the
/// attribute index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandParameter {
    /// Gain in dB
    Gain = 0,
    /// Frequency in Hz
    Freq,
    Q,
    /// 1.0 = enabled
    Enabled,
    /// `EqBandType` index
    Type,
}

impl BandParameter {
    pub const COUNT: usize = 5;

    pub const ALL: [BandParameter; Self::COUNT] = [
        BandParameter::Gain,
        BandParameter::Freq,
        BandParameter::Q,
        BandParameter::Enabled,
        BandParameter::Type,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Split an attribute index into band and parameter
    pub fn split(attribute_index: usize) -> (usize, BandParameter) {
        (
            attribute_index / Self::COUNT,
            Self::ALL[attribute_index % Self::COUNT],
        )
    }
}

/// Notification for UI listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EqEvent {
    BandAdded(usize),
    BandRemoved(usize),
    FftEnabled(bool),
    /// The whole band list was replaced
    StateRestored,
}

/// Persisted EQ state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EqState {
    pub num_filters: usize,
    /// Attribute values per band in `BandParameter` order
    pub bands: Vec<Vec<f64>>,
    #[serde(default)]
    pub fft_enabled: bool,
}

impl EqState {
    pub fn from_json(json: &str) -> FeResult<Self> {
        serde_json::from_str(json).map_err(|e| FeError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> FeResult<String> {
        serde_json::to_string(self).map_err(|e| FeError::Serialization(e.to_string()))
    }
}

/// One stereo band
#[derive(Debug, Clone)]
struct FilterBand {
    filter: MultiChannelFilter<StaticBiquad>,
    band_type: EqBandType,
    /// Sanitised dB value, kept so reads return exactly what was set
    gain_db: f64,
    enabled: bool,
}

impl FilterBand {
    fn new(sample_rate: f64, smoothing_time: f64) -> Self {
        let mut filter = MultiChannelFilter::new(sample_rate);
        filter.set_smoothing_time(smoothing_time);
        filter.set_type(EqBandType::Peak.index());

        Self {
            filter,
            band_type: EqBandType::Peak,
            gain_db: 0.0,
            enabled: true,
        }
    }

    fn get(&self, parameter: BandParameter) -> f64 {
        match parameter {
            BandParameter::Gain => self.gain_db,
            BandParameter::Freq => self.filter.frequency(),
            BandParameter::Q => self.filter.q(),
            BandParameter::Enabled => {
                if self.enabled {
                    1.0
                } else {
                    0.0
                }
            }
            BandParameter::Type => self.band_type.index() as f64,
        }
    }

    fn set(&mut self, parameter: BandParameter, value: f64) {
        match parameter {
            BandParameter::Gain => {
                self.gain_db = FilterLimits::limit_gain_db(value);
                self.filter.set_gain(Decibels(self.gain_db).to_gain());
            }
            BandParameter::Freq => self.filter.set_frequency(value),
            BandParameter::Q => self.filter.set_q(value),
            BandParameter::Enabled => self.enabled = value >= 0.5,
            BandParameter::Type => {
                let index = if value.is_finite() && value >= 0.0 {
                    value.round() as usize
                } else {
                    usize::MAX
                };

                match EqBandType::from_index(index) {
                    Some(band_type) => {
                        self.band_type = band_type;
                        self.filter.set_type(band_type.index());
                    }
                    None => log::warn!("[CurveEq] Ignoring unknown band type {}", value),
                }
            }
        }
    }
}

/// Multi-band EQ shared between the audio thread and the UI
///
/// All methods take `&self`; wrap the engine in an `Arc` to share it.
pub struct CurveEq {
    bands: Mutex<Vec<FilterBand>>,
    analyser: Arc<AnalyserRingBuffer>,
    fft_enabled: AtomicBool,
    listeners: Mutex<Vec<Sender<EqEvent>>>,
    sample_rate: AtomicU64,
    config: EngineConfig,
}

impl std::fmt::Debug for CurveEq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurveEq")
            .field("num_bands", &self.num_filter_bands())
            .field("fft_enabled", &self.is_spectrum_analyser_enabled())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

impl Default for CurveEq {
    fn default() -> Self {
        Self::build(EngineConfig::default())
    }
}

impl CurveEq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> FeResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EngineConfig) -> Self {
        Self {
            bands: Mutex::new(Vec::new()),
            analyser: Arc::new(AnalyserRingBuffer::new(config.analyser_channels)),
            fft_enabled: AtomicBool::new(false),
            listeners: Mutex::new(Vec::new()),
            sample_rate: AtomicU64::new(44100.0_f64.to_bits()),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Acquire))
    }

    pub fn set_sample_rate(&self, sample_rate: f64) -> FeResult<()> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FeError::InvalidSampleRate(sample_rate));
        }

        self.sample_rate.store(sample_rate.to_bits(), Ordering::Release);
        for band in self.bands.lock().iter_mut() {
            band.filter.set_sample_rate(sample_rate);
        }

        Ok(())
    }

    /// Receive band and analyser notifications
    pub fn subscribe(&self) -> Receiver<EqEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.listeners.lock().push(tx);
        rx
    }

    fn broadcast(&self, event: EqEvent) {
        self.listeners.lock().retain(|tx| tx.send(event).is_ok());
    }

    /// Insert a peak band (appended when `insert_index` is None or past the
    /// end) and return its index
    pub fn add_filter_band(&self, frequency: f64, gain_db: f64, insert_index: Option<usize>) -> usize {
        let mut band = FilterBand::new(self.sample_rate(), self.config.smoothing_time());
        band.set(BandParameter::Freq, frequency);
        band.set(BandParameter::Gain, gain_db);
        band.set(BandParameter::Q, DEFAULT_Q);
        band.filter.reset();

        let index = {
            let mut bands = self.bands.lock();
            let index = insert_index.map_or(bands.len(), |i| i.min(bands.len()));
            bands.insert(index, band);
            index
        };

        log::debug!("[CurveEq] Band added at {} ({} Hz, {} dB)", index, frequency, gain_db);
        self.broadcast(EqEvent::BandAdded(index));
        index
    }

    /// Remove a band; returns false for an unknown index
    pub fn remove_filter_band(&self, index: usize) -> bool {
        {
            let mut bands = self.bands.lock();
            if index >= bands.len() {
                return false;
            }
            bands.remove(index);
        }

        log::debug!("[CurveEq] Band {} removed", index);
        self.broadcast(EqEvent::BandRemoved(index));
        true
    }

    pub fn num_filter_bands(&self) -> usize {
        self.bands.lock().len()
    }

    /// Attribute value, 0.0 for an unknown band
    pub fn get_attribute(&self, index: usize) -> f64 {
        let (band, parameter) = BandParameter::split(index);
        self.bands.lock().get(band).map_or(0.0, |b| b.get(parameter))
    }

    /// Set an attribute; unknown bands are ignored
    pub fn set_attribute(&self, index: usize, value: f64) {
        let (band, parameter) = BandParameter::split(index);

        match self.bands.lock().get_mut(band) {
            Some(b) => b.set(parameter, value),
            None => log::warn!("[CurveEq] Ignoring attribute {} for missing band {}", index, band),
        }
    }

    pub fn band_attribute(&self, band: usize, parameter: BandParameter) -> f64 {
        self.get_attribute(band * BandParameter::COUNT + parameter as usize)
    }

    pub fn set_band_attribute(&self, band: usize, parameter: BandParameter, value: f64) {
        self.set_attribute(band * BandParameter::COUNT + parameter as usize, value);
    }

    /// Turn the spectrum capture on or off
    ///
    /// The analyser's active state follows the flag: enabling posts the
    /// configured size unless a non-zero size is active or pending,
    /// disabling posts size 0. Either takes effect on the next
    /// `apply_pending_resize`.
    pub fn enable_spectrum_analyser(&self, enabled: bool) {
        let was_enabled = self.fft_enabled.swap(enabled, Ordering::AcqRel);

        let effective_size = self
            .analyser
            .pending_size()
            .unwrap_or_else(|| self.analyser.size());

        if (effective_size > 0) != enabled {
            // Config validation guarantees a power of two here
            let size = if enabled { self.config.analyser_buffer_size } else { 0 };

            if let Err(e) = self.analyser.set_analyser_buffer_size(size) {
                log::warn!("[CurveEq] Analyser not resized: {}", e);
            }
        }

        if was_enabled != enabled {
            self.broadcast(EqEvent::FftEnabled(enabled));
        }
    }

    pub fn is_spectrum_analyser_enabled(&self) -> bool {
        self.fft_enabled.load(Ordering::Acquire)
    }

    /// Ring buffer the display readers consume
    pub fn analyser(&self) -> Arc<AnalyserRingBuffer> {
        Arc::clone(&self.analyser)
    }

    /// Run the enabled bands over a block (audio thread)
    pub fn apply_effect(&self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        let (start, num) = buffer.clamp_range(start_sample, num_samples);
        let sub_block = self.config.sub_block_size.max(1);

        {
            let mut bands = self.bands.lock();

            if !bands.is_empty() {
                let end = start + num;
                let mut chunk_start = start;

                while chunk_start < end {
                    let chunk_len = sub_block.min(end - chunk_start);

                    for band in bands.iter_mut().filter(|b| b.enabled) {
                        band.filter
                            .render(&mut RenderData::new(buffer, chunk_start, chunk_len));
                    }

                    chunk_start += chunk_len;
                }
            }
        }

        if self.fft_enabled.load(Ordering::Relaxed) && self.analyser.is_active() {
            self.analyser.push_samples(buffer, start, num);
        }
    }

    /// Clear every band's history
    pub fn reset(&self) {
        for band in self.bands.lock().iter_mut() {
            band.filter.reset();
        }
    }

    /// Biquad approximation of one band at its target parameters
    pub fn band_coefficients(&self, index: usize) -> Option<BiquadCoeffs> {
        self.bands
            .lock()
            .get(index)
            .map(|b| b.filter.approximate_coefficients())
    }

    /// Linear magnitude of the whole curve at `frequency`
    pub fn magnitude_response(&self, frequency: f64) -> f64 {
        let sample_rate = self.sample_rate();

        self.bands
            .lock()
            .iter()
            .filter(|b| b.enabled)
            .map(|b| b.filter.approximate_coefficients().magnitude_at(frequency, sample_rate))
            .product()
    }

    pub fn export_state(&self) -> EqState {
        let bands = self.bands.lock();

        EqState {
            num_filters: bands.len(),
            bands: bands
                .iter()
                .map(|b| BandParameter::ALL.iter().map(|&p| b.get(p)).collect())
                .collect(),
            fft_enabled: self.is_spectrum_analyser_enabled(),
        }
    }

    /// Replace the band list with a persisted state
    ///
    /// Missing bands or attribute values read as 0.0.
    pub fn restore_state(&self, state: &EqState) {
        if state.bands.len() < state.num_filters
            || state.bands.iter().any(|b| b.len() < BandParameter::COUNT)
        {
            log::warn!(
                "[CurveEq] Restoring incomplete state ({} bands declared, {} stored)",
                state.num_filters,
                state.bands.len()
            );
        }

        let sample_rate = self.sample_rate();
        let smoothing_time = self.config.smoothing_time();

        let restored: Vec<FilterBand> = (0..state.num_filters)
            .map(|i| {
                let values = state.bands.get(i).map_or(&[][..], Vec::as_slice);
                let mut band = FilterBand::new(sample_rate, smoothing_time);

                for parameter in BandParameter::ALL {
                    let value = values.get(parameter as usize).copied().unwrap_or(0.0);
                    band.set(parameter, value);
                }

                band.filter.reset();
                band
            })
            .collect();

        *self.bands.lock() = restored;

        self.enable_spectrum_analyser(state.fft_enabled);
        self.broadcast(EqEvent::StateRestored);
    }
}
