//! Runtime-selected filter topology, mono or one instance per voice

use fe_core::{DEFAULT_FREQUENCY, DEFAULT_GAIN, DEFAULT_Q, Decibels, FilterLimits};

use super::{
    Ladder, LinkwitzRiley, Moog, MultiChannelFilter, OnePole, PhaseAllpass, RenderData, RingMod,
    StateVariable, StaticBiquad,
};
use crate::biquad::BiquadCoeffs;
use crate::smoothing::DEFAULT_SMOOTHING_TIME;
use crate::{Processor, ProcessorConfig};

/// User-facing filter mode
///
/// The discriminants are the integer values of the `Mode` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum FilterMode {
    #[default]
    LowPass = 0,
    HighPass,
    LowShelf,
    HighShelf,
    Peak,
    ResoLow,
    StateVariableLP,
    StateVariableHP,
    MoogLP,
    OnePoleLowPass,
    OnePoleHighPass,
    StateVariablePeak,
    StateVariableNotch,
    StateVariableBandPass,
    Allpass,
    LadderFourPoleLP,
    LadderFourPoleHP,
    RingMod,
    LinkwitzRileyLP,
    LinkwitzRileyHP,
    LinkwitzRileyAP,
}

impl FilterMode {
    pub const ALL: [FilterMode; 21] = [
        FilterMode::LowPass,
        FilterMode::HighPass,
        FilterMode::LowShelf,
        FilterMode::HighShelf,
        FilterMode::Peak,
        FilterMode::ResoLow,
        FilterMode::StateVariableLP,
        FilterMode::StateVariableHP,
        FilterMode::MoogLP,
        FilterMode::OnePoleLowPass,
        FilterMode::OnePoleHighPass,
        FilterMode::StateVariablePeak,
        FilterMode::StateVariableNotch,
        FilterMode::StateVariableBandPass,
        FilterMode::Allpass,
        FilterMode::LadderFourPoleLP,
        FilterMode::LadderFourPoleHP,
        FilterMode::RingMod,
        FilterMode::LinkwitzRileyLP,
        FilterMode::LinkwitzRileyHP,
        FilterMode::LinkwitzRileyAP,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Topology family and its sub-type for this mode
    pub fn topology(self) -> (TopologyKind, usize) {
        use TopologyKind as K;

        match self {
            Self::LowPass => (K::StaticBiquad, 0),
            Self::HighPass => (K::StaticBiquad, 1),
            Self::LowShelf => (K::StaticBiquad, 2),
            Self::HighShelf => (K::StaticBiquad, 3),
            Self::Peak => (K::StaticBiquad, 4),
            Self::ResoLow => (K::StaticBiquad, 5),
            Self::StateVariableLP => (K::StateVariable, 0),
            Self::StateVariableHP => (K::StateVariable, 1),
            Self::StateVariableBandPass => (K::StateVariable, 2),
            Self::StateVariableNotch => (K::StateVariable, 3),
            Self::StateVariablePeak => (K::StateVariable, 5),
            Self::MoogLP => (K::Moog, 2),
            Self::OnePoleLowPass => (K::OnePole, 0),
            Self::OnePoleHighPass => (K::OnePole, 1),
            Self::Allpass => (K::PhaseAllpass, 0),
            Self::LadderFourPoleLP => (K::Ladder, 0),
            Self::LadderFourPoleHP => (K::Ladder, 1),
            Self::RingMod => (K::RingMod, 0),
            Self::LinkwitzRileyLP => (K::LinkwitzRiley, 0),
            Self::LinkwitzRileyHP => (K::LinkwitzRiley, 1),
            Self::LinkwitzRileyAP => (K::LinkwitzRiley, 2),
        }
    }
}

/// Filter topology family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyKind {
    Moog,
    Ladder,
    StateVariable,
    StaticBiquad,
    OnePole,
    PhaseAllpass,
    RingMod,
    LinkwitzRiley,
}

/// Integer attribute protocol of a filter bank
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAttribute {
    /// Gain in dB
    Gain = 0,
    /// Cutoff frequency in Hz
    Frequency,
    Q,
    /// `FilterMode` index
    Mode,
}

impl FilterAttribute {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Gain),
            1 => Some(Self::Frequency),
            2 => Some(Self::Q),
            3 => Some(Self::Mode),
            _ => None,
        }
    }
}

/// One `MultiChannelFilter` of any topology
#[derive(Debug, Clone)]
enum AnyFilter {
    Moog(MultiChannelFilter<Moog>),
    Ladder(MultiChannelFilter<Ladder>),
    StateVariable(MultiChannelFilter<StateVariable>),
    StaticBiquad(MultiChannelFilter<StaticBiquad>),
    OnePole(MultiChannelFilter<OnePole>),
    PhaseAllpass(MultiChannelFilter<PhaseAllpass>),
    RingMod(MultiChannelFilter<RingMod>),
    LinkwitzRiley(MultiChannelFilter<LinkwitzRiley>),
}

macro_rules! dispatch {
    ($filter:expr, $f:ident => $body:expr) => {
        match $filter {
            AnyFilter::Moog($f) => $body,
            AnyFilter::Ladder($f) => $body,
            AnyFilter::StateVariable($f) => $body,
            AnyFilter::StaticBiquad($f) => $body,
            AnyFilter::OnePole($f) => $body,
            AnyFilter::PhaseAllpass($f) => $body,
            AnyFilter::RingMod($f) => $body,
            AnyFilter::LinkwitzRiley($f) => $body,
        }
    };
}

/// Target parameters copied across a topology rebuild
#[derive(Debug, Clone, Copy)]
struct Params {
    frequency: f64,
    q: f64,
    gain: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            q: DEFAULT_Q,
            gain: DEFAULT_GAIN,
        }
    }
}

impl AnyFilter {
    fn new(kind: TopologyKind, sample_rate: f64) -> Self {
        match kind {
            TopologyKind::Moog => Self::Moog(MultiChannelFilter::new(sample_rate)),
            TopologyKind::Ladder => Self::Ladder(MultiChannelFilter::new(sample_rate)),
            TopologyKind::StateVariable => Self::StateVariable(MultiChannelFilter::new(sample_rate)),
            TopologyKind::StaticBiquad => Self::StaticBiquad(MultiChannelFilter::new(sample_rate)),
            TopologyKind::OnePole => Self::OnePole(MultiChannelFilter::new(sample_rate)),
            TopologyKind::PhaseAllpass => Self::PhaseAllpass(MultiChannelFilter::new(sample_rate)),
            TopologyKind::RingMod => Self::RingMod(MultiChannelFilter::new(sample_rate)),
            TopologyKind::LinkwitzRiley => Self::LinkwitzRiley(MultiChannelFilter::new(sample_rate)),
        }
    }

    /// Fresh filter of `mode` with the given targets already reached
    fn build(mode: FilterMode, sample_rate: f64, smoothing_time: f64, params: Params) -> Self {
        let (kind, sub_type) = mode.topology();
        let mut filter = Self::new(kind, sample_rate);

        dispatch!(&mut filter, f => {
            f.set_smoothing_time(smoothing_time);
            f.set_type(sub_type);
            f.set_frequency(params.frequency);
            f.set_q(params.q);
            f.set_gain(params.gain);
            f.reset();
        });

        filter
    }

    fn kind(&self) -> TopologyKind {
        match self {
            Self::Moog(_) => TopologyKind::Moog,
            Self::Ladder(_) => TopologyKind::Ladder,
            Self::StateVariable(_) => TopologyKind::StateVariable,
            Self::StaticBiquad(_) => TopologyKind::StaticBiquad,
            Self::OnePole(_) => TopologyKind::OnePole,
            Self::PhaseAllpass(_) => TopologyKind::PhaseAllpass,
            Self::RingMod(_) => TopologyKind::RingMod,
            Self::LinkwitzRiley(_) => TopologyKind::LinkwitzRiley,
        }
    }

    fn id(&self) -> &'static str {
        dispatch!(self, f => f.id())
    }

    fn params(&self) -> Params {
        dispatch!(self, f => Params {
            frequency: f.frequency(),
            q: f.q(),
            gain: f.gain(),
        })
    }

    fn set_type(&mut self, sub_type: usize) {
        dispatch!(self, f => f.set_type(sub_type))
    }

    fn set_frequency(&mut self, frequency: f64) {
        dispatch!(self, f => f.set_frequency(frequency))
    }

    fn set_q(&mut self, q: f64) {
        dispatch!(self, f => f.set_q(q))
    }

    fn set_gain(&mut self, gain: f64) {
        dispatch!(self, f => f.set_gain(gain))
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        dispatch!(self, f => f.set_sample_rate(sample_rate))
    }

    fn set_smoothing_time(&mut self, seconds: f64) {
        dispatch!(self, f => f.set_smoothing_time(seconds))
    }

    fn reset(&mut self) {
        dispatch!(self, f => f.reset())
    }

    #[inline]
    fn render(&mut self, r: &mut RenderData<'_>) {
        dispatch!(self, f => f.render(r))
    }

    #[inline]
    fn process_frame(&mut self, frame: &mut [f64]) {
        dispatch!(self, f => f.process_frame(frame))
    }

    fn approximate_coefficients(&self) -> BiquadCoeffs {
        dispatch!(self, f => f.approximate_coefficients())
    }

    fn current_coefficients(&self) -> BiquadCoeffs {
        dispatch!(self, f => f.current_coefficients())
    }
}

/// Backing storage of a bank
#[derive(Debug, Clone)]
enum BankStore {
    Mono(AnyFilter),
    Poly(Vec<AnyFilter>),
}

/// Filter with a runtime-selectable mode, mono or one instance per voice
///
/// Switching between modes of the same topology family is a sub-type change;
/// switching families rebuilds the filters in place.
#[derive(Debug, Clone)]
pub struct FilterBank {
    store: BankStore,
    mode: FilterMode,
    num_voices: usize,
    sample_rate: f64,
    smoothing_time: f64,
    params: Params,
    display_voice: Option<usize>,
}

impl FilterBank {
    /// `num_voices <= 1` builds a mono bank
    pub fn new(num_voices: usize) -> Self {
        let num_voices = num_voices.max(1);
        let mode = FilterMode::default();
        let sample_rate = 44100.0;
        let params = Params::default();
        let build = || AnyFilter::build(mode, sample_rate, DEFAULT_SMOOTHING_TIME, params);

        let store = if num_voices == 1 {
            BankStore::Mono(build())
        } else {
            BankStore::Poly((0..num_voices).map(|_| build()).collect())
        };

        Self {
            store,
            mode,
            num_voices,
            sample_rate,
            smoothing_time: DEFAULT_SMOOTHING_TIME,
            params,
            display_voice: None,
        }
    }

    /// Builder variant of `set_smoothing_time`
    pub fn with_smoothing_time(mut self, seconds: f64) -> Self {
        self.set_smoothing_time(seconds);
        self
    }

    pub fn num_voices(&self) -> usize {
        self.num_voices
    }

    pub fn is_poly(&self) -> bool {
        matches!(self.store, BankStore::Poly(_))
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn topology_kind(&self) -> TopologyKind {
        self.mode.topology().0
    }

    /// Identifier of the active topology family
    pub fn topology_id(&self) -> &'static str {
        self.first().id()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn first(&self) -> &AnyFilter {
        match &self.store {
            BankStore::Mono(f) => f,
            BankStore::Poly(voices) => &voices[0],
        }
    }

    fn filters_mut(&mut self) -> &mut [AnyFilter] {
        match &mut self.store {
            BankStore::Mono(f) => std::slice::from_mut(f),
            BankStore::Poly(voices) => voices,
        }
    }

    /// Change the mode, rebuilding the filters only when the topology family
    /// changes
    pub fn set_mode(&mut self, mode: FilterMode) {
        if mode == self.mode {
            return;
        }

        let (kind, sub_type) = mode.topology();
        let rebuild = kind != self.first().kind();
        self.mode = mode;

        if rebuild {
            log::debug!(
                "[FilterBank] Rebuilding {} voice(s): {} -> {:?}",
                self.num_voices,
                self.first().id(),
                kind
            );
        }

        let (sample_rate, smoothing_time) = (self.sample_rate, self.smoothing_time);

        for filter in self.filters_mut() {
            if rebuild {
                *filter = AnyFilter::build(mode, sample_rate, smoothing_time, filter.params());
            } else {
                filter.set_type(sub_type);
            }
        }
    }

    /// Set cutoff frequency of every voice
    pub fn set_frequency(&mut self, frequency: f64) {
        self.params.frequency = frequency;
        for filter in self.filters_mut() {
            filter.set_frequency(frequency);
        }
    }

    pub fn set_q(&mut self, q: f64) {
        self.params.q = q;
        for filter in self.filters_mut() {
            filter.set_q(q);
        }
    }

    /// Set gain of every voice as a linear factor
    pub fn set_gain(&mut self, gain: f64) {
        self.params.gain = gain;
        for filter in self.filters_mut() {
            filter.set_gain(gain);
        }
    }

    pub fn set_smoothing_time(&mut self, seconds: f64) {
        self.smoothing_time = seconds;
        for filter in self.filters_mut() {
            filter.set_smoothing_time(seconds);
        }
    }

    /// Set an attribute on every voice
    pub fn set_attribute(&mut self, attribute: FilterAttribute, value: f64) {
        match attribute {
            FilterAttribute::Gain => self.set_gain(Decibels(FilterLimits::limit_gain_db(value)).to_gain()),
            FilterAttribute::Frequency => self.set_frequency(value),
            FilterAttribute::Q => self.set_q(value),
            FilterAttribute::Mode => match mode_from_value(value) {
                Some(mode) => self.set_mode(mode),
                None => log::warn!("[FilterBank] Ignoring unknown mode {}", value),
            },
        }
    }

    /// Set an attribute on one voice only
    ///
    /// `Mode` always applies to the whole bank. Returns false for an unknown
    /// voice.
    pub fn set_voice_attribute(&mut self, voice: usize, attribute: FilterAttribute, value: f64) -> bool {
        if attribute == FilterAttribute::Mode {
            self.set_attribute(attribute, value);
            return true;
        }

        let Some(filter) = self.filters_mut().get_mut(voice) else {
            return false;
        };

        match attribute {
            FilterAttribute::Gain => filter.set_gain(Decibels(FilterLimits::limit_gain_db(value)).to_gain()),
            FilterAttribute::Frequency => filter.set_frequency(value),
            FilterAttribute::Q => filter.set_q(value),
            FilterAttribute::Mode => {}
        }

        true
    }

    /// Bank-level attribute value
    pub fn attribute(&self, attribute: FilterAttribute) -> f64 {
        match attribute {
            FilterAttribute::Gain => Decibels::from_gain(FilterLimits::limit_gain(self.params.gain)).0,
            FilterAttribute::Frequency => FilterLimits::limit_frequency(self.params.frequency, self.sample_rate),
            FilterAttribute::Q => FilterLimits::limit_q(self.params.q),
            FilterAttribute::Mode => self.mode.index() as f64,
        }
    }

    /// Clear the history of one voice, typically at note start
    pub fn reset_voice(&mut self, voice: usize) {
        if let Some(filter) = self.filters_mut().get_mut(voice) {
            filter.reset();
        }
    }

    /// Select which voice `current_coefficients` reports
    pub fn set_display_voice(&mut self, voice: Option<usize>) {
        self.display_voice = voice;
    }

    pub fn display_voice(&self) -> Option<usize> {
        self.display_voice
    }

    /// Biquad approximation at the bank's target parameters
    pub fn approximate_coefficients(&self) -> BiquadCoeffs {
        self.first().approximate_coefficients()
    }

    /// Biquad approximation at the last rendered parameters of the display
    /// voice
    pub fn current_coefficients(&self) -> BiquadCoeffs {
        match &self.store {
            BankStore::Mono(f) => f.current_coefficients(),
            BankStore::Poly(voices) => {
                let voice = self.display_voice.unwrap_or(0).min(voices.len() - 1);
                voices[voice].current_coefficients()
            }
        }
    }

    /// Render a mono bank
    ///
    /// Calling this on a polyphonic bank is a programming error: it asserts
    /// in debug builds and does nothing in release builds.
    #[inline]
    pub fn render_mono(&mut self, r: &mut RenderData<'_>) {
        match &mut self.store {
            BankStore::Mono(filter) => filter.render(r),
            BankStore::Poly(_) => debug_assert!(false, "render_mono called on a polyphonic filter bank"),
        }
    }

    /// Render the voice selected by `r.voice_index`
    ///
    /// Calling this on a mono bank, without a voice index or with an index
    /// past the voice count is a programming error: it asserts in debug
    /// builds and does nothing in release builds.
    #[inline]
    pub fn render_poly(&mut self, r: &mut RenderData<'_>) {
        let BankStore::Poly(voices) = &mut self.store else {
            debug_assert!(false, "render_poly called on a mono filter bank");
            return;
        };

        match r.voice_index.and_then(|v| voices.get_mut(v)) {
            Some(filter) => filter.render(r),
            None => debug_assert!(false, "render_poly called with invalid voice {:?}", r.voice_index),
        }
    }

    /// Filter one interleaved frame
    ///
    /// Mono banks take `None`, polyphonic banks the voice index. A mismatch
    /// asserts in debug builds and leaves the frame untouched in release.
    #[inline]
    pub fn process_frame(&mut self, voice_index: Option<usize>, frame: &mut [f64]) {
        match (&mut self.store, voice_index) {
            (BankStore::Mono(filter), None) => filter.process_frame(frame),
            (BankStore::Poly(voices), Some(v)) if v < voices.len() => voices[v].process_frame(frame),
            _ => debug_assert!(false, "process_frame called with mismatched voice {:?}", voice_index),
        }
    }
}

fn mode_from_value(value: f64) -> Option<FilterMode> {
    if value.is_finite() && value >= 0.0 {
        FilterMode::from_index(value.round() as usize)
    } else {
        None
    }
}

impl Processor for FilterBank {
    fn reset(&mut self) {
        for filter in self.filters_mut() {
            filter.reset();
        }
    }
}

impl ProcessorConfig for FilterBank {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            log::warn!("[FilterBank] Ignoring invalid sample rate {}", sample_rate);
            return;
        }

        self.sample_rate = sample_rate;
        for filter in self.filters_mut() {
            filter.set_sample_rate(sample_rate);
        }
    }
}
