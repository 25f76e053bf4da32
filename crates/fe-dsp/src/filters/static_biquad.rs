//! RBJ cookbook biquads behind the topology interface

use fe_core::{ChannelBuffer, Decibels, FilterLimits};

use super::{CoefficientType, FilterTopology, MAX_CHANNELS, active_channels};
use crate::biquad::{BiquadCoeffs, BiquadTDF2};
use crate::{MonoProcessor, Processor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum BiquadMode {
    #[default]
    LowPass,
    HighPass,
    LowShelf,
    HighShelf,
    Peak,
    ResoLow,
}

/// One TDF-II biquad per channel sharing a coefficient set
#[derive(Debug, Clone)]
pub struct StaticBiquad {
    filters: [BiquadTDF2; MAX_CHANNELS],
    coeffs: BiquadCoeffs,
    mode: BiquadMode,
    num_channels: usize,
}

impl Default for StaticBiquad {
    fn default() -> Self {
        Self {
            filters: std::array::from_fn(|_| BiquadTDF2::new()),
            coeffs: BiquadCoeffs::bypass(),
            mode: BiquadMode::LowPass,
            num_channels: MAX_CHANNELS,
        }
    }
}

impl StaticBiquad {
    /// Coefficients applied to every channel
    pub fn coefficients(&self) -> BiquadCoeffs {
        self.coeffs
    }
}

impl FilterTopology for StaticBiquad {
    const ID: &'static str = "biquad";
    const MODES: &'static [&'static str] =
        &["LowPass", "High Pass", "Low Shelf", "High Shelf", "Peak", "Reso Low"];
    const COEFFICIENT_TYPES: &'static [CoefficientType] = &[
        CoefficientType::LowPass,
        CoefficientType::HighPass,
        CoefficientType::LowShelf,
        CoefficientType::HighShelf,
        CoefficientType::Peak,
        CoefficientType::LowPassReso,
    ];

    fn set_sub_type(&mut self, sub_type: usize) {
        self.mode = match sub_type {
            0 => BiquadMode::LowPass,
            1 => BiquadMode::HighPass,
            2 => BiquadMode::LowShelf,
            3 => BiquadMode::HighShelf,
            4 => BiquadMode::Peak,
            5 => BiquadMode::ResoLow,
            _ => return,
        };

        // History of another response shape is meaningless
        self.reset(self.num_channels);
    }

    fn update_coefficients(&mut self, sample_rate: f64, frequency: f64, q: f64, gain: f64) {
        let frequency = FilterLimits::limit_frequency(frequency, sample_rate);
        let gain_db = Decibels::from_gain(gain).0.max(-144.0);

        self.coeffs = match self.mode {
            BiquadMode::LowPass => BiquadCoeffs::lowpass_butterworth(frequency, sample_rate),
            BiquadMode::HighPass => BiquadCoeffs::highpass_butterworth(frequency, sample_rate),
            BiquadMode::LowShelf => BiquadCoeffs::low_shelf(frequency, q, gain_db, sample_rate),
            BiquadMode::HighShelf => BiquadCoeffs::high_shelf(frequency, q, gain_db, sample_rate),
            BiquadMode::Peak => BiquadCoeffs::peaking(frequency, q, gain_db, sample_rate),
            BiquadMode::ResoLow => BiquadCoeffs::lowpass(frequency, q, sample_rate),
        };

        for filter in &mut self.filters {
            filter.set_coeffs(self.coeffs);
        }
    }

    fn reset(&mut self, num_channels: usize) {
        self.num_channels = num_channels.min(MAX_CHANNELS);

        for filter in self.filters.iter_mut().take(self.num_channels) {
            filter.reset();
        }
    }

    fn process_samples(&mut self, buffer: &mut ChannelBuffer, start_sample: usize, num_samples: usize) {
        for c in 0..active_channels(buffer) {
            self.filters[c].process_block(buffer.range_mut(c, start_sample, num_samples));
        }
    }

    fn process_frame(&mut self, frame: &mut [f64]) {
        for (x, filter) in frame.iter_mut().zip(self.filters.iter_mut()) {
            *x = filter.process_sample(*x);
        }
    }
}
