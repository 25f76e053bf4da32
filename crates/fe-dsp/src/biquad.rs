//! RBJ cookbook coefficients and a Transposed Direct Form II kernel
//!
//! `BiquadCoeffs` doubles as the normalised 5-tap coefficient set every
//! filter topology reports for plotting.

use fe_core::Sample;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::filters::flush_denormal;
use crate::{MonoProcessor, Processor};

/// Biquad coefficients (normalised, a0 == 1)
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

/// Shared intermediate terms of the RBJ cookbook formulas
struct Rbj {
    sin_omega: f64,
    cos_omega: f64,
    alpha: f64,
}

impl Rbj {
    fn new(freq: f64, q: f64, sample_rate: f64) -> Self {
        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        Self {
            sin_omega,
            cos_omega: omega.cos(),
            alpha: sin_omega / (2.0 * q),
        }
    }
}

impl BiquadCoeffs {
    #[inline]
    fn normalised(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Calculate lowpass filter coefficients
    pub fn lowpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let r = Rbj::new(freq, q, sample_rate);
        let b1 = 1.0 - r.cos_omega;

        Self::normalised(
            b1 / 2.0,
            b1,
            b1 / 2.0,
            1.0 + r.alpha,
            -2.0 * r.cos_omega,
            1.0 - r.alpha,
        )
    }

    /// Second-order Butterworth lowpass
    pub fn lowpass_butterworth(freq: f64, sample_rate: f64) -> Self {
        Self::lowpass(freq, FRAC_1_SQRT_2, sample_rate)
    }

    /// Calculate highpass filter coefficients
    pub fn highpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let r = Rbj::new(freq, q, sample_rate);
        let b0 = (1.0 + r.cos_omega) / 2.0;

        Self::normalised(
            b0,
            -(1.0 + r.cos_omega),
            b0,
            1.0 + r.alpha,
            -2.0 * r.cos_omega,
            1.0 - r.alpha,
        )
    }

    /// Second-order Butterworth highpass
    pub fn highpass_butterworth(freq: f64, sample_rate: f64) -> Self {
        Self::highpass(freq, FRAC_1_SQRT_2, sample_rate)
    }

    /// Calculate bandpass filter coefficients (constant 0 dB peak gain)
    pub fn bandpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let r = Rbj::new(freq, q, sample_rate);

        Self::normalised(
            r.alpha,
            0.0,
            -r.alpha,
            1.0 + r.alpha,
            -2.0 * r.cos_omega,
            1.0 - r.alpha,
        )
    }

    /// Calculate allpass filter coefficients
    pub fn allpass(freq: f64, q: f64, sample_rate: f64) -> Self {
        let r = Rbj::new(freq, q, sample_rate);

        Self::normalised(
            1.0 - r.alpha,
            -2.0 * r.cos_omega,
            1.0 + r.alpha,
            1.0 + r.alpha,
            -2.0 * r.cos_omega,
            1.0 - r.alpha,
        )
    }

    /// Calculate peaking EQ filter coefficients
    /// gain_db: gain in decibels
    pub fn peaking(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let r = Rbj::new(freq, q, sample_rate);

        Self::normalised(
            1.0 + r.alpha * a,
            -2.0 * r.cos_omega,
            1.0 - r.alpha * a,
            1.0 + r.alpha / a,
            -2.0 * r.cos_omega,
            1.0 - r.alpha / a,
        )
    }

    /// Calculate low shelf filter coefficients
    pub fn low_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let r = Rbj::new(freq, q, sample_rate);
        let cos_omega = r.cos_omega;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * r.alpha;

        Self::normalised(
            a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega),
            a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega),
            (a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha,
        )
    }

    /// Calculate high shelf filter coefficients
    pub fn high_shelf(freq: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        let a = 10.0_f64.powf(gain_db / 40.0);
        let r = Rbj::new(freq, q, sample_rate);
        let cos_omega = r.cos_omega;
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * r.alpha;

        Self::normalised(
            a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega),
            a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos_omega),
            (a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha,
        )
    }

    /// Bypass (unity gain, no filtering)
    pub fn bypass() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }

    /// Linear magnitude of the transfer function at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let den = (den_re * den_re + den_im * den_im).sqrt();
        if den <= f64::EPSILON {
            return f64::INFINITY;
        }

        (num_re * num_re + num_im * num_im).sqrt() / den
    }

    pub fn is_finite(&self) -> bool {
        [self.b0, self.b1, self.b2, self.a1, self.a2]
            .iter()
            .all(|c| c.is_finite())
    }
}

/// Transposed Direct Form II biquad filter
///
/// History below the denormal threshold is flushed to zero so a decaying
/// tail never lingers in subnormal range.
#[derive(Debug, Clone)]
pub struct BiquadTDF2 {
    coeffs: BiquadCoeffs,
    z1: f64,
    z2: f64,
}

impl BiquadTDF2 {
    /// Unity-gain filter with cleared history
    pub fn new() -> Self {
        Self::with_coeffs(BiquadCoeffs::bypass())
    }

    pub fn with_coeffs(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }
}

impl Default for BiquadTDF2 {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for BiquadTDF2 {
    fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

impl MonoProcessor for BiquadTDF2 {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let output = self.coeffs.b0 * input + self.z1;
        self.z1 = flush_denormal(self.coeffs.b1 * input - self.coeffs.a1 * output + self.z2);
        self.z2 = flush_denormal(self.coeffs.b2 * input - self.coeffs.a2 * output);
        output
    }
}
