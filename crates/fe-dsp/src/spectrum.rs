//! Display readers for the analyser ring buffer
//!
//! Run on the UI timer, never on the audio thread:
//! - `SpectrumAnalyser` - mono-summed, Blackman-windowed real FFT with
//!   dB mapping and peak-hold decay
//! - `Oscilloscope` - min/max envelope per display column
//! - `Goniometer` - mid/side point cloud
//! - `SpectrumCapture` - bundles the three and applies posted resizes

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use fe_core::{Decibels, Sample, StereoSample};
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::analyser::{AnalyserRingBuffer, RingBufferSnapshot};
use crate::config::EngineConfig;

/// Floor of the displayed dB range
const DISPLAY_FLOOR_DB: f64 = -70.0;
/// Curve applied to the normalised dB value
const DISPLAY_EXPONENT: f64 = 0.707;
/// Weight of the new value when blending with the held one
const NEW_VALUE_WEIGHT: f64 = 0.6;
/// Peak-hold fall per update
const PEAK_DECAY: f64 = 0.02;

/// Blackman window of `size` samples
fn blackman(size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }

    let n = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / n;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

/// Map a dB level to the 0..1 display scale
#[inline]
pub fn display_value(db: f64) -> f64 {
    let db = if db.is_nan() { DISPLAY_FLOOR_DB } else { db.clamp(DISPLAY_FLOOR_DB, 0.0) };
    (1.0 + db / -DISPLAY_FLOOR_DB).powf(DISPLAY_EXPONENT)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPECTRUM
// ═══════════════════════════════════════════════════════════════════════════════

/// FFT spectrum of the ring buffer contents
pub struct SpectrumAnalyser {
    fft: Option<Arc<dyn RealToComplex<f64>>>,
    planner: RealFftPlanner<f64>,
    fft_size: usize,
    window: Vec<f64>,
    window_gain: f64,
    input_buffer: Vec<f64>,
    output_buffer: Vec<Complex<f64>>,
    snapshot: RingBufferSnapshot,
    /// Level per bin in dBFS
    magnitudes_db: Vec<f64>,
    /// Peak-held display value per bin (0..1)
    display: Vec<f64>,
    last_sequence: Option<u64>,
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("last_sequence", &self.last_sequence)
            .finish()
    }
}

impl Default for SpectrumAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyser {
    pub fn new() -> Self {
        Self {
            fft: None,
            planner: RealFftPlanner::new(),
            fft_size: 0,
            window: Vec::new(),
            window_gain: 1.0,
            input_buffer: Vec::new(),
            output_buffer: Vec::new(),
            snapshot: RingBufferSnapshot::default(),
            magnitudes_db: Vec::new(),
            display: Vec::new(),
            last_sequence: None,
        }
    }

    /// Plan the FFT and window for a new ring size
    fn prepare(&mut self, fft_size: usize) {
        let fft = self.planner.plan_fft_forward(fft_size);
        let output_len = fft_size / 2 + 1;

        self.window = blackman(fft_size);
        // Amplitude normalisation: a full-scale sine reads 0 dB
        self.window_gain = 2.0 / self.window.iter().sum::<f64>().max(f64::EPSILON);
        self.input_buffer = vec![0.0; fft_size];
        self.output_buffer = vec![Complex::new(0.0, 0.0); output_len];
        self.magnitudes_db = vec![DISPLAY_FLOOR_DB; output_len];
        self.display = vec![0.0; output_len];
        self.fft = Some(fft);
        self.fft_size = fft_size;

        log::debug!("[SpectrumAnalyser] FFT size {}", fft_size);
    }

    /// Recompute the spectrum if the ring buffer changed
    ///
    /// Returns true when new values were computed.
    pub fn update(&mut self, ring: &AnalyserRingBuffer) -> bool {
        let sequence = ring.sequence();
        if self.last_sequence == Some(sequence) {
            return false;
        }

        if !ring.read_into(&mut self.snapshot) {
            self.last_sequence = Some(sequence);
            return false;
        }

        let size = self.snapshot.size();
        if size < 2 {
            return false;
        }

        if size != self.fft_size {
            self.prepare(size);
        }

        self.last_sequence = Some(self.snapshot.sequence);
        self.analyze();
        true
    }

    fn analyze(&mut self) {
        let Some(fft) = self.fft.as_ref() else {
            return;
        };

        // Mono sum, oldest sample first
        let num_channels = self.snapshot.num_channels().max(1);
        let scale = 1.0 / num_channels as f64;
        self.input_buffer.fill(0.0);

        for c in 0..self.snapshot.num_channels() {
            for (x, sample) in self.input_buffer.iter_mut().zip(self.snapshot.ordered(c)) {
                *x += sample * scale;
            }
        }

        for (x, w) in self.input_buffer.iter_mut().zip(&self.window) {
            *x *= w;
        }

        if fft.process(&mut self.input_buffer, &mut self.output_buffer).is_err() {
            self.output_buffer.fill(Complex::new(0.0, 0.0));
        }

        for (i, c) in self.output_buffer.iter().enumerate() {
            let magnitude = c.norm() * self.window_gain;
            let db = Decibels::from_gain(magnitude).0.max(DISPLAY_FLOOR_DB);
            self.magnitudes_db[i] = db;

            let value = NEW_VALUE_WEIGHT * display_value(db) + (1.0 - NEW_VALUE_WEIGHT) * self.display[i];
            let held = &mut self.display[i];

            *held = if value > *held { value } else { (*held - PEAK_DECAY).max(0.0) };
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Level per bin in dBFS, floored at -70 dB
    pub fn magnitudes_db(&self) -> &[f64] {
        &self.magnitudes_db
    }

    /// Peak-held display value per bin (0..1)
    pub fn display_values(&self) -> &[f64] {
        &self.display
    }

    pub fn bin_to_freq(&self, bin: usize, sample_rate: f64) -> f64 {
        if self.fft_size == 0 {
            return 0.0;
        }
        bin as f64 * sample_rate / self.fft_size as f64
    }

    pub fn freq_to_bin(&self, freq: f64, sample_rate: f64) -> usize {
        ((freq * self.fft_size as f64) / sample_rate).round() as usize
    }

    /// Drop held values and force a recompute
    pub fn reset(&mut self) {
        self.display.fill(0.0);
        self.magnitudes_db.fill(DISPLAY_FLOOR_DB);
        self.last_sequence = None;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OSCILLOSCOPE / GONIOMETER
// ═══════════════════════════════════════════════════════════════════════════════

/// Min/max envelope for waveform display
#[derive(Debug, Clone)]
pub struct Oscilloscope {
    num_points: usize,
    snapshot: RingBufferSnapshot,
    /// (min, max) per point per channel
    envelopes: Vec<Vec<(Sample, Sample)>>,
    last_sequence: Option<u64>,
}

impl Oscilloscope {
    pub fn new(num_points: usize) -> Self {
        Self {
            num_points: num_points.max(1),
            snapshot: RingBufferSnapshot::default(),
            envelopes: Vec::new(),
            last_sequence: None,
        }
    }

    pub fn update(&mut self, ring: &AnalyserRingBuffer) -> bool {
        let sequence = ring.sequence();
        if self.last_sequence == Some(sequence) {
            return false;
        }
        self.last_sequence = Some(sequence);

        if !ring.read_into(&mut self.snapshot) {
            self.envelopes.clear();
            return false;
        }

        let size = self.snapshot.size();
        let num_points = self.num_points.min(size).max(1);

        self.envelopes
            .resize_with(self.snapshot.num_channels(), Vec::new);

        for (c, envelope) in self.envelopes.iter_mut().enumerate() {
            envelope.clear();
            envelope.resize(num_points, (Sample::INFINITY, Sample::NEG_INFINITY));

            for (i, sample) in self.snapshot.ordered(c).enumerate() {
                let (lo, hi) = &mut envelope[i * num_points / size];
                *lo = lo.min(sample);
                *hi = hi.max(sample);
            }
        }

        true
    }

    /// Envelope of one channel, oldest first
    pub fn envelope(&self, channel: usize) -> &[(Sample, Sample)] {
        self.envelopes.get(channel).map_or(&[], Vec::as_slice)
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }
}

/// Goniometer point: side on x, mid on y
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhasePoint {
    pub x: Sample,
    pub y: Sample,
}

/// Stereo field display
///
/// A mono signal draws a vertical line, a pure side signal a horizontal one.
#[derive(Debug, Clone)]
pub struct Goniometer {
    max_points: usize,
    snapshot: RingBufferSnapshot,
    points: Vec<PhasePoint>,
    last_sequence: Option<u64>,
}

impl Goniometer {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points: max_points.max(1),
            snapshot: RingBufferSnapshot::default(),
            points: Vec::new(),
            last_sequence: None,
        }
    }

    pub fn update(&mut self, ring: &AnalyserRingBuffer) -> bool {
        let sequence = ring.sequence();
        if self.last_sequence == Some(sequence) {
            return false;
        }
        self.last_sequence = Some(sequence);

        self.points.clear();
        if !ring.read_into(&mut self.snapshot) {
            return false;
        }

        let size = self.snapshot.size();
        let right_channel = if self.snapshot.num_channels() > 1 { 1 } else { 0 };
        let stride = size.div_ceil(self.max_points).max(1);

        let left = self.snapshot.ordered(0);
        let right = self.snapshot.ordered(right_channel);

        self.points.extend(
            left.zip(right)
                .step_by(stride)
                .map(|(l, r)| {
                    let ms = StereoSample::new(l, r).to_mid_side();
                    PhasePoint { x: ms.side, y: ms.mid }
                }),
        );

        true
    }

    /// Points oldest first
    pub fn points(&self) -> &[PhasePoint] {
        &self.points
    }

    /// Left/right correlation of the last update (-1..1)
    pub fn correlation(&self) -> f64 {
        let (mut mid, mut side) = (0.0, 0.0);
        for p in &self.points {
            mid += p.y * p.y;
            side += p.x * p.x;
        }

        if mid + side <= f64::EPSILON {
            0.0
        } else {
            (mid - side) / (mid + side)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAPTURE
// ═══════════════════════════════════════════════════════════════════════════════

/// UI-side consumer of a ring buffer
///
/// `tick` is called from the host's display timer at `refresh_interval`.
#[derive(Debug)]
pub struct SpectrumCapture {
    ring: Arc<AnalyserRingBuffer>,
    refresh_interval: Duration,
    pub spectrum: SpectrumAnalyser,
    pub oscilloscope: Oscilloscope,
    pub goniometer: Goniometer,
}

impl SpectrumCapture {
    pub fn new(ring: Arc<AnalyserRingBuffer>, config: &EngineConfig) -> Self {
        let hz = if config.spectrum_refresh_hz > 0.0 { config.spectrum_refresh_hz } else { 30.0 };

        Self {
            ring,
            refresh_interval: Duration::from_secs_f64(1.0 / hz),
            spectrum: SpectrumAnalyser::new(),
            oscilloscope: Oscilloscope::new(512),
            goniometer: Goniometer::new(1024),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn ring(&self) -> &Arc<AnalyserRingBuffer> {
        &self.ring
    }

    /// Apply a posted resize, then refresh every reader
    ///
    /// Returns true if any reader produced new data.
    pub fn tick(&mut self) -> bool {
        // A deferred resize stays posted for the next tick
        self.ring.apply_pending_resize();

        let spectrum = self.spectrum.update(&self.ring);
        let oscilloscope = self.oscilloscope.update(&self.ring);
        let goniometer = self.goniometer.update(&self.ring);

        spectrum || oscilloscope || goniometer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fe_core::ChannelBuffer;

    fn sine_ring(size: usize, bin: usize, amplitude: f64) -> AnalyserRingBuffer {
        let ring = AnalyserRingBuffer::with_size(2, size).unwrap();
        let samples: Vec<Sample> = (0..size)
            .map(|i| amplitude * (2.0 * PI * bin as f64 * i as f64 / size as f64).sin())
            .collect();
        ring.push_samples(&ChannelBuffer::dual_mono(&samples), 0, size);
        ring
    }

    #[test]
    fn test_display_mapping() {
        assert_eq!(display_value(0.0), 1.0);
        assert_eq!(display_value(-70.0), 0.0);
        assert_eq!(display_value(-200.0), 0.0);
        assert_eq!(display_value(12.0), 1.0);
        assert_eq!(display_value(f64::NAN), 0.0);
    }

    #[test]
    fn test_full_scale_sine_reads_zero_db() {
        let ring = sine_ring(1024, 64, 1.0);
        let mut spectrum = SpectrumAnalyser::new();

        assert!(spectrum.update(&ring));
        assert_eq!(spectrum.fft_size(), 1024);

        let peak = spectrum.magnitudes_db()[64];
        assert!(peak.abs() < 0.1, "peak {peak} dB");
        assert!(spectrum.magnitudes_db()[300] < -60.0);
    }

    #[test]
    fn test_unchanged_ring_is_skipped() {
        let ring = sine_ring(256, 8, 0.5);
        let mut spectrum = SpectrumAnalyser::new();

        assert!(spectrum.update(&ring));
        assert!(!spectrum.update(&ring));
    }

    #[test]
    fn test_peak_hold_decays() {
        let ring = sine_ring(256, 8, 1.0);
        let mut spectrum = SpectrumAnalyser::new();
        spectrum.update(&ring);
        let held = spectrum.display_values()[8];

        ring.clear();
        spectrum.update(&ring);
        assert!((spectrum.display_values()[8] - (held - PEAK_DECAY)).abs() < 1e-12);
    }

    #[test]
    fn test_oscilloscope_envelope() {
        let ring = AnalyserRingBuffer::with_size(1, 8).unwrap();
        let samples = vec![0.0, 1.0, -1.0, 0.5, 0.2, 0.3, -0.4, 0.1];
        ring.push_samples(&ChannelBuffer::from_channels(vec![samples]), 0, 8);

        let mut scope = Oscilloscope::new(2);
        assert!(scope.update(&ring));
        assert_eq!(scope.envelope(0), &[(-1.0, 1.0), (-0.4, 0.3)]);
    }

    #[test]
    fn test_goniometer_mono_signal_is_vertical() {
        let ring = sine_ring(64, 4, 0.8);
        let mut gonio = Goniometer::new(64);
        gonio.update(&ring);

        assert_eq!(gonio.points().len(), 64);
        assert!(gonio.points().iter().all(|p| p.x == 0.0));
        assert!((gonio.correlation() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_capture_applies_resize() {
        let ring = Arc::new(AnalyserRingBuffer::new(2));
        let mut capture = SpectrumCapture::new(Arc::clone(&ring), &EngineConfig::default());
        assert_eq!(capture.refresh_interval(), Duration::from_secs_f64(1.0 / 30.0));

        ring.set_analyser_buffer_size(512).unwrap();
        capture.tick();
        assert_eq!(ring.size(), 512);
    }
}
