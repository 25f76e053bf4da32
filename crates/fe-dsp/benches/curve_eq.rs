//! Curve EQ and spectrum benchmarks

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fe_core::ChannelBuffer;
use fe_dsp::{AnalyserRingBuffer, CurveEq, EngineConfig, SpectrumAnalyser};

fn block(num_samples: usize) -> ChannelBuffer {
    let samples: Vec<f64> = (0..num_samples).map(|i| (i as f64 * 0.11).sin() * 0.5).collect();
    ChannelBuffer::dual_mono(&samples)
}

fn bench_apply_effect(c: &mut Criterion) {
    let eq = CurveEq::new();
    for (i, frequency) in [80.0, 250.0, 1000.0, 4000.0, 12000.0].into_iter().enumerate() {
        eq.add_filter_band(frequency, if i % 2 == 0 { 3.0 } else { -3.0 }, None);
    }
    eq.enable_spectrum_analyser(true);
    eq.analyser().apply_pending_resize();

    let mut buffer = block(512);

    c.bench_function("curve_eq_5_bands_512", |b| {
        b.iter(|| {
            eq.apply_effect(black_box(&mut buffer), 0, 512);
        })
    });
}

fn bench_spectrum(c: &mut Criterion) {
    let size = EngineConfig::default().analyser_buffer_size;
    let ring = Arc::new(AnalyserRingBuffer::with_size(2, size).unwrap());
    let mut spectrum = SpectrumAnalyser::new();
    let buffer = block(256);

    c.bench_function("spectrum_update_8192", |b| {
        b.iter(|| {
            ring.push_samples(&buffer, 0, 256);
            spectrum.update(black_box(&ring));
        })
    });
}

criterion_group!(benches, bench_apply_effect, bench_spectrum);
criterion_main!(benches);
