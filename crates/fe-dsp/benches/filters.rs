//! Filter topology benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use fe_core::ChannelBuffer;
use fe_dsp::filters::{FilterBank, FilterMode, RenderData};

fn noise_block(num_samples: usize) -> ChannelBuffer {
    let samples: Vec<f64> = (0..num_samples).map(|i| (i as f64 * 0.37).sin() * 0.5).collect();
    ChannelBuffer::dual_mono(&samples)
}

fn bench_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_bank_512");

    for mode in FilterMode::ALL {
        let mut bank = FilterBank::new(1);
        bank.set_mode(mode);
        bank.set_frequency(1200.0);
        bank.set_q(2.0);

        let mut buffer = noise_block(512);

        group.bench_function(format!("{:?}", mode), |b| {
            b.iter(|| {
                bank.render_mono(&mut RenderData::whole(black_box(&mut buffer)));
            })
        });
    }

    group.finish();
}

fn bench_sweep(c: &mut Criterion) {
    let mut bank = FilterBank::new(1);
    bank.set_mode(FilterMode::StateVariableLP);
    let mut buffer = noise_block(512);
    let mut frequency = 100.0;

    // Coefficients recomputed every block
    c.bench_function("svf_sweep_512", |b| {
        b.iter(|| {
            frequency = if frequency > 10_000.0 { 100.0 } else { frequency * 1.1 };
            bank.set_frequency(frequency);
            bank.render_mono(&mut RenderData::whole(black_box(&mut buffer)));
        })
    });
}

fn bench_poly(c: &mut Criterion) {
    let mut bank = FilterBank::new(16);
    bank.set_mode(FilterMode::MoogLP);
    let mut buffer = noise_block(128);

    c.bench_function("moog_16_voices_128", |b| {
        b.iter(|| {
            for voice in 0..16 {
                bank.render_poly(&mut RenderData::whole(black_box(&mut buffer)).with_voice(voice));
            }
        })
    });
}

fn bench_frames(c: &mut Criterion) {
    let mut bank = FilterBank::new(1);
    bank.set_mode(FilterMode::MoogLP);
    let samples: Vec<f64> = (0..512).map(|i| (i as f64 * 0.37).sin() * 0.5).collect();

    c.bench_function("moog_frames_512", |b| {
        b.iter(|| {
            for &x in &samples {
                let mut frame = [x, -x];
                bank.process_frame(None, black_box(&mut frame));
            }
        })
    });
}

fn bench_silent_tail(c: &mut Criterion) {
    let mut bank = FilterBank::new(1);
    bank.set_mode(FilterMode::StateVariableLP);
    bank.set_frequency(8000.0);
    bank.set_q(9.0);

    let mut impulse = ChannelBuffer::new(2, 512);
    impulse.set_sample(0, 0, 1.0);
    bank.render_mono(&mut RenderData::whole(&mut impulse));

    // Long after the impulse the state is flushed rather than subnormal
    let mut silence = ChannelBuffer::new(2, 512);
    c.bench_function("svf_silent_tail_512", |b| {
        b.iter(|| {
            silence.channel_mut(0).fill(0.0);
            silence.channel_mut(1).fill(0.0);
            bank.render_mono(&mut RenderData::whole(black_box(&mut silence)));
        })
    });
}

criterion_group!(benches, bench_modes, bench_sweep, bench_poly, bench_frames, bench_silent_tail);
criterion_main!(benches);
