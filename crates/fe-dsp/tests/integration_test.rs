//! Filter Engine Integration Tests
//!
//! Exercises the public render paths end to end.
//! Verifies:
//! - Coefficient updates are idempotent for every topology
//! - Impulse responses stay finite across the legal parameter range
//! - Reset leaves every kernel silent
//! - Decaying tails flush to zero instead of going subnormal
//! - Per-frame processing matches block rendering
//! - MultiChannelFilter and FilterBank attenuate and keep voices independent

use fe_core::ChannelBuffer;
use fe_dsp::filters::{
    FilterAttribute, FilterBank, FilterMode, FilterTopology, Ladder, LinkwitzRiley, Moog,
    MultiChannelFilter, OnePole, PhaseAllpass, RenderData, RingMod, StateVariable, StaticBiquad,
};
use fe_dsp::{Processor, ProcessorConfig};

const SAMPLE_RATE: f64 = 44100.0;
const BLOCK_SIZE: usize = 512;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Generate test sine wave
fn generate_sine(samples: usize, freq: f64) -> Vec<f64> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            (2.0 * std::f64::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Deterministic white noise in -1..1
fn generate_noise(samples: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    (0..samples)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
        })
        .collect()
}

fn rms(signal: &[f64]) -> f64 {
    let sum: f64 = signal.iter().map(|x| x * x).sum();
    (sum / signal.len() as f64).sqrt()
}

fn is_valid_signal(buffer: &ChannelBuffer) -> bool {
    buffer.iter_channels().all(|c| c.iter().all(|x| x.is_finite()))
}

macro_rules! for_each_topology {
    ($check:ident) => {
        $check::<Moog>();
        $check::<Ladder>();
        $check::<StateVariable>();
        $check::<StaticBiquad>();
        $check::<OnePole>();
        $check::<PhaseAllpass>();
        $check::<RingMod>();
        $check::<LinkwitzRiley>();
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOPOLOGY INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════════

fn check_idempotent_update<T: FilterTopology>() {
    let input = generate_noise(4096, 7);

    for sub_type in 0..T::MODES.len() {
        let mut once = T::default();
        let mut twice = T::default();
        once.set_sub_type(sub_type);
        twice.set_sub_type(sub_type);

        once.update_coefficients(SAMPLE_RATE, 1234.5, 2.5, 0.5);
        twice.update_coefficients(SAMPLE_RATE, 1234.5, 2.5, 0.5);
        twice.update_coefficients(SAMPLE_RATE, 1234.5, 2.5, 0.5);

        let mut a = ChannelBuffer::dual_mono(&input);
        let mut b = ChannelBuffer::dual_mono(&input);
        once.process_samples(&mut a, 0, input.len());
        twice.process_samples(&mut b, 0, input.len());

        assert_eq!(a, b, "{} mode {} differs after a repeated update", T::ID, T::MODES[sub_type]);
    }
}

#[test]
fn test_update_coefficients_is_idempotent() {
    init_logging();
    for_each_topology!(check_idempotent_update);
}

fn check_impulse_stability<T: FilterTopology>() {
    let nyquist_limit = 0.49 * SAMPLE_RATE;
    let frequencies: Vec<f64> = (0..=24)
        .map(|i| 20.0 * (nyquist_limit / 20.0).powf(i as f64 / 24.0))
        .collect();
    let qs = [0.1, 0.3, 0.707, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0];

    for sub_type in 0..T::MODES.len() {
        for &frequency in &frequencies {
            for &q in &qs {
                let mut kernel = T::default();
                kernel.set_sub_type(sub_type);
                kernel.update_coefficients(SAMPLE_RATE, frequency, q, 1.0);

                let mut buffer = ChannelBuffer::new(1, 10_000);
                buffer.set_sample(0, 0, 1.0);
                kernel.process_samples(&mut buffer, 0, 10_000);

                assert!(
                    is_valid_signal(&buffer),
                    "{} mode {} unstable at {} Hz, Q {}",
                    T::ID,
                    T::MODES[sub_type],
                    frequency,
                    q
                );
            }
        }
    }
}

#[test]
fn test_impulse_response_stays_finite() {
    init_logging();
    for_each_topology!(check_impulse_stability);
}

fn check_silence_after_reset<T: FilterTopology>() {
    let noise = generate_noise(2048, 3);

    for sub_type in 0..T::MODES.len() {
        let mut kernel = T::default();
        kernel.set_sub_type(sub_type);
        kernel.update_coefficients(SAMPLE_RATE, 800.0, 4.0, 1.0);

        let mut excited = ChannelBuffer::dual_mono(&noise);
        kernel.process_samples(&mut excited, 0, noise.len());

        kernel.reset(2);

        let mut silence = ChannelBuffer::new(2, 64);
        kernel.process_samples(&mut silence, 0, 64);

        for c in 0..2 {
            assert_eq!(
                silence.get_sample(c, 0),
                0.0,
                "{} mode {} not silent after reset",
                T::ID,
                T::MODES[sub_type]
            );
        }
    }
}

#[test]
fn test_reset_gives_silence() {
    init_logging();
    for_each_topology!(check_silence_after_reset);
}

fn check_tail_never_subnormal<T: FilterTopology>() {
    const TAIL: usize = 100_000;

    for sub_type in 0..T::MODES.len() {
        for frequency in [2000.0, 8000.0, 16000.0] {
            for q in [0.707, 20.0] {
                let mut kernel = T::default();
                kernel.set_sub_type(sub_type);
                kernel.update_coefficients(SAMPLE_RATE, frequency, q, 1.0);

                let mut buffer = ChannelBuffer::new(2, TAIL);
                buffer.set_sample(0, 0, 1.0);
                buffer.set_sample(1, 0, -1.0);
                kernel.process_samples(&mut buffer, 0, TAIL);

                let subnormal = buffer
                    .iter_channels()
                    .flat_map(|c| c.iter())
                    .position(|x| *x != 0.0 && !x.is_normal());

                assert!(
                    subnormal.is_none(),
                    "{} mode {} went subnormal at {} Hz, Q {} (sample {:?})",
                    T::ID,
                    T::MODES[sub_type],
                    frequency,
                    q,
                    subnormal
                );
            }
        }
    }
}

#[test]
fn test_decaying_tails_never_go_subnormal() {
    init_logging();
    for_each_topology!(check_tail_never_subnormal);
}

fn check_frames_match_render<T: FilterTopology + Clone>() {
    let left = generate_noise(1024, 11);
    let right = generate_sine(1024, 330.0);

    for sub_type in 0..T::MODES.len() {
        let mut block_filter = MultiChannelFilter::<T>::new(SAMPLE_RATE);
        block_filter.set_type(sub_type);
        block_filter.set_frequency(1800.0);
        block_filter.set_q(2.0);
        block_filter.set_gain(1.5);
        block_filter.reset();
        let mut frame_filter = block_filter.clone();

        let mut buffer = ChannelBuffer::from_channels(vec![left.clone(), right.clone()]);
        for start in (0..1024).step_by(BLOCK_SIZE) {
            block_filter.render(&mut RenderData::new(&mut buffer, start, BLOCK_SIZE));
        }

        for i in 0..1024 {
            let mut frame = [left[i], right[i]];
            frame_filter.process_frame(&mut frame);

            for (c, x) in frame.iter().enumerate() {
                assert!(
                    (x - buffer.get_sample(c, i)).abs() < 1e-12,
                    "{} mode {} frame {} differs from block render",
                    T::ID,
                    T::MODES[sub_type],
                    i
                );
            }
        }
    }
}

#[test]
fn test_frame_processing_matches_block_render() {
    init_logging();
    for_each_topology!(check_frames_match_render);
}

// ═══════════════════════════════════════════════════════════════════════════════
// END-TO-END SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_static_biquad_lowpass_attenuates() {
    init_logging();

    let mut filter = MultiChannelFilter::<StaticBiquad>::new(SAMPLE_RATE);
    filter.set_smoothing_time(0.0);
    filter.set_type(0);
    filter.set_frequency(1000.0);
    filter.set_q(0.707);

    let input = generate_sine(SAMPLE_RATE as usize, 5000.0);
    let mut buffer = ChannelBuffer::dual_mono(&input);

    let mut start = 0;
    while start < input.len() {
        let num = BLOCK_SIZE.min(input.len() - start);
        filter.render(&mut RenderData::new(&mut buffer, start, num));
        start += num;
    }

    assert!(is_valid_signal(&buffer));

    for c in 0..2 {
        let attenuation_db = 20.0 * (rms(buffer.channel(c)) / rms(&input)).log10();
        assert!(attenuation_db < -12.0, "channel {} attenuation {:.1} dB", c, attenuation_db);
    }
}

#[test]
fn test_filter_bank_voices_are_independent() {
    init_logging();

    let mut bank = FilterBank::new(4).with_smoothing_time(0.0);
    bank.set_sample_rate(SAMPLE_RATE);
    bank.set_mode(FilterMode::MoogLP);

    assert!(bank.set_voice_attribute(0, FilterAttribute::Frequency, 200.0));
    assert!(bank.set_voice_attribute(1, FilterAttribute::Frequency, 8000.0));
    assert!(!bank.set_voice_attribute(4, FilterAttribute::Frequency, 1000.0));

    let noise = generate_noise(4096, 42);
    let mut voice0 = ChannelBuffer::dual_mono(&noise);
    let mut voice1 = ChannelBuffer::dual_mono(&noise);

    bank.render_poly(&mut RenderData::whole(&mut voice0).with_voice(0));
    bank.render_poly(&mut RenderData::whole(&mut voice1).with_voice(1));

    assert!(is_valid_signal(&voice0));
    assert!(is_valid_signal(&voice1));
    assert_ne!(voice0, voice1);

    // The darker voice keeps less energy
    assert!(rms(voice0.channel(0)) < rms(voice1.channel(0)));
}

#[test]
fn test_voice_reset_does_not_touch_other_voices() {
    init_logging();

    let mut bank = FilterBank::new(2).with_smoothing_time(0.0);
    bank.set_mode(FilterMode::StateVariableLP);
    bank.set_frequency(500.0);

    let noise = generate_noise(1024, 9);
    let mut warmup = ChannelBuffer::dual_mono(&noise);
    bank.render_poly(&mut RenderData::whole(&mut warmup).with_voice(1));

    // Voice 1 now rings; voice 0 was never rendered
    bank.reset_voice(0);

    let mut a = ChannelBuffer::new(2, 16);
    bank.render_poly(&mut RenderData::whole(&mut a).with_voice(1));
    assert!(a.channel(0).iter().any(|&x| x != 0.0));

    bank.reset_voice(1);
    let mut b = ChannelBuffer::new(2, 16);
    bank.render_poly(&mut RenderData::whole(&mut b).with_voice(1));
    assert!(b.channel(0).iter().all(|&x| x == 0.0));
}

#[test]
fn test_mode_sweep_renders_every_mode() {
    init_logging();

    let mut bank = FilterBank::new(1);
    bank.set_sample_rate(48000.0);
    bank.set_frequency(2000.0);
    bank.set_q(2.0);

    let noise = generate_noise(BLOCK_SIZE, 11);

    for mode in FilterMode::ALL {
        bank.set_mode(mode);
        assert_eq!(bank.mode(), mode);

        let mut buffer = ChannelBuffer::dual_mono(&noise);
        for _ in 0..8 {
            bank.render_mono(&mut RenderData::whole(&mut buffer));
        }

        assert!(is_valid_signal(&buffer), "{:?} produced invalid samples", mode);
        assert!(bank.current_coefficients().is_finite());
        bank.reset();
    }
}

#[test]
fn test_modulation_moves_cutoff() {
    init_logging();

    let mut plain = MultiChannelFilter::<StaticBiquad>::new(SAMPLE_RATE);
    let mut modulated = MultiChannelFilter::<StaticBiquad>::new(SAMPLE_RATE);
    for filter in [&mut plain, &mut modulated] {
        filter.set_smoothing_time(0.0);
        filter.set_type(0);
        filter.set_frequency(8000.0);
    }

    let input = generate_sine(4096, 5000.0);
    let mut a = ChannelBuffer::dual_mono(&input);
    let mut b = ChannelBuffer::dual_mono(&input);

    plain.render(&mut RenderData::whole(&mut a));
    modulated.render(&mut RenderData::whole(&mut b).with_modulation(0.1, 1.0, 1.0));

    assert!(rms(b.channel(0)) < rms(a.channel(0)) * 0.5);
    assert!(modulated.current_coefficients() != plain.current_coefficients());
}
