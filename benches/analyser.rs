use barbershop_stage::audio::SpectrumAnalyser;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_byte_frequency_data(c: &mut Criterion) {
    let mut analyser = SpectrumAnalyser::new(2048).expect("valid FFT size");
    let tone: Vec<f32> = (0..2048)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
        .collect();
    analyser.push_samples(&tone);
    let mut bytes = vec![0u8; analyser.frequency_bin_count()];

    c.bench_function("byte_frequency_data 2048", |b| {
        b.iter(|| {
            analyser.push_samples(black_box(&tone[..256]));
            analyser.byte_frequency_data(black_box(&mut bytes));
        })
    });
}

criterion_group!(benches, bench_byte_frequency_data);
criterion_main!(benches);
