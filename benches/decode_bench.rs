//! Yin 解码引擎性能基准测试.
//!
//! 覆盖整流解码、采样级 seek、N:M 重采样与 PCM 编码等热路径.

#[path = "../tests/common/mod.rs"]
mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use yin::resample::{NtomResampler, encode_samples};
use yin::{Decoder, DecoderParams, Encoding, Whence};

use common::{L2_STEREO_44K, SPF, layer2_stream, read_all};

fn bench_layer2_decode(c: &mut Criterion) {
    let data = layer2_stream(L2_STEREO_44K, 100);
    c.bench_function("layer2_decode_100_frames_s16", |b| {
        b.iter(|| {
            let mut dec = Decoder::new();
            dec.open_memory(black_box(data.clone())).unwrap();
            black_box(read_all(&mut dec));
        });
    });
}

fn bench_layer2_decode_resampled(c: &mut Criterion) {
    let data = layer2_stream(L2_STEREO_44K, 100);
    let params = DecoderParams {
        force_rate: 48000,
        encoding: Encoding::F32,
        ..DecoderParams::default()
    };
    c.bench_function("layer2_decode_100_frames_to_48000_f32", |b| {
        b.iter(|| {
            let mut dec = Decoder::with_params(params.clone()).unwrap();
            dec.open_memory(black_box(data.clone())).unwrap();
            black_box(read_all(&mut dec));
        });
    });
}

fn bench_sample_seek(c: &mut Criterion) {
    let mut dec = Decoder::new();
    dec.open_memory(layer2_stream(L2_STEREO_44K, 200)).unwrap();
    dec.scan().unwrap();
    let mut target = 0i64;
    c.bench_function("seek_random_sample_200_frames", |b| {
        b.iter(|| {
            target = (target + 37_123) % (200 * SPF);
            black_box(dec.seek(black_box(target), Whence::Set).unwrap());
        });
    });
}

fn bench_ntom_resample(c: &mut Criterion) {
    let input: Vec<f32> = (0..SPF as usize * 2)
        .map(|i| ((i % 256) as f32 - 128.0) / 256.0)
        .collect();
    c.bench_function("ntom_1152_stereo_44100_to_48000", |b| {
        let mut nt = NtomResampler::configure(44100, 48000, SPF as usize, 0).unwrap();
        let mut output = Vec::with_capacity(input.len() * 2);
        b.iter(|| {
            output.clear();
            nt.resample(black_box(&input), 2, &mut output);
            nt.commit();
            black_box(&output);
        });
    });
}

fn bench_encode_samples(c: &mut Criterion) {
    let input: Vec<f32> = (0..4096).map(|i| ((i % 512) as f32 - 256.0) / 256.0).collect();
    for encoding in [Encoding::S16, Encoding::S32, Encoding::U8] {
        let mut output = vec![0u8; input.len() * encoding.bytes_per_sample()];
        c.bench_function(&format!("encode_4096_{encoding:?}"), |b| {
            b.iter(|| {
                black_box(encode_samples(black_box(&input), encoding, 1.0, &mut output).unwrap());
            });
        });
    }
}

criterion_group!(
    benches,
    bench_layer2_decode,
    bench_layer2_decode_resampled,
    bench_sample_seek,
    bench_ntom_resample,
    bench_encode_samples,
);
criterion_main!(benches);
