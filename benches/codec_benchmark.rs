use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use srla::{Decoder, DecoderConfig, EncodeParameter, Encoder, EncoderConfig};

fn test_signal(len: usize, seed: u64) -> Vec<i32> {
    let mut s = seed;
    (0..len)
        .map(|_| {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
            (((s >> 40) % 8000) as i32) - 4000
        })
        .collect()
}

fn encode(channels: &[Vec<i32>]) -> Vec<u8> {
    let mut encoder = Encoder::new(EncoderConfig {
        max_num_channels: channels.len() as u16,
        min_num_samples_per_block: 4096,
        max_num_samples_per_block: 4096,
        max_num_lookahead_samples: 4096,
    });
    encoder
        .set_encode_parameter(EncodeParameter {
            num_channels: channels.len() as u16,
            bits_per_sample: 16,
            sampling_rate: 44100,
            min_num_samples_per_block: 4096,
            max_num_samples_per_block: 4096,
            num_lookahead_samples: 4096,
            preset: 3,
        })
        .unwrap();
    encoder.encode_whole(channels, None).unwrap()
}

fn decode(stream: &[u8], num_channels: u16) -> Vec<Vec<i32>> {
    let mut decoder = Decoder::new(DecoderConfig { max_num_channels: num_channels, verify_checksum: true });
    decoder.decode_whole(stream).unwrap()
}

fn bench_encode(c: &mut Criterion) {
    let channels = vec![test_signal(44100, 1), test_signal(44100, 2)];
    c.bench_function("encode_one_second_stereo", |b| b.iter(|| black_box(encode(&channels))));
}

fn bench_decode(c: &mut Criterion) {
    let channels = vec![test_signal(44100, 1), test_signal(44100, 2)];
    let stream = encode(&channels);
    c.bench_function("decode_one_second_stereo", |b| b.iter(|| black_box(decode(&stream, 2))));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20).measurement_time(Duration::new(20, 0));
    targets = bench_encode, bench_decode
}
criterion_main!(benches);
