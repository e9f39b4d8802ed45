//! SRLA: a lossless audio codec core.
//!
//! This crate implements the block-level compression pipeline — channel
//! decorrelation, preemphasis, long-term and linear prediction, and a
//! partitioned recursive-Rice residual coder — and its exact inverse.
//! Container parsing, a command-line driver, and audio playback are out of
//! scope: callers hand this crate integer PCM sample planes and get a
//! self-contained byte stream back, and vice versa.

pub mod bitstream;
pub mod block;
pub mod coder;
pub mod constants;
pub mod errors;
pub mod fft;
pub mod frame;
pub mod huffman;
pub mod io;
pub mod lpc;
pub mod ltp;
pub mod partition;
pub mod predictor;
pub mod preemphasis;
pub mod presets;
pub mod utility;

pub use errors::Error;
pub use frame::{Decoder, DecoderConfig, EncodeParameter, Encoder, EncoderConfig, FileHeader};

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signal(len: usize, seed: u64, amplitude: i32) -> Vec<i32> {
        let mut s = seed;
        (0..len)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                (((s >> 40) % (2 * amplitude as u64 + 1)) as i32) - amplitude
            })
            .collect()
    }

    fn round_trip(channels: &[Vec<i32>], bits_per_sample: u16, preset: u8, block: u32) {
        let mut encoder = Encoder::new(EncoderConfig {
            max_num_channels: channels.len() as u16,
            min_num_samples_per_block: block,
            max_num_samples_per_block: block,
            max_num_lookahead_samples: block,
        });
        encoder
            .set_encode_parameter(EncodeParameter {
                num_channels: channels.len() as u16,
                bits_per_sample,
                sampling_rate: 44100,
                min_num_samples_per_block: block,
                max_num_samples_per_block: block,
                num_lookahead_samples: block,
                preset,
            })
            .unwrap();
        let stream = encoder.encode_whole(channels, None).unwrap();

        let mut decoder = Decoder::new(DecoderConfig { max_num_channels: channels.len() as u16, verify_checksum: true });
        let decoded = decoder.decode_whole(&stream).unwrap();
        assert_eq!(&decoded, channels);
    }

    #[test]
    fn silence_round_trips() {
        let channels = vec![vec![0i32; 8192], vec![0i32; 8192]];
        round_trip(&channels, 16, 0, 1024);
    }

    #[test]
    fn full_scale_dc_round_trips() {
        let channels = vec![vec![32767i32; 1024]];
        round_trip(&channels, 16, 3, 1024);
    }

    #[test]
    fn sine_stereo_round_trips() {
        let n = 8500;
        let left: Vec<i32> = (0..n).map(|i| (8000.0 * (2.0 * std::f64::consts::PI * 440.0 * i as f64 / 44100.0).sin()) as i32).collect();
        let right: Vec<i32> = left.iter().map(|&v| -v).collect();
        round_trip(&[left, right], 16, 6, 1024);
    }

    #[test]
    fn white_noise_eight_channels_round_trips() {
        let channels: Vec<Vec<i32>> = (0..8).map(|i| test_signal(8500, i as u64 + 10, 1 << 22)).collect();
        round_trip(&channels, 24, 3, 1024);
    }

    #[test]
    fn nyquist_oscillation_round_trips() {
        let channels = vec![(0..8500).map(|i| if i % 2 == 0 { 1 } else { -1 }).collect()];
        round_trip(&channels, 16, 2, 1024);
    }

    #[test]
    fn tiny_impulse_round_trips_and_is_not_classified_silent() {
        let mut data = vec![0i32; 8500];
        data[1] = 1;
        round_trip(&[data], 16, 1, 1024);
    }
}
