//! Power-of-two complex FFT and the real-signal autocorrelation built on top
//! of it. The autocorrelation contract (zero-pad, forward transform, square
//! the per-bin magnitude, inverse transform, scale by `2/n`) is what the LPC
//! and LTP analyzers depend on; the transform itself is an iterative
//! radix-2 Cooley-Tukey engine operating on interleaved real/imaginary pairs.

use std::f64::consts::PI;

/// Direction of a complex transform.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward transform.
    Forward,
    /// Inverse transform (unnormalized).
    Inverse,
}

/// In-place complex FFT over `data` (length `2*n`, interleaved re/im),
/// `n` must be a power of two. Unnormalized in both directions.
pub fn complex_fft(data: &mut [f64], n: usize, dir: Direction) {
    debug_assert_eq!(data.len(), 2 * n);
    debug_assert!(n.is_power_of_two());
    if n <= 1 {
        return;
    }

    // Bit-reversal permutation.
    let mut j = 0usize;
    for i in 0..n {
        if i < j {
            data.swap(2 * i, 2 * j);
            data.swap(2 * i + 1, 2 * j + 1);
        }
        let mut m = n >> 1;
        while m >= 1 && j & m != 0 {
            j &= !m;
            m >>= 1;
        }
        j |= m;
    }

    let sign = if dir == Direction::Forward { -1.0 } else { 1.0 };
    let mut len = 2usize;
    while len <= n {
        let half = len / 2;
        let angle_step = sign * 2.0 * PI / len as f64;
        let mut start = 0usize;
        while start < n {
            for k in 0..half {
                let angle = angle_step * k as f64;
                let (wr, wi) = (angle.cos(), angle.sin());
                let even_idx = 2 * (start + k);
                let odd_idx = 2 * (start + k + half);
                let (or, oi) = (data[odd_idx], data[odd_idx + 1]);
                let tr = or * wr - oi * wi;
                let ti = or * wi + oi * wr;
                let (er, ei) = (data[even_idx], data[even_idx + 1]);
                data[even_idx] = er + tr;
                data[even_idx + 1] = ei + ti;
                data[odd_idx] = er - tr;
                data[odd_idx + 1] = ei - ti;
            }
            start += len;
        }
        len <<= 1;
    }
}

/// Computes autocorrelation lags `[0, order)` of `signal` via the power
/// spectrum: zero-pad to the next power of two, transform, square each bin's
/// magnitude, inverse transform, scale by `2/n`.
pub fn autocorrelation_fft(signal: &[f64], order: usize) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return vec![0.0; order];
    }
    let fft_size = crate::utility::round_up_to_power_of_two(n as u32) as usize * 2;
    let mut buf = vec![0.0f64; 2 * fft_size];
    for (i, &s) in signal.iter().enumerate() {
        buf[2 * i] = s;
    }
    complex_fft(&mut buf, fft_size, Direction::Forward);
    for k in 0..fft_size {
        let re = buf[2 * k];
        let im = buf[2 * k + 1];
        buf[2 * k] = re * re + im * im;
        buf[2 * k + 1] = 0.0;
    }
    complex_fft(&mut buf, fft_size, Direction::Inverse);
    let scale = 2.0 / n as f64;
    let max_lag = order.min(fft_size);
    let mut result = vec![0.0; order];
    for lag in 0..max_lag {
        result[lag] = buf[2 * lag] * scale / fft_size as f64;
    }
    result
}

/// Direct O(N * order) autocorrelation, used for small `N` where the fixed
/// overhead of the FFT path dominates.
pub fn autocorrelation_direct(signal: &[f64], order: usize) -> Vec<f64> {
    let n = signal.len();
    let mut result = vec![0.0; order];
    for (lag, slot) in result.iter_mut().enumerate() {
        let mut sum = 0.0;
        for t in lag..n {
            sum += signal[t] * signal[t - lag];
        }
        *slot = sum;
    }
    result
}

/// Computes autocorrelation lags `[0, order)`, choosing the direct form for
/// short signals and the FFT form otherwise.
pub fn autocorrelation(signal: &[f64], order: usize) -> Vec<f64> {
    if signal.len() < 256 || order >= signal.len() {
        autocorrelation_direct(signal, order)
    } else {
        autocorrelation_fft(signal, order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_then_ifft_is_identity_up_to_scale() {
        let n = 16;
        let mut data = vec![0.0f64; 2 * n];
        for i in 0..n {
            data[2 * i] = (i as f64 * 0.3).sin();
        }
        let original = data.clone();
        complex_fft(&mut data, n, Direction::Forward);
        complex_fft(&mut data, n, Direction::Inverse);
        for i in 0..2 * n {
            assert!((data[i] / n as f64 - original[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn autocorrelation_direct_and_fft_agree() {
        let signal: Vec<f64> = (0..300).map(|i| (i as f64 * 0.1).sin()).collect();
        let direct = autocorrelation_direct(&signal, 8);
        let fft = autocorrelation_fft(&signal, 8);
        for (d, f) in direct.iter().zip(fft.iter()) {
            assert!((d - f).abs() < 1e-6 * d.abs().max(1.0));
        }
    }

    #[test]
    fn autocorrelation_lag_zero_is_energy() {
        let signal = vec![1.0, 2.0, 3.0, 4.0];
        let r = autocorrelation_direct(&signal, 1);
        assert!((r[0] - 30.0).abs() < 1e-9);
    }
}
