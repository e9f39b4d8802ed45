//! Long-term (pitch) prediction: period detection from autocorrelation peaks
//! and a Toeplitz coefficient solve centered on the detected period.

use crate::constants::{
    LPC_RIDGE_REGULARIZATION_PARAMETER, LTP_MAX_NUM_PITCH_CANDIDATES, LTP_MAX_PERIOD, LTP_MIN_PERIOD,
    LTP_PITCH_RATIO_VS_MAX_THRESHOLD,
};
use crate::fft::autocorrelation;
use crate::lpc::{apply_window, WindowType};

/// Detects the pitch period in `auto_corr` (indexed `0..=max_period`),
/// returning the selected lag, or `0` if no periodicity was found.
pub fn detect_pitch(auto_corr: &[f64], max_period: usize) -> u32 {
    let mut candidates: Vec<(usize, f64)> = Vec::new();
    let mut j = 1usize;
    while j + 1 < auto_corr.len().min(max_period + 1) && candidates.len() < LTP_MAX_NUM_PITCH_CANDIDATES {
        if auto_corr[j] > auto_corr[j - 1] && auto_corr[j] > auto_corr[j + 1] {
            candidates.push((j, auto_corr[j]));
        }
        j += 1;
    }
    if candidates.is_empty() {
        return 0;
    }
    let max_peak = candidates.iter().fold(f64::MIN, |m, &(_, v)| m.max(v));
    for &(lag, val) in &candidates {
        if val >= LTP_PITCH_RATIO_VS_MAX_THRESHOLD * max_peak {
            return lag as u32;
        }
    }
    0
}

/// Result of an LTP coefficient solve: the pitch period (0 means disabled)
/// and `order` floating-point tap coefficients.
pub struct LtpResult {
    /// Detected pitch period in samples, or 0 if LTP is disabled for this block.
    pub period: u32,
    /// Tap coefficients, valid only when `period != 0`.
    pub coefs: Vec<f64>,
}

/// Computes LTP coefficients for `signal` (already converted to `[-1, 1)`
/// doubles) with an odd tap `order`.
pub fn calculate_ltp_coefficients(signal: &[f64], order: usize) -> LtpResult {
    debug_assert!(order % 2 == 1);
    let half = order / 2;
    let max_period = (LTP_MAX_PERIOD as usize).min(signal.len().saturating_sub(1));
    if max_period < LTP_MIN_PERIOD as usize {
        return LtpResult { period: 0, coefs: vec![0.0; order] };
    }

    let mut windowed = signal.to_vec();
    apply_window(&mut windowed, WindowType::Welch);
    let acorr = autocorrelation(&windowed, max_period + half + 1);

    if acorr[0].abs() <= f64::MIN_POSITIVE {
        return LtpResult { period: 0, coefs: vec![0.0; order] };
    }

    let period = detect_pitch(&acorr, max_period);
    if period == 0 || (period as usize) < half + 1 {
        return LtpResult { period: 0, coefs: vec![0.0; order] };
    }
    let period = period as usize;

    let mut r = acorr.clone();
    r[0] *= 1.0 + LPC_RIDGE_REGULARIZATION_PARAMETER;

    let get_r = |lag: i64| -> f64 {
        let lag = lag.unsigned_abs() as usize;
        *r.get(lag).unwrap_or(&0.0)
    };

    let mut mat = vec![vec![0.0; order]; order];
    for (j, row) in mat.iter_mut().enumerate() {
        for (k, cell) in row.iter_mut().enumerate() {
            *cell = get_r(j as i64 - k as i64);
        }
    }
    let rhs: Vec<f64> = (0..order).map(|i| get_r(period as i64 - half as i64 + i as i64)).collect();

    let coefs = match cholesky_solve(&mat, &rhs) {
        Some(c) => c,
        None => return LtpResult { period: 0, coefs: vec![0.0; order] },
    };

    let l1: f64 = coefs.iter().map(|c| c.abs()).sum();
    if l1 >= 1.0 {
        let mut fallback = vec![0.0; order];
        fallback[half] = acorr[period] / acorr[0];
        return LtpResult { period: period as u32, coefs: fallback };
    }

    LtpResult { period: period as u32, coefs }
}

/// Solves the symmetric positive-definite system `mat * x = rhs` via Cholesky
/// decomposition, returning `None` if `mat` is numerically singular.
pub fn cholesky_solve(mat: &[Vec<f64>], rhs: &[f64]) -> Option<Vec<f64>> {
    let n = mat.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = mat[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = rhs[i];
        for k in 0..i {
            sum -= l[i][k] * y[k];
        }
        y[i] = sum / l[i][i];
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[k][i] * x[k];
        }
        x[i] = sum / l[i][i];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periodic_signal(period: usize, len: usize) -> Vec<f64> {
        (0..len).map(|i| (2.0 * std::f64::consts::PI * (i % period) as f64 / period as f64).sin()).collect()
    }

    #[test]
    fn detects_known_period() {
        let signal = periodic_signal(64, 2000);
        let acorr = autocorrelation(&signal, 200);
        let period = detect_pitch(&acorr, 199);
        assert_eq!(period, 64);
    }

    #[test]
    fn ltp_coefficients_are_stable() {
        let signal = periodic_signal(80, 2000);
        let result = calculate_ltp_coefficients(&signal, 3);
        let l1: f64 = result.coefs.iter().map(|c| c.abs()).sum();
        assert!(l1 < 1.0 + 1e-9);
    }

    #[test]
    fn short_signal_disables_ltp() {
        let signal = vec![0.1; 10];
        let result = calculate_ltp_coefficients(&signal, 3);
        assert_eq!(result.period, 0);
    }

    #[test]
    fn cholesky_solves_identity_system() {
        let mat = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let rhs = vec![3.0, 4.0];
        let x = cholesky_solve(&mat, &rhs).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-9);
        assert!((x[1] - 4.0).abs() < 1e-9);
    }
}
