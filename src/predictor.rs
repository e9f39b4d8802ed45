//! Bit-exact integer LPC and LTP predict/synthesize filters.
//!
//! Both the forward (encode) and inverse (decode) forms use the same
//! `bias + sum(coef[i] * history[i]) >> rshift` arithmetic so that encode
//! then decode is the identity over `i32` for any coefficient set produced
//! by the quantizer.

/// Runs LPC forward prediction over `data` in place, replacing each sample
/// with its prediction residual. `coef` is stored so that `coef[i]`
/// multiplies `data[t - order + i]` for `t >= order`; for `t < order` the
/// partial history `0..t` is used instead.
pub fn lpc_predict(data: &mut [i32], coef: &[i32], rshift: u32) {
    let order = coef.len();
    if order == 0 {
        return;
    }
    let bias: i64 = if rshift == 0 { 0 } else { 1i64 << (rshift - 1) };
    for t in (0..data.len()).rev() {
        let used = order.min(t);
        let mut predict = bias;
        for i in 0..used {
            let c = coef[order - used + i] as i64;
            predict += c * data[t - used + i] as i64;
        }
        let shifted = predict >> rshift;
        data[t] = (data[t] as i64 + shifted) as i32;
    }
}

/// Inverse of [`lpc_predict`].
pub fn lpc_synthesize(data: &mut [i32], coef: &[i32], rshift: u32) {
    let order = coef.len();
    if order == 0 {
        return;
    }
    let bias: i64 = if rshift == 0 { 0 } else { 1i64 << (rshift - 1) };
    for t in 0..data.len() {
        let used = order.min(t);
        let mut predict = bias;
        for i in 0..used {
            let c = coef[order - used + i] as i64;
            predict += c * data[t - used + i] as i64;
        }
        let shifted = predict >> rshift;
        data[t] = (data[t] as i64 - shifted) as i32;
    }
}

/// Runs LTP forward prediction (3-tap, centered on `period`) over `data` in
/// place. No-op when `period == 0`.
pub fn ltp_predict(data: &mut [i32], coef: &[i32], period: u32, rshift: u32) {
    if period == 0 || coef.is_empty() {
        return;
    }
    let period = period as usize;
    let half = coef.len() / 2;
    let bias: i64 = if rshift == 0 { 0 } else { 1i64 << (rshift - 1) };
    for t in (0..data.len()).rev() {
        if t < period + 1 {
            continue;
        }
        let mut predict = bias;
        for (i, &c) in coef.iter().enumerate() {
            let idx = t - period - 1 + i;
            predict += c as i64 * data[idx] as i64;
        }
        let _ = half;
        let shifted = predict >> rshift;
        data[t] = (data[t] as i64 + shifted) as i32;
    }
}

/// Inverse of [`ltp_predict`].
pub fn ltp_synthesize(data: &mut [i32], coef: &[i32], period: u32, rshift: u32) {
    if period == 0 || coef.is_empty() {
        return;
    }
    let period = period as usize;
    let bias: i64 = if rshift == 0 { 0 } else { 1i64 << (rshift - 1) };
    for t in 0..data.len() {
        if t < period + 1 {
            continue;
        }
        let mut predict = bias;
        for (i, &c) in coef.iter().enumerate() {
            let idx = t - period - 1 + i;
            predict += c as i64 * data[idx] as i64;
        }
        let shifted = predict >> rshift;
        data[t] = (data[t] as i64 - shifted) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lpc_round_trips() {
        let original: Vec<i32> = (0..300).map(|i| (((i * 91) % 5000) - 2500) as i32).collect();
        let coef = vec![40i32, -12, 5, -2];
        let rshift = 6u32;
        let mut data = original.clone();
        lpc_predict(&mut data, &coef, rshift);
        lpc_synthesize(&mut data, &coef, rshift);
        assert_eq!(data, original);
    }

    #[test]
    fn lpc_round_trips_with_order_larger_than_signal() {
        let original = vec![10i32, -5, 3];
        let coef = vec![1i32, 2, 3, 4, 5];
        let mut data = original.clone();
        lpc_predict(&mut data, &coef, 4);
        lpc_synthesize(&mut data, &coef, 4);
        assert_eq!(data, original);
    }

    #[test]
    fn ltp_round_trips() {
        let original: Vec<i32> = (0..500).map(|i| (((i * 13) % 3000) - 1500) as i32).collect();
        let coef = vec![10i32, 100, 10];
        let period = 64u32;
        let mut data = original.clone();
        ltp_predict(&mut data, &coef, period, 7);
        ltp_synthesize(&mut data, &coef, period, 7);
        assert_eq!(data, original);
    }

    #[test]
    fn ltp_disabled_is_identity() {
        let original = vec![1, 2, 3, 4, 5];
        let mut data = original.clone();
        ltp_predict(&mut data, &[1, 2, 3], 0, 4);
        assert_eq!(data, original);
    }
}
