//! Partitioned Rice / recursive-Rice residual coder.

use crate::bitstream::{BitReader, BitWriter};
use crate::constants::{RECURSIVE_RICE_MLNOPTX, RICE_OPTX};
use crate::utility::{sint32_to_uint32, uint32_to_sint32};
use crate::Result;

const MAX_PARTITION_ORDER: u32 = 10;

#[derive(Clone, Copy, PartialEq, Eq)]
enum CodeType {
    Rice,
    RecursiveRice,
}

fn rice_parameter(mean: f64) -> u32 {
    if mean <= 0.0 {
        return 0;
    }
    let rho = 1.0 / (1.0 + mean);
    let k = (RICE_OPTX.ln() / (1.0 - rho).ln()).log2();
    if k.is_finite() { k.round().max(0.0) as u32 } else { 0 }
}

pub(crate) fn recursive_rice_parameters(mean: f64) -> (u32, u32) {
    let inner = (RECURSIVE_RICE_MLNOPTX * (1.0 + mean)).max(1.0);
    let k2 = inner.log2().floor().max(0.0) as u32;
    (k2 + 1, k2)
}

fn rice_bits(u: u32, k: u32) -> u32 {
    (u >> k) + 1 + k
}

fn recursive_rice_bits(u: u32, k1: u32, k2: u32) -> u32 {
    let threshold = 1u32 << k1;
    if u < threshold {
        1 + k1
    } else {
        let rem = u - threshold;
        1 + (rem >> k2) + 1 + k2
    }
}

fn partition_means(values: &[u32], order: u32) -> Vec<f64> {
    let parts = 1usize << order;
    let per = values.len() / parts;
    (0..parts)
        .map(|p| {
            let slice = &values[p * per..(p + 1) * per];
            slice.iter().map(|&v| v as u64).sum::<u64>() as f64 / per.max(1) as f64
        })
        .collect()
}

fn max_partition_order(n: usize) -> u32 {
    let mut order = 0u32;
    while order < MAX_PARTITION_ORDER && n % (1usize << (order + 1)) == 0 && (n >> (order + 1)) >= 1 {
        order += 1;
    }
    order
}

fn put_elias_gamma(writer: &mut BitWriter, u: u32) {
    if u == 0 {
        writer.put_bits(1, 1);
        return;
    }
    let v = u + 1;
    let bits = 32 - v.leading_zeros();
    // `put_zero_run`'s terminating 1 bit doubles as `v`'s leading bit, so
    // only the low `bits - 1` bits of `v` follow it.
    writer.put_zero_run(bits - 1);
    writer.put_bits(v & ((1u32 << (bits - 1)) - 1), bits - 1);
}

fn get_elias_gamma(reader: &mut BitReader) -> Result<u32> {
    let zeros = reader.get_zero_run()?;
    if zeros == 0 {
        // put_zero_run(0) writes a single 1 bit that get_zero_run already consumed.
        return Ok(0);
    }
    let v = reader.get_bits(zeros)?;
    Ok((1u32 << zeros | v) - 1)
}

/// Estimates the number of bits `encode` would emit for `residual`, without
/// performing any bitstream side effects.
pub fn estimate_bits(residual: &[i32]) -> u32 {
    if residual.is_empty() {
        return 16;
    }
    let u: Vec<u32> = residual.iter().map(|&s| sint32_to_uint32(s)).collect();
    let whole_mean = u.iter().map(|&v| v as u64).sum::<u64>() as f64 / u.len() as f64;
    let code_type = if whole_mean < 2.0 { CodeType::Rice } else { CodeType::RecursiveRice };

    let max_order = max_partition_order(u.len());
    let mut best = u32::MAX;
    for order in 0..=max_order {
        let means = partition_means(&u, order);
        let mut bits = 1 + 10; // code type + partition order field
        let per = u.len() >> order;
        let mut prev_param = 0i64;
        for (p, &mean) in means.iter().enumerate() {
            let (param_bits, param_val) = match code_type {
                CodeType::Rice => (5u32, rice_parameter(mean) as i64),
                CodeType::RecursiveRice => {
                    let (k1, _) = recursive_rice_parameters(mean);
                    (5, k1 as i64)
                }
            };
            if p == 0 {
                bits += param_bits;
            } else {
                let delta = sint32_to_uint32((param_val - prev_param) as i32);
                bits += 2 * (32 - (delta + 1).leading_zeros()) - 1;
            }
            prev_param = param_val;
            let slice = &u[p * per..(p + 1) * per];
            match code_type {
                CodeType::Rice => {
                    let k = param_val as u32;
                    bits += slice.iter().map(|&v| rice_bits(v, k)).sum::<u32>();
                }
                CodeType::RecursiveRice => {
                    let k1 = param_val as u32;
                    let k2 = k1 - 1;
                    bits += slice.iter().map(|&v| recursive_rice_bits(v, k1, k2)).sum::<u32>();
                }
            }
            if bits >= best {
                break;
            }
        }
        best = best.min(bits);
    }
    best
}

/// Encodes `residual` into `writer` using the partition order and parameters
/// that minimize the estimated bit length.
pub fn encode(writer: &mut BitWriter, residual: &[i32]) {
    let u: Vec<u32> = residual.iter().map(|&s| sint32_to_uint32(s)).collect();
    let whole_mean = if u.is_empty() { 0.0 } else { u.iter().map(|&v| v as u64).sum::<u64>() as f64 / u.len() as f64 };
    let code_type = if whole_mean < 2.0 { CodeType::Rice } else { CodeType::RecursiveRice };

    let max_order = max_partition_order(u.len());
    let mut best_order = 0u32;
    let mut best_bits = u32::MAX;
    for order in 0..=max_order {
        let bits = estimate_partition_bits(&u, code_type, order);
        if bits < best_bits {
            best_bits = bits;
            best_order = order;
        }
    }

    writer.put_bits(matches!(code_type, CodeType::RecursiveRice) as u32, 1);
    writer.put_bits(best_order, 10);

    let parts = 1usize << best_order;
    let per = u.len() / parts.max(1);
    let means = partition_means(&u, best_order);
    let mut prev_param: Option<u32> = None;
    for (p, &mean) in means.iter().enumerate() {
        let slice = if per == 0 { &u[..0] } else { &u[p * per..(p + 1) * per] };
        match code_type {
            CodeType::Rice => {
                let k = rice_parameter(mean);
                write_param(writer, k, &mut prev_param);
                for &v in slice {
                    writer.put_zero_run(v >> k);
                    writer.put_bits(v & ((1u32 << k).wrapping_sub(1)), k);
                }
            }
            CodeType::RecursiveRice => {
                let (k1, k2) = recursive_rice_parameters(mean);
                write_param(writer, k1, &mut prev_param);
                let threshold = 1u32 << k1;
                for &v in slice {
                    if v < threshold {
                        writer.put_bits(1, 1);
                        writer.put_bits(v, k1);
                    } else {
                        let rem = v - threshold;
                        writer.put_zero_run(1 + (rem >> k2));
                        writer.put_bits(rem & ((1u32 << k2).wrapping_sub(1)), k2);
                    }
                }
            }
        }
    }
}

fn write_param(writer: &mut BitWriter, param: u32, prev: &mut Option<u32>) {
    match *prev {
        None => writer.put_bits(param, 5),
        Some(p) => {
            let delta = sint32_to_uint32(param as i32 - p as i32);
            put_elias_gamma(writer, delta);
        }
    }
    *prev = Some(param);
}

fn estimate_partition_bits(u: &[u32], code_type: CodeType, order: u32) -> u32 {
    let parts = 1usize << order;
    let per = u.len() / parts.max(1);
    let means = partition_means(u, order);
    let mut bits = 1 + 10;
    let mut prev_param: Option<u32> = None;
    for (p, &mean) in means.iter().enumerate() {
        let slice = if per == 0 { &u[..0] } else { &u[p * per..(p + 1) * per] };
        let param = match code_type {
            CodeType::Rice => rice_parameter(mean),
            CodeType::RecursiveRice => recursive_rice_parameters(mean).0,
        };
        bits += match prev_param {
            None => 5,
            Some(prev) => {
                let delta = sint32_to_uint32(param as i32 - prev as i32);
                2 * (32 - (delta + 1).leading_zeros()) - 1
            }
        };
        prev_param = Some(param);
        bits += match code_type {
            CodeType::Rice => slice.iter().map(|&v| rice_bits(v, param)).sum::<u32>(),
            CodeType::RecursiveRice => slice.iter().map(|&v| recursive_rice_bits(v, param, param - 1)).sum::<u32>(),
        };
    }
    bits
}

/// Decodes `n` residual samples from `reader`.
pub fn decode(reader: &mut BitReader, n: usize) -> Result<Vec<i32>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let is_recursive = reader.get_bits(1)? != 0;
    let order = reader.get_bits(10)?;
    let parts = 1usize << order;
    let per = n / parts;

    let mut out = Vec::with_capacity(n);
    let mut prev_param: Option<u32> = None;
    for p in 0..parts {
        let count = if p + 1 == parts { n - per * p } else { per };
        let param = match prev_param {
            None => reader.get_bits(5)?,
            Some(prev) => {
                let delta = get_elias_gamma(reader)?;
                (prev as i32 + uint32_to_sint32(delta)) as u32
            }
        };
        prev_param = Some(param);
        if is_recursive {
            let k1 = param;
            let k2 = k1.saturating_sub(1);
            let threshold = 1u32 << k1;
            for _ in 0..count {
                let lead = reader.get_zero_run()?;
                let v = if lead == 0 {
                    reader.get_bits(k1)?
                } else {
                    let low = reader.get_bits(k2)?;
                    threshold + (((lead - 1) << k2) | low)
                };
                out.push(uint32_to_sint32(v));
            }
        } else {
            let k = param;
            for _ in 0..count {
                let q = reader.get_zero_run()?;
                let low = reader.get_bits(k)?;
                out.push(uint32_to_sint32((q << k) | low));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_round_trips_quiet_and_loud_signals() {
        let signals: Vec<Vec<i32>> = vec![
            vec![0; 64],
            (0..64).map(|i| if i % 2 == 0 { 3 } else { -3 }).collect(),
            (0..256).map(|i| ((i * 37) % 4000) as i32 - 2000).collect(),
            vec![12345],
        ];
        for s in signals {
            let mut w = BitWriter::new();
            encode(&mut w, &s);
            let bytes = w.into_bytes();
            let mut r = BitReader::new(&bytes);
            let decoded = decode(&mut r, s.len()).unwrap();
            assert_eq!(decoded, s);
        }
    }

    #[test]
    fn recursive_rice_k1_is_k2_plus_one() {
        let (k1, k2) = recursive_rice_parameters(50.0);
        assert_eq!(k1, k2 + 1);
    }

    #[test]
    fn estimate_bits_is_an_upper_bound_proxy_not_exact() {
        let s: Vec<i32> = (0..128).map(|i| (i % 17) - 8).collect();
        let estimate = estimate_bits(&s);
        let mut w = BitWriter::new();
        encode(&mut w, &s);
        let actual = w.byte_len() as u32 * 8;
        assert!(actual <= estimate + 64);
    }
}
