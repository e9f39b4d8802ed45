//! Per-block encode/decode orchestration: channel decorrelation, preemphasis,
//! LTP, LPC, and residual coding, wrapped in a checksummed block header.

use crate::bitstream::{BitReader, BitWriter};
use crate::constants::{BLOCK_HEADER_SIZE, BLOCK_SYNC_CODE, LTP_ORDER};
use crate::errors::Error;
use crate::huffman::{raw_coefficient_tree, sum_coefficient_tree, HuffmanTree};
use crate::lpc::{af_refine, levinson_durbin, svr_refine, windowed_autocorrelation, WindowType};
use crate::ltp::calculate_ltp_coefficients;
use crate::predictor::{lpc_predict, lpc_synthesize, ltp_predict, ltp_synthesize};
use crate::preemphasis::{apply_two_stage, unapply_two_stage, PreemphasisFilter};
use crate::presets::ParameterPreset;
use crate::utility::{fletcher16, lr_to_ls, lr_to_ms, lr_to_sr, ls_to_lr, ms_to_lr, sr_to_lr};
use crate::Result;

/// How the first stereo pair of a block's channels was decorrelated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelProcessMethod {
    /// Left/right, unmodified.
    Lr,
    /// Mid/side.
    Ms,
    /// Left/side.
    Ls,
    /// Side/right.
    Sr,
}

impl ChannelProcessMethod {
    fn code(self) -> u32 {
        match self {
            ChannelProcessMethod::Lr => 0,
            ChannelProcessMethod::Ms => 1,
            ChannelProcessMethod::Ls => 2,
            ChannelProcessMethod::Sr => 3,
        }
    }

    fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => ChannelProcessMethod::Lr,
            1 => ChannelProcessMethod::Ms,
            2 => ChannelProcessMethod::Ls,
            3 => ChannelProcessMethod::Sr,
            _ => return Err(Error::InvalidFormat("unknown channel process method")),
        })
    }

    fn forward(self, l: i32, r: i32) -> (i32, i32) {
        match self {
            ChannelProcessMethod::Lr => (l, r),
            ChannelProcessMethod::Ms => lr_to_ms(l, r),
            ChannelProcessMethod::Ls => lr_to_ls(l, r),
            ChannelProcessMethod::Sr => lr_to_sr(l, r),
        }
    }

    fn inverse(self, a: i32, b: i32) -> (i32, i32) {
        match self {
            ChannelProcessMethod::Lr => (a, b),
            ChannelProcessMethod::Ms => ms_to_lr(a, b),
            ChannelProcessMethod::Ls => ls_to_lr(a, b),
            ChannelProcessMethod::Sr => sr_to_lr(a, b),
        }
    }
}

/// Block payload classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// LPC/LTP-compressed residual payload.
    Compressed = 0,
    /// All-zero payload, no body stored.
    Silent = 1,
    /// Uncompressed interleaved samples.
    Raw = 2,
}

/// Fixed 11-byte block header.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    /// Number of bytes from the checksum field through the end of the block.
    pub block_size: u32,
    /// Fletcher-16 checksum over the bytes following this field.
    pub checksum: u16,
    /// Payload classification.
    pub block_type: BlockType,
    /// Number of samples (per channel) carried by this block.
    pub num_samples: u16,
}

struct ChannelPlan {
    residual: Vec<i32>,
    preemphasis: [PreemphasisFilter; crate::constants::NUM_PREEMPHASIS_FILTERS],
    lpc_order: usize,
    lpc_coef: Vec<i32>,
    lpc_rshift: u32,
    use_sum_coef: bool,
    ltp_period: u32,
    ltp_coef: Vec<i32>,
    bits: u32,
}

fn plan_channel(samples: &[i32], bits_per_sample: u32, preset: &ParameterPreset) -> ChannelPlan {
    let mut working = samples.to_vec();
    let preemphasis = apply_two_stage(&mut working);

    let scale = (1i64 << (bits_per_sample - 1)) as f64;
    let to_double = |data: &[i32]| -> Vec<f64> { data.iter().map(|&s| s as f64 / scale).collect() };

    let ltp_result = calculate_ltp_coefficients(&to_double(&working), LTP_ORDER);
    let ltp_scale = (1i64 << crate::constants::LTP_COEFFICIENT_RSHIFT) as f64;
    let ltp_limit = (1i32 << 7) - 1;
    let ltp_coef: Vec<i32> =
        ltp_result.coefs.iter().map(|&c| (c * ltp_scale).round().clamp(-(ltp_limit as f64) - 1.0, ltp_limit as f64) as i32).collect();
    if ltp_result.period != 0 {
        ltp_predict(&mut working, &ltp_coef, ltp_result.period, crate::constants::LTP_COEFFICIENT_RSHIFT);
    }

    let max_order = (preset.max_num_parameters as usize).min(working.len().saturating_sub(1)).max(1);
    let doubled = to_double(&working);
    let acorr = windowed_autocorrelation(&doubled, max_order, WindowType::Welch);
    let ld = levinson_durbin(&acorr, max_order);

    let order = match preset.lpc_order_tactics {
        crate::presets::LpcOrderDecisionTactics::MaxFixed => max_order,
        _ => {
            let mut best_order = 1;
            let mut best_cost = f64::MAX;
            for o in 1..=max_order {
                if ld.coefs[o].is_empty() {
                    continue;
                }
                let cost = crate::lpc::estimate_code_length(&ld.parcor[1..=o], ld.error_vars[o]);
                if cost < best_cost {
                    best_cost = cost;
                    best_order = o;
                }
            }
            best_order
        }
    };

    let ld_coefs = if ld.coefs[order].is_empty() { vec![0.0; order] } else { ld.coefs[order].clone() };

    // The auxiliary-function (L1/IRLS) estimator always runs as a refinement
    // pass over the Levinson-Durbin starting point; the SVR soft-threshold
    // estimator only runs when the preset asks for it, so presets with
    // `svr_max_num_iterations == 0` genuinely skip it rather than computing
    // and discarding it.
    let af_coefs = af_refine(&doubled, &ld_coefs, AF_MAX_ITERATIONS);
    let mut candidates = vec![ld_coefs, af_coefs];
    if preset.svr_max_num_iterations > 0 {
        candidates.push(svr_refine(&doubled, &candidates[0], preset.margin_list, preset.svr_max_num_iterations, bits_per_sample));
    }

    let pre_lpc = working.clone();
    let mut best: Option<(Vec<i32>, u32, Vec<i32>, u32)> = None;
    for raw_coefs in &candidates {
        let (mut q, rshift) = crate::lpc::quantize_coefficients(raw_coefs, 8, 15);
        q.reverse();
        let mut trial = pre_lpc.clone();
        lpc_predict(&mut trial, &q, rshift);
        let trial_bits = crate::coder::estimate_bits(&trial);
        if best.as_ref().map_or(true, |(_, _, _, b)| trial_bits < *b) {
            best = Some((q, rshift, trial, trial_bits));
        }
    }
    let (lpc_coef, lpc_rshift, residual, residual_bits) = best.expect("candidates is never empty");
    working = residual;

    let ltp_bits = if ltp_result.period != 0 { 8 + 8 * LTP_ORDER as u32 } else { 8 };

    let raw_symbols = coefficient_symbols(&lpc_coef, false);
    let sum_symbols = coefficient_symbols(&lpc_coef, true);
    let raw_coef_bits = tree_bits(raw_coefficient_tree(), &raw_symbols);
    let sum_coef_bits = tree_bits(sum_coefficient_tree(), &sum_symbols);
    let use_sum_coef = sum_coef_bits < raw_coef_bits;
    let coef_bits = raw_coef_bits.min(sum_coef_bits);

    let header_bits = 8 + 4 + 1 + coef_bits;
    let bits = header_bits + ltp_bits + residual_bits;

    ChannelPlan {
        residual: working,
        preemphasis,
        lpc_order: order,
        lpc_coef,
        lpc_rshift,
        use_sum_coef,
        ltp_period: ltp_result.period,
        ltp_coef,
        bits,
    }
}

/// Total bits `tree` would spend coding `symbols`, without writing them.
fn tree_bits(tree: &HuffmanTree, symbols: &[u8]) -> u32 {
    symbols.iter().map(|&s| tree.code_len(s)).sum()
}

/// Maps quantized LPC coefficients to the symbols either coding table
/// expects: `raw` codes each coefficient's own zig-zag value, `sum` codes
/// the first coefficient raw and every following one as the zig-zag of its
/// wrapped-8-bit sum with its predecessor (inverted by
/// `coefficients_from_symbols`).
fn coefficient_symbols(coef: &[i32], sum: bool) -> Vec<u8> {
    if !sum || coef.is_empty() {
        return coef.iter().map(|&c| crate::utility::sint32_to_uint32(c) as u8).collect();
    }
    let mut out = Vec::with_capacity(coef.len());
    out.push(crate::utility::sint32_to_uint32(coef[0]) as u8);
    let mut prev = coef[0] as i8;
    for &c in &coef[1..] {
        let cur = c as i8;
        let delta = cur.wrapping_add(prev);
        out.push(crate::utility::sint32_to_uint32(delta as i32) as u8);
        prev = cur;
    }
    out
}

/// Inverse of `coefficient_symbols`.
fn coefficients_from_symbols(symbols: &[u8], sum: bool) -> Vec<i32> {
    if !sum || symbols.is_empty() {
        return symbols.iter().map(|&s| crate::utility::uint32_to_sint32(s as u32)).collect();
    }
    let first = crate::utility::uint32_to_sint32(symbols[0] as u32);
    let mut out = Vec::with_capacity(symbols.len());
    out.push(first);
    let mut prev = first as i8;
    for &s in &symbols[1..] {
        let delta = crate::utility::uint32_to_sint32(s as u32) as i8;
        let cur = delta.wrapping_sub(prev);
        out.push(cur as i32);
        prev = cur;
    }
    out
}

/// Fixed iteration cap for the always-on AF refinement pass (no preset field
/// controls it; unlike SVR it has no off switch).
const AF_MAX_ITERATIONS: u32 = 10;

/// Estimates the encoded size, in bits, of a candidate block spanning one
/// window of each channel in `channels`, by running the real preemphasis
/// -> LTP -> LPC -> residual pipeline per channel (channel decorrelation
/// search is skipped here to keep the variable block-size search affordable;
/// `encode_block` itself still searches it when the boundaries are final).
pub fn estimate_block_bits(channels: &[&[i32]], bits_per_sample: u32, preset: &ParameterPreset) -> u32 {
    let mut bits = 2 + BLOCK_HEADER_SIZE as u32 * 8;
    for ch in channels {
        bits += plan_channel(ch, bits_per_sample, preset).bits;
    }
    bits
}

fn write_channel_header(writer: &mut BitWriter, plan: &ChannelPlan, bits_per_sample: u32) {
    for filter in plan.preemphasis.iter() {
        writer.put_bits(crate::utility::sint32_to_uint32(filter.prev), bits_per_sample + 1);
        writer.put_bits(crate::utility::sint32_to_uint32(filter.coef), crate::constants::PREEMPHASIS_COEF_SHIFT + 1);
    }
    writer.put_bits(plan.lpc_order as u32, crate::constants::LPC_COEFFICIENT_ORDER_BITWIDTH);
    writer.put_bits(plan.lpc_rshift, crate::constants::RSHIFT_LPC_COEFFICIENT_BITWIDTH);
    writer.put_bits(plan.use_sum_coef as u32, 1);
    let tree = if plan.use_sum_coef { sum_coefficient_tree() } else { raw_coefficient_tree() };
    for sym in coefficient_symbols(&plan.lpc_coef, plan.use_sum_coef) {
        tree.put_code(writer, sym);
    }
    if plan.ltp_period == 0 {
        writer.put_bits(0, 8);
    } else {
        writer.put_bits(plan.ltp_period - crate::constants::LTP_MIN_PERIOD + 1, 8);
        for &c in &plan.ltp_coef {
            writer.put_bits(crate::utility::sint32_to_uint32(c), crate::constants::LTP_COEFFICIENT_BITWIDTH);
        }
    }
}

struct DecodedChannelHeader {
    preemphasis: [PreemphasisFilter; crate::constants::NUM_PREEMPHASIS_FILTERS],
    lpc_coef: Vec<i32>,
    lpc_rshift: u32,
    ltp_period: u32,
    ltp_coef: Vec<i32>,
}

fn read_channel_header(reader: &mut BitReader, bits_per_sample: u32) -> Result<DecodedChannelHeader> {
    let mut preemphasis = [PreemphasisFilter::default(); crate::constants::NUM_PREEMPHASIS_FILTERS];
    for filter in preemphasis.iter_mut() {
        filter.prev = crate::utility::uint32_to_sint32(reader.get_bits(bits_per_sample + 1)?);
        filter.coef =
            crate::utility::uint32_to_sint32(reader.get_bits(crate::constants::PREEMPHASIS_COEF_SHIFT + 1)?);
    }
    let order = reader.get_bits(crate::constants::LPC_COEFFICIENT_ORDER_BITWIDTH)? as usize;
    let rshift = reader.get_bits(crate::constants::RSHIFT_LPC_COEFFICIENT_BITWIDTH)?;
    let use_sum = reader.get_bits(1)? != 0;
    let tree = if use_sum { sum_coefficient_tree() } else { raw_coefficient_tree() };
    let mut symbols = Vec::with_capacity(order);
    for _ in 0..order {
        symbols.push(tree.get_code(reader)?);
    }
    let lpc_coef = coefficients_from_symbols(&symbols, use_sum);
    let coded_period = reader.get_bits(8)?;
    let (ltp_period, ltp_coef) = if coded_period == 0 {
        (0, Vec::new())
    } else {
        let period = coded_period - 1 + crate::constants::LTP_MIN_PERIOD;
        let mut coef = Vec::with_capacity(LTP_ORDER);
        for _ in 0..LTP_ORDER {
            coef.push(crate::utility::uint32_to_sint32(
                reader.get_bits(crate::constants::LTP_COEFFICIENT_BITWIDTH)?,
            ));
        }
        (period, coef)
    };

    Ok(DecodedChannelHeader { preemphasis, lpc_coef, lpc_rshift: rshift, ltp_period, ltp_coef })
}

/// Encodes one block of `channels` (each `num_samples` long) using `preset`,
/// returning the full byte-serialized block including its header.
pub fn encode_block(channels: &[Vec<i32>], bits_per_sample: u32, preset: &ParameterPreset) -> Vec<u8> {
    let num_channels = channels.len();
    let num_samples = channels.first().map_or(0, |c| c.len());

    if num_samples == 0 || channels.iter().all(|c| c.iter().all(|&s| s == 0)) {
        return finish_block(BlockType::Silent, num_samples, &[]);
    }

    let raw_payload = encode_raw_payload(channels, bits_per_sample);

    let (plans, method): (Vec<ChannelPlan>, Option<ChannelProcessMethod>) = if num_channels >= 2 {
        let l = &channels[0];
        let r = &channels[1];
        let candidates = [ChannelProcessMethod::Lr, ChannelProcessMethod::Ms, ChannelProcessMethod::Ls, ChannelProcessMethod::Sr];
        let mut best: Option<(ChannelProcessMethod, ChannelPlan, ChannelPlan, u32)> = None;
        for &m in &candidates {
            let (a, b): (Vec<i32>, Vec<i32>) = l.iter().zip(r.iter()).map(|(&lv, &rv)| m.forward(lv, rv)).unzip();
            let pa = plan_channel(&a, bits_per_sample, preset);
            let pb = plan_channel(&b, bits_per_sample, preset);
            let total = pa.bits + pb.bits;
            if best.as_ref().map_or(true, |(_, _, _, b)| total < *b) {
                best = Some((m, pa, pb, total));
            }
        }
        let (method, pa, pb, _) = best.unwrap();
        let mut plans = vec![pa, pb];
        for ch in channels.iter().skip(2) {
            plans.push(plan_channel(ch, bits_per_sample, preset));
        }
        (plans, Some(method))
    } else {
        (channels.iter().map(|c| plan_channel(c, bits_per_sample, preset)).collect(), None)
    };

    let mut writer = BitWriter::new();
    writer.put_bits(method.map_or(0, |m| m.code()), 2);
    for plan in &plans {
        write_channel_header(&mut writer, plan, bits_per_sample);
    }
    for plan in &plans {
        crate::coder::encode(&mut writer, &plan.residual);
    }
    let compressed_payload = writer.into_bytes();

    if compressed_payload.len() < raw_payload.len() {
        finish_block(BlockType::Compressed, num_samples, &compressed_payload)
    } else {
        finish_block(BlockType::Raw, num_samples, &raw_payload)
    }
}

fn encode_raw_payload(channels: &[Vec<i32>], bits_per_sample: u32) -> Vec<u8> {
    let num_samples = channels.first().map_or(0, |c| c.len());
    let mut writer = BitWriter::new();
    for t in 0..num_samples {
        for ch in channels {
            writer.put_bits(crate::utility::sint32_to_uint32(ch[t]), bits_per_sample + 1);
        }
    }
    writer.into_bytes()
}

fn finish_block(block_type: BlockType, num_samples: usize, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(3 + payload.len());
    body.push(block_type as u8);
    body.extend_from_slice(&(num_samples as u16).to_be_bytes());
    body.extend_from_slice(payload);

    let checksum = fletcher16(&body);
    let block_size = (2 + body.len()) as u32;

    let mut out = Vec::with_capacity(BLOCK_HEADER_SIZE + payload.len());
    out.extend_from_slice(&BLOCK_SYNC_CODE.to_be_bytes());
    out.extend_from_slice(&block_size.to_be_bytes());
    out.extend_from_slice(&checksum.to_be_bytes());
    out.extend_from_slice(&body);
    out
}

/// Decodes one block from the front of `data`, returning the reconstructed
/// per-channel samples and the number of bytes consumed.
pub fn decode_block(data: &[u8], num_channels: usize, bits_per_sample: u32, verify_checksum: bool) -> Result<(Vec<Vec<i32>>, usize)> {
    if data.len() < 6 {
        return Err(Error::InsufficientData);
    }
    let sync = u16::from_be_bytes([data[0], data[1]]);
    if sync != BLOCK_SYNC_CODE {
        return Err(Error::InvalidFormat("bad block sync code"));
    }
    let block_size = u32::from_be_bytes([data[2], data[3], data[4], data[5]]) as usize;
    let total_len = 6 + block_size;
    if data.len() < total_len {
        return Err(Error::InsufficientData);
    }
    let checksum = u16::from_be_bytes([data[6], data[7]]);
    let body = &data[8..total_len];
    if verify_checksum && fletcher16(body) != checksum {
        return Err(Error::DataCorruption);
    }

    let block_type = match body[0] {
        0 => BlockType::Compressed,
        1 => BlockType::Silent,
        2 => BlockType::Raw,
        _ => return Err(Error::InvalidFormat("unknown block type")),
    };
    let num_samples = u16::from_be_bytes([body[1], body[2]]) as usize;
    let payload = &body[3..];

    let channels = match block_type {
        BlockType::Silent => vec![vec![0i32; num_samples]; num_channels],
        BlockType::Raw => decode_raw_payload(payload, num_channels, num_samples, bits_per_sample)?,
        BlockType::Compressed => decode_compressed_payload(payload, num_channels, num_samples, bits_per_sample)?,
    };

    Ok((channels, total_len))
}

fn decode_raw_payload(payload: &[u8], num_channels: usize, num_samples: usize, bits_per_sample: u32) -> Result<Vec<Vec<i32>>> {
    let mut reader = BitReader::new(payload);
    let mut channels = vec![Vec::with_capacity(num_samples); num_channels];
    for _ in 0..num_samples {
        for ch in channels.iter_mut() {
            ch.push(crate::utility::uint32_to_sint32(reader.get_bits(bits_per_sample + 1)?));
        }
    }
    Ok(channels)
}

fn decode_compressed_payload(payload: &[u8], num_channels: usize, num_samples: usize, bits_per_sample: u32) -> Result<Vec<Vec<i32>>> {
    let mut reader = BitReader::new(payload);
    let method_code = reader.get_bits(2)?;
    let method = if num_channels >= 2 { Some(ChannelProcessMethod::from_code(method_code)?) } else { None };

    let mut headers = Vec::with_capacity(num_channels);
    for _ in 0..num_channels {
        headers.push(read_channel_header(&mut reader, bits_per_sample)?);
    }

    let mut channels = Vec::with_capacity(num_channels);
    for header in &headers {
        let mut residual = crate::coder::decode(&mut reader, num_samples)?;
        lpc_synthesize(&mut residual, &header.lpc_coef, header.lpc_rshift);
        if header.ltp_period != 0 {
            ltp_synthesize(&mut residual, &header.ltp_coef, header.ltp_period, crate::constants::LTP_COEFFICIENT_RSHIFT);
        }
        unapply_two_stage(&mut residual, &header.preemphasis);
        channels.push(residual);
    }

    if let Some(m) = method {
        let (a, b): (Vec<i32>, Vec<i32>) =
            channels[0].iter().zip(channels[1].iter()).map(|(&av, &bv)| m.inverse(av, bv)).unzip();
        channels[0] = a;
        channels[1] = b;
    }

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::PRESETS;

    fn test_signal(len: usize, seed: u64) -> Vec<i32> {
        let mut s = seed;
        (0..len)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                (((s >> 40) % 4000) as i32) - 2000
            })
            .collect()
    }

    #[test]
    fn mono_block_round_trips() {
        let preset = &PRESETS[1];
        let channels = vec![test_signal(512, 1)];
        let block = encode_block(&channels, 16, preset);
        let (decoded, consumed) = decode_block(&block, 1, 16, true).unwrap();
        assert_eq!(consumed, block.len());
        assert_eq!(decoded, channels);
    }

    #[test]
    fn stereo_block_round_trips() {
        let preset = &PRESETS[3];
        let channels = vec![test_signal(1024, 7), test_signal(1024, 9)];
        let block = encode_block(&channels, 16, preset);
        let (decoded, _) = decode_block(&block, 2, 16, true).unwrap();
        assert_eq!(decoded, channels);
    }

    #[test]
    fn silent_block_round_trips() {
        let preset = &PRESETS[0];
        let channels = vec![vec![0i32; 256], vec![0i32; 256]];
        let block = encode_block(&channels, 16, preset);
        let (decoded, _) = decode_block(&block, 2, 16, true).unwrap();
        assert_eq!(decoded, channels);
    }

    #[test]
    fn multi_channel_round_trips() {
        let preset = &PRESETS[2];
        let channels: Vec<Vec<i32>> = (0..8).map(|i| test_signal(300, i as u64 + 1)).collect();
        let block = encode_block(&channels, 24, preset);
        let (decoded, _) = decode_block(&block, 8, 24, true).unwrap();
        assert_eq!(decoded, channels);
    }

    #[test]
    fn coefficient_symbols_round_trip_raw_and_sum() {
        let coef = vec![-120, 3, 127, -128, 0, 64];
        for sum in [false, true] {
            let symbols = coefficient_symbols(&coef, sum);
            assert_eq!(coefficients_from_symbols(&symbols, sum), coef);
        }
    }

    #[test]
    fn sum_coding_is_chosen_when_it_is_actually_shorter() {
        // Coefficients that alternate in sign but nearly cancel in sum code
        // shorter under the sum tree than under the raw tree.
        let coef = vec![40, -39, 41, -40, 39, -41, 40, -39];
        let raw_bits = tree_bits(raw_coefficient_tree(), &coefficient_symbols(&coef, false));
        let sum_bits = tree_bits(sum_coefficient_tree(), &coefficient_symbols(&coef, true));
        assert!(sum_bits < raw_bits, "expected sum coding to win: raw={raw_bits} sum={sum_bits}");
    }

    #[test]
    fn corrupted_checksum_is_detected() {
        let preset = &PRESETS[1];
        let channels = vec![test_signal(128, 3)];
        let mut block = encode_block(&channels, 16, preset);
        let last = block.len() - 1;
        block[last] ^= 0xFF;
        assert!(matches!(decode_block(&block, 1, 16, true), Err(Error::DataCorruption)));
    }
}
