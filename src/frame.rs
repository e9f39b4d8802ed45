//! File-level framing: the stream header plus whole-stream encode/decode
//! orchestration over the block codec.

use tracing::{debug, trace};

use crate::block::{decode_block, encode_block};
use crate::constants::{CODEC_VERSION, FORMAT_VERSION, MAX_NUM_CHANNELS};
use crate::errors::Error;
use crate::io::{read_file_header, write_file_header};
use crate::presets::preset_for;
use crate::Result;

/// The 29-byte header opening every SRLA stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Bitstream format version.
    pub format_version: u32,
    /// Codec version.
    pub codec_version: u32,
    /// Number of channels, 1..=8.
    pub num_channels: u16,
    /// Total number of samples per channel.
    pub num_samples: u32,
    /// Sampling rate in Hz.
    pub sampling_rate: u32,
    /// Bits per sample: 8, 16, or 24.
    pub bits_per_sample: u16,
    /// Maximum number of samples carried by any one block.
    pub max_num_samples_per_block: u32,
    /// Compiled-in preset index, 0..=6.
    pub preset: u8,
}

impl FileHeader {
    /// Validates every field, returning `self` on success.
    pub fn validate(self) -> Result<Self> {
        if self.num_channels == 0 || self.num_channels as usize > MAX_NUM_CHANNELS {
            return Err(Error::InvalidFormat("num_channels out of range"));
        }
        if self.sampling_rate == 0 {
            return Err(Error::InvalidFormat("sampling_rate is zero"));
        }
        if !matches!(self.bits_per_sample, 8 | 16 | 24) {
            return Err(Error::InvalidFormat("bits_per_sample must be 8, 16, or 24"));
        }
        if self.max_num_samples_per_block == 0 {
            return Err(Error::InvalidFormat("max_num_samples_per_block is zero"));
        }
        preset_for(self.preset)?;
        Ok(self)
    }
}

/// Parameters supplied by the caller before encoding a stream.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParameter {
    /// Number of channels, 1..=8.
    pub num_channels: u16,
    /// Bits per sample: 8, 16, or 24.
    pub bits_per_sample: u16,
    /// Sampling rate in Hz.
    pub sampling_rate: u32,
    /// Smallest block size the partitioner may choose.
    pub min_num_samples_per_block: u32,
    /// Largest block size the partitioner may choose.
    pub max_num_samples_per_block: u32,
    /// Lookahead window size driving the variable block-size search.
    pub num_lookahead_samples: u32,
    /// Compiled-in preset index, 0..=6.
    pub preset: u8,
}

/// Upper bounds a single handle is built to support.
#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    /// Maximum channel count the handle can encode.
    pub max_num_channels: u16,
    /// Smallest block size the handle supports.
    pub min_num_samples_per_block: u32,
    /// Largest block size the handle supports.
    pub max_num_samples_per_block: u32,
    /// Largest lookahead window the handle supports.
    pub max_num_lookahead_samples: u32,
}

/// Per-block progress callback: `(total_samples, progress_samples, block_bytes)`.
pub type EncodeBlockCallback<'a> = dyn FnMut(u32, u32, &[u8]) + 'a;

/// A stateful encoder handle. Owns its scratch buffers; not `Sync`.
pub struct Encoder {
    config: EncoderConfig,
    parameter: Option<EncodeParameter>,
}

impl Encoder {
    /// Creates a new handle sized for `config`.
    pub fn new(config: EncoderConfig) -> Self {
        debug!(?config, "creating encoder");
        Self { config, parameter: None }
    }

    /// Installs the parameters for the stream about to be encoded.
    pub fn set_encode_parameter(&mut self, parameter: EncodeParameter) -> Result<()> {
        if parameter.num_channels == 0 || parameter.num_channels > self.config.max_num_channels {
            return Err(Error::InvalidArgument("num_channels exceeds configured maximum"));
        }
        if parameter.min_num_samples_per_block == 0 || parameter.min_num_samples_per_block > parameter.max_num_samples_per_block {
            return Err(Error::InvalidArgument("invalid block size bounds"));
        }
        preset_for(parameter.preset)?;
        self.parameter = Some(parameter);
        Ok(())
    }

    /// Encodes the whole of `channels` (each the same length) into a single
    /// byte stream, invoking `callback` after each block if supplied.
    pub fn encode_whole(&mut self, channels: &[Vec<i32>], mut callback: Option<&mut EncodeBlockCallback>) -> Result<Vec<u8>> {
        let parameter = self.parameter.ok_or(Error::ParameterNotSet)?;
        let num_samples = channels.first().map_or(0, |c| c.len()) as u32;
        if channels.len() != parameter.num_channels as usize {
            return Err(Error::InvalidArgument("channel count does not match parameter"));
        }

        let header = FileHeader {
            format_version: FORMAT_VERSION,
            codec_version: CODEC_VERSION,
            num_channels: parameter.num_channels,
            num_samples,
            sampling_rate: parameter.sampling_rate,
            bits_per_sample: parameter.bits_per_sample,
            max_num_samples_per_block: parameter.max_num_samples_per_block,
            preset: parameter.preset,
        }
        .validate()?;

        let mut out = Vec::new();
        write_file_header(&mut out, &header)?;

        let preset = preset_for(parameter.preset)?;
        let fixed = parameter.min_num_samples_per_block == parameter.max_num_samples_per_block;
        let mut progress = 0u32;

        let mut offset = 0usize;
        while offset < num_samples as usize {
            let boundaries = if fixed {
                let len = (parameter.max_num_samples_per_block as usize).min(num_samples as usize - offset);
                vec![(offset, len)]
            } else {
                let window_end = (offset + parameter.num_lookahead_samples as usize).min(num_samples as usize);
                let window_channels: Vec<Vec<i32>> = channels.iter().map(|c| c[offset..window_end].to_vec()).collect();
                let local = crate::partition::plan_blocks(
                    window_end - offset,
                    parameter.min_num_samples_per_block as usize,
                    parameter.max_num_samples_per_block as usize,
                    &window_channels,
                    parameter.bits_per_sample as u32,
                    preset,
                );
                local.into_iter().map(|(s, l)| (offset + s, l)).collect()
            };

            for (start, len) in boundaries {
                let block_channels: Vec<Vec<i32>> = channels.iter().map(|c| c[start..start + len].to_vec()).collect();
                let block_bytes = encode_block(&block_channels, parameter.bits_per_sample as u32, preset);
                trace!(start, len, bytes = block_bytes.len(), "encoded block");
                progress += len as u32;
                if let Some(cb) = callback.as_deref_mut() {
                    cb(num_samples, progress, &block_bytes);
                }
                out.extend_from_slice(&block_bytes);
            }
            offset += boundaries_len(num_samples as usize, offset, fixed, parameter);
        }

        Ok(out)
    }
}

fn boundaries_len(num_samples: usize, offset: usize, fixed: bool, parameter: EncodeParameter) -> usize {
    if fixed {
        (parameter.max_num_samples_per_block as usize).min(num_samples - offset)
    } else {
        (parameter.num_lookahead_samples as usize).min(num_samples - offset)
    }
}

/// Upper bounds a decoder handle is built to support.
#[derive(Debug, Clone, Copy)]
pub struct DecoderConfig {
    /// Maximum channel count the handle can decode.
    pub max_num_channels: u16,
    /// Whether block checksums are verified during decode.
    pub verify_checksum: bool,
}

/// A stateful decoder handle. Owns its scratch buffers; not `Sync`.
pub struct Decoder {
    config: DecoderConfig,
    header: Option<FileHeader>,
}

impl Decoder {
    /// Creates a new handle sized for `config`.
    pub fn new(config: DecoderConfig) -> Self {
        debug!(?config, "creating decoder");
        Self { config, header: None }
    }

    /// Decodes the 29-byte file header from the front of `data`.
    pub fn decode_header(&mut self, data: &[u8]) -> Result<FileHeader> {
        let mut cursor = data;
        let header = read_file_header(&mut cursor)?;
        if header.num_channels as usize > self.config.max_num_channels as usize {
            return Err(Error::InvalidFormat("stream channel count exceeds configured maximum"));
        }
        self.header = Some(header);
        Ok(header)
    }

    /// Decodes an entire stream, returning one sample vector per channel.
    pub fn decode_whole(&mut self, data: &[u8]) -> Result<Vec<Vec<i32>>> {
        let header = self.decode_header(data)?;
        let mut offset = crate::constants::HEADER_SIZE;
        let num_channels = header.num_channels as usize;
        let mut channels = vec![Vec::with_capacity(header.num_samples as usize); num_channels];

        let mut decoded_samples = 0u32;
        while decoded_samples < header.num_samples && offset < data.len() {
            let (block_channels, consumed) =
                decode_block(&data[offset..], num_channels, header.bits_per_sample as u32, self.config.verify_checksum)?;
            for (dst, src) in channels.iter_mut().zip(block_channels.into_iter()) {
                dst.extend(src);
            }
            decoded_samples = channels.first().map_or(0, |c| c.len()) as u32;
            offset += consumed;
        }

        if decoded_samples < header.num_samples {
            return Err(Error::InsufficientData);
        }
        for ch in channels.iter_mut() {
            ch.truncate(header.num_samples as usize);
        }
        Ok(channels)
    }
}
