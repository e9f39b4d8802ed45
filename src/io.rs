//! Big-endian byte-level I/O helpers for the file header. SRLA's wire format
//! is big-endian throughout, unlike a typical little-endian PCM container.

use std::io::{self, Read, Write};

use crate::Result;

/// Big-endian integer write helpers, blanket-implemented over any `Write`.
pub trait WriteBuffer: Write {
    /// Writes a single byte.
    #[inline(always)]
    fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    /// Writes a big-endian `u16`.
    #[inline(always)]
    fn write_be_u16(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }

    /// Writes a big-endian `u32`.
    #[inline(always)]
    fn write_be_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_be_bytes())
    }
}

impl<W: Write + ?Sized> WriteBuffer for W {}

/// Big-endian integer read helpers, blanket-implemented over any `Read`.
pub trait ReadBuffer: Read {
    /// Reads a single byte.
    #[inline(always)]
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a big-endian `u16`.
    #[inline(always)]
    fn read_be_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Reads a big-endian `u32`.
    #[inline(always)]
    fn read_be_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }
}

impl<R: Read + ?Sized> ReadBuffer for R {}

/// Serializes a [`crate::frame::FileHeader`] to exactly `HEADER_SIZE` bytes.
pub fn write_file_header<W: Write>(w: &mut W, header: &crate::frame::FileHeader) -> Result<()> {
    w.write_all(&crate::constants::MAGIC)?;
    w.write_be_u32(header.format_version)?;
    w.write_be_u32(header.codec_version)?;
    w.write_be_u16(header.num_channels)?;
    w.write_be_u32(header.num_samples)?;
    w.write_be_u32(header.sampling_rate)?;
    w.write_be_u16(header.bits_per_sample)?;
    w.write_be_u32(header.max_num_samples_per_block)?;
    w.write_u8(header.preset)?;
    Ok(())
}

/// Parses a [`crate::frame::FileHeader`] from exactly `HEADER_SIZE` bytes,
/// validating the magic and version fields.
pub fn read_file_header<R: Read>(r: &mut R) -> Result<crate::frame::FileHeader> {
    use crate::errors::Error;

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != crate::constants::MAGIC {
        return Err(Error::InvalidFormat("bad magic"));
    }
    let format_version = r.read_be_u32()?;
    if format_version != crate::constants::FORMAT_VERSION {
        return Err(Error::InvalidFormat("unsupported format version"));
    }
    let codec_version = r.read_be_u32()?;
    if codec_version != crate::constants::CODEC_VERSION {
        return Err(Error::InvalidFormat("unsupported codec version"));
    }
    let num_channels = r.read_be_u16()?;
    let num_samples = r.read_be_u32()?;
    let sampling_rate = r.read_be_u32()?;
    let bits_per_sample = r.read_be_u16()?;
    let max_num_samples_per_block = r.read_be_u32()?;
    let preset = r.read_u8()?;

    crate::frame::FileHeader {
        format_version,
        codec_version,
        num_channels,
        num_samples,
        sampling_rate,
        bits_per_sample,
        max_num_samples_per_block,
        preset,
    }
    .validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FileHeader;

    #[test]
    fn header_round_trips() {
        let header = FileHeader {
            format_version: crate::constants::FORMAT_VERSION,
            codec_version: crate::constants::CODEC_VERSION,
            num_channels: 2,
            num_samples: 44100,
            sampling_rate: 44100,
            bits_per_sample: 16,
            max_num_samples_per_block: 4096,
            preset: 3,
        };
        let mut buf = Vec::new();
        write_file_header(&mut buf, &header).unwrap();
        assert_eq!(buf.len(), crate::constants::HEADER_SIZE);
        let mut cursor = &buf[..];
        let decoded = read_file_header(&mut cursor).unwrap();
        assert_eq!(decoded.num_channels, header.num_channels);
        assert_eq!(decoded.preset, header.preset);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut buf = vec![0u8; crate::constants::HEADER_SIZE];
        buf[0] = b'X';
        let mut cursor = &buf[..];
        assert!(read_file_header(&mut cursor).is_err());
    }
}
