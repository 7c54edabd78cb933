//! Block decoding.
//!
//! A block is a control header followed by `nsamples * ssize` payload bytes.
//! The payload is decoded into a [`Samples`] vector whose width follows
//! `ssize`; any other sample size is rejected rather than reinterpreted.
//! Samples are read little-endian, the byte order of the data stream. The
//! endianness bits of the header flags are informational and never reorder
//! payload bytes.

use bytes::Buf;
use zio_sys::{ControlHeader, RawBlock};

use crate::error::{Result, ZioError};

/// Decoded samples of one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Samples {
    /// `ssize == 1`
    U8(Vec<u8>),
    /// `ssize == 2`
    U16(Vec<u16>),
    /// `ssize == 4`
    U32(Vec<u32>),
    /// `ssize == 8`
    U64(Vec<u64>),
}

impl Samples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
        }
    }

    /// True if the block carried no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample width in bytes.
    pub fn width(&self) -> usize {
        match self {
            Self::U8(_) => 1,
            Self::U16(_) => 2,
            Self::U32(_) => 4,
            Self::U64(_) => 8,
        }
    }

    /// Sample `i` widened to `u64`.
    pub fn get(&self, i: usize) -> Option<u64> {
        match self {
            Self::U8(v) => v.get(i).map(|&s| u64::from(s)),
            Self::U16(v) => v.get(i).map(|&s| u64::from(s)),
            Self::U32(v) => v.get(i).map(|&s| u64::from(s)),
            Self::U64(v) => v.get(i).copied(),
        }
    }

    /// Every sample widened to `u64`, in order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Serialize back into little-endian payload bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.width());
        match self {
            Self::U8(v) => out.extend_from_slice(v),
            Self::U16(v) => v.iter().for_each(|s| out.extend(s.to_le_bytes())),
            Self::U32(v) => v.iter().for_each(|s| out.extend(s.to_le_bytes())),
            Self::U64(v) => v.iter().for_each(|s| out.extend(s.to_le_bytes())),
        }
        out
    }
}

/// One acquisition block. Produced fresh by every read and owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Control header as read.
    pub ctrl: ControlHeader,
    /// Payload decoded according to `ctrl.ssize`.
    pub samples: Samples,
}

impl Block {
    /// Build a block for writing; `nsamples` and `ssize` follow `samples`.
    pub fn new(mut ctrl: ControlHeader, samples: Samples) -> Self {
        ctrl.nsamples = samples.len() as u32;
        ctrl.ssize = samples.width() as u16;
        Self { ctrl, samples }
    }

    /// Payload bytes as written to the data stream.
    pub fn payload(&self) -> Vec<u8> {
        self.samples.to_bytes()
    }
}

/// Decode a control header.
pub fn decode_header(bytes: &[u8]) -> Result<ControlHeader> {
    Ok(ControlHeader::decode(bytes)?)
}

/// Decode the payload announced by `ctrl`.
///
/// Bytes past `nsamples * ssize` are ignored.
pub fn decode_samples(ctrl: &ControlHeader, payload: &[u8]) -> Result<Samples> {
    let ssize = ctrl.ssize;
    if !matches!(ssize, 1 | 2 | 4 | 8) {
        return Err(ZioError::UnsupportedSampleSize(ssize));
    }
    let n = ctrl.nsamples as usize;
    let expected = ctrl.payload_len();
    if payload.len() < expected {
        return Err(ZioError::Truncated {
            expected,
            actual: payload.len(),
        });
    }

    let mut buf = &payload[..expected];
    let samples = match ssize {
        1 => Samples::U8(buf.to_vec()),
        2 => Samples::U16(
            (0..n)
                .map(|_| buf.get_u16_le())
                .collect(),
        ),
        4 => Samples::U32(
            (0..n)
                .map(|_| buf.get_u32_le())
                .collect(),
        ),
        _ => Samples::U64(
            (0..n)
                .map(|_| buf.get_u64_le())
                .collect(),
        ),
    };
    Ok(samples)
}

/// Decode a raw block read from a channel.
pub fn decode_block(raw: &RawBlock) -> Result<Block> {
    let ctrl = decode_header(&raw.ctrl)?;
    let samples = decode_samples(&ctrl, &raw.data)?;
    Ok(Block { ctrl, samples })
}
