//! Bit-exact layout of the ZIO control record.
//!
//! Every block produced by a ZIO channel starts with a [`ControlHeader`]. The
//! record is 512 bytes with one inline TLV entry; drivers may extend the TLV
//! region, so anything beyond the fixed part that forms whole 16-byte entries
//! is decoded as additional [`Tlv`]s.
//!
//! ```text
//! offset  size  field
//!      0     1  major_version
//!      1     1  minor_version
//!      2     1  zio_alarms
//!      3     1  drv_alarms
//!      4     4  seq_num
//!      8     4  nsamples
//!     12     2  ssize
//!     14     2  nbits
//!     16    32  addr         (family, host type, host id, dev id, cset, chan, devname)
//!     48    24  tstamp       (secs, ticks, bins)
//!     72     4  mem_offset
//!     76     4  reserved
//!     80     4  flags
//!     84    12  triggername
//!     96   200  attr_channel (std_mask, unused, ext_mask, std_val[16], ext_val[32])
//!    296   200  attr_trigger
//!    496    16  tlv[0]       (type, length, payload[8])
//! ```
//!
//! All multi-byte fields are little-endian.

use std::fmt;

use bitflags::bitflags;
use bytes::{Buf, BufMut};
use thiserror::Error;

/// Size of the control record with a single TLV entry.
pub const ZIO_CONTROL_SIZE: usize = 512;
/// Size of one TLV entry.
pub const ZIO_TLV_SIZE: usize = 16;
/// Capacity of the standard attribute group.
pub const ZIO_MAX_STD_ATTR: usize = 16;
/// Capacity of the extended attribute group.
pub const ZIO_MAX_EXT_ATTR: usize = 32;
/// Width of the host id field in [`Address`].
pub const ZIO_HOSTID_LEN: usize = 8;
/// Width of the device name field in [`Address`].
pub const ZIO_DEVNAME_LEN: usize = 12;
/// Width of the trigger name field.
pub const ZIO_TRIGGERNAME_LEN: usize = 12;

const FIXED_SIZE: usize = ZIO_CONTROL_SIZE - ZIO_TLV_SIZE;

/// Errors raised while decoding a control record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Fewer bytes than the fixed control size.
    #[error("Malformed control record: got {actual} bytes, need at least {expected}")]
    Malformed { expected: usize, actual: usize },
}

bitflags! {
    /// Bits of the `flags` word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlFlags: u32 {
        /// Samples are aligned to the most significant bit.
        const MSB_ALIGN = 0x0010_0000;
        /// Samples are aligned to the least significant bit.
        const LSB_ALIGN = 0x0020_0000;
        /// Samples are little-endian.
        const LITTLE_ENDIAN = 0x0100_0000;
        /// Samples are big-endian.
        const BIG_ENDIAN = 0x0200_0000;
    }
}

bitflags! {
    /// Bits of the framework alarm byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Alarms: u8 {
        /// A block was lost because the buffer was full.
        const LOST_BLOCK = 0x01;
        /// A trigger fired while the previous one was still running.
        const LOST_TRIGGER = 0x02;
        /// A sniffing reader missed data.
        const LOST_SNIFF = 0x04;
    }
}

/// Source address of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Address {
    /// Address family.
    pub sa_family: u16,
    /// Host type.
    pub host_type: u8,
    /// Padding.
    pub filler: u8,
    /// Host identifier.
    pub hostid: [u8; ZIO_HOSTID_LEN],
    /// Device instance id.
    pub dev_id: u32,
    /// Channel-set index.
    pub cset: u16,
    /// Channel index.
    pub chan: u16,
    /// Device name, NUL padded.
    pub devname: [u8; ZIO_DEVNAME_LEN],
}

impl Address {
    /// Device name as text, up to the first NUL.
    pub fn devname(&self) -> String {
        fixed_str(&self.devname)
    }

    /// Store `name` in the fixed device name field, truncating if needed.
    pub fn set_devname(&mut self, name: &str) {
        self.devname = fixed_bytes(name);
    }

    fn decode(buf: &mut &[u8]) -> Self {
        Self {
            sa_family: buf.get_u16_le(),
            host_type: buf.get_u8(),
            filler: buf.get_u8(),
            hostid: get_array(buf),
            dev_id: buf.get_u32_le(),
            cset: buf.get_u16_le(),
            chan: buf.get_u16_le(),
            devname: get_array(buf),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u16_le(self.sa_family);
        out.put_u8(self.host_type);
        out.put_u8(self.filler);
        out.put_slice(&self.hostid);
        out.put_u32_le(self.dev_id);
        out.put_u16_le(self.cset);
        out.put_u16_le(self.chan);
        out.put_slice(&self.devname);
    }
}

/// Acquisition time stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// Seconds.
    pub secs: u64,
    /// Ticks within the second.
    pub ticks: u64,
    /// Driver-defined sub-tick bins.
    pub bins: u64,
}

impl Timestamp {
    fn decode(buf: &mut &[u8]) -> Self {
        Self {
            secs: buf.get_u64_le(),
            ticks: buf.get_u64_le(),
            bins: buf.get_u64_le(),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u64_le(self.secs);
        out.put_u64_le(self.ticks);
        out.put_u64_le(self.bins);
    }
}

/// Snapshot of an object's attribute values at acquisition time.
///
/// Only the slots whose bit is set in the matching mask are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlAttrTable {
    /// Slots of `std_val` in use.
    pub std_mask: u16,
    /// Padding.
    pub unused: u16,
    /// Slots of `ext_val` in use.
    pub ext_mask: u32,
    /// Standard attribute values.
    pub std_val: [u32; ZIO_MAX_STD_ATTR],
    /// Extended attribute values.
    pub ext_val: [u32; ZIO_MAX_EXT_ATTR],
}

impl CtrlAttrTable {
    /// Standard `(slot, value)` pairs selected by `std_mask`.
    pub fn std_values(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let mask = u32::from(self.std_mask);
        self.std_val
            .iter()
            .enumerate()
            .filter(move |(i, _)| mask & (1 << i) != 0)
            .map(|(i, v)| (i, *v))
    }

    /// Extended `(slot, value)` pairs selected by `ext_mask`.
    pub fn ext_values(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let mask = self.ext_mask;
        self.ext_val
            .iter()
            .enumerate()
            .filter(move |(i, _)| mask & (1 << i) != 0)
            .map(|(i, v)| (i, *v))
    }

    fn decode(buf: &mut &[u8]) -> Self {
        let std_mask = buf.get_u16_le();
        let unused = buf.get_u16_le();
        let ext_mask = buf.get_u32_le();
        let mut std_val = [0u32; ZIO_MAX_STD_ATTR];
        for v in std_val.iter_mut() {
            *v = buf.get_u32_le();
        }
        let mut ext_val = [0u32; ZIO_MAX_EXT_ATTR];
        for v in ext_val.iter_mut() {
            *v = buf.get_u32_le();
        }
        Self {
            std_mask,
            unused,
            ext_mask,
            std_val,
            ext_val,
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u16_le(self.std_mask);
        out.put_u16_le(self.unused);
        out.put_u32_le(self.ext_mask);
        for v in &self.std_val {
            out.put_u32_le(*v);
        }
        for v in &self.ext_val {
            out.put_u32_le(*v);
        }
    }
}

/// One type-length-value extension entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tlv {
    /// Entry type.
    pub kind: u32,
    /// Payload length in bytes.
    pub length: u32,
    /// Inline payload.
    pub payload: [u8; 8],
}

impl Tlv {
    fn decode(buf: &mut &[u8]) -> Self {
        Self {
            kind: buf.get_u32_le(),
            length: buf.get_u32_le(),
            payload: get_array(buf),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.kind);
        out.put_u32_le(self.length);
        out.put_slice(&self.payload);
    }
}

/// The control record that precedes every block payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlHeader {
    /// Major version of the framework.
    pub major_version: u8,
    /// Minor version of the framework.
    pub minor_version: u8,
    /// Framework alarm bits, see [`Alarms`].
    pub zio_alarms: u8,
    /// Driver alarm bits.
    pub drv_alarms: u8,
    /// Per-channel block counter.
    pub seq_num: u32,
    /// Number of samples in the block.
    pub nsamples: u32,
    /// Sample size in bytes.
    pub ssize: u16,
    /// Significant bits per sample.
    pub nbits: u16,
    /// Source of the block.
    pub addr: Address,
    /// Acquisition time.
    pub tstamp: Timestamp,
    /// Offset in device memory.
    pub mem_offset: u32,
    /// Reserved.
    pub reserved: u32,
    /// See [`ControlFlags`].
    pub flags: u32,
    /// Trigger type, NUL padded.
    pub triggername: [u8; ZIO_TRIGGERNAME_LEN],
    /// Channel attribute snapshot.
    pub attr_channel: CtrlAttrTable,
    /// Trigger attribute snapshot.
    pub attr_trigger: CtrlAttrTable,
    /// Always holds at least one entry.
    pub tlv: Vec<Tlv>,
}

impl Default for ControlHeader {
    fn default() -> Self {
        Self {
            major_version: 0,
            minor_version: 0,
            zio_alarms: 0,
            drv_alarms: 0,
            seq_num: 0,
            nsamples: 0,
            ssize: 0,
            nbits: 0,
            addr: Address::default(),
            tstamp: Timestamp::default(),
            mem_offset: 0,
            reserved: 0,
            flags: 0,
            triggername: [0; ZIO_TRIGGERNAME_LEN],
            attr_channel: CtrlAttrTable::default(),
            attr_trigger: CtrlAttrTable::default(),
            tlv: vec![Tlv::default()],
        }
    }
}

impl ControlHeader {
    /// Decode a control record.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Malformed`] if `bytes` is shorter than
    /// [`ZIO_CONTROL_SIZE`].
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < ZIO_CONTROL_SIZE {
            return Err(LayoutError::Malformed {
                expected: ZIO_CONTROL_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = bytes;
        let major_version = buf.get_u8();
        let minor_version = buf.get_u8();
        let zio_alarms = buf.get_u8();
        let drv_alarms = buf.get_u8();
        let seq_num = buf.get_u32_le();
        let nsamples = buf.get_u32_le();
        let ssize = buf.get_u16_le();
        let nbits = buf.get_u16_le();
        let addr = Address::decode(&mut buf);
        let tstamp = Timestamp::decode(&mut buf);
        let mem_offset = buf.get_u32_le();
        let reserved = buf.get_u32_le();
        let flags = buf.get_u32_le();
        let triggername = get_array(&mut buf);
        let attr_channel = CtrlAttrTable::decode(&mut buf);
        let attr_trigger = CtrlAttrTable::decode(&mut buf);
        debug_assert_eq!(bytes.len() - buf.remaining(), FIXED_SIZE);

        let mut tlv = Vec::with_capacity(buf.remaining() / ZIO_TLV_SIZE);
        while buf.remaining() >= ZIO_TLV_SIZE {
            tlv.push(Tlv::decode(&mut buf));
        }

        Ok(Self {
            major_version,
            minor_version,
            zio_alarms,
            drv_alarms,
            seq_num,
            nsamples,
            ssize,
            nbits,
            addr,
            tstamp,
            mem_offset,
            reserved,
            flags,
            triggername,
            attr_channel,
            attr_trigger,
            tlv,
        })
    }

    /// Encode the record. An empty TLV list is written as one zeroed entry.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        out.put_u8(self.major_version);
        out.put_u8(self.minor_version);
        out.put_u8(self.zio_alarms);
        out.put_u8(self.drv_alarms);
        out.put_u32_le(self.seq_num);
        out.put_u32_le(self.nsamples);
        out.put_u16_le(self.ssize);
        out.put_u16_le(self.nbits);
        self.addr.encode(&mut out);
        self.tstamp.encode(&mut out);
        out.put_u32_le(self.mem_offset);
        out.put_u32_le(self.reserved);
        out.put_u32_le(self.flags);
        out.put_slice(&self.triggername);
        self.attr_channel.encode(&mut out);
        self.attr_trigger.encode(&mut out);
        if self.tlv.is_empty() {
            Tlv::default().encode(&mut out);
        }
        for entry in &self.tlv {
            entry.encode(&mut out);
        }
        out
    }

    /// Number of bytes [`encode`](Self::encode) produces.
    pub fn encoded_len(&self) -> usize {
        FIXED_SIZE + ZIO_TLV_SIZE * self.tlv.len().max(1)
    }

    /// Payload size announced by the header (`nsamples * ssize`).
    pub fn payload_len(&self) -> usize {
        self.nsamples as usize * self.ssize as usize
    }

    /// Flags word as typed bits; unknown bits are retained.
    pub fn control_flags(&self) -> ControlFlags {
        ControlFlags::from_bits_retain(self.flags)
    }

    /// Framework alarms as typed bits; unknown bits are retained.
    pub fn alarms(&self) -> Alarms {
        Alarms::from_bits_retain(self.zio_alarms)
    }

    /// Trigger name as text, up to the first NUL.
    pub fn trigger_name(&self) -> String {
        fixed_str(&self.triggername)
    }

    /// Store `name` in the fixed trigger name field, truncating if needed.
    pub fn set_trigger_name(&mut self, name: &str) {
        self.triggername = fixed_bytes(name);
    }

    fn endianness(&self) -> &'static str {
        let flags = self.control_flags();
        if flags.contains(ControlFlags::LITTLE_ENDIAN) {
            "little-endian"
        } else if flags.contains(ControlFlags::BIG_ENDIAN) {
            "big-endian"
        } else {
            "unknown-endian"
        }
    }
}

impl fmt::Display for ControlHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ctrl: version {}.{}, trigger {}, dev {}-{:04x}, cset {}, chan {}",
            self.major_version,
            self.minor_version,
            self.trigger_name(),
            self.addr.devname(),
            self.addr.dev_id,
            self.addr.cset,
            self.addr.chan
        )?;
        writeln!(
            f,
            "Ctrl: alarms 0x{:02x} 0x{:02x}",
            self.zio_alarms, self.drv_alarms
        )?;
        writeln!(
            f,
            "Ctrl: seq {}, n {}, size {}, bits {}, flags {:08x} ({})",
            self.seq_num,
            self.nsamples,
            self.ssize,
            self.nbits,
            self.flags,
            self.endianness()
        )?;
        writeln!(
            f,
            "Ctrl: stamp {}.{:09} ({})",
            self.tstamp.secs, self.tstamp.ticks, self.tstamp.bins
        )?;
        write!(f, "Ctrl: mem_offset {:08x}", self.mem_offset)
    }
}

fn get_array<const N: usize>(buf: &mut &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    out
}

fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn fixed_bytes<const N: usize>(name: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let src = name.as_bytes();
    let n = src.len().min(N);
    out[..n].copy_from_slice(&src[..n]);
    out
}
