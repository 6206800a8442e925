//! Versioned frames for shuffle batches.
//!
//! A frame is a fixed little-endian header, a record count, and the bincode
//! encoding of the records:
//!
//! ```text
//! +---------+---------+-----------+------------------+
//! | ver u16 | kind u16| rsvd u32  | count u32 | body |
//! +---------+---------+-----------+------------------+
//! ```
//!
//! Substrates route every shuffle batch through a frame, local ones included,
//! so what a vertex receives is exactly what a remote worker would decode.

use std::mem::{align_of, size_of};

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::graph_error::GraphError;

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Frame kinds.
pub const KIND_SHUFFLE: u16 = 1;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

const HDR_LEN: usize = size_of::<WireHdr>() + size_of::<WireCount>();

/// Encodes `records` as one frame of the given kind.
pub fn encode_frame<T: Serialize>(kind: u16, records: &[T]) -> Result<Bytes, GraphError> {
    if records.len() > u32::MAX as usize {
        return Err(GraphError::Codec(format!(
            "batch of {} records does not fit a frame",
            records.len()
        )));
    }
    let body = bincode::serialize(records)?;
    let mut buf = BytesMut::with_capacity(HDR_LEN + body.len());
    buf.put_slice(bytemuck::bytes_of(&WireHdr::new(kind)));
    buf.put_slice(bytemuck::bytes_of(&WireCount::new(records.len())));
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Decodes a frame produced by [`encode_frame`], checking version, kind and count.
pub fn decode_frame<T: DeserializeOwned>(kind: u16, frame: &[u8]) -> Result<Vec<T>, GraphError> {
    if frame.len() < HDR_LEN {
        return Err(GraphError::Codec(format!(
            "expected at least {HDR_LEN} bytes, got {}",
            frame.len()
        )));
    }
    let hdr: WireHdr = bytemuck::pod_read_unaligned(&frame[..size_of::<WireHdr>()]);
    if hdr.version() != WIRE_VERSION {
        return Err(GraphError::Codec(format!(
            "unsupported wire version {} (expected {WIRE_VERSION})",
            hdr.version()
        )));
    }
    if hdr.kind() != kind {
        return Err(GraphError::Codec(format!(
            "unexpected frame kind {} (expected {kind})",
            hdr.kind()
        )));
    }
    let count: WireCount = bytemuck::pod_read_unaligned(&frame[size_of::<WireHdr>()..HDR_LEN]);
    let records: Vec<T> = bincode::deserialize(&frame[HDR_LEN..])?;
    if records.len() != count.get() {
        return Err(GraphError::Codec(format!(
            "frame announced {} records, body holds {}",
            count.get(),
            records.len()
        )));
    }
    Ok(records)
}

// compile-time layout checks
static_assertions::const_assert!(size_of::<WireHdr>() == 8);
static_assertions::const_assert!(align_of::<WireHdr>() == 4);
static_assertions::const_assert!(size_of::<WireCount>() == 4);
