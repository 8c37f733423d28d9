//! Unit buffers
//!
//! A [`UnitBuffer`] holds one discrete unit of media: a compressed packet
//! or a decoded audio/video frame. Buffers are reused across reads, so
//! capacity only ever grows; [`UnitBuffer::reset`] clears length and
//! metadata while keeping the backing storage.

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Per-unit flag bits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitFlags(u32);

impl UnitFlags {
    /// No flags set
    pub const NONE: Self = Self(0);
    /// Unit can be decoded without earlier units
    pub const KEYFRAME: Self = Self(1 << 0);
    /// Timestamps jump before this unit
    pub const DISCONTINUITY: Self = Self(1 << 1);
    /// Payload is known to be damaged
    pub const CORRUPT: Self = Self(1 << 2);
    /// Last unit of a segment (e.g. a field pair or an access unit)
    pub const SEGMENT_END: Self = Self(1 << 3);

    /// Raw bit value
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if every bit of `other` is set
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for UnitFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Side metadata carried next to the payload, like a packet header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitMeta {
    /// Presentation timestamp in the stream's timescale
    pub pts: Option<i64>,
    /// Duration in the stream's timescale
    pub duration: Option<i64>,
    /// Flag bits
    pub flags: UnitFlags,
    /// Logical stream the unit belongs to when an upstream multiplexes
    pub stream_index: usize,
}

/// Reusable container for one media unit
#[derive(Debug, Default)]
pub struct UnitBuffer {
    data: BytesMut,
    meta: UnitMeta,
}

impl UnitBuffer {
    /// Create an empty buffer with no storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            meta: UnitMeta::default(),
        }
    }

    /// Create a buffer holding a copy of `payload`
    pub fn from_slice(payload: &[u8]) -> Self {
        let mut unit = Self::with_capacity(payload.len());
        unit.data.extend_from_slice(payload);
        unit
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes the buffer can hold without reallocating
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Start of the backing storage, for identity checks
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable payload bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Side metadata
    pub fn meta(&self) -> &UnitMeta {
        &self.meta
    }

    /// Mutable side metadata
    pub fn meta_mut(&mut self) -> &mut UnitMeta {
        &mut self.meta
    }

    /// Replace the side metadata
    pub fn set_meta(&mut self, meta: UnitMeta) {
        self.meta = meta;
    }

    /// Clear payload and metadata, keeping the storage
    pub fn reset(&mut self) {
        self.data.clear();
        self.meta = UnitMeta::default();
    }

    /// Make sure at least `additional` more bytes fit without reallocating
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    /// Set the payload length, zero-filling any new bytes
    pub fn resize(&mut self, len: usize) {
        self.data.resize(len, 0);
    }

    /// Append bytes to the payload
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Replace the payload with a copy of `bytes`; metadata is untouched
    pub fn set_data(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }

    /// Make this buffer an exact copy of `other`, payload and metadata
    pub fn copy_from(&mut self, other: &UnitBuffer) {
        self.set_data(other.data());
        self.meta = other.meta;
    }

    /// Copy the payload into an immutable shared handle
    ///
    /// Used to hand finished units to consumers that outlive the read,
    /// such as a serving layer.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.data)
    }
}

impl Clone for UnitBuffer {
    fn clone(&self) -> Self {
        let mut unit = Self::with_capacity(self.capacity());
        unit.copy_from(self);
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_capacity() {
        let mut unit = UnitBuffer::from_slice(&[7u8; 512]);
        unit.meta_mut().pts = Some(90);
        let capacity = unit.capacity();

        unit.reset();

        assert!(unit.is_empty());
        assert_eq!(unit.meta(), &UnitMeta::default());
        assert_eq!(unit.capacity(), capacity);
    }

    #[test]
    fn test_refill_within_capacity_does_not_reallocate() {
        let mut unit = UnitBuffer::with_capacity(1024);
        unit.set_data(&[1u8; 1024]);
        let ptr = unit.as_ptr();

        for len in [0usize, 1, 188, 1023, 1024] {
            unit.reset();
            unit.set_data(&vec![3u8; len]);
            assert_eq!(unit.as_ptr(), ptr, "reallocated at length {}", len);
            assert_eq!(unit.len(), len);
        }
    }

    #[test]
    fn test_capacity_grows() {
        let mut unit = UnitBuffer::with_capacity(16);
        unit.set_data(&[0u8; 4096]);
        assert!(unit.capacity() >= 4096);
        unit.set_data(&[0u8; 8]);
        assert!(unit.capacity() >= 4096);
    }

    #[test]
    fn test_flags() {
        let mut flags = UnitFlags::KEYFRAME | UnitFlags::DISCONTINUITY;
        assert!(flags.contains(UnitFlags::KEYFRAME));
        flags.remove(UnitFlags::KEYFRAME);
        assert!(!flags.contains(UnitFlags::KEYFRAME));
        assert!(flags.contains(UnitFlags::DISCONTINUITY));
        flags.insert(UnitFlags::CORRUPT);
        assert_eq!(flags.bits(), 0b110);
    }

    #[test]
    fn test_to_bytes_is_detached() {
        let mut unit = UnitBuffer::from_slice(b"abc");
        let frozen = unit.to_bytes();
        unit.data_mut()[0] = b'x';
        assert_eq!(&frozen[..], b"abc");
    }
}
