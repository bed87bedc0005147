//! # keydesc — search-key descriptors and normalization
//!
//! A *search key* is built by concatenating one or more *segments* cut out of
//! a record payload. Each segment names a byte window (`offset`, `size`) and a
//! type; the segment bytes are rewritten — *normalized* — so that a plain
//! byte-wise comparison of two stored keys orders them naturally:
//!
//! | type | size | transform |
//! |------|------|-----------|
//! | `Byte` | ≥ 1 | identity (already lexicographic) |
//! | `U16`/`U32` | 2 / 4 | native byte order → big-endian |
//! | `S16`/`S32` | 2 / 4 | add sign bias (`0x8000` / `0x8000_0000`), then big-endian |
//!
//! The sign bias maps the two's-complement range onto an unsigned range with
//! the same order, so normalized keys compare correctly across signs and
//! across host endianness.
//!
//! This crate also owns the wire form of descriptors as stored in the
//! database file: each descriptor is a little-endian `u16` segment count
//! followed by 4 bytes per segment (`offset: u16 LE, type: u8, size: u8`).

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Bytes one segment occupies in the descriptor block.
pub const SEGMENT_WIRE_BYTES: usize = 4;

/// Segment type discriminants are part of the file format; the wire values
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SegmentType {
    Byte = 1,
    S16 = 2,
    U16 = 3,
    S32 = 4,
    U32 = 5,
}

impl SegmentType {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(SegmentType::Byte),
            2 => Some(SegmentType::S16),
            3 => Some(SegmentType::U16),
            4 => Some(SegmentType::S32),
            5 => Some(SegmentType::U32),
            _ => None,
        }
    }

    /// The mandatory segment size for fixed-width types; `None` for `Byte`,
    /// which accepts any size above zero.
    pub fn fixed_size(self) -> Option<u8> {
        match self {
            SegmentType::Byte => None,
            SegmentType::S16 | SegmentType::U16 => Some(2),
            SegmentType::S32 | SegmentType::U32 => Some(4),
        }
    }
}

/// One slice of the record payload contributing to a search key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySegment {
    /// Byte offset of the segment within the record payload buffer.
    pub offset: u16,
    pub ty: SegmentType,
    /// Segment size in bytes.
    pub size: u8,
}

impl KeySegment {
    pub fn new(offset: u16, ty: SegmentType, size: u8) -> Self {
        Self { offset, ty, size }
    }

    pub fn encode(&self, out: &mut [u8]) {
        LittleEndian::write_u16(&mut out[0..2], self.offset);
        out[2] = self.ty as u8;
        out[3] = self.size;
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, KeyDescError> {
        let ty = SegmentType::from_raw(bytes[2]).ok_or(KeyDescError::UnknownType(bytes[2]))?;
        Ok(Self {
            offset: LittleEndian::read_u16(&bytes[0..2]),
            ty,
            size: bytes[3],
        })
    }
}

/// The segment list defining one search key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    pub segments: Vec<KeySegment>,
}

impl KeyDescriptor {
    pub fn new(segments: Vec<KeySegment>) -> Self {
        Self { segments }
    }

    /// Sum of the segment sizes — the width of this key inside an index slot.
    pub fn key_size(&self) -> u16 {
        self.segments.iter().map(|s| u16::from(s.size)).sum()
    }

    /// Bytes this descriptor occupies on disk (`u16` count + segments).
    pub fn wire_bytes(&self) -> u16 {
        2 + (self.segments.len() * SEGMENT_WIRE_BYTES) as u16
    }

    /// Appends the wire form (`u16 LE` count, then each segment) to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let mut count = [0u8; 2];
        LittleEndian::write_u16(&mut count, self.segments.len() as u16);
        out.extend_from_slice(&count);
        for segment in &self.segments {
            let mut wire = [0u8; SEGMENT_WIRE_BYTES];
            segment.encode(&mut wire);
            out.extend_from_slice(&wire);
        }
    }

    /// Decodes `nr_of_segments` segments from `bytes`
    /// (`nr_of_segments * SEGMENT_WIRE_BYTES` long).
    pub fn decode_segments(nr_of_segments: u16, bytes: &[u8]) -> Result<Self, KeyDescError> {
        let mut segments = Vec::with_capacity(usize::from(nr_of_segments));
        for chunk in bytes
            .chunks_exact(SEGMENT_WIRE_BYTES)
            .take(usize::from(nr_of_segments))
        {
            segments.push(KeySegment::decode(chunk)?);
        }
        if segments.len() != usize::from(nr_of_segments) {
            return Err(KeyDescError::Truncated);
        }
        Ok(Self { segments })
    }
}

/// Sizes derived from a validated descriptor set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorLayout {
    /// Bytes the whole descriptor block occupies on disk.
    pub descriptor_bytes: u16,
    /// Sum of every segment size across all keys.
    pub total_key_size: u16,
}

/// Errors raised by descriptor validation and decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyDescError {
    #[error("no key descriptors given")]
    Empty,

    #[error("unknown segment type {0}")]
    UnknownType(u8),

    #[error("key {key}: segment {segment} size {size} does not match its type")]
    SizeMismatch { key: u16, segment: u16, size: u8 },

    #[error("key {key}: segments {a} and {b} overlap in the payload")]
    Overlap { key: u16, a: u16, b: u16 },

    #[error("truncated descriptor block")]
    Truncated,
}

/// Validates a descriptor set and computes its on-disk layout.
///
/// A descriptor is valid when every segment size matches its type and no two
/// segments *within the same key* overlap in the payload. Segments of
/// different keys may overlap freely — two keys indexing the same field is
/// normal.
///
/// Overlap is checked on half-open byte intervals
/// (`a.start < b.end && b.start < a.end`), which also rejects full
/// containment.
pub fn validate(descriptors: &[KeyDescriptor]) -> Result<DescriptorLayout, KeyDescError> {
    if descriptors.is_empty() {
        return Err(KeyDescError::Empty);
    }

    let mut descriptor_bytes: u16 = 0;
    let mut total_key_size: u16 = 0;

    for (key, descriptor) in descriptors.iter().enumerate() {
        let key = key as u16;
        descriptor_bytes += descriptor.wire_bytes();
        total_key_size += descriptor.key_size();

        for (j, segment) in descriptor.segments.iter().enumerate() {
            match segment.ty.fixed_size() {
                None if segment.size > 0 => {}
                Some(required) if segment.size == required => {}
                _ => {
                    return Err(KeyDescError::SizeMismatch {
                        key,
                        segment: j as u16,
                        size: segment.size,
                    });
                }
            }

            let start = u32::from(segment.offset);
            let end = start + u32::from(segment.size);

            for (k, other) in descriptor.segments.iter().enumerate().skip(j + 1) {
                let other_start = u32::from(other.offset);
                let other_end = other_start + u32::from(other.size);
                if start < other_end && other_start < end {
                    return Err(KeyDescError::Overlap {
                        key,
                        a: j as u16,
                        b: k as u16,
                    });
                }
            }
        }
    }

    Ok(DescriptorLayout {
        descriptor_bytes,
        total_key_size,
    })
}

/// Rewrites one segment in place into its memcmp-ordered form.
///
/// `bytes` must be exactly the segment's width for the fixed-width types;
/// `Byte` segments pass through untouched.
pub fn normalize_segment(bytes: &mut [u8], ty: SegmentType) {
    match ty {
        SegmentType::Byte => {}
        SegmentType::U16 => {
            let value = u16::from_ne_bytes([bytes[0], bytes[1]]);
            bytes.copy_from_slice(&value.to_be_bytes());
        }
        SegmentType::S16 => {
            let value = u16::from_ne_bytes([bytes[0], bytes[1]]).wrapping_add(0x8000);
            bytes.copy_from_slice(&value.to_be_bytes());
        }
        SegmentType::U32 => {
            let value = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            bytes.copy_from_slice(&value.to_be_bytes());
        }
        SegmentType::S32 => {
            let value = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                .wrapping_add(0x8000_0000);
            bytes.copy_from_slice(&value.to_be_bytes());
        }
    }
}
