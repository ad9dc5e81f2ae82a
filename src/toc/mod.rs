// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-flash table of contents.
//!
//! A record is a 64 byte header, `entry_count` fixed size entries and a
//! trailing CRC-64 over everything before it. All integers are big-endian.

pub mod decode;
pub mod encode;
pub mod validate;

pub use decode::decode_toc;
pub use encode::encode_toc;
pub use validate::{TocValidator, ValidatedToc};

use thiserror::Error;

use crate::config::{NUM_SIDES, TOC_SIZE};
use crate::types::section::NAME_LEN;
use crate::types::{SectionId, TocOffsets};

pub const MAGIC: u32 = 0x5041_5254; // "PART"
pub const VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 64;
pub const ENTRY_SIZE: usize = 48;
pub const CHECKSUM_SIZE: usize = 8;

/// Entries that fit into one TOC region.
pub const MAX_ENTRIES: usize = (TOC_SIZE as usize - HEADER_SIZE - CHECKSUM_SIZE) / ENTRY_SIZE;

bitflags::bitflags! {
    /// Per-entry flags.
    pub struct EntryFlags: u32 {
        const ECC = 1 << 0;
        const READ_ONLY = 1 << 1;
        const PRESERVED = 1 << 2;
        const VOLATILE = 1 << 3;
        const CLEAR_ON_ECC_ERR = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Header flags.
    pub struct SideFlags: u32 {
        const GOLDEN = 1 << 0;
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TocError {
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported version {0}")]
    UnsupportedVersion(u32),
    #[error("entry size {0} does not match {ENTRY_SIZE}")]
    EntrySize(u32),
    #[error("{0} entries do not fit in a TOC region")]
    TooManyEntries(u32),
    #[error("record truncated")]
    Truncated,
    #[error("checksum mismatch: expected {expected:#018x}, found {found:#018x}")]
    ChecksumMismatch { expected: u64, found: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocHeader {
    pub block_size: u32,
    pub block_count: u32,
    pub flags: SideFlags,
    /// TOC locations of both sides as known to this copy.
    pub sides: [TocOffsets; NUM_SIDES],
}

impl TocHeader {
    /// Size of the side image this TOC describes.
    pub fn image_size(&self) -> u64 {
        self.block_size as u64 * self.block_count as u64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub name: [u8; NAME_LEN],
    /// Absolute physical offset.
    pub offset: u64,
    /// Physical length including ECC bytes.
    pub length: u64,
    pub flags: EntryFlags,
}

impl TocEntry {
    pub fn new(id: SectionId, offset: u64, length: u64, flags: EntryFlags) -> Self {
        Self {
            name: id.raw_name(),
            offset,
            length,
            flags,
        }
    }

    pub fn section(&self) -> Option<SectionId> {
        SectionId::from_raw_name(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocRecord {
    pub header: TocHeader,
    pub entries: Vec<TocEntry>,
}

impl TocRecord {
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.entries.len() * ENTRY_SIZE + CHECKSUM_SIZE
    }
}

pub(crate) fn checksum(bytes: &[u8]) -> u64 {
    let mut digest = crc64fast::Digest::new();
    digest.write(bytes);
    digest.sum64()
}
