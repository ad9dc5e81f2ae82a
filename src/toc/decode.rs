// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! TOC decoding.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use super::{
    checksum, EntryFlags, SideFlags, TocEntry, TocError, TocHeader, TocRecord, CHECKSUM_SIZE,
    ENTRY_SIZE, HEADER_SIZE, MAGIC, MAX_ENTRIES, VERSION,
};
use crate::types::section::NAME_LEN;
use crate::types::TocOffsets;

impl From<std::io::Error> for TocError {
    fn from(_: std::io::Error) -> Self {
        TocError::Truncated
    }
}

/// Parses and validates a record from the start of `buf`. Trailing bytes
/// past the checksum (the rest of the TOC region) are ignored.
pub fn decode_toc(buf: &[u8]) -> Result<TocRecord, TocError> {
    let mut cur = Cursor::new(buf);

    let magic = cur.read_u32::<BigEndian>()?;
    if magic != MAGIC {
        return Err(TocError::BadMagic(magic));
    }
    let version = cur.read_u32::<BigEndian>()?;
    if version != VERSION {
        return Err(TocError::UnsupportedVersion(version));
    }
    let entry_size = cur.read_u32::<BigEndian>()?;
    if entry_size as usize != ENTRY_SIZE {
        return Err(TocError::EntrySize(entry_size));
    }
    let entry_count = cur.read_u32::<BigEndian>()?;
    if entry_count as usize > MAX_ENTRIES {
        return Err(TocError::TooManyEntries(entry_count));
    }

    // checksum first: nothing below is trusted before it matches
    let body_len = HEADER_SIZE + entry_count as usize * ENTRY_SIZE;
    if buf.len() < body_len + CHECKSUM_SIZE {
        return Err(TocError::Truncated);
    }
    let mut stored = [0u8; CHECKSUM_SIZE];
    stored.copy_from_slice(&buf[body_len..body_len + CHECKSUM_SIZE]);
    let expected = u64::from_be_bytes(stored);
    let found = checksum(&buf[..body_len]);
    if expected != found {
        return Err(TocError::ChecksumMismatch { expected, found });
    }

    let block_size = cur.read_u32::<BigEndian>()?;
    let block_count = cur.read_u32::<BigEndian>()?;
    let flags = SideFlags::from_bits_truncate(cur.read_u32::<BigEndian>()?);
    let _reserved = cur.read_u32::<BigEndian>()?;
    let mut sides = [TocOffsets::default(); 2];
    for side in sides.iter_mut() {
        side.primary = cur.read_u64::<BigEndian>()?;
        side.backup = cur.read_u64::<BigEndian>()?;
    }

    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let mut name = [0u8; NAME_LEN];
        cur.read_exact(&mut name)?;
        let offset = cur.read_u64::<BigEndian>()?;
        let length = cur.read_u64::<BigEndian>()?;
        let flags = EntryFlags::from_bits_truncate(cur.read_u32::<BigEndian>()?);
        let mut reserved = [0u8; 12];
        cur.read_exact(&mut reserved)?;
        entries.push(TocEntry {
            name,
            offset,
            length,
            flags,
        });
    }

    Ok(TocRecord {
        header: TocHeader {
            block_size,
            block_count,
            flags,
            sides,
        },
        entries,
    })
}
