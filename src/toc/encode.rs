// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! TOC encoding.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use super::{checksum, TocError, TocRecord, ENTRY_SIZE, MAGIC, MAX_ENTRIES, VERSION};

fn write_body<W: Write>(w: &mut W, record: &TocRecord) -> std::io::Result<()> {
    let header = &record.header;
    w.write_u32::<BigEndian>(MAGIC)?;
    w.write_u32::<BigEndian>(VERSION)?;
    w.write_u32::<BigEndian>(ENTRY_SIZE as u32)?;
    w.write_u32::<BigEndian>(record.entries.len() as u32)?;
    w.write_u32::<BigEndian>(header.block_size)?;
    w.write_u32::<BigEndian>(header.block_count)?;
    w.write_u32::<BigEndian>(header.flags.bits())?;
    w.write_u32::<BigEndian>(0)?;
    for side in &header.sides {
        w.write_u64::<BigEndian>(side.primary)?;
        w.write_u64::<BigEndian>(side.backup)?;
    }

    for entry in &record.entries {
        w.write_all(&entry.name)?;
        w.write_u64::<BigEndian>(entry.offset)?;
        w.write_u64::<BigEndian>(entry.length)?;
        w.write_u32::<BigEndian>(entry.flags.bits())?;
        w.write_all(&[0u8; 12])?;
    }
    Ok(())
}

/// Serializes a record, checksum included.
pub fn encode_toc(record: &TocRecord) -> Result<Vec<u8>, TocError> {
    if record.entries.len() > MAX_ENTRIES {
        return Err(TocError::TooManyEntries(record.entries.len() as u32));
    }
    let mut buf = Vec::with_capacity(record.encoded_len());
    write_body(&mut buf, record)?;
    let sum = checksum(&buf);
    buf.write_u64::<BigEndian>(sum)?;
    Ok(buf)
}
