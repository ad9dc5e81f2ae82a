// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Page ECC.
//!
//! Every 8 data bytes on flash are followed by one check byte. The code is a
//! SEC-DED Hsiao (72,64) code: any single bit flip in the 9 bytes is
//! corrected, any double flip is detected.
//!
//! The column set is picked so that the check byte of an all-`0xFF` word is
//! `0xFF` as well. A freshly erased page therefore decodes clean.

use serde::Serialize;

use crate::config::{ECC_PAGE_SIZE, PAGE_SIZE};

/// Outcome of decoding ECC protected data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum EccStatus {
    Clean,
    Corrected,
    Uncorrectable,
}

/// Encodes and decodes the redundancy of one page.
pub trait EccCodec: Send {
    /// `raw` must be `data.len() * 9 / 8` bytes long.
    fn encode(&self, data: &[u8], raw: &mut [u8]);

    /// Writes the (possibly corrected) data to `data` and reports the worst
    /// status seen over all words.
    fn decode(&self, raw: &[u8], data: &mut [u8]) -> EccStatus;

    fn encode_page(&self, data: &[u8]) -> Vec<u8> {
        let mut raw = vec![0u8; data.len() / 8 * 9];
        self.encode(data, &mut raw);
        raw
    }

    fn decode_page(&self, raw: &[u8]) -> (Vec<u8>, EccStatus) {
        let mut data = vec![0u8; raw.len() / 9 * 8];
        let status = self.decode(raw, &mut data);
        (data, status)
    }
}

// Columns 0..56 are all weight-3 bytes, 56..64 are weight-5 bytes whose XOR is zero.
const COLUMNS: [u8; 64] = [
    0x07, 0x0b, 0x0d, 0x0e, 0x13, 0x15, 0x16, 0x19,
    0x1a, 0x1c, 0x23, 0x25, 0x26, 0x29, 0x2a, 0x2c,
    0x31, 0x32, 0x34, 0x38, 0x43, 0x45, 0x46, 0x49,
    0x4a, 0x4c, 0x51, 0x52, 0x54, 0x58, 0x61, 0x62,
    0x64, 0x68, 0x70, 0x83, 0x85, 0x86, 0x89, 0x8a,
    0x8c, 0x91, 0x92, 0x94, 0x98, 0xa1, 0xa2, 0xa4,
    0xa8, 0xb0, 0xc1, 0xc2, 0xc4, 0xc8, 0xd0, 0xe0,
    0x1f, 0x2f, 0x37, 0x3b, 0x3d, 0x3e, 0xc7, 0xf8,
];

/// Check byte for one 64-bit word.
pub fn generate(word: u64) -> u8 {
    let mut ecc = 0u8;
    let mut bits = word;
    while bits != 0 {
        let bit = bits.trailing_zeros() as usize;
        ecc ^= COLUMNS[bit];
        bits &= bits - 1;
    }
    ecc
}

/// Verifies one word against its check byte, fixing a single flipped bit.
pub fn correct(word: u64, ecc: u8) -> (u64, EccStatus) {
    let syndrome = generate(word) ^ ecc;
    if syndrome == 0 {
        return (word, EccStatus::Clean);
    }
    // flipped check bit, data is intact
    if syndrome.count_ones() == 1 {
        return (word, EccStatus::Corrected);
    }
    match COLUMNS.iter().position(|&c| c == syndrome) {
        Some(bit) => (word ^ (1u64 << bit), EccStatus::Corrected),
        None => (word, EccStatus::Uncorrectable),
    }
}

/// The codec used on PNOR.
#[derive(Clone, Copy, Debug, Default)]
pub struct PnorEcc;

impl EccCodec for PnorEcc {
    fn encode(&self, data: &[u8], raw: &mut [u8]) {
        for (word, out) in data.chunks_exact(8).zip(raw.chunks_exact_mut(9)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(word);
            out[..8].copy_from_slice(word);
            out[8] = generate(u64::from_be_bytes(bytes));
        }
    }

    fn decode(&self, raw: &[u8], data: &mut [u8]) -> EccStatus {
        let mut status = EccStatus::Clean;
        for (chunk, out) in raw.chunks_exact(9).zip(data.chunks_exact_mut(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&chunk[..8]);
            let (word, word_status) = correct(u64::from_be_bytes(bytes), chunk[8]);
            out.copy_from_slice(&word.to_be_bytes());
            status = status.max(word_status);
        }
        status
    }
}

/// Physical size of a page for a section with or without ECC.
pub fn physical_page_size(ecc: bool) -> u64 {
    if ecc {
        ECC_PAGE_SIZE
    } else {
        PAGE_SIZE
    }
}

/// Logical bytes held by `physical` bytes of a section.
pub fn logical_size(physical: u64, ecc: bool) -> u64 {
    if ecc {
        physical / 9 * 8
    } else {
        physical
    }
}
