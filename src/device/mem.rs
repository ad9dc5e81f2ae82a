// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory flash.
//!
//! Clones share the same storage, so a test can keep a handle to flip bits or
//! inject faults after the device moved into the provider.

use rustc_hash::FxHashSet;
use std::io::{self, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::FlashDevice;
use crate::config::{FlashGeometry, ERASED_BYTE};

#[derive(Debug, Default)]
struct Chips {
    data: Vec<Vec<u8>>,
    read_faults: FxHashSet<(u32, u64)>,
    write_faults: FxHashSet<(u32, u64)>,
    writes: u64,
}

#[derive(Clone, Debug)]
pub struct MemFlash {
    geometry: FlashGeometry,
    chips: Arc<Mutex<Chips>>,
}

impl MemFlash {
    /// Fully erased device.
    pub fn new(geometry: FlashGeometry) -> Self {
        let data = (0..geometry.chip_count)
            .map(|_| vec![ERASED_BYTE; geometry.chip_size as usize])
            .collect();
        Self {
            geometry,
            chips: Arc::new(Mutex::new(Chips {
                data,
                ..Chips::default()
            })),
        }
    }

    /// Device holding `image` from offset 0, erased past its end.
    pub fn from_image(geometry: FlashGeometry, image: &[u8]) -> Self {
        let flash = Self::new(geometry);
        flash.poke(0, image);
        flash
    }

    fn lock(&self) -> MutexGuard<'_, Chips> {
        self.chips.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    /// Reads raw bytes at an absolute offset, bypassing fault injection.
    pub fn peek(&self, offset: u64, len: usize) -> Vec<u8> {
        let chips = self.lock();
        let mut out = Vec::with_capacity(len);
        for abs in offset..offset + len as u64 {
            let (chip, off) = self
                .geometry
                .locate(abs)
                .unwrap_or_else(|| panic!("peek past end of flash at {abs:#x}"));
            out.push(chips.data[chip as usize][off as usize]);
        }
        out
    }

    /// Writes raw bytes at an absolute offset, bypassing fault injection.
    pub fn poke(&self, offset: u64, bytes: &[u8]) {
        let mut chips = self.lock();
        for (i, &b) in bytes.iter().enumerate() {
            let abs = offset + i as u64;
            let (chip, off) = self
                .geometry
                .locate(abs)
                .unwrap_or_else(|| panic!("poke past end of flash at {abs:#x}"));
            chips.data[chip as usize][off as usize] = b;
        }
    }

    /// Flips one bit of the byte at an absolute offset.
    pub fn flip_bit(&self, offset: u64, bit: u8) {
        let byte = self.peek(offset, 1)[0];
        self.poke(offset, &[byte ^ (1 << (bit & 7))]);
    }

    /// Makes every read starting at (chip, offset) fail.
    pub fn fail_reads_at(&self, chip: u32, offset: u64) {
        self.lock().read_faults.insert((chip, offset));
    }

    /// Makes every write starting at (chip, offset) fail.
    pub fn fail_writes_at(&self, chip: u32, offset: u64) {
        self.lock().write_faults.insert((chip, offset));
    }

    pub fn clear_faults(&self) {
        let mut chips = self.lock();
        chips.read_faults.clear();
        chips.write_faults.clear();
    }

    /// Number of writes that reached the device.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    fn span(&self, chip: u32, offset: u64, len: usize) -> Result<(usize, usize)> {
        let end = offset + len as u64;
        if chip >= self.geometry.chip_count || end > self.geometry.chip_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("access {offset:#x}+{len:#x} outside chip {chip}"),
            ));
        }
        Ok((offset as usize, end as usize))
    }
}

impl FlashDevice for MemFlash {
    fn read(&mut self, chip: u32, offset: u64, buf: &mut [u8]) -> Result<()> {
        let (start, end) = self.span(chip, offset, buf.len())?;
        let chips = self.lock();
        if chips.read_faults.contains(&(chip, offset)) {
            return Err(io::Error::other("injected read fault"));
        }
        buf.copy_from_slice(&chips.data[chip as usize][start..end]);
        Ok(())
    }

    fn write(&mut self, chip: u32, offset: u64, data: &[u8]) -> Result<()> {
        let (start, end) = self.span(chip, offset, data.len())?;
        let mut chips = self.lock();
        if chips.write_faults.contains(&(chip, offset)) {
            return Err(io::Error::other("injected write fault"));
        }
        chips.data[chip as usize][start..end].copy_from_slice(data);
        chips.writes += 1;
        Ok(())
    }
}
