// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! PNOR image file exposed as a flash device.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use memmap2::MmapMut;
use pnor_rp::device::FlashDevice;
use pnor_rp::FlashGeometry;

/// A writable mapping of an image file. Chips are laid out back to back.
pub struct MmapFlash {
    map: MmapMut,
    geometry: FlashGeometry,
}

impl MmapFlash {
    pub fn open(path: &Path, geometry: FlashGeometry) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open image {}", path.display()))?;
        let len = file.metadata()?.len();
        if len != geometry.total_size() {
            bail!(
                "image {} is {:#x} bytes, flash geometry expects {:#x}",
                path.display(),
                len,
                geometry.total_size()
            );
        }
        // SAFETY: the image is not resized while mapped; concurrent writers
        // from other processes are not supported.
        let map = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { map, geometry })
    }

    fn span(&self, chip: u32, offset: u64, len: usize) -> io::Result<std::ops::Range<usize>> {
        if chip >= self.geometry.chip_count || offset + len as u64 > self.geometry.chip_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("access {offset:#x}+{len:#x} outside chip {chip}"),
            ));
        }
        let start = self.geometry.absolute(chip, offset) as usize;
        Ok(start..start + len)
    }
}

impl FlashDevice for MmapFlash {
    fn read(&mut self, chip: u32, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = self.span(chip, offset, buf.len())?;
        buf.copy_from_slice(&self.map[range]);
        Ok(())
    }

    fn write(&mut self, chip: u32, offset: u64, data: &[u8]) -> io::Result<()> {
        let range = self.span(chip, offset, data.len())?;
        self.map[range.clone()].copy_from_slice(data);
        self.map.flush_range(range.start, range.len())
    }
}
