// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants and the provider configuration.

use serde::Deserialize;
use std::time::Duration;

const MEGABYTE: u64 = 1024 * 1024;

/// Logical page size served to clients (and the unit of the health tracker).
pub const PAGE_SIZE: u64 = 4096;

/// Physical size of one ECC-protected page: 8 data bytes + 1 check byte per word.
pub const ECC_PAGE_SIZE: u64 = PAGE_SIZE * 9 / 8;

/// Size of one TOC region on flash.
pub const TOC_SIZE: u64 = 0x8000;

/// Content of an erased flash byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// Number of redundant sides in a PNOR image.
pub const NUM_SIDES: usize = 2;

/// How the image is spread over physical chips.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlashGeometry {
    pub chip_size: u64,
    pub chip_count: u32,
}

impl FlashGeometry {
    pub fn total_size(&self) -> u64 {
        self.chip_size * self.chip_count as u64
    }

    /// Splits an absolute image offset into (chip, offset inside chip).
    pub fn locate(&self, offset: u64) -> Option<(u32, u64)> {
        if self.chip_size == 0 || offset >= self.total_size() {
            return None;
        }
        Some(((offset / self.chip_size) as u32, offset % self.chip_size))
    }

    /// Inverse of [`FlashGeometry::locate`].
    pub fn absolute(&self, chip: u32, offset: u64) -> u64 {
        chip as u64 * self.chip_size + offset
    }
}

impl Default for FlashGeometry {
    fn default() -> Self {
        Self {
            chip_size: 64 * MEGABYTE,
            chip_count: 1,
        }
    }
}

/// The virtual range reserved for the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VirtualWindow {
    pub base: u64,
    pub size: u64,
}

impl VirtualWindow {
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    pub fn contains(&self, vaddr: u64) -> bool {
        vaddr >= self.base && vaddr < self.end()
    }
}

impl Default for VirtualWindow {
    fn default() -> Self {
        Self {
            base: 0x8000_0000,
            size: 64 * MEGABYTE,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PnorConfig {
    pub geometry: FlashGeometry,
    /// Size of one side; side A starts at 0, side B at `side_size`.
    pub side_size: u64,
    /// Offset of the backup TOC relative to the start of its side.
    pub backup_toc_offset: u64,
    pub window: VirtualWindow,
    /// Deadline for a single client request. `None` blocks until served.
    pub request_timeout: Option<Duration>,
}

impl PnorConfig {
    /// Start of the side with the given index.
    pub fn side_base(&self, index: usize) -> u64 {
        index as u64 * self.side_size
    }
}

impl Default for PnorConfig {
    fn default() -> Self {
        let side_size = 32 * MEGABYTE;
        Self {
            geometry: FlashGeometry::default(),
            side_size,
            backup_toc_offset: side_size - TOC_SIZE,
            window: VirtualWindow::default(),
            request_timeout: None,
        }
    }
}

/// Values handed over by the boot loader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct BootInfo {
    /// Physical offset of the HBB section the system booted from.
    pub hbb_offset: u64,
}
