// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Physical flash access.

pub mod io;
pub mod mem;

pub use io::{DeviceIo, ShutdownFlag};
pub use mem::MemFlash;

use serde::Serialize;
use std::io::Result;

/// A set of flash chips addressed by (chip, byte offset).
///
/// Implementations only move bytes; ECC, health accounting and the shutdown
/// gate live in [`DeviceIo`].
pub trait FlashDevice: Send {
    fn read(&mut self, chip: u32, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn write(&mut self, chip: u32, offset: u64, data: &[u8]) -> Result<()>;
}

impl<T: FlashDevice + ?Sized> FlashDevice for Box<T> {
    fn read(&mut self, chip: u32, offset: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read(chip, offset, buf)
    }

    fn write(&mut self, chip: u32, offset: u64, data: &[u8]) -> Result<()> {
        (**self).write(chip, offset, data)
    }
}

/// Device coordinates of one page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct PhysAddr {
    pub chip: u32,
    /// Byte offset inside `chip`.
    pub offset: u64,
    /// Page carries ECC check bytes.
    pub ecc: bool,
}
