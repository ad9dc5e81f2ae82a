// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Page level device I/O with ECC, health accounting and the shutdown gate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{FlashDevice, PhysAddr};
use crate::config::{FlashGeometry, PAGE_SIZE};
use crate::ecc::{physical_page_size, EccCodec, EccStatus, PnorEcc};
use crate::error::{PnorError, Result};
use crate::health::FlashHealth;

/// Sticky flag raised by the shutdown notification.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The only path to the device. Owned by the coordinator thread.
pub struct DeviceIo<D, E = PnorEcc> {
    device: D,
    codec: E,
    geometry: FlashGeometry,
    health: Arc<FlashHealth>,
    shutdown: ShutdownFlag,
}

impl<D: FlashDevice, E: EccCodec> DeviceIo<D, E> {
    pub fn new(
        device: D,
        codec: E,
        geometry: FlashGeometry,
        health: Arc<FlashHealth>,
        shutdown: ShutdownFlag,
    ) -> Self {
        Self {
            device,
            codec,
            geometry,
            health,
            shutdown,
        }
    }

    pub fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    pub fn health(&self) -> &Arc<FlashHealth> {
        &self.health
    }

    /// Device coordinates of an absolute image offset.
    pub fn locate(&self, offset: u64, ecc: bool) -> Result<PhysAddr> {
        let (chip, offset_in_chip) = self
            .geometry
            .locate(offset)
            .ok_or(PnorError::InvalidAddress(offset))?;
        Ok(PhysAddr {
            chip,
            offset: offset_in_chip,
            ecc,
        })
    }

    /// Reads one logical page. A corrected read is counted and otherwise
    /// transparent; an uncorrectable one fails.
    pub fn read_page(&mut self, addr: PhysAddr) -> Result<(Vec<u8>, EccStatus)> {
        let mut raw = vec![0u8; physical_page_size(addr.ecc) as usize];
        self.device
            .read(addr.chip, addr.offset, &mut raw)
            .map_err(|e| {
                tracing::error!("PNOR read of chip {} at {:#x} failed: {}", addr.chip, addr.offset, e);
                PnorError::DeviceReadFailure {
                    chip: addr.chip,
                    offset: addr.offset,
                }
            })?;

        if !addr.ecc {
            return Ok((raw, EccStatus::Clean));
        }

        let (data, status) = self.codec.decode_page(&raw);
        match status {
            EccStatus::Clean => {}
            EccStatus::Corrected => {
                tracing::warn!("corrected ECC error on chip {} at {:#x}", addr.chip, addr.offset);
                self.health
                    .record_correction(self.geometry.absolute(addr.chip, addr.offset));
            }
            EccStatus::Uncorrectable => {
                tracing::error!("uncorrectable ECC error on chip {} at {:#x}", addr.chip, addr.offset);
                return Err(PnorError::Uncorrectable {
                    chip: addr.chip,
                    offset: addr.offset,
                });
            }
        }
        Ok((data, status))
    }

    /// Writes one logical page, adding fresh ECC when the page carries it.
    /// Refused once shutdown has been signalled.
    pub fn write_page(&mut self, addr: PhysAddr, data: &[u8]) -> Result<()> {
        if self.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        if data.len() as u64 != PAGE_SIZE {
            return Err(PnorError::InvalidRequest("page writes must be exactly one page"));
        }

        let abs = self.geometry.absolute(addr.chip, addr.offset);
        let raw = if addr.ecc {
            self.codec.encode_page(data)
        } else {
            data.to_vec()
        };

        // runs to completion; a failure leaves the page in an unknown state
        if let Err(e) = self.device.write(addr.chip, addr.offset, &raw) {
            tracing::error!("PNOR write of chip {} at {:#x} failed: {}", addr.chip, addr.offset, e);
            self.health.mark_unknown(abs);
            return Err(PnorError::DeviceWriteFailure {
                chip: addr.chip,
                offset: addr.offset,
            });
        }
        self.health.record_write(abs);
        Ok(())
    }

    /// Reads `len` raw bytes at an absolute image offset (TOC regions carry no ECC).
    pub fn read_raw(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let PhysAddr { chip, offset: chip_offset, .. } = self.locate(offset, false)?;
        let mut buf = vec![0u8; len];
        self.device
            .read(chip, chip_offset, &mut buf)
            .map_err(|e| {
                tracing::error!("PNOR raw read at {:#x} failed: {}", offset, e);
                PnorError::DeviceReadFailure {
                    chip,
                    offset: chip_offset,
                }
            })?;
        Ok(buf)
    }
}
