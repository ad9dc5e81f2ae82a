// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Whole-section maintenance: erase and ECC scrub.

use serde::Serialize;

use super::SectionInfo;
use crate::config::{ERASED_BYTE, PAGE_SIZE};
use crate::device::{DeviceIo, FlashDevice};
use crate::ecc::{EccCodec, EccStatus};
use crate::error::{PnorError, Result};
use crate::types::SectionId;

/// Result of an ECC scrub. Offsets are absolute physical page offsets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EccRepair {
    pub section: SectionId,
    pub pages_scanned: u64,
    pub corrected: Vec<u64>,
    pub uncorrectable: Vec<u64>,
    /// Correctable pages whose rewrite failed; still correctable on read.
    pub unrepaired: Vec<u64>,
}

impl EccRepair {
    pub fn new(section: SectionId) -> Self {
        Self {
            section,
            pages_scanned: 0,
            corrected: Vec::new(),
            uncorrectable: Vec::new(),
            unrepaired: Vec::new(),
        }
    }

    /// Nothing was broken.
    pub fn is_clean(&self) -> bool {
        self.corrected.is_empty() && self.uncorrectable.is_empty() && self.unrepaired.is_empty()
    }

    /// Every page is readable and carries good ECC.
    pub fn is_complete(&self) -> bool {
        self.uncorrectable.is_empty() && self.unrepaired.is_empty()
    }
}

/// Overwrites every page with the erased pattern, with valid ECC where the
/// section carries it.
pub fn clear_section<D: FlashDevice, E: EccCodec>(io: &mut DeviceIo<D, E>, section: &SectionInfo) -> Result<()> {
    if section.read_only {
        return Err(PnorError::PermissionDenied(section.id));
    }
    let fill = vec![ERASED_BYTE; PAGE_SIZE as usize];
    for offset in section.page_offsets() {
        let addr = io.locate(offset, section.ecc)?;
        io.write_page(addr, &fill)?;
    }
    tracing::info!("cleared section {} on side {}", section.id, section.side);
    Ok(())
}

/// Rewrites every page that needed a correction with fresh ECC. Pages that
/// cannot be corrected, or whose rewrite failed, are listed in the report,
/// which then comes back as [`PnorError::RepairIncomplete`]. Only a shutdown
/// stops the scan early.
pub fn fix_ecc<D: FlashDevice, E: EccCodec>(io: &mut DeviceIo<D, E>, section: &SectionInfo) -> Result<EccRepair> {
    let mut report = EccRepair::new(section.id);
    if !section.ecc {
        return Ok(report);
    }

    for offset in section.page_offsets() {
        let addr = io.locate(offset, true)?;
        report.pages_scanned += 1;
        match io.read_page(addr) {
            Ok((_, EccStatus::Clean)) => {}
            Ok((data, EccStatus::Corrected)) => match io.write_page(addr, &data) {
                Ok(()) => report.corrected.push(offset),
                Err(PnorError::ShutdownInProgress) => return Err(PnorError::ShutdownInProgress),
                Err(e) => {
                    tracing::warn!("rewrite of corrected page {:#x} failed: {}", offset, e);
                    report.unrepaired.push(offset);
                }
            },
            Ok((_, EccStatus::Uncorrectable))
            | Err(PnorError::Uncorrectable { .. })
            | Err(PnorError::DeviceReadFailure { .. }) => {
                report.uncorrectable.push(offset);
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        "ECC scrub of {}: {} pages, {} corrected, {} uncorrectable, {} not rewritten",
        section.id,
        report.pages_scanned,
        report.corrected.len(),
        report.uncorrectable.len(),
        report.unrepaired.len()
    );
    if report.is_complete() {
        Ok(report)
    } else {
        Err(PnorError::RepairIncomplete(report))
    }
}
