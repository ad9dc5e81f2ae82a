// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Locating and validating the TOC copies of each side.
//!
//! Each side carries a primary and a backup copy. The primary is preferred;
//! the backup is used only when the primary fails to read or validate. A
//! corrupt copy is never rewritten here.

use super::{decode_toc, TocRecord, HEADER_SIZE};
use crate::config::{BootInfo, PnorConfig, TOC_SIZE};
use crate::device::{DeviceIo, FlashDevice};
use crate::ecc::EccCodec;
use crate::error::{PnorError, StartupError};
use crate::hwp::DiagnosticBlob;
use crate::provider::state::StartupPhase;
use crate::types::{SideId, TocCopy, TocOffsets};

/// A TOC copy that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedToc {
    pub side: SideId,
    pub copy: TocCopy,
    pub offset: u64,
    pub record: TocRecord,
}

/// Where the TOCs live, as learned from the boot side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TocLocations {
    pub boot_side: SideId,
    pub sides: [TocOffsets; 2],
}

pub struct TocValidator<'a, D, E> {
    io: &'a mut DeviceIo<D, E>,
    config: &'a PnorConfig,
}

impl<'a, D: FlashDevice, E: EccCodec> TocValidator<'a, D, E> {
    pub fn new(io: &'a mut DeviceIo<D, E>, config: &'a PnorConfig) -> Self {
        Self { io, config }
    }

    /// Picks the boot side from the HBB address and reads its TOC to learn
    /// the TOC offsets of both sides.
    pub fn find_toc(&mut self, boot: BootInfo) -> Result<TocLocations, StartupError> {
        let phase = StartupPhase::FindingToc;
        let side_size = self.config.side_size.max(1);
        let boot_side = SideId::from_index((boot.hbb_offset / side_size) as usize)
            .ok_or_else(|| StartupError::new(phase, PnorError::InvalidAddress(boot.hbb_offset)))?;

        let base = self.config.side_base(boot_side.index());
        let guess = TocOffsets::new(base, base + self.config.backup_toc_offset);
        let found = self.read_side(boot_side, guess, phase)?;

        let mut sides = found.record.header.sides;
        if sides[boot_side.index()].is_absent() {
            sides[boot_side.index()] = guess;
        }
        tracing::info!(
            "booting from side {} (HBB at {:#x}), TOC {} copy at {:#x}",
            boot_side,
            boot.hbb_offset,
            found.copy,
            found.offset
        );
        Ok(TocLocations { boot_side, sides })
    }

    /// Returns the first valid copy of a side's TOC, primary before backup.
    pub fn read_toc(&mut self, side: SideId, offsets: TocOffsets) -> Result<ValidatedToc, StartupError> {
        self.read_side(side, offsets, StartupPhase::ReadingToc)
    }

    fn read_side(
        &mut self,
        side: SideId,
        offsets: TocOffsets,
        phase: StartupPhase,
    ) -> Result<ValidatedToc, StartupError> {
        let mut first_err = None;
        for copy in [TocCopy::Primary, TocCopy::Backup] {
            let offset = offsets.get(copy);
            match self.read_copy(side, offset, phase) {
                Ok(record) => {
                    if copy == TocCopy::Backup {
                        tracing::warn!("side {} primary TOC unusable, using backup at {:#x}", side, offset);
                    }
                    return Ok(ValidatedToc {
                        side,
                        copy,
                        offset,
                        record,
                    });
                }
                Err(e) => {
                    tracing::warn!("side {} {} TOC at {:#x} rejected: {}", side, copy, offset, e.kind);
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| StartupError::new(phase, PnorError::SideUnavailable(side))))
    }

    fn read_copy(&mut self, side: SideId, offset: u64, phase: StartupPhase) -> Result<TocRecord, StartupError> {
        let raw = self
            .io
            .read_raw(offset, TOC_SIZE as usize)
            .map_err(|e| StartupError::new(phase, e))?;
        decode_toc(&raw).map_err(|reason| {
            StartupError::new(phase, PnorError::TocCorrupt { side, offset, reason })
                .with_diagnostics(DiagnosticBlob::new(raw[..HEADER_SIZE].to_vec()))
        })
    }
}
