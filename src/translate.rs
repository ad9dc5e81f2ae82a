// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Virtual address <-> flash translation.
//!
//! The window mirrors the flash image: a section of side A or B sits at
//! `window.base + flash_offset`, covering its logical size. ECC sections are
//! shorter in the window than on flash, which leaves gaps behind them.

use core::ops::Range;

use crate::config::{FlashGeometry, VirtualWindow, PAGE_SIZE};
use crate::device::PhysAddr;
use crate::ecc::physical_page_size;
use crate::error::{PnorError, Result};
use crate::section::{SectionInfo, SectionTable};
use crate::types::SectionId;

#[derive(Clone, Debug)]
pub struct AddressTranslator {
    window: VirtualWindow,
    geometry: FlashGeometry,
    /// Sections of every side with a valid TOC, ordered by virtual address.
    mapped: Vec<SectionInfo>,
    /// Flash ranges of sides without a valid TOC.
    unmapped: Vec<Range<u64>>,
}

impl AddressTranslator {
    pub fn new<'a>(
        window: VirtualWindow,
        geometry: FlashGeometry,
        tables: impl IntoIterator<Item = &'a SectionTable>,
        unmapped: Vec<Range<u64>>,
    ) -> Self {
        let mut mapped: Vec<SectionInfo> = tables.into_iter().flat_map(|t| t.iter().cloned()).collect();
        mapped.sort_by_key(|s| s.vaddr);
        Self {
            window,
            geometry,
            mapped,
            unmapped,
        }
    }

    pub fn window(&self) -> VirtualWindow {
        self.window
    }

    /// The section backing `vaddr`.
    pub fn section_info(&self, vaddr: u64) -> Result<&SectionInfo> {
        if !self.window.contains(vaddr) {
            return Err(PnorError::InvalidAddress(vaddr));
        }
        if let Some(section) = self.mapped.iter().find(|s| s.contains_vaddr(vaddr)) {
            return Ok(section);
        }
        let flash = vaddr - self.window.base;
        if self.unmapped.iter().any(|r| r.contains(&flash)) {
            return Err(PnorError::NotMapped(vaddr));
        }
        Err(PnorError::InvalidAddress(vaddr))
    }

    pub fn to_section(&self, vaddr: u64) -> Result<SectionId> {
        self.section_info(vaddr).map(|s| s.id)
    }

    /// Device coordinates of the page holding `vaddr`.
    pub fn to_physical(&self, vaddr: u64) -> Result<PhysAddr> {
        self.resolve(vaddr).map(|(_, addr)| addr)
    }

    /// Section and page coordinates in one lookup.
    pub fn resolve(&self, vaddr: u64) -> Result<(&SectionInfo, PhysAddr)> {
        let section = self.section_info(vaddr)?;
        let page = (vaddr - section.vaddr) / PAGE_SIZE;
        let offset = section.flash_offset + page * physical_page_size(section.ecc);
        let (chip, offset) = self
            .geometry
            .locate(offset)
            .ok_or(PnorError::InvalidAddress(vaddr))?;
        Ok((
            section,
            PhysAddr {
                chip,
                offset,
                ecc: section.ecc,
            },
        ))
    }

    /// Section owning an absolute physical offset.
    pub fn section_at(&self, offset: u64) -> Result<SectionId> {
        self.mapped
            .iter()
            .find(|s| s.contains_flash(offset))
            .map(|s| s.id)
            .ok_or(PnorError::NotMapped(offset))
    }

    /// Same as [`AddressTranslator::section_at`] for chip-relative coordinates.
    pub fn section_at_device(&self, addr: PhysAddr) -> Result<SectionId> {
        self.section_at(self.geometry.absolute(addr.chip, addr.offset))
    }
}
