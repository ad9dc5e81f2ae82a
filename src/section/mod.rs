// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Section table built from a validated TOC, and section-wide maintenance.

pub mod maintenance;

pub use maintenance::{clear_section, fix_ecc, EccRepair};

use serde::Serialize;

use crate::config::{FlashGeometry, VirtualWindow, PAGE_SIZE, TOC_SIZE};
use crate::ecc::{logical_size, physical_page_size};
use crate::error::{PnorError, Result};
use crate::toc::{EntryFlags, ValidatedToc};
use crate::types::{SectionId, SideId, TocOffsets};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    pub id: SectionId,
    pub side: SideId,
    /// Absolute physical offset.
    pub flash_offset: u64,
    /// Bytes on flash, ECC included.
    pub physical_size: u64,
    /// Bytes visible through the virtual window.
    pub size: u64,
    /// Zero until virtual addresses are assigned.
    pub vaddr: u64,
    pub ecc: bool,
    pub read_only: bool,
    pub preserved: bool,
    pub volatile: bool,
    pub clear_on_ecc_err: bool,
}

impl SectionInfo {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn flash_end(&self) -> u64 {
        self.flash_offset + self.physical_size
    }

    pub fn page_count(&self) -> u64 {
        self.size / PAGE_SIZE
    }

    /// Absolute offsets of every physical page, in order.
    pub fn page_offsets(&self) -> impl Iterator<Item = u64> {
        let step = physical_page_size(self.ecc);
        let base = self.flash_offset;
        (0..self.page_count()).map(move |page| base + page * step)
    }

    pub fn contains_flash(&self, offset: u64) -> bool {
        offset >= self.flash_offset && offset < self.flash_end()
    }

    pub fn contains_vaddr(&self, vaddr: u64) -> bool {
        vaddr >= self.vaddr && vaddr < self.vaddr + self.size
    }
}

/// Limits a side's sections must respect.
#[derive(Clone, Copy, Debug)]
pub struct ImageBounds {
    /// First byte of the side.
    pub start: u64,
    /// Configured size of a side; no TOC may claim more.
    pub side_size: u64,
    pub geometry: FlashGeometry,
}

/// Sections of one side, ordered by flash offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionTable {
    side: SideId,
    sections: Vec<SectionInfo>,
}

fn invalid(msg: String) -> PnorError {
    tracing::error!("{}", msg);
    PnorError::SectionTableInvalid(msg)
}

impl SectionTable {
    /// Builds the table, rejecting anything that would make a section
    /// ambiguous or unreachable. A correct checksum does not make a TOC sane.
    pub fn build(toc: &ValidatedToc, bounds: ImageBounds) -> Result<Self> {
        let side = toc.side;
        let header = &toc.record.header;
        if header.image_size() > bounds.side_size {
            return Err(invalid(format!(
                "side {} TOC claims {:#x} bytes, sides are {:#x}",
                side,
                header.image_size(),
                bounds.side_size
            )));
        }
        let end = bounds.start + header.image_size();
        if end > bounds.geometry.total_size() {
            return Err(invalid(format!(
                "side {} image ends at {:#x}, past the end of flash",
                side, end
            )));
        }
        let toc_at: TocOffsets = header.sides[side.index()];

        let mut sections: Vec<SectionInfo> = Vec::with_capacity(toc.record.entries.len());
        for entry in &toc.record.entries {
            let id = match entry.section() {
                Some(id) => id,
                None => {
                    tracing::debug!("skipping unknown TOC entry {:?}", String::from_utf8_lossy(&entry.name));
                    continue;
                }
            };
            if sections.iter().any(|s| s.id == id) {
                return Err(invalid(format!("section {} listed twice on side {}", id, side)));
            }

            let ecc = entry.flags.contains(EntryFlags::ECC);
            let page = physical_page_size(ecc);
            if entry.offset % PAGE_SIZE != 0 {
                return Err(invalid(format!("section {} offset {:#x} not page aligned", id, entry.offset)));
            }
            if entry.length == 0 || entry.length % page != 0 {
                return Err(invalid(format!(
                    "section {} length {:#x} not a multiple of {:#x}",
                    id, entry.length, page
                )));
            }
            let entry_end = entry
                .offset
                .checked_add(entry.length)
                .ok_or_else(|| invalid(format!("section {} length overflows", id)))?;
            if entry.offset < bounds.start || entry_end > end {
                return Err(invalid(format!(
                    "section {} [{:#x}, {:#x}) outside side {} [{:#x}, {:#x})",
                    id, entry.offset, entry_end, side, bounds.start, end
                )));
            }
            let first_chip = bounds.geometry.locate(entry.offset).map(|(c, _)| c);
            let last_chip = bounds.geometry.locate(entry_end - 1).map(|(c, _)| c);
            if first_chip != last_chip {
                return Err(invalid(format!("section {} crosses a chip boundary", id)));
            }
            if id != SectionId::Toc {
                for region in [toc_at.primary, toc_at.backup] {
                    if entry.offset < region + TOC_SIZE && region < entry_end {
                        return Err(invalid(format!("section {} overlaps the TOC at {:#x}", id, region)));
                    }
                }
            }

            sections.push(SectionInfo {
                id,
                side,
                flash_offset: entry.offset,
                physical_size: entry.length,
                size: logical_size(entry.length, ecc),
                vaddr: 0,
                ecc,
                read_only: entry.flags.contains(EntryFlags::READ_ONLY),
                preserved: entry.flags.contains(EntryFlags::PRESERVED),
                volatile: entry.flags.contains(EntryFlags::VOLATILE),
                clear_on_ecc_err: entry.flags.contains(EntryFlags::CLEAR_ON_ECC_ERR),
            });
        }

        sections.sort_by_key(|s| s.flash_offset);
        for pair in sections.windows(2) {
            if pair[0].flash_end() > pair[1].flash_offset {
                return Err(invalid(format!(
                    "sections {} and {} overlap on side {}",
                    pair[0].id, pair[1].id, side
                )));
            }
        }

        tracing::debug!("side {}: {} sections", side, sections.len());
        Ok(Self { side, sections })
    }

    /// Places every section in the window at `base + flash offset`.
    pub fn assign_virtual(&mut self, window: VirtualWindow) -> Result<()> {
        for section in &mut self.sections {
            let vaddr = window.base + section.flash_offset;
            if vaddr + section.size > window.end() {
                return Err(invalid(format!(
                    "section {} at {:#x} does not fit in the virtual window",
                    section.id, vaddr
                )));
            }
            section.vaddr = vaddr;
        }
        Ok(())
    }

    pub fn side(&self) -> SideId {
        self.side
    }

    pub fn lookup(&self, id: SectionId) -> Result<&SectionInfo> {
        self.sections
            .iter()
            .find(|s| s.id == id)
            .ok_or(PnorError::NotFound(id))
    }

    pub fn lookup_by_physical_offset(&self, offset: u64) -> Result<SectionId> {
        self.sections
            .iter()
            .find(|s| s.contains_flash(offset))
            .map(|s| s.id)
            .ok_or(PnorError::NotMapped(offset))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionInfo> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
