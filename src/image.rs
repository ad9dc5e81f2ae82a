// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Builds complete PNOR images: every side gets the same section layout,
//! a primary TOC at its start and a backup TOC at `backup_toc_offset`.

use crate::config::{PnorConfig, ERASED_BYTE, NUM_SIDES, PAGE_SIZE, TOC_SIZE};
use crate::ecc::{EccCodec, PnorEcc};
use crate::error::{PnorError, Result};
use crate::toc::{encode_toc, EntryFlags, SideFlags, TocEntry, TocHeader, TocRecord};
use crate::types::{SectionId, SideId, TocOffsets};

#[derive(Clone, Debug)]
pub struct SectionLayout {
    pub id: SectionId,
    /// Relative to the start of the side.
    pub offset: u64,
    /// Physical length, ECC included.
    pub length: u64,
    pub flags: EntryFlags,
    /// Logical content placed at the start of the section.
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ImageBuilder {
    config: PnorConfig,
    sides: usize,
    golden: Option<SideId>,
    sections: Vec<SectionLayout>,
}

impl ImageBuilder {
    pub fn new(config: PnorConfig) -> Self {
        Self {
            config,
            sides: NUM_SIDES,
            golden: None,
            sections: Vec::new(),
        }
    }

    /// One or two sides.
    pub fn sides(mut self, sides: usize) -> Self {
        self.sides = sides.clamp(1, NUM_SIDES);
        self
    }

    pub fn golden(mut self, side: SideId) -> Self {
        self.golden = Some(side);
        self
    }

    pub fn section(mut self, id: SectionId, offset: u64, length: u64, flags: EntryFlags) -> Self {
        self.sections.push(SectionLayout {
            id,
            offset,
            length,
            flags,
            data: Vec::new(),
        });
        self
    }

    /// Sets the initial logical content of an already added section.
    pub fn data(mut self, id: SectionId, data: &[u8]) -> Self {
        if let Some(section) = self.sections.iter_mut().find(|s| s.id == id) {
            section.data = data.to_vec();
        }
        self
    }

    pub fn config(&self) -> &PnorConfig {
        &self.config
    }

    pub fn toc_offsets(&self, side: SideId) -> TocOffsets {
        if side.index() >= self.sides {
            return TocOffsets::default();
        }
        let base = self.config.side_base(side.index());
        TocOffsets::new(base, base + self.config.backup_toc_offset)
    }

    /// The TOC record written (twice) on `side`.
    pub fn toc_record(&self, side: SideId) -> TocRecord {
        let base = self.config.side_base(side.index());
        let mut entries = vec![TocEntry::new(SectionId::Toc, base, TOC_SIZE, EntryFlags::READ_ONLY)];
        entries.extend(
            self.sections
                .iter()
                .map(|s| TocEntry::new(s.id, base + s.offset, s.length, s.flags)),
        );

        let mut flags = SideFlags::empty();
        if self.golden == Some(side) {
            flags |= SideFlags::GOLDEN;
        }
        TocRecord {
            header: TocHeader {
                block_size: PAGE_SIZE as u32,
                block_count: (self.config.side_size / PAGE_SIZE) as u32,
                flags,
                sides: [self.toc_offsets(SideId::A), self.toc_offsets(SideId::B)],
            },
            entries,
        }
    }

    /// The whole device content, `geometry.total_size()` bytes.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut image = vec![ERASED_BYTE; self.config.geometry.total_size() as usize];
        let codec = PnorEcc;

        for side in SideId::ALL.iter().take(self.sides) {
            let base = self.config.side_base(side.index());
            for section in &self.sections {
                if section.data.is_empty() {
                    continue;
                }
                let mut logical = section.data.clone();
                let rem = logical.len() % PAGE_SIZE as usize;
                if rem != 0 {
                    logical.resize(logical.len() + PAGE_SIZE as usize - rem, ERASED_BYTE);
                }
                let raw = if section.flags.contains(EntryFlags::ECC) {
                    codec.encode_page(&logical)
                } else {
                    logical
                };
                let start = (base + section.offset) as usize;
                let len = raw.len().min(section.length as usize);
                let dest = image.get_mut(start..start + len).ok_or_else(|| {
                    PnorError::SectionTableInvalid(format!("section {} lies past the end of flash", section.id))
                })?;
                dest.copy_from_slice(&raw[..len]);
            }

            let offsets = self.toc_offsets(*side);
            let toc = encode_toc(&self.toc_record(*side)).map_err(|reason| PnorError::TocCorrupt {
                side: *side,
                offset: offsets.primary,
                reason,
            })?;
            for at in [offsets.primary, offsets.backup] {
                let at = at as usize;
                image
                    .get_mut(at..at + toc.len())
                    .ok_or(PnorError::InvalidAddress(at as u64))?
                    .copy_from_slice(&toc);
            }
        }
        Ok(image)
    }
}
