// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! JSON description of an image, as consumed by `pnor build`.
//!
//! ```json
//! {
//!   "sides": 2,
//!   "golden": "B",
//!   "sections": [
//!     { "name": "HBB", "offset": 32768, "length": 1048576, "flags": ["READ_ONLY"] },
//!     { "name": "GUARD", "offset": 1081344, "length": 36864, "flags": ["ECC", "PRESERVED"],
//!       "data": "guard.bin" }
//!   ]
//! }
//! ```
//!
//! Offsets are relative to the start of each side. `data` paths are relative
//! to the layout file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use pnor_rp::image::ImageBuilder;
use pnor_rp::toc::EntryFlags;
use pnor_rp::{PnorConfig, SectionId, SideId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ImageLayout {
    #[serde(default = "default_sides")]
    pub sides: usize,
    #[serde(default)]
    pub golden: Option<String>,
    pub sections: Vec<SectionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SectionEntry {
    pub name: String,
    pub offset: u64,
    pub length: u64,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub data: Option<PathBuf>,
}

fn default_sides() -> usize {
    2
}

pub fn parse_side(s: &str) -> Result<SideId> {
    match s {
        "A" | "a" => Ok(SideId::A),
        "B" | "b" => Ok(SideId::B),
        other => bail!("unknown side {other:?}, expected A or B"),
    }
}

fn parse_flag(name: &str) -> Result<EntryFlags> {
    Ok(match name.to_ascii_uppercase().as_str() {
        "ECC" => EntryFlags::ECC,
        "READ_ONLY" => EntryFlags::READ_ONLY,
        "PRESERVED" => EntryFlags::PRESERVED,
        "VOLATILE" => EntryFlags::VOLATILE,
        "CLEAR_ON_ECC_ERR" => EntryFlags::CLEAR_ON_ECC_ERR,
        other => bail!("unknown section flag {other:?}"),
    })
}

impl ImageLayout {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid layout {}", path.display()))
    }

    /// Turns the layout into an image builder. `base_dir` resolves `data` paths.
    pub fn builder(&self, config: PnorConfig, base_dir: &Path) -> Result<ImageBuilder> {
        let mut builder = ImageBuilder::new(config).sides(self.sides);
        if let Some(golden) = &self.golden {
            builder = builder.golden(parse_side(golden)?);
        }
        for entry in &self.sections {
            let id: SectionId = entry
                .name
                .parse()
                .map_err(|e| anyhow!("section {:?}: {}", entry.name, e))?;
            let flags = entry
                .flags
                .iter()
                .try_fold(EntryFlags::empty(), |acc, f| parse_flag(f).map(|flag| acc | flag))?;
            builder = builder.section(id, entry.offset, entry.length, flags);
            if let Some(data) = &entry.data {
                let path = base_dir.join(data);
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read section data {}", path.display()))?;
                builder = builder.data(id, &bytes);
            }
        }
        Ok(builder)
    }
}
