// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use anyhow::{Context, Result};
use pnor_rp::{BootInfo, PnorConfig, PnorRp};

use crate::mmap::MmapFlash;

/// Reads `--config`, falling back to the platform defaults.
pub fn load_config(path: Option<&Path>) -> Result<PnorConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
        }
        None => Ok(PnorConfig::default()),
    }
}

/// Accepts decimal or `0x` prefixed hex.
pub fn parse_offset(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid offset {s:?}: {e}"))
}

/// A resource provider running over an image file.
pub struct Session {
    pub rp: PnorRp,
}

impl Session {
    /// Starts the provider. A failed startup is not an error here; callers
    /// that need a ready provider use [`Session::ready`].
    pub fn open(image: &Path, config: PnorConfig, hbb: Option<u64>) -> Result<Self> {
        let flash = MmapFlash::open(image, config.geometry)?;
        let boot = BootInfo {
            hbb_offset: hbb.unwrap_or(0),
        };
        Ok(Self {
            rp: PnorRp::init(config, boot, flash),
        })
    }

    pub fn ready(&self) -> Result<&PnorRp> {
        self.rp.outcome().context("PNOR resource provider did not start")?;
        Ok(&self.rp)
    }
}
