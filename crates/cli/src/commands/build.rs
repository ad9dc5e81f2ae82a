// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;

use anyhow::{Context, Result};
use pnor_rp::PnorConfig;

use crate::layout::ImageLayout;

pub fn run(layout_path: &Path, out: &Path, config: PnorConfig) -> Result<()> {
    let layout = ImageLayout::load(layout_path)?;
    let base_dir = layout_path.parent().unwrap_or_else(|| Path::new("."));
    let builder = layout.builder(config, base_dir)?;
    let image = builder.build().context("Failed to lay out image")?;

    std::fs::write(out, &image).with_context(|| format!("Failed to write {}", out.display()))?;
    tracing::info!(
        "wrote {} ({:#x} bytes, {} sections per side)",
        out.display(),
        image.len(),
        layout.sections.len()
    );
    Ok(())
}
