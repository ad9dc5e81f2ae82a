// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{Context, Result};
use pnor_rp::SectionId;

use crate::engine::Session;

pub fn run(session: &Session, section: SectionId) -> Result<()> {
    let rp = session.ready()?;
    rp.clear_section(section)
        .with_context(|| format!("Failed to clear {section}"))?;
    let info = rp.get_section_info(section)?;
    println!(
        "Cleared {} on side {} ({} pages)",
        section,
        info.side,
        info.page_count()
    );
    Ok(())
}
