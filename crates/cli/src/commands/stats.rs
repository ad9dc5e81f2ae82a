// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reads every page of every mapped section and reports what it took.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use anyhow::Result;
use pnor_rp::config::PAGE_SIZE;
use pnor_rp::health::FlashStats;
use pnor_rp::SideId;
use serde::Serialize;

use crate::engine::Session;

#[derive(Debug, Default, Serialize)]
pub struct ScanSummary {
    pub pages_read: u64,
    /// (virtual address, error) of every page that failed to read.
    pub failures: Vec<(u64, String)>,
    pub pages: Vec<(u64, FlashStats)>,
}

pub fn run(session: &Session, json: bool) -> Result<ScanSummary> {
    let rp = session.ready()?;
    let mut summary = ScanSummary::default();

    for side in SideId::ALL {
        if !rp.get_side_info(side)?.valid {
            continue;
        }
        for section in rp.side_sections(side)? {
            for page in 0..section.page_count() {
                let vaddr = section.vaddr + page * PAGE_SIZE;
                summary.pages_read += 1;
                if let Err(e) = rp.read(vaddr) {
                    summary.failures.push((vaddr, e.to_string()));
                }
            }
        }
    }
    summary.pages = rp.health_snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(summary);
    }

    println!("Scanned {} pages, {} unreadable", summary.pages_read, summary.failures.len());
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Page", "Offset", "Writes", "Corrections", "Unknown"]);
    for (page, stats) in &summary.pages {
        table.add_row(vec![
            page.to_string(),
            format!("{:#x}", page * PAGE_SIZE),
            stats.writes.to_string(),
            stats.corrections.to_string(),
            stats.unknown.to_string(),
        ]);
    }
    println!("{table}\n");
    for (vaddr, err) in &summary.failures {
        println!("read of {vaddr:#x} failed: {err}");
    }
    Ok(summary)
}
