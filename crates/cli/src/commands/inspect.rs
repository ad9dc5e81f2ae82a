// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use anyhow::Result;
use pnor_rp::{SectionInfo, SideId, SideInfo, StartupPhase};
use serde::Serialize;

use crate::engine::Session;

#[derive(Serialize)]
struct Report {
    phase: StartupPhase,
    error: Option<String>,
    active_side: SideId,
    sides: Vec<SideInfo>,
    sections: Vec<SectionInfo>,
}

fn flags(s: &SectionInfo) -> String {
    let mut out = Vec::new();
    if s.ecc {
        out.push("ECC");
    }
    if s.read_only {
        out.push("RO");
    }
    if s.preserved {
        out.push("PRESERVED");
    }
    if s.volatile {
        out.push("VOLATILE");
    }
    if s.clear_on_ecc_err {
        out.push("CLEAR_ON_ECC_ERR");
    }
    out.join(",")
}

fn yes(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}

pub fn run(session: &Session, json: bool) -> Result<()> {
    let rp = &session.rp;
    let report = Report {
        phase: rp.phase(),
        error: rp.outcome().err().map(|e| e.to_string()),
        active_side: rp.active_side(),
        sides: SideId::ALL
            .iter()
            .filter_map(|side| rp.get_side_info(*side).ok())
            .collect(),
        sections: rp.sections().unwrap_or_default(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    session.ready()?;
    Ok(())
}

fn print_report(report: &Report) {
    println!("\nPNOR Status Report");
    println!("------------------");
    println!("Startup: {}", report.phase);
    if let Some(err) = &report.error {
        println!("Error:   {err}");
        return;
    }

    let mut sides = Table::new();
    sides
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Side", "Valid", "Active", "Golden", "TOC", "Primary", "Backup", "HBB"]);
    for side in &report.sides {
        sides.add_row(vec![
            side.id.to_string(),
            yes(side.valid).to_string(),
            yes(side.active).to_string(),
            yes(side.golden).to_string(),
            side.toc_used.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            format!("{:#x}", side.toc.primary),
            format!("{:#x}", side.toc.backup),
            side.hbb_offset.map(|o| format!("{o:#x}")).unwrap_or_else(|| "-".into()),
        ]);
    }
    println!("{sides}\n");

    let mut sections = Table::new();
    sections
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Section", "Flash", "Physical", "Size", "Virtual", "Flags"]);
    for s in &report.sections {
        sections.add_row(vec![
            s.name().to_string(),
            format!("{:#x}", s.flash_offset),
            format!("{:#x}", s.physical_size),
            format!("{:#x}", s.size),
            format!("{:#x}", s.vaddr),
            flags(s),
        ]);
    }
    println!("Active side {}:", report.active_side);
    println!("{sections}\n");
}
