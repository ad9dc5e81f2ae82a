// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{bail, Result};
use pnor_rp::{EccRepair, PnorError, SectionId};

use crate::engine::Session;

fn print_repair(report: &EccRepair) {
    println!(
        "{}: {} pages scanned, {} corrected, {} uncorrectable, {} not rewritten",
        report.section,
        report.pages_scanned,
        report.corrected.len(),
        report.uncorrectable.len(),
        report.unrepaired.len()
    );
    for offset in &report.corrected {
        println!("  corrected     {offset:#x}");
    }
    for offset in &report.uncorrectable {
        println!("  uncorrectable {offset:#x}");
    }
    for offset in &report.unrepaired {
        println!("  not rewritten {offset:#x}");
    }
}

pub fn run(session: &Session, section: SectionId) -> Result<EccRepair> {
    let rp = session.ready()?;
    match rp.fix_ecc(section) {
        Ok(report) => {
            print_repair(&report);
            Ok(report)
        }
        Err(PnorError::RepairIncomplete(report)) => {
            print_repair(&report);
            bail!(
                "{} page(s) of {} could not be repaired",
                report.uncorrectable.len() + report.unrepaired.len(),
                section
            )
        }
        Err(e) => Err(e.into()),
    }
}
