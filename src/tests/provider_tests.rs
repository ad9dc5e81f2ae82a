// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::time::Duration;

use super::fixtures::{self, vaddr, GUARD, HBB, HBEL, HBEL_LEN, HBI, SIDE_SIZE, WINDOW_BASE};
use crate::config::{ECC_PAGE_SIZE, PAGE_SIZE};
use crate::device::PhysAddr;
use crate::error::PnorError;
use crate::health::FlashHealth;
use crate::provider::{PnorRp, StartupPhase};
use crate::types::{SectionId, SideId, TocCopy, TocOffsets};

const PAGE: usize = PAGE_SIZE as usize;

fn pattern(seed: u8) -> Vec<u8> {
    (0..PAGE).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn test_startup_reaches_ready() {
    let flash = fixtures::flash();
    let rp = fixtures::start(&flash);

    assert_eq!(rp.outcome(), Ok(()));
    assert_eq!(rp.phase(), StartupPhase::Ready);
    assert_eq!(rp.active_side(), SideId::A);

    let a = rp.get_side_info(SideId::A).unwrap();
    assert!(a.valid && a.active && a.has_other_side && !a.golden);
    assert_eq!(a.toc_used, Some(TocCopy::Primary));
    assert_eq!(a.hbb_offset, Some(HBB));

    let b = rp.get_side_info(SideId::B).unwrap();
    assert!(b.valid && !b.active);
    assert_eq!(b.hbb_offset, Some(SIDE_SIZE + HBB));

    // startup only reads
    assert_eq!(flash.writes(), 0);
}

#[test]
fn test_boot_from_side_b() {
    let flash = fixtures::flash_from(&fixtures::builder().golden(SideId::B));
    let rp = PnorRp::init(fixtures::config(), fixtures::boot_b(), flash);

    assert_eq!(rp.active_side(), SideId::B);
    let b = rp.get_side_info(SideId::B).unwrap();
    assert!(b.active && b.golden);
    assert!(!rp.get_side_info(SideId::A).unwrap().golden);

    let hbel = rp.get_section_info(SectionId::HbErrlogs).unwrap();
    assert_eq!(hbel.side, SideId::B);
    assert_eq!(hbel.flash_offset, SIDE_SIZE + HBEL);
}

#[test]
fn test_section_info_and_toc_offsets() {
    let rp = fixtures::start(&fixtures::flash());

    let hbel = rp.get_section_info(SectionId::HbErrlogs).unwrap();
    assert_eq!(hbel.vaddr, WINDOW_BASE + HBEL);
    assert_eq!(hbel.size, HBEL_LEN);
    assert!(hbel.volatile && !hbel.ecc);

    let guard = rp.get_section_info(SectionId::GuardData).unwrap();
    assert_eq!(guard.size, 4 * PAGE_SIZE);
    assert_eq!(guard.physical_size, 4 * ECC_PAGE_SIZE);

    assert_eq!(
        rp.get_section_info(SectionId::Payload),
        Err(PnorError::NotFound(SectionId::Payload))
    );

    let names: Vec<&str> = rp.sections().unwrap().iter().map(|s| s.name()).collect();
    assert_eq!(names, ["part", "HBB", "HBI", "GUARD", "HBEL"]);

    assert_eq!(rp.toc_offset(SideId::A), TocOffsets::new(0, 0x7_8000));
    assert_eq!(
        rp.toc_offset(SideId::B),
        TocOffsets::new(SIDE_SIZE, SIDE_SIZE + 0x7_8000)
    );
}

#[test]
fn test_read_returns_initial_content() {
    let guard_data = pattern(7);
    let flash = fixtures::flash_from(&fixtures::builder().data(SectionId::GuardData, &guard_data));
    let rp = fixtures::start(&flash);

    assert_eq!(rp.read(vaddr(GUARD)).unwrap(), guard_data);
    // any address inside the page faults in the whole page
    assert_eq!(rp.read(vaddr(GUARD) + 123).unwrap(), guard_data);
    assert_eq!(rp.read(vaddr(GUARD) + PAGE_SIZE).unwrap(), vec![0xFF; PAGE]);
}

#[test]
fn test_write_back_and_read() {
    let flash = fixtures::flash();
    let rp = fixtures::start(&flash);

    let data = pattern(1);
    rp.write(vaddr(HBEL) + PAGE_SIZE, &data).unwrap();
    assert_eq!(rp.read(vaddr(HBEL) + PAGE_SIZE).unwrap(), data);
    assert_eq!(flash.peek(HBEL + PAGE_SIZE, PAGE), data);
    assert_eq!(rp.flash_stats(FlashHealth::page_of(HBEL + PAGE_SIZE)).writes, 1);

    // ECC pages land spread out with their check bytes
    let data = pattern(2);
    rp.write(vaddr(GUARD) + PAGE_SIZE, &data).unwrap();
    assert_eq!(rp.read(vaddr(GUARD) + PAGE_SIZE).unwrap(), data);
    let raw = flash.peek(GUARD + ECC_PAGE_SIZE, ECC_PAGE_SIZE as usize);
    assert_eq!(&raw[..8], &data[..8]);
    assert_eq!(&raw[9..17], &data[8..16]);
}

#[test]
fn test_write_rejections() {
    let flash = fixtures::flash();
    let rp = fixtures::start(&flash);
    let data = pattern(3);

    assert_eq!(
        rp.write(vaddr(HBEL) + 8, &data),
        Err(PnorError::InvalidRequest("write-back address must be page aligned"))
    );
    assert!(matches!(
        rp.write(vaddr(HBEL), &data[..100]),
        Err(PnorError::InvalidRequest(_))
    ));
    assert_eq!(
        rp.write(vaddr(HBB), &data),
        Err(PnorError::PermissionDenied(SectionId::HbBaseCode))
    );
    assert_eq!(
        rp.write(vaddr(HBI), &data),
        Err(PnorError::PermissionDenied(SectionId::HbExtCode))
    );
    assert_eq!(
        rp.write(vaddr(0x5_0000), &data),
        Err(PnorError::InvalidAddress(vaddr(0x5_0000)))
    );
    assert_eq!(flash.writes(), 0);
}

#[test]
fn test_clear_section() {
    let flash = fixtures::flash_from(
        &fixtures::builder()
            .data(SectionId::GuardData, &[0x5A; 2 * PAGE])
            .data(SectionId::HbErrlogs, &[0xA5; PAGE]),
    );
    let rp = fixtures::start(&flash);

    rp.clear_section(SectionId::GuardData).unwrap();
    for page in 0..4 {
        assert_eq!(rp.read(vaddr(GUARD) + page * PAGE_SIZE).unwrap(), vec![0xFF; PAGE]);
    }
    // erased data carries an erased check byte
    assert!(flash.peek(GUARD, 4 * ECC_PAGE_SIZE as usize).iter().all(|&b| b == 0xFF));

    rp.clear_section(SectionId::HbErrlogs).unwrap();
    assert_eq!(rp.read(vaddr(HBEL)).unwrap(), vec![0xFF; PAGE]);
    // only the active side is touched
    assert_eq!(flash.peek(SIDE_SIZE + HBEL, 4), vec![0xA5; 4]);

    assert_eq!(
        rp.clear_section(SectionId::HbBaseCode),
        Err(PnorError::PermissionDenied(SectionId::HbBaseCode))
    );
    assert_eq!(
        rp.clear_section(SectionId::Payload),
        Err(PnorError::NotFound(SectionId::Payload))
    );
}

#[test]
fn test_switch_side() {
    let flash = fixtures::flash_from(&fixtures::builder().data(SectionId::HbErrlogs, &[0xA5; PAGE]));
    let rp = fixtures::start(&flash);

    rp.switch_side(SideId::B).unwrap();
    assert_eq!(rp.active_side(), SideId::B);
    assert!(rp.get_side_info(SideId::B).unwrap().active);
    assert!(!rp.get_side_info(SideId::A).unwrap().active);

    rp.clear_section(SectionId::HbErrlogs).unwrap();
    assert_eq!(flash.peek(SIDE_SIZE + HBEL, 4), vec![0xFF; 4]);
    assert_eq!(flash.peek(HBEL, 4), vec![0xA5; 4]);

    // both sides stay addressable through the window
    assert_eq!(rp.to_section(vaddr(HBEL)), Ok(SectionId::HbErrlogs));
    assert_eq!(rp.read(vaddr(HBEL)).unwrap()[..4], [0xA5; 4]);
}

#[test]
fn test_side_sections_leaves_active_side() {
    let rp = fixtures::start(&fixtures::flash());

    let b = rp.side_sections(SideId::B).unwrap();
    assert_eq!(b.len(), 5);
    assert!(b.iter().all(|s| s.side == SideId::B));
    assert_eq!(b[4].flash_offset, SIDE_SIZE + HBEL);
    assert_eq!(rp.active_side(), SideId::A);
    assert_eq!(rp.get_section_info(SectionId::HbErrlogs).unwrap().side, SideId::A);
}

#[test]
fn test_failed_write_marks_page_unknown() {
    let flash = fixtures::flash();
    let rp = fixtures::start(&flash);
    let page = FlashHealth::page_of(HBEL);

    flash.fail_writes_at(0, HBEL);
    assert_eq!(
        rp.write(vaddr(HBEL), &pattern(4)),
        Err(PnorError::DeviceWriteFailure { chip: 0, offset: HBEL })
    );
    assert!(rp.flash_stats(page).unknown);
    assert_eq!(rp.flash_stats(page).writes, 0);

    flash.clear_faults();
    rp.write(vaddr(HBEL), &pattern(4)).unwrap();
    let stats = rp.flash_stats(page);
    assert!(!stats.unknown);
    assert_eq!(stats.writes, 1);
    assert_eq!(rp.health_snapshot(), vec![(page, stats)]);
}

#[test]
fn test_two_chips_side_b_on_second_chip() {
    let config = fixtures::two_chip_config();
    let flash = fixtures::flash_from(&fixtures::builder_for(config.clone()));
    let rp = PnorRp::init(config, fixtures::boot_a(), flash.clone());
    assert_eq!(rp.outcome(), Ok(()));

    let b_hbel = vaddr(SIDE_SIZE + HBEL);
    assert_eq!(
        rp.to_physical(b_hbel),
        Ok(PhysAddr {
            chip: 1,
            offset: HBEL,
            ecc: false
        })
    );
    assert_eq!(rp.section_at(SIDE_SIZE + HBEL), Ok(SectionId::HbErrlogs));

    let data = pattern(5);
    rp.write(b_hbel, &data).unwrap();
    assert_eq!(rp.read(b_hbel).unwrap(), data);
    assert_eq!(flash.peek(SIDE_SIZE + HBEL, PAGE), data);
}

#[test]
fn test_requests_with_deadline() {
    let config = crate::config::PnorConfig {
        request_timeout: Some(Duration::from_secs(30)),
        ..fixtures::config()
    };
    let rp = PnorRp::init(config, fixtures::boot_a(), fixtures::flash());
    assert_eq!(rp.read(vaddr(HBEL)).unwrap(), vec![0xFF; PAGE]);
    rp.write(vaddr(HBEL), &pattern(6)).unwrap();
}
