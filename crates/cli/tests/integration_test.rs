use std::path::{Path, PathBuf};

use pnor_cli::commands::{build, clear, fix_ecc, inspect, stats};
use pnor_cli::engine::{self, Session};
use pnor_rp::config::{ECC_PAGE_SIZE, PAGE_SIZE};
use pnor_rp::{PnorConfig, SectionId, SideId};
use tempfile::tempdir;

const GUARD: u64 = 0x2_2000;

const CONFIG: &str = r#"{
    "geometry": { "chip_size": 1048576, "chip_count": 1 },
    "side_size": 524288,
    "backup_toc_offset": 491520,
    "window": { "base": 2147483648, "size": 1048576 }
}"#;

const LAYOUT: &str = r#"{
    "sides": 2,
    "golden": "B",
    "sections": [
        { "name": "HBB",   "offset": 32768,  "length": 65536, "flags": ["READ_ONLY"] },
        { "name": "GUARD", "offset": 139264, "length": 18432, "flags": ["ECC", "PRESERVED"], "data": "guard.bin" },
        { "name": "HBEL",  "offset": 163840, "length": 16384, "flags": ["volatile"] }
    ]
}"#;

struct Fixture {
    _dir: tempfile::TempDir,
    image: PathBuf,
    config: PnorConfig,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let layout_path = dir.path().join("layout.json");
    std::fs::write(&config_path, CONFIG).unwrap();
    std::fs::write(&layout_path, LAYOUT).unwrap();
    std::fs::write(dir.path().join("guard.bin"), vec![0x3Cu8; PAGE_SIZE as usize]).unwrap();

    let config = engine::load_config(Some(&config_path)).unwrap();
    let image = dir.path().join("pnor.img");
    build::run(&layout_path, &image, config.clone()).unwrap();
    Fixture {
        _dir: dir,
        image,
        config,
    }
}

fn open(f: &Fixture) -> Session {
    Session::open(&f.image, f.config.clone(), None).unwrap()
}

fn flip_bit(image: &Path, offset: u64, mask: u8) {
    let mut bytes = std::fs::read(image).unwrap();
    bytes[offset as usize] ^= mask;
    std::fs::write(image, bytes).unwrap();
}

#[test]
fn test_build_and_inspect() {
    let f = fixture();
    assert_eq!(std::fs::metadata(&f.image).unwrap().len(), 0x10_0000);

    let session = open(&f);
    assert!(inspect::run(&session, false).is_ok());
    assert!(inspect::run(&session, true).is_ok());

    let rp = session.ready().unwrap();
    assert!(rp.get_side_info(SideId::B).unwrap().golden);
    let guard = rp.get_section_info(SectionId::GuardData).unwrap();
    assert!(guard.ecc && guard.preserved);
    assert_eq!(rp.read(guard.vaddr).unwrap(), vec![0x3C; PAGE_SIZE as usize]);
}

#[test]
fn test_hbb_selects_boot_side() {
    let f = fixture();
    let session = Session::open(&f.image, f.config.clone(), Some(0x8_8000)).unwrap();
    assert_eq!(session.ready().unwrap().active_side(), SideId::B);
}

#[test]
fn test_clear_persists_to_file() {
    let f = fixture();
    {
        let session = open(&f);
        clear::run(&session, SectionId::GuardData).unwrap();
        assert!(clear::run(&session, SectionId::HbBaseCode).is_err());
    }
    let bytes = std::fs::read(&f.image).unwrap();
    let guard = &bytes[GUARD as usize..(GUARD + 4 * ECC_PAGE_SIZE) as usize];
    assert!(guard.iter().all(|&b| b == 0xFF));
    // side B untouched
    let b_guard = (0x8_0000 + GUARD) as usize;
    assert_eq!(bytes[b_guard], 0x3C);
}

#[test]
fn test_fix_ecc_repairs_file() {
    let f = fixture();
    flip_bit(&f.image, GUARD + 1, 0x04);

    {
        let session = open(&f);
        let report = fix_ecc::run(&session, SectionId::GuardData).unwrap();
        assert_eq!(report.corrected, vec![GUARD]);
    }
    let bytes = std::fs::read(&f.image).unwrap();
    assert_eq!(bytes[(GUARD + 1) as usize], 0x3C);

    let session = open(&f);
    assert!(fix_ecc::run(&session, SectionId::GuardData).unwrap().is_clean());

    // two flips in one word cannot be repaired
    drop(session);
    flip_bit(&f.image, GUARD + ECC_PAGE_SIZE, 0x03);
    let session = open(&f);
    assert!(fix_ecc::run(&session, SectionId::GuardData).is_err());
}

#[test]
fn test_stats_counts_corrections() {
    let f = fixture();
    flip_bit(&f.image, GUARD + 20, 0x80);

    let session = open(&f);
    let summary = stats::run(&session, true).unwrap();
    assert!(summary.failures.is_empty());
    let corrected: u32 = summary.pages.iter().map(|(_, s)| s.corrections).sum();
    assert_eq!(corrected, 1);
    // part 8, HBB 16, GUARD 4, HBEL 4 pages on each side
    assert_eq!(summary.pages_read, 64);
    assert_eq!(session.ready().unwrap().active_side(), SideId::A);
}

#[test]
fn test_stats_keeps_boot_side_active() {
    let f = fixture();
    let session = Session::open(&f.image, f.config.clone(), Some(0x8_8000)).unwrap();
    let summary = stats::run(&session, false).unwrap();
    assert_eq!(summary.pages_read, 64);
    let rp = session.ready().unwrap();
    assert_eq!(rp.active_side(), SideId::B);
    assert_eq!(rp.get_section_info(SectionId::GuardData).unwrap().side, SideId::B);
}

#[test]
fn test_unbootable_image_reports_failure() {
    let f = fixture();
    flip_bit(&f.image, 20, 0x01);
    flip_bit(&f.image, 0x7_8000 + 20, 0x01);

    let session = open(&f);
    assert!(session.ready().is_err());
    assert!(inspect::run(&session, false).is_err());
    assert!(stats::run(&session, false).is_err());
}

#[test]
fn test_bad_layout_rejected() {
    let dir = tempdir().unwrap();
    let layout = dir.path().join("layout.json");
    std::fs::write(
        &layout,
        r#"{ "sections": [ { "name": "NOPE", "offset": 32768, "length": 4096 } ] }"#,
    )
    .unwrap();
    let err = build::run(&layout, &dir.path().join("out.img"), PnorConfig::default()).unwrap_err();
    assert!(err.to_string().contains("NOPE"));
}
