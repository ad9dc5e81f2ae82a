// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::config::PAGE_SIZE;
use crate::health::{FlashHealth, FlashStats};

#[test]
fn test_counters_grow_per_page() {
    let health = FlashHealth::new();
    assert!(health.is_empty());

    health.record_write(3 * PAGE_SIZE);
    health.record_write(3 * PAGE_SIZE + 100);
    health.record_correction(3 * PAGE_SIZE);
    health.record_correction(7 * PAGE_SIZE);

    assert_eq!(
        health.stats(3),
        FlashStats {
            writes: 2,
            corrections: 1,
            unknown: false
        }
    );
    assert_eq!(health.stats(7).corrections, 1);
    assert_eq!(health.stats(42), FlashStats::default());

    let pages: Vec<u64> = health.snapshot().iter().map(|(p, _)| *p).collect();
    assert_eq!(pages, vec![3, 7]);
}

#[test]
fn test_successful_write_clears_unknown() {
    let health = FlashHealth::new();
    health.mark_unknown(0);
    assert!(health.stats(0).unknown);
    health.record_write(0);
    assert!(!health.stats(0).unknown);
    assert_eq!(health.stats(0).writes, 1);
}
