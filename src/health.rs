// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Flash wear and health bookkeeping.
//!
//! Purely observational: nothing in the I/O path consults these counters.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::PAGE_SIZE;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FlashStats {
    /// Successful writes of this page.
    pub writes: u32,
    /// Reads that needed an ECC correction.
    pub corrections: u32,
    /// Set when a write failed part way and the content is not known.
    pub unknown: bool,
}

/// Per-page counters, keyed by physical page number
/// (absolute image offset / [`PAGE_SIZE`]).
#[derive(Debug, Default)]
pub struct FlashHealth {
    pages: Mutex<FxHashMap<u64, FlashStats>>,
}

impl FlashHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_of(offset: u64) -> u64 {
        offset / PAGE_SIZE
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<u64, FlashStats>> {
        // counters stay valid even if a holder panicked
        self.pages.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_write(&self, offset: u64) {
        let mut pages = self.lock();
        let stats = pages.entry(Self::page_of(offset)).or_default();
        stats.writes = stats.writes.saturating_add(1);
        stats.unknown = false;
    }

    pub fn record_correction(&self, offset: u64) {
        let mut pages = self.lock();
        let stats = pages.entry(Self::page_of(offset)).or_default();
        stats.corrections = stats.corrections.saturating_add(1);
    }

    pub fn mark_unknown(&self, offset: u64) {
        self.lock().entry(Self::page_of(offset)).or_default().unknown = true;
    }

    /// Counters of one page; untouched pages report all zero.
    pub fn stats(&self, page: u64) -> FlashStats {
        self.lock().get(&page).copied().unwrap_or_default()
    }

    /// All touched pages, ordered by page number.
    pub fn snapshot(&self) -> Vec<(u64, FlashStats)> {
        let mut all: Vec<_> = self.lock().iter().map(|(&p, &s)| (p, s)).collect();
        all.sort_unstable_by_key(|(page, _)| *page);
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
