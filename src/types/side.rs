// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Redundant image sides and their TOC locations.

use core::fmt;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum SideId {
    A = 0,
    B = 1,
}

impl SideId {
    pub const ALL: [SideId; 2] = [SideId::A, SideId::B];

    pub fn from_index(v: usize) -> Option<Self> {
        match v {
            0 => Some(SideId::A),
            1 => Some(SideId::B),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn other(&self) -> Self {
        match self {
            SideId::A => SideId::B,
            SideId::B => SideId::A,
        }
    }
}

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideId::A => f.write_str("A"),
            SideId::B => f.write_str("B"),
        }
    }
}

/// Which of the two TOC copies of a side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TocCopy {
    Primary,
    Backup,
}

impl fmt::Display for TocCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TocCopy::Primary => f.write_str("primary"),
            TocCopy::Backup => f.write_str("backup"),
        }
    }
}

/// Physical offsets of the primary and backup TOC of one side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct TocOffsets {
    pub primary: u64,
    pub backup: u64,
}

impl TocOffsets {
    pub fn new(primary: u64, backup: u64) -> Self {
        Self { primary, backup }
    }

    /// A side without any TOC is recorded as (0, 0) by the other side.
    pub fn is_absent(&self) -> bool {
        self.primary == 0 && self.backup == 0
    }

    pub fn get(&self, copy: TocCopy) -> u64 {
        match copy {
            TocCopy::Primary => self.primary,
            TocCopy::Backup => self.backup,
        }
    }
}

/// What startup learned about one side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SideInfo {
    pub id: SideId,
    /// A TOC copy validated and its section table was built.
    pub valid: bool,
    /// Section lookups are served from this side.
    pub active: bool,
    pub golden: bool,
    pub has_other_side: bool,
    pub toc: TocOffsets,
    pub toc_used: Option<TocCopy>,
    pub hbb_offset: Option<u64>,
}

impl SideInfo {
    pub fn invalid(id: SideId, toc: TocOffsets) -> Self {
        Self {
            id,
            valid: false,
            active: false,
            golden: false,
            has_other_side: false,
            toc,
            toc_used: None,
            hbb_offset: None,
        }
    }
}
