// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Messages served by the daemon loop.

use std::sync::mpsc::SyncSender;

use crate::error::Result;
use crate::section::EccRepair;
use crate::types::SectionId;

pub type Reply<T> = SyncSender<Result<T>>;

pub enum Request {
    /// Demand fault on a page of the window.
    Read { vaddr: u64, reply: Reply<Vec<u8>> },
    /// Write-back of a dirty page of the window.
    Write { vaddr: u64, data: Vec<u8>, reply: Reply<()> },
    Clear { section: SectionId, reply: Reply<()> },
    FixEcc { section: SectionId, reply: Reply<EccRepair> },
    Shutdown { reply: Reply<()> },
}
