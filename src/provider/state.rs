// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Startup state and the state shared between the daemon and its clients.

use core::fmt;
use serde::Serialize;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::PnorConfig;
use crate::device::ShutdownFlag;
use crate::error::{PnorError, Result, StartupError};
use crate::health::FlashHealth;
use crate::section::SectionTable;
use crate::translate::AddressTranslator;
use crate::types::{SideId, SideInfo, TocOffsets};

/// Startup runs these in order, each at most once. `Failed` is terminal and
/// reachable from every phase before `Ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StartupPhase {
    Uninitialized,
    FindingToc,
    ReadingToc,
    BuildingSectionTable,
    MappingVirtualAddresses,
    Ready,
    Failed,
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartupPhase::Uninitialized => "uninitialized",
            StartupPhase::FindingToc => "finding TOC",
            StartupPhase::ReadingToc => "reading TOC",
            StartupPhase::BuildingSectionTable => "building section table",
            StartupPhase::MappingVirtualAddresses => "mapping virtual addresses",
            StartupPhase::Ready => "ready",
            StartupPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Everything startup discovers.
#[derive(Clone, Debug)]
pub struct Layout {
    pub sides: [SideInfo; 2],
    pub tables: [Option<SectionTable>; 2],
    pub active: SideId,
    pub translator: Option<AddressTranslator>,
}

impl Layout {
    /// Before discovery: side A assumed, TOCs at their configured spots.
    pub fn undiscovered(config: &PnorConfig) -> Self {
        let toc = |side: SideId| {
            let base = config.side_base(side.index());
            TocOffsets::new(base, base + config.backup_toc_offset)
        };
        Self {
            sides: [
                SideInfo::invalid(SideId::A, toc(SideId::A)),
                SideInfo::invalid(SideId::B, toc(SideId::B)),
            ],
            tables: [None, None],
            active: SideId::A,
            translator: None,
        }
    }

    pub fn active_table(&self) -> Option<&SectionTable> {
        self.tables[self.active.index()].as_ref()
    }

    pub fn translator(&self) -> Result<&AddressTranslator> {
        self.translator.as_ref().ok_or(PnorError::Disconnected)
    }
}

pub(crate) struct Shared {
    pub config: PnorConfig,
    outcome: OnceLock<core::result::Result<(), StartupError>>,
    phase: Mutex<StartupPhase>,
    layout: RwLock<Layout>,
    pub shutdown: ShutdownFlag,
    pub health: Arc<FlashHealth>,
}

impl Shared {
    pub fn new(config: PnorConfig) -> Self {
        let layout = Layout::undiscovered(&config);
        Self {
            config,
            outcome: OnceLock::new(),
            phase: Mutex::new(StartupPhase::Uninitialized),
            layout: RwLock::new(layout),
            shutdown: ShutdownFlag::new(),
            health: Arc::new(FlashHealth::new()),
        }
    }

    pub fn phase(&self) -> StartupPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves startup forward. Phases never repeat and nothing leaves a
    /// terminal phase.
    pub fn advance(&self, next: StartupPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase >= next || *phase == StartupPhase::Ready {
            tracing::error!("PNOR startup cannot move from {} to {}", *phase, next);
            return;
        }
        tracing::info!("PNOR startup: {}", next);
        *phase = next;
    }

    /// Records the startup outcome. Only the first call has an effect.
    pub fn finish(&self, outcome: core::result::Result<(), StartupError>) {
        let next = match &outcome {
            Ok(()) => StartupPhase::Ready,
            Err(e) => {
                tracing::error!("PNOR resource provider {}", e);
                StartupPhase::Failed
            }
        };
        if self.outcome.set(outcome).is_ok() {
            self.advance(next);
        }
    }

    /// Fails fast with the recorded startup error.
    pub fn ready(&self) -> Result<()> {
        match self.outcome.get() {
            Some(Ok(())) => Ok(()),
            Some(Err(e)) => Err(PnorError::NotReady(e.clone())),
            None => Err(PnorError::NotReady(StartupError::new(
                self.phase(),
                PnorError::Disconnected,
            ))),
        }
    }

    pub fn layout(&self) -> RwLockReadGuard<'_, Layout> {
        self.layout.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn layout_mut(&self) -> RwLockWriteGuard<'_, Layout> {
        self.layout.write().unwrap_or_else(PoisonError::into_inner)
    }
}
