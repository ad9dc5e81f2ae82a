// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The PNOR resource provider.
//!
//! [`PnorRp`] is an explicit handle: it is created once at process start and
//! handed to whoever needs flash access. Creating it spawns the coordinator
//! thread, which runs startup and then serves requests until the handle is
//! dropped. Startup never fails the constructor; its outcome is kept and
//! replayed by every later call.

pub mod daemon;
pub mod msg;
pub mod state;

pub use state::{Layout, StartupPhase};

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use self::daemon::Daemon;
use self::msg::{Reply, Request};
use self::state::Shared;
use crate::config::{BootInfo, PnorConfig};
use crate::device::{DeviceIo, FlashDevice, PhysAddr};
use crate::ecc::{EccCodec, PnorEcc};
use crate::error::{PnorError, Result, StartupError};
use crate::health::FlashStats;
use crate::section::{EccRepair, SectionInfo};
use crate::types::{SectionId, SideId, SideInfo, TocOffsets};

pub struct PnorRp {
    shared: Arc<Shared>,
    tx: Option<Sender<Request>>,
    worker: Option<JoinHandle<()>>,
}

impl PnorRp {
    /// Starts the provider on `device` with the PNOR ECC codec.
    pub fn init<D>(config: PnorConfig, boot: BootInfo, device: D) -> Self
    where
        D: FlashDevice + 'static,
    {
        Self::with_codec(config, boot, device, PnorEcc)
    }

    /// Starts the provider with an explicit ECC codec.
    pub fn with_codec<D, E>(config: PnorConfig, boot: BootInfo, device: D, codec: E) -> Self
    where
        D: FlashDevice + 'static,
        E: EccCodec + 'static,
    {
        let shared = Arc::new(Shared::new(config));
        let io = DeviceIo::new(
            device,
            codec,
            shared.config.geometry,
            shared.health.clone(),
            shared.shutdown.clone(),
        );
        let (tx, rx) = mpsc::channel();
        let (started_tx, started_rx) = mpsc::sync_channel(1);
        let daemon = Daemon::new(io, shared.clone(), rx);

        let worker = match thread::Builder::new()
            .name("pnor-rp".into())
            .spawn(move || daemon.run(boot, started_tx))
        {
            Ok(handle) => {
                if started_rx.recv().is_err() {
                    shared.finish(Err(StartupError::new(shared.phase(), PnorError::Disconnected)));
                }
                Some(handle)
            }
            Err(e) => {
                tracing::error!("cannot spawn PNOR daemon: {}", e);
                shared.finish(Err(StartupError::new(
                    StartupPhase::Uninitialized,
                    PnorError::Disconnected,
                )));
                None
            }
        };

        Self {
            shared,
            tx: Some(tx),
            worker,
        }
    }

    /// `Ok` once startup completed, else the recorded failure.
    pub fn outcome(&self) -> Result<()> {
        self.shared.ready()
    }

    pub fn phase(&self) -> StartupPhase {
        self.shared.phase()
    }

    pub fn config(&self) -> &PnorConfig {
        &self.shared.config
    }

    pub fn get_side_info(&self, side: SideId) -> Result<SideInfo> {
        self.shared.ready()?;
        Ok(self.shared.layout().sides[side.index()].clone())
    }

    /// Location, size and permissions of a section of the active side.
    pub fn get_section_info(&self, section: SectionId) -> Result<SectionInfo> {
        self.shared.ready()?;
        let layout = self.shared.layout();
        let table = layout
            .active_table()
            .ok_or(PnorError::SideUnavailable(layout.active))?;
        table.lookup(section).cloned()
    }

    /// Every section of the active side, ordered by flash offset.
    pub fn sections(&self) -> Result<Vec<SectionInfo>> {
        self.shared.ready()?;
        let layout = self.shared.layout();
        Ok(layout
            .active_table()
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Sections of any side with a valid TOC. Does not change the active side.
    pub fn side_sections(&self, side: SideId) -> Result<Vec<SectionInfo>> {
        self.shared.ready()?;
        let layout = self.shared.layout();
        let table = layout.tables[side.index()]
            .as_ref()
            .ok_or(PnorError::SideUnavailable(side))?;
        Ok(table.iter().cloned().collect())
    }

    /// Cached TOC locations of a side. Never touches the device.
    pub fn toc_offset(&self, side: SideId) -> TocOffsets {
        self.shared.layout().sides[side.index()].toc
    }

    pub fn active_side(&self) -> SideId {
        self.shared.layout().active
    }

    /// Serves section lookups from another side with a valid TOC.
    pub fn switch_side(&self, side: SideId) -> Result<()> {
        self.shared.ready()?;
        let mut layout = self.shared.layout_mut();
        if layout.tables[side.index()].is_none() {
            return Err(PnorError::SideUnavailable(side));
        }
        layout.active = side;
        for info in layout.sides.iter_mut() {
            info.active = info.id == side;
        }
        tracing::info!("active PNOR side is now {}", side);
        Ok(())
    }

    pub fn to_physical(&self, vaddr: u64) -> Result<PhysAddr> {
        self.shared.ready()?;
        self.shared.layout().translator()?.to_physical(vaddr)
    }

    pub fn to_section(&self, vaddr: u64) -> Result<SectionId> {
        self.shared.ready()?;
        self.shared.layout().translator()?.to_section(vaddr)
    }

    /// Section owning an absolute physical offset.
    pub fn section_at(&self, offset: u64) -> Result<SectionId> {
        self.shared.ready()?;
        self.shared.layout().translator()?.section_at(offset)
    }

    /// Demand fault: returns the page of the window holding `vaddr`.
    pub fn read(&self, vaddr: u64) -> Result<Vec<u8>> {
        self.shared.ready()?;
        self.call(|reply| Request::Read { vaddr, reply })
    }

    /// Writes back one full page at a page aligned `vaddr`.
    pub fn write(&self, vaddr: u64, page: &[u8]) -> Result<()> {
        self.shared.ready()?;
        if self.shared.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        let data = page.to_vec();
        self.call(|reply| Request::Write { vaddr, data, reply })
    }

    /// Fills a writable section with the erased pattern (with good ECC).
    pub fn clear_section(&self, section: SectionId) -> Result<()> {
        self.shared.ready()?;
        if self.shared.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        self.call(|reply| Request::Clear { section, reply })
    }

    /// Repairs correctable ECC errors of a section.
    ///
    /// `Ok` means no uncorrectable page remains; the report tells whether
    /// anything needed fixing. Pages that could not be repaired come back in
    /// [`PnorError::RepairIncomplete`].
    pub fn fix_ecc(&self, section: SectionId) -> Result<EccRepair> {
        self.shared.ready()?;
        if self.shared.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        self.call(|reply| Request::FixEcc { section, reply })
    }

    /// Delivers the shutdown notification and waits until the daemon has
    /// stopped accepting writes.
    pub fn notify_shutdown(&self) -> Result<()> {
        self.call(|reply| Request::Shutdown { reply })
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.is_raised()
    }

    pub fn flash_stats(&self, page: u64) -> FlashStats {
        self.shared.health.stats(page)
    }

    pub fn health_snapshot(&self) -> Vec<(u64, FlashStats)> {
        self.shared.health.snapshot()
    }

    fn call<T>(&self, request: impl FnOnce(Reply<T>) -> Request) -> Result<T> {
        let tx = self.tx.as_ref().ok_or(PnorError::Disconnected)?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        tx.send(request(reply_tx)).map_err(|_| PnorError::Disconnected)?;

        // a request that timed out still runs to completion on the daemon
        match self.shared.config.request_timeout {
            Some(timeout) => reply_rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => PnorError::Timeout,
                RecvTimeoutError::Disconnected => PnorError::Disconnected,
            })?,
            None => reply_rx.recv().map_err(|_| PnorError::Disconnected)?,
        }
    }
}

impl Drop for PnorRp {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
