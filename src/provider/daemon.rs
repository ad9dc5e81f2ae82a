// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The coordinator thread: runs startup, then serves requests. All device
//! I/O happens here, one request at a time.

use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;

use super::msg::Request;
use super::state::{Layout, Shared, StartupPhase};
use crate::config::{BootInfo, PAGE_SIZE};
use crate::device::{DeviceIo, FlashDevice};
use crate::ecc::EccCodec;
use crate::error::{PnorError, Result, StartupError};
use crate::section::{self, EccRepair, ImageBounds, SectionInfo, SectionTable};
use crate::toc::{SideFlags, TocValidator, ValidatedToc};
use crate::translate::AddressTranslator;
use crate::types::{SectionId, SideId, SideInfo};

pub(crate) struct Daemon<D, E> {
    io: DeviceIo<D, E>,
    shared: Arc<Shared>,
    rx: Receiver<Request>,
}

impl<D: FlashDevice, E: EccCodec> Daemon<D, E> {
    pub fn new(io: DeviceIo<D, E>, shared: Arc<Shared>, rx: Receiver<Request>) -> Self {
        Self { io, shared, rx }
    }

    pub fn run(mut self, boot: BootInfo, started: SyncSender<()>) {
        let outcome = self.startup(boot).map(|layout| {
            *self.shared.layout_mut() = layout;
        });
        self.shared.finish(outcome);
        let _ = started.send(());
        self.wait_for_message();
    }

    fn startup(&mut self, boot: BootInfo) -> core::result::Result<Layout, StartupError> {
        let config = self.shared.config.clone();

        self.shared.advance(StartupPhase::FindingToc);
        let locations = TocValidator::new(&mut self.io, &config).find_toc(boot)?;
        let boot_side = locations.boot_side;
        {
            let mut layout = self.shared.layout_mut();
            for side in SideId::ALL {
                layout.sides[side.index()].toc = locations.sides[side.index()];
            }
            layout.active = boot_side;
        }

        self.shared.advance(StartupPhase::ReadingToc);
        let mut tocs: [Option<ValidatedToc>; 2] = [None, None];
        for side in SideId::ALL {
            let offsets = locations.sides[side.index()];
            if side != boot_side && offsets.is_absent() {
                tracing::info!("image has no side {}", side);
                continue;
            }
            match TocValidator::new(&mut self.io, &config).read_toc(side, offsets) {
                Ok(toc) => tocs[side.index()] = Some(toc),
                Err(e) if side == boot_side => return Err(e),
                Err(e) => tracing::warn!("side {} is unusable: {}", side, e),
            }
        }

        self.shared.advance(StartupPhase::BuildingSectionTable);
        let mut tables: [Option<SectionTable>; 2] = [None, None];
        for toc in tocs.iter().flatten() {
            let bounds = ImageBounds {
                start: config.side_base(toc.side.index()),
                side_size: config.side_size,
                geometry: config.geometry,
            };
            match SectionTable::build(toc, bounds) {
                Ok(table) => tables[toc.side.index()] = Some(table),
                Err(e) if toc.side == boot_side => {
                    return Err(StartupError::new(StartupPhase::BuildingSectionTable, e))
                }
                Err(e) => tracing::warn!("side {} is unusable: {}", toc.side, e),
            }
        }

        self.shared.advance(StartupPhase::MappingVirtualAddresses);
        for side in SideId::ALL {
            let mapped = match tables[side.index()].as_mut() {
                Some(table) => table.assign_virtual(config.window),
                None => continue,
            };
            match mapped {
                Ok(()) => {}
                Err(e) if side == boot_side => {
                    return Err(StartupError::new(StartupPhase::MappingVirtualAddresses, e))
                }
                Err(e) => {
                    tracing::warn!("side {} is unusable: {}", side, e);
                    tables[side.index()] = None;
                }
            }
        }

        let unmapped = SideId::ALL
            .iter()
            .filter(|side| tables[side.index()].is_none())
            .map(|side| {
                let base = config.side_base(side.index());
                base..base + config.side_size
            })
            .collect();
        let translator = AddressTranslator::new(
            config.window,
            config.geometry,
            tables.iter().flatten(),
            unmapped,
        );

        let sides = SideId::ALL.map(|side| {
            let toc = locations.sides[side.index()];
            let has_other_side = !locations.sides[side.other().index()].is_absent();
            match (&tables[side.index()], &tocs[side.index()]) {
                (Some(table), Some(validated)) => SideInfo {
                    id: side,
                    valid: true,
                    active: side == boot_side,
                    golden: validated.record.header.flags.contains(SideFlags::GOLDEN),
                    has_other_side,
                    toc,
                    toc_used: Some(validated.copy),
                    hbb_offset: table.lookup(SectionId::HbBaseCode).ok().map(|s| s.flash_offset),
                },
                _ => SideInfo {
                    has_other_side,
                    ..SideInfo::invalid(side, toc)
                },
            }
        });

        Ok(Layout {
            sides,
            tables,
            active: boot_side,
            translator: Some(translator),
        })
    }

    fn wait_for_message(&mut self) {
        while let Ok(request) = self.rx.recv() {
            match request {
                Request::Read { vaddr, reply } => {
                    let _ = reply.send(self.read(vaddr));
                }
                Request::Write { vaddr, data, reply } => {
                    let _ = reply.send(self.write(vaddr, &data));
                }
                Request::Clear { section, reply } => {
                    let _ = reply.send(self.clear_section(section));
                }
                Request::FixEcc { section, reply } => {
                    let _ = reply.send(self.fix_ecc(section));
                }
                Request::Shutdown { reply } => {
                    tracing::info!("shutdown requested, refusing further PNOR writes");
                    self.shared.shutdown.raise();
                    let _ = reply.send(Ok(()));
                }
            }
        }
        tracing::debug!("request channel closed, PNOR daemon exiting");
    }

    fn read(&mut self, vaddr: u64) -> Result<Vec<u8>> {
        self.shared.ready()?;
        let addr = self.shared.layout().translator()?.to_physical(vaddr)?;
        let (data, _) = self.io.read_page(addr)?;
        Ok(data)
    }

    fn write(&mut self, vaddr: u64, data: &[u8]) -> Result<()> {
        self.shared.ready()?;
        if self.shared.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        if vaddr % PAGE_SIZE != 0 {
            return Err(PnorError::InvalidRequest("write-back address must be page aligned"));
        }
        let addr = {
            let layout = self.shared.layout();
            let (section, addr) = layout.translator()?.resolve(vaddr)?;
            if section.read_only {
                return Err(PnorError::PermissionDenied(section.id));
            }
            addr
        };
        self.io.write_page(addr, data)
    }

    fn active_section(&self, id: SectionId) -> Result<SectionInfo> {
        let layout = self.shared.layout();
        let table = layout
            .active_table()
            .ok_or(PnorError::SideUnavailable(layout.active))?;
        table.lookup(id).cloned()
    }

    fn clear_section(&mut self, id: SectionId) -> Result<()> {
        self.shared.ready()?;
        if self.shared.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        let info = self.active_section(id)?;
        section::clear_section(&mut self.io, &info)
    }

    fn fix_ecc(&mut self, id: SectionId) -> Result<EccRepair> {
        self.shared.ready()?;
        if self.shared.shutdown.is_raised() {
            return Err(PnorError::ShutdownInProgress);
        }
        let info = self.active_section(id)?;
        section::fix_ecc(&mut self.io, &info)
    }
}
