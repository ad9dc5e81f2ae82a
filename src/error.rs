// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

use crate::hwp::DiagnosticBlob;
use crate::provider::state::StartupPhase;
use crate::section::EccRepair;
use crate::toc::TocError;
use crate::types::{SectionId, SideId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PnorError {
    #[error("device read failed on chip {chip} at {offset:#x}")]
    DeviceReadFailure { chip: u32, offset: u64 },
    #[error("device write failed on chip {chip} at {offset:#x}")]
    DeviceWriteFailure { chip: u32, offset: u64 },
    #[error("TOC of side {side} at {offset:#x} is corrupt: {reason}")]
    TocCorrupt {
        side: SideId,
        offset: u64,
        reason: TocError,
    },
    #[error("section table invalid: {0}")]
    SectionTableInvalid(String),
    #[error("address {0:#x} is not inside a mapped section")]
    InvalidAddress(u64),
    #[error("section {0} is read-only")]
    PermissionDenied(SectionId),
    #[error("section {0} is not present in the active TOC")]
    NotFound(SectionId),
    #[error("address {0:#x} belongs to a side without a valid TOC")]
    NotMapped(u64),
    #[error("shutdown in progress, flash writes are refused")]
    ShutdownInProgress,
    #[error("uncorrectable ECC error on chip {chip} at {offset:#x}")]
    Uncorrectable { chip: u32, offset: u64 },
    #[error(
        "ECC repair of {} left {} uncorrectable and {} unrewritten page(s)",
        .0.section,
        .0.uncorrectable.len(),
        .0.unrepaired.len()
    )]
    RepairIncomplete(EccRepair),
    #[error("side {0} has no usable TOC")]
    SideUnavailable(SideId),
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("provider not ready: {0}")]
    NotReady(StartupError),
    #[error("request deadline expired")]
    Timeout,
    #[error("resource provider daemon is not running")]
    Disconnected,
}

/// The sticky failure recorded by the startup sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("startup failed while {phase}: {kind}")]
pub struct StartupError {
    pub phase: StartupPhase,
    pub kind: Box<PnorError>,
    pub diagnostics: Vec<DiagnosticBlob>,
}

impl StartupError {
    pub fn new(phase: StartupPhase, kind: PnorError) -> Self {
        Self {
            phase,
            kind: Box::new(kind),
            diagnostics: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, blob: DiagnosticBlob) -> Self {
        self.diagnostics.push(blob);
        self
    }
}

pub type Result<T> = core::result::Result<T, PnorError>;
