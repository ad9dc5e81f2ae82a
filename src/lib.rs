// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! pnor-rp: the PNOR resource provider.
//!
//! Discovers and validates the redundant tables of contents of a PNOR flash
//! image, exposes its sections through a virtual window, performs page level
//! ECC protected I/O and keeps per-page wear statistics.

pub mod config;
pub mod device;
pub mod ecc;
pub mod error;
pub mod health;
pub mod hwp;
pub mod image;
pub mod provider;
pub mod section;
pub mod toc;
pub mod translate;
pub mod types;

pub use config::{BootInfo, FlashGeometry, PnorConfig, VirtualWindow};
pub use error::{PnorError, Result, StartupError};
pub use provider::{PnorRp, StartupPhase};
pub use section::{EccRepair, SectionInfo};
pub use types::{SectionId, SideId, SideInfo, TocCopy, TocOffsets};

#[cfg(test)]
pub mod tests;
