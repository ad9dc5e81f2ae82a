// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Identity types shared by every component.

pub mod section;
pub mod side;

pub use section::SectionId;
pub use side::{SideId, SideInfo, TocCopy, TocOffsets};
