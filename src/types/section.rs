// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Section identifiers.

use core::fmt;
use core::str::FromStr;
use serde::Serialize;

/// Length of the name field of a TOC entry.
pub const NAME_LEN: usize = 16;

macro_rules! sections {
    ($($variant:ident => $name:literal,)*) => {
        /// Every section a PNOR image can describe. The set is fixed at
        /// image-build time; TOC entries with other names are ignored.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[repr(u8)]
        pub enum SectionId {
            $($variant,)*
        }

        impl SectionId {
            pub const ALL: &'static [SectionId] = &[$(SectionId::$variant,)*];

            /// Name as stored in the TOC entry.
            pub fn name(&self) -> &'static str {
                match self {
                    $(SectionId::$variant => $name,)*
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(SectionId::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

sections! {
    Toc => "part",
    HbBaseCode => "HBB",
    HbExtCode => "HBI",
    HbBootloader => "HBBL",
    SbeIpl => "SBE",
    Wink => "HCODE",
    Payload => "PAYLOAD",
    HbRuntime => "HBRT",
    HbData => "HBD",
    GuardData => "GUARD",
    HbErrlogs => "HBEL",
    DimmJedecVpd => "DJVPD",
    ModuleVpd => "MVPD",
    CentaurVpd => "CVPD",
    Nvram => "NVRAM",
    Occ => "OCC",
    FirData => "FIRDATA",
    AttrTmp => "ATTR_TMP",
    AttrPerm => "ATTR_PERM",
    Capp => "CAPP",
    Version => "VERSION",
    RingOvd => "RINGOVD",
    Test => "TEST",
    TestRo => "TESTRO",
}

impl SectionId {
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Decodes a NUL padded TOC name field.
    pub fn from_raw_name(raw: &[u8; NAME_LEN]) -> Option<Self> {
        let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&raw[..end]).ok().and_then(Self::from_name)
    }

    pub fn raw_name(&self) -> [u8; NAME_LEN] {
        let mut raw = [0u8; NAME_LEN];
        let name = self.name().as_bytes();
        raw[..name.len()].copy_from_slice(name);
        raw
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl fmt::Display for UnknownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown PNOR section '{}'", self.0)
    }
}

impl std::error::Error for UnknownSection {}

impl FromStr for SectionId {
    type Err = UnknownSection;

    /// Accepts the on-flash name in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionId::ALL
            .iter()
            .copied()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}
