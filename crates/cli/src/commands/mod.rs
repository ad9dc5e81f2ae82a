// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod build;
pub mod clear;
pub mod fix_ecc;
pub mod inspect;
pub mod stats;
