// File: lib.rs
// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2023-2025
// - Volker Schwaberow <volker@schwaberow.de>

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_inception)]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::new_without_default)]
#![allow(clippy::useless_vec)]

pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod errors;
pub mod forms;
pub mod http;
pub mod probe;
pub mod ratelimit;
pub mod reports;
pub mod signal;
pub mod source;
pub mod state;
pub mod stats;
pub mod target;
pub mod wordlist;

#[cfg(test)]
mod config_tests;

pub use engine::{Engine, ScanOutcome};
pub use errors::{ScanError, ScanResult};
