//! # Engine Module
//!
//! This module holds the per-structure validation machinery that the workflows
//! fan out over a structure catalog.
//!
//! ## Overview
//!
//! A validation run maps each catalogued structure file to a flat row of metrics.
//! Some metrics are measured natively from atom coordinates, the rest come from
//! external programs whose text output is parsed into columns.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Run settings, tool locations, timeouts and check thresholds
//! - **Native Checks** ([`checks`]) - PoseBusters-style tests and backbone geometry statistics
//! - **External Tools** ([`tools`]) - MolProbity, reduce/probe, Rosetta and DockQ wrappers
//! - **Progress Monitoring** ([`progress`]) - Progress events for user-facing reporting
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation

pub mod checks;
pub mod config;
pub mod error;
pub mod progress;
pub mod tools;
