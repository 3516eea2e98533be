//! # relaxval Core Library
//!
//! Aggregation and analysis of structure-validation metrics for experimental and
//! predicted protein structures before and after Rosetta relaxation.
//!
//! ## Architectural Philosophy
//!
//! The library keeps the same strict three-layer split throughout, so that each
//! stage can be tested in isolation and external tools stay behind one seam.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`), the PDB
//!   reader, geometry, structure discovery (`catalog`), statistics and metric tables.
//!
//! - **[`engine`]: The Logic Core.** Configuration, errors and progress reporting,
//!   the native geometric checks (`checks`) and the wrappers around the external
//!   validation binaries (`tools`).
//!
//! - **[`workflows`]: The Public API.** One function per pipeline stage: validation,
//!   statistical analysis, figures, DockQ assessment and trial comparison. Each
//!   stage reads the files the previous one wrote and runs once, start to finish.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
mod test_support;
