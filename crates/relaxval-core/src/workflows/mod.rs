//! # Workflows Module
//!
//! High-level entry points, one per pipeline stage. Each stage reads its inputs from
//! the file system, reports progress through a [`ProgressReporter`](crate::engine::progress::ProgressReporter),
//! and writes CSV (and for figures, SVG) outputs that the next stage consumes.
//!
//! ## Architecture
//!
//! - **Validation** ([`validate`]) - Runs the selected suites over every catalogued structure
//!   and compiles per-protein and global result tables.
//! - **Analysis** ([`analyze`]) - Descriptive statistics, hypothesis tests, effect sizes,
//!   correlations and the before/after scorecard over the compiled tables.
//! - **Figures** ([`figures`]) - SVG figures over the compiled tables.
//! - **DockQ** ([`dockq`]) - Interface quality of predicted complexes against bound natives.
//! - **Trials** ([`trials`]) - Consistency of repeated validation runs.

pub mod analyze;
pub mod dockq;
pub mod figures;
pub mod trials;
pub mod validate;
