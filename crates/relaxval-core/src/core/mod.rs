//! # Core Module
//!
//! Stateless building blocks shared by every pipeline stage.
//!
//! - **Structure Representation** ([`models`]) - Atoms, residues, chains and structures
//! - **File I/O** ([`io`]) - The fixed-column PDB reader and gzip staging for external tools
//! - **Geometry and Lookup Tables** ([`utils`]) - Distances, angles, dihedrals, plane fits,
//!   the cell grid and residue identifier tables
//! - **Discovery** ([`catalog`]) - Enumeration of structure files by naming convention
//! - **Statistics** ([`stats`]) - Descriptive statistics, correlation, non-parametric tests
//!   and effect sizes
//! - **Tables** ([`table`]) - Metric records and the CSV/JSON interchange between stages

pub mod catalog;
pub mod io;
pub mod models;
pub mod stats;
pub mod table;
pub mod utils;
