//! # Core Models Module
//!
//! Data structures for the coordinate files that the validation suites inspect.
//!
//! ## Key Components
//!
//! - [`atom`] - Atom records with element, alternate location and coordinates
//! - [`residue`] - Residues keyed by chain, sequence number and insertion code
//! - [`chain`] - Ordered residue lists per chain
//! - [`structure`] - The complete structure with slot-map storage and lookups
//! - [`ids`] - Stable identifier types and the file-level [`ids::ResidueKey`]
//!
//! ## Usage
//!
//! ```ignore
//! use relaxval::core::models::{atom::Atom, structure::Structure};
//!
//! let mut structure = Structure::new();
//! let chain_id = structure.add_chain('A');
//! let residue_id = structure.add_residue(chain_id, 1, None, "ALA").unwrap();
//! structure.add_atom_to_residue(residue_id, Atom::new("CA", residue_id, Point3::origin()));
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod residue;
pub mod structure;
