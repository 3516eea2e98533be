//! Provides input functionality for coordinate files.
//!
//! Structures are read through the [`traits::StructureFile`] interface, which the
//! fixed-column PDB reader implements. External validation tools that need a
//! plain file on disk go through [`staging`], which decompresses gzip inputs into
//! self-deleting temporary files.

pub mod pdb;
pub mod staging;
pub mod traits;
