//! Native geometric checks computed directly from atom coordinates.
//!
//! Each submodule measures one property of a [`Structure`] and returns a plain
//! report type; [`posebusters`] and [`geometry`] assemble those reports into the
//! metric columns of their suites.

pub mod backbone;
pub mod cbeta;
pub mod chirality;
pub mod clashes;
pub mod disulfide;
pub mod geometry;
pub mod omega;
pub mod posebusters;
pub mod ramachandran;
pub mod rings;

use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use nalgebra::Point3;

/// Neighbouring residues of every chain, in file order, water excluded.
pub(crate) fn adjacent_residues(structure: &Structure) -> Vec<(ResidueId, ResidueId)> {
    structure
        .polymer_segments()
        .iter()
        .flat_map(|segment| segment.windows(2).map(|w| (w[0], w[1])))
        .collect()
}

/// Positions of the named atoms of one residue, or `None` if any is absent.
pub(crate) fn atom_positions<const N: usize>(
    structure: &Structure,
    residue: ResidueId,
    names: [&str; N],
) -> Option<[Point3<f64>; N]> {
    let mut positions = [Point3::origin(); N];
    for (slot, name) in positions.iter_mut().zip(names) {
        *slot = structure.atom_position(residue, name)?;
    }
    Some(positions)
}

/// Non-water residues, chain by chain.
pub(crate) fn polymer_residues(structure: &Structure) -> impl Iterator<Item = ResidueId> + '_ {
    structure
        .residues_iter()
        .filter(|(_, residue)| !residue.is_water())
        .map(|(id, _)| id)
}
