use super::polymer_residues;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::plane_rmsd;
use crate::core::utils::identifiers::aromatic_ring_atoms;

const MIN_RING_ATOMS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RingFlatness {
    pub n_rings: usize,
    pub n_nonplanar: usize,
    /// Largest RMS distance of ring atoms to their best-fit plane.
    pub max_deviation: f64,
}

/// Planarity of the side-chain rings of PHE, TYR, TRP and HIS.
pub fn aromatic_flatness(structure: &Structure, tolerance: f64) -> RingFlatness {
    let mut report = RingFlatness::default();
    for residue_id in polymer_residues(structure) {
        let Some(ring) = structure
            .residue(residue_id)
            .and_then(|residue| aromatic_ring_atoms(&residue.name))
        else {
            continue;
        };
        let points: Vec<_> = ring
            .iter()
            .filter_map(|name| structure.atom_position(residue_id, name))
            .collect();
        if points.len() < MIN_RING_ATOMS {
            continue;
        }
        let Some(deviation) = plane_rmsd(&points) else {
            continue;
        };
        report.n_rings += 1;
        report.max_deviation = report.max_deviation.max(deviation);
        if deviation > tolerance {
            report.n_nonplanar += 1;
        }
    }
    report
}
