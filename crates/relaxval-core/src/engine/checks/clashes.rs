use crate::core::models::ids::AtomId;
use crate::core::models::structure::Structure;
use crate::core::utils::spatial::pairs_within;
use nalgebra::Point3;
use std::cmp::Ordering;
use tracing::debug;

/// Largest van der Waals radius in the clash radius table (sulfur).
const MAX_VDW_RADIUS: f64 = 1.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clash {
    pub atom_a: AtomId,
    pub atom_b: AtomId,
    pub distance: f64,
    /// r_a + r_b - d, in Angstrom.
    pub overlap: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClashReport {
    /// Clashes sorted from the worst overlap down.
    pub clashes: Vec<Clash>,
}

impl ClashReport {
    pub fn count(&self) -> usize {
        self.clashes.len()
    }

    /// Largest overlap; 0 without clashes.
    pub fn worst_overlap(&self) -> f64 {
        self.clashes.first().map_or(0.0, |c| c.overlap)
    }
}

struct ClashAtom {
    id: AtomId,
    chain: char,
    seq: isize,
    radius: f64,
    position: Point3<f64>,
}

/// Atom pairs whose van der Waals spheres overlap by more than `min_overlap`.
///
/// Pairs within the same chain whose residue numbers differ by at most one are
/// covalent neighbours and never count. Water is ignored.
pub fn find_clashes(structure: &Structure, min_overlap: f64) -> ClashReport {
    let atoms: Vec<ClashAtom> = structure
        .residues_iter()
        .filter(|(_, residue)| !residue.is_water())
        .flat_map(|(_, residue)| {
            residue.atoms().iter().filter_map(move |&id| {
                let atom = structure.atom(id)?;
                Some(ClashAtom {
                    id,
                    chain: residue.chain_label(),
                    seq: residue.seq,
                    radius: atom.element.vdw_radius(),
                    position: atom.position,
                })
            })
        })
        .collect();

    let positions: Vec<Point3<f64>> = atoms.iter().map(|a| a.position).collect();
    let cutoff = 2.0 * MAX_VDW_RADIUS - min_overlap;
    let mut clashes: Vec<Clash> = pairs_within(&positions, cutoff)
        .into_iter()
        .filter_map(|(i, j, d)| {
            let (a, b) = (&atoms[i], &atoms[j]);
            if a.chain == b.chain && (a.seq - b.seq).abs() <= 1 {
                return None;
            }
            let overlap = a.radius + b.radius - d;
            (overlap > min_overlap).then_some(Clash {
                atom_a: a.id,
                atom_b: b.id,
                distance: d,
                overlap,
            })
        })
        .collect();

    clashes.sort_by(|a, b| b.overlap.partial_cmp(&a.overlap).unwrap_or(Ordering::Equal));
    debug!(
        atoms = atoms.len(),
        clashes = clashes.len(),
        "Steric clash scan complete."
    );
    ClashReport { clashes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{structure_from, tri_alanine};

    #[test]
    fn ideal_tripeptide_has_no_clashes() {
        let report = find_clashes(&tri_alanine(), 0.5);
        assert_eq!(report.count(), 0);
        assert_eq!(report.worst_overlap(), 0.0);
    }

    #[test]
    fn overlapping_distant_residues_clash() {
        let structure = structure_from(&[
            ('A', 1, "ALA", "CB", [0.0, 0.0, 0.0]),
            ('A', 5, "ALA", "CB", [2.5, 0.0, 0.0]),
            ('A', 9, "SER", "OG", [0.0, 3.0, 0.0]),
        ]);
        let report = find_clashes(&structure, 0.5);
        assert_eq!(report.count(), 1);
        assert!((report.worst_overlap() - 0.9).abs() < 1e-9);
        assert!((report.clashes[0].distance - 2.5).abs() < 1e-9);
    }

    #[test]
    fn covalent_neighbours_and_water_are_ignored() {
        let structure = structure_from(&[
            ('A', 1, "ALA", "C", [0.0, 0.0, 0.0]),
            ('A', 2, "ALA", "N", [1.3, 0.0, 0.0]),
            ('B', 2, "ALA", "N", [0.0, 1.5, 0.0]),
            ('W', 1, "HOH", "O", [0.0, 0.0, 1.0]),
        ]);
        let report = find_clashes(&structure, 0.5);
        // Only the cross-chain pairs remain.
        assert_eq!(report.count(), 2);
        assert!(report.clashes.iter().all(|c| c.distance > 1.4));
    }
}
