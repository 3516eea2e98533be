use super::{atom_positions, polymer_residues};
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::dihedral;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chirality {
    pub n_centers: usize,
    pub n_d_residues: usize,
}

/// Counts D-configured alpha carbons among non-glycine residues.
///
/// The improper dihedral N-CA-C-CB sits near -122 degrees for an L residue;
/// anything above `+threshold` is taken as D.
pub fn chirality(structure: &Structure, threshold: f64) -> Chirality {
    let mut report = Chirality::default();
    for residue in polymer_residues(structure) {
        if structure
            .residue(residue)
            .is_none_or(|r| r.name.trim() == "GLY")
        {
            continue;
        }
        let Some([n, ca, c, cb]) = atom_positions(structure, residue, ["N", "CA", "C", "CB"])
        else {
            continue;
        };
        report.n_centers += 1;
        if dihedral(&n, &ca, &c, &cb) > threshold {
            report.n_d_residues += 1;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mirrored, structure_from, tri_alanine, tri_alanine_atoms};

    #[test]
    fn l_alanines_pass() {
        assert_eq!(
            chirality(&tri_alanine(), 30.0),
            Chirality {
                n_centers: 3,
                n_d_residues: 0
            }
        );
    }

    #[test]
    fn mirror_image_is_all_d() {
        let structure = structure_from(&mirrored(&tri_alanine_atoms()));
        assert_eq!(chirality(&structure, 30.0).n_d_residues, 3);
    }

    #[test]
    fn glycine_and_incomplete_residues_are_skipped() {
        let atoms: Vec<_> = tri_alanine_atoms()
            .into_iter()
            .map(|(c, s, _, n, p)| (c, s, if s == 1 { "GLY" } else { "ALA" }, n, p))
            .filter(|&(_, s, _, n, _)| !(s == 3 && n == "CB"))
            .collect();
        assert_eq!(chirality(&structure_from(&atoms), 30.0).n_centers, 1);
    }
}
