use crate::core::models::structure::Structure;
use crate::core::utils::geometry::distance;
use itertools::Itertools;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disulfides {
    pub n_bonds: usize,
    pub n_bad: usize,
}

/// Cystine bridges: SG-SG pairs strictly inside `bond`, flagged bad outside `ideal`.
pub fn disulfides(structure: &Structure, bond: (f64, f64), ideal: (f64, f64)) -> Disulfides {
    let sulfurs: Vec<_> = structure
        .residues_iter()
        .filter(|(_, residue)| residue.name.trim() == "CYS")
        .filter_map(|(id, _)| structure.atom_position(id, "SG"))
        .collect();

    let mut report = Disulfides::default();
    for (a, b) in sulfurs.iter().tuple_combinations() {
        let d = distance(a, b);
        if d > bond.0 && d < bond.1 {
            report.n_bonds += 1;
            if d < ideal.0 || d > ideal.1 {
                report.n_bad += 1;
            }
        }
    }
    report
}
