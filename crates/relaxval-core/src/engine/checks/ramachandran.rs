use super::atom_positions;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::dihedral;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Beta,
    Alpha,
    LeftHanded,
    /// Outside every region, tolerated for glycine.
    Glycine,
    Outlier,
}

impl Region {
    /// Coarse Ramachandran region of a (phi, psi) pair, in degrees.
    pub fn classify(phi: f64, psi: f64, is_glycine: bool) -> Self {
        let in_range = |v: f64, lo: f64, hi: f64| (lo..=hi).contains(&v);
        if in_range(phi, -180.0, -45.0)
            && (in_range(psi, 45.0, 180.0) || in_range(psi, -180.0, -135.0))
        {
            Region::Beta
        } else if in_range(phi, -100.0, -45.0) && in_range(psi, -65.0, -15.0) {
            Region::Alpha
        } else if in_range(phi, 30.0, 90.0) && in_range(psi, -30.0, 60.0) {
            Region::LeftHanded
        } else if is_glycine {
            Region::Glycine
        } else {
            Region::Outlier
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhiPsi {
    pub n_residues: usize,
    pub n_outliers: usize,
}

/// Backbone (phi, psi) of every interior residue of each chain.
pub fn phi_psi_angles(structure: &Structure) -> Vec<(f64, f64, bool)> {
    let mut angles = Vec::new();
    for segment in structure.polymer_segments() {
        for window in segment.windows(3) {
            let (Some([c_prev]), Some([n, ca, c]), Some([n_next])) = (
                atom_positions(structure, window[0], ["C"]),
                atom_positions(structure, window[1], ["N", "CA", "C"]),
                atom_positions(structure, window[2], ["N"]),
            ) else {
                continue;
            };
            let is_glycine = structure
                .residue(window[1])
                .is_some_and(|r| r.name.trim() == "GLY");
            angles.push((
                dihedral(&c_prev, &n, &ca, &c),
                dihedral(&n, &ca, &c, &n_next),
                is_glycine,
            ));
        }
    }
    angles
}

pub fn phi_psi(structure: &Structure) -> PhiPsi {
    let angles = phi_psi_angles(structure);
    PhiPsi {
        n_residues: angles.len(),
        n_outliers: angles
            .iter()
            .filter(|&&(phi, psi, gly)| Region::classify(phi, psi, gly) == Region::Outlier)
            .count(),
    }
}
