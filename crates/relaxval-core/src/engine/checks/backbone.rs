use super::{adjacent_residues, atom_positions, polymer_residues};
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{angle, distance};
use crate::core::utils::identifiers::BACKBONE_ATOMS;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Connectivity {
    pub n_breaks: usize,
    /// Longest C(i)-N(i+1) gap counted as a break; 0 without breaks.
    pub max_break: f64,
}

/// Chain breaks: neighbouring residues whose C(i)-N(i+1) distance exceeds `max_gap`.
pub fn connectivity(structure: &Structure, max_gap: f64) -> Connectivity {
    let mut report = Connectivity::default();
    for (prev, next) in adjacent_residues(structure) {
        let (Some(c), Some(n)) = (
            structure.atom_position(prev, "C"),
            structure.atom_position(next, "N"),
        ) else {
            continue;
        };
        let d = distance(&c, &n);
        if d > max_gap {
            report.n_breaks += 1;
            report.max_break = report.max_break.max(d);
        }
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeptideBonds {
    pub lengths: Vec<f64>,
    pub n_outliers: usize,
}

/// C(i)-N(i+1) lengths between residues with consecutive sequence numbers.
pub fn peptide_bonds(structure: &Structure, (lo, hi): (f64, f64)) -> PeptideBonds {
    let mut report = PeptideBonds::default();
    for (prev, next) in adjacent_residues(structure) {
        let sequential = match (structure.residue(prev), structure.residue(next)) {
            (Some(a), Some(b)) => b.seq - a.seq == 1,
            _ => false,
        };
        if !sequential {
            continue;
        }
        let (Some(c), Some(n)) = (
            structure.atom_position(prev, "C"),
            structure.atom_position(next, "N"),
        ) else {
            continue;
        };
        let d = distance(&c, &n);
        if d < lo || d > hi {
            report.n_outliers += 1;
        }
        report.lengths.push(d);
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackboneAngles {
    pub angles: Vec<f64>,
    pub n_outliers: usize,
}

/// N-CA-C angle of every residue that has all three atoms.
pub fn backbone_angles(structure: &Structure, (lo, hi): (f64, f64)) -> BackboneAngles {
    let mut report = BackboneAngles::default();
    for residue in polymer_residues(structure) {
        let Some([n, ca, c]) = atom_positions(structure, residue, ["N", "CA", "C"]) else {
            continue;
        };
        let theta = angle(&n, &ca, &c);
        if !(lo..=hi).contains(&theta) {
            report.n_outliers += 1;
        }
        report.angles.push(theta);
    }
    report
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completeness {
    pub n_residues: usize,
    pub n_incomplete: usize,
    pub n_missing_atoms: usize,
}

/// Residues lacking any of N, CA, C or O.
pub fn completeness(structure: &Structure) -> Completeness {
    let mut report = Completeness::default();
    for (_, residue) in structure.residues_iter() {
        if residue.is_water() {
            continue;
        }
        report.n_residues += 1;
        let missing = BACKBONE_ATOMS
            .iter()
            .filter(|name| !residue.has_atom(name))
            .count();
        if missing > 0 {
            report.n_incomplete += 1;
            report.n_missing_atoms += missing;
        }
    }
    report
}
