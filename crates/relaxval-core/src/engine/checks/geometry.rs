use super::{adjacent_residues, cbeta, omega};
use crate::core::models::ids::ResidueId;
use crate::core::models::structure::Structure;
use crate::core::table::{MetricRecord, MetricValue};
use crate::core::utils::geometry::{angle, distance};
use tracing::instrument;

/// Peptide bonds longer than this are chain breaks, not restraints.
const MAX_PEPTIDE_BOND: f64 = 2.0;
/// |z| above which a restraint counts as an outlier.
const OUTLIER_Z: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
struct Target {
    ideal: f64,
    sigma: f64,
}

impl Target {
    const fn new(ideal: f64, sigma: f64) -> Self {
        Self { ideal, sigma }
    }

    fn z(self, value: f64) -> f64 {
        (value - self.ideal) / self.sigma
    }
}

// Engh & Huber backbone targets; bonds in Angstrom, angles in degrees.
const N_CA: Target = Target::new(1.458, 0.019);
const CA_C: Target = Target::new(1.525, 0.021);
const C_O: Target = Target::new(1.231, 0.020);
const C_N: Target = Target::new(1.329, 0.014);
const CA_CB: Target = Target::new(1.530, 0.020);

const N_CA_C: Target = Target::new(111.2, 2.8);
const CA_C_N: Target = Target::new(116.2, 2.0);
const C_N_CA: Target = Target::new(121.7, 1.8);
const CA_C_O: Target = Target::new(120.1, 2.1);
const O_C_N: Target = Target::new(122.7, 1.6);
const N_CA_CB: Target = Target::new(110.5, 1.7);
const C_CA_CB: Target = Target::new(110.1, 1.9);

const INTRA_BONDS: [(&str, &str, Target); 4] = [
    ("N", "CA", N_CA),
    ("CA", "C", CA_C),
    ("C", "O", C_O),
    ("CA", "CB", CA_CB),
];

const INTRA_ANGLES: [(&str, &str, &str, Target); 4] = [
    ("N", "CA", "C", N_CA_C),
    ("CA", "C", "O", CA_C_O),
    ("N", "CA", "CB", N_CA_CB),
    ("C", "CA", "CB", C_CA_CB),
];

/// Bond and angle z-scores of the protein backbone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Restraints {
    pub bond_z: Vec<f64>,
    pub angle_z: Vec<f64>,
}

fn rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some((values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt())
}

fn outliers(values: &[f64]) -> usize {
    values.iter().filter(|z| z.abs() > OUTLIER_Z).count()
}

impl Restraints {
    pub fn bond_rmsz(&self) -> Option<f64> {
        rms(&self.bond_z)
    }

    pub fn angle_rmsz(&self) -> Option<f64> {
        rms(&self.angle_z)
    }

    fn push_bond(
        &mut self,
        structure: &Structure,
        a: (ResidueId, &str),
        b: (ResidueId, &str),
        target: Target,
    ) {
        if let (Some(pa), Some(pb)) = (
            structure.atom_position(a.0, a.1),
            structure.atom_position(b.0, b.1),
        ) {
            self.bond_z.push(target.z(distance(&pa, &pb)));
        }
    }

    fn push_angle(&mut self, structure: &Structure, atoms: [(ResidueId, &str); 3], target: Target) {
        let [a, b, c] = atoms.map(|(res, name)| structure.atom_position(res, name));
        if let (Some(a), Some(b), Some(c)) = (a, b, c) {
            self.angle_z.push(target.z(angle(&a, &b, &c)));
        }
    }
}

/// Collects every backbone restraint of the standard amino acids in `structure`.
pub fn restraints(structure: &Structure) -> Restraints {
    let mut out = Restraints::default();
    let is_amino = |id: ResidueId| structure.residue(id).is_some_and(|r| r.is_standard());

    for (id, residue) in structure.residues_iter() {
        if !residue.is_standard() {
            continue;
        }
        for (a, b, target) in INTRA_BONDS {
            out.push_bond(structure, (id, a), (id, b), target);
        }
        for (a, b, c, target) in INTRA_ANGLES {
            out.push_angle(structure, [(id, a), (id, b), (id, c)], target);
        }
    }

    for (prev, next) in adjacent_residues(structure) {
        if !is_amino(prev) || !is_amino(next) {
            continue;
        }
        let Some(c_n) = structure
            .atom_position(prev, "C")
            .zip(structure.atom_position(next, "N"))
            .map(|(c, n)| distance(&c, &n))
        else {
            continue;
        };
        if c_n >= MAX_PEPTIDE_BOND {
            continue;
        }
        out.push_bond(structure, (prev, "C"), (next, "N"), C_N);
        out.push_angle(structure, [(prev, "CA"), (prev, "C"), (next, "N")], CA_C_N);
        out.push_angle(structure, [(prev, "O"), (prev, "C"), (next, "N")], O_C_N);
        out.push_angle(structure, [(prev, "C"), (next, "N"), (next, "CA")], C_N_CA);
    }
    out
}

/// The extended geometry suite: restraint RMSZ, C-beta deviations and the omega distribution.
#[instrument(skip_all, name = "geometry_suite")]
pub fn evaluate(structure: &Structure) -> MetricRecord {
    let restraints = restraints(structure);
    let mut record = MetricRecord::new();
    record.set("bond_rmsz", MetricValue::from_option(restraints.bond_rmsz(), 3));
    record.set("angle_rmsz", MetricValue::from_option(restraints.angle_rmsz(), 3));
    record.set("n_bonds", MetricValue::count(restraints.bond_z.len()));
    record.set("n_angles", MetricValue::count(restraints.angle_z.len()));
    record.set("n_bond_outliers", MetricValue::count(outliers(&restraints.bond_z)));
    record.set("n_angle_outliers", MetricValue::count(outliers(&restraints.angle_z)));

    record.merge(&cbeta::CbetaDeviations::measure(structure).to_record());
    record.merge(&omega::distribution(&omega::omega_angles(structure)));
    record
}
