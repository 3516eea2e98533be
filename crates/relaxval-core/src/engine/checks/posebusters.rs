//! PoseBusters-style physical plausibility tests.
//!
//! Every test yields one boolean pass column plus the raw measurements behind
//! it (prefixed `raw_`). The two halves are written to separate tables.

use super::{backbone, chirality, clashes, disulfide, omega, ramachandran, rings};
use crate::core::models::structure::Structure;
use crate::core::stats::descriptive::{mean, population_std_dev};
use crate::core::table::{MetricRecord, MetricValue};
use crate::core::utils::identifiers::is_standard_residue;
use crate::engine::config::PoseBustersThresholds;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Pass columns in output order.
pub const TESTS: [&str; 12] = [
    "structure_loaded",
    "valid_residues",
    "backbone_connected",
    "bond_lengths",
    "bond_angles",
    "steric_clashes",
    "aromatic_flatness",
    "peptide_planarity",
    "chirality",
    "complete_residues",
    "disulfide_geometry",
    "internal_energy",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseBustersReport {
    /// Pass columns followed by `all_pass` and `n_pass`.
    pub pass: MetricRecord,
    pub raw: MetricRecord,
}

impl PoseBustersReport {
    pub fn all_pass(&self) -> bool {
        self.pass
            .get("all_pass")
            .and_then(MetricValue::as_bool)
            .unwrap_or(false)
    }

    /// Both halves in one record, pass columns first.
    pub fn combined(&self) -> MetricRecord {
        let mut record = self.pass.clone();
        record.merge(&self.raw);
        record
    }
}

/// Runs all twelve tests on `structure`.
///
/// `rosetta_score` is the total Rosetta energy when it could be computed; the
/// internal energy test is Missing otherwise and does not gate `all_pass`.
#[instrument(skip_all, name = "posebusters_suite")]
pub fn evaluate(
    structure: &Structure,
    thresholds: &PoseBustersThresholds,
    rosetta_score: Option<f64>,
) -> PoseBustersReport {
    let mut pass = MetricRecord::new();
    let mut raw = MetricRecord::new();

    let n_atoms = structure.atom_count();
    pass.set("structure_loaded", n_atoms > 0);
    raw.set("raw_n_atoms", MetricValue::count(n_atoms));

    let residue_types: BTreeSet<&str> = structure
        .residues_iter()
        .filter(|(_, residue)| !residue.is_water())
        .map(|(_, residue)| residue.name.trim())
        .collect();
    let non_standard: Vec<&str> = residue_types
        .iter()
        .copied()
        .filter(|name| !is_standard_residue(name))
        .collect();
    pass.set("valid_residues", non_standard.is_empty());
    raw.set("raw_n_residue_types", MetricValue::count(residue_types.len()));
    raw.set(
        "raw_n_valid_residue_types",
        MetricValue::count(residue_types.len() - non_standard.len()),
    );
    raw.set("raw_non_standard_residues", non_standard.join(";"));

    let connectivity = backbone::connectivity(structure, thresholds.backbone_break);
    pass.set("backbone_connected", connectivity.n_breaks == 0);
    raw.set("raw_n_backbone_breaks", MetricValue::count(connectivity.n_breaks));
    raw.set(
        "raw_max_break_distance",
        MetricValue::rounded(connectivity.max_break, 3),
    );

    let bonds = backbone::peptide_bonds(structure, thresholds.peptide_bond);
    pass.set("bond_lengths", bonds.n_outliers == 0);
    raw.set("raw_n_peptide_bonds", MetricValue::count(bonds.lengths.len()));
    raw.set("raw_n_bond_outliers", MetricValue::count(bonds.n_outliers));
    raw.set(
        "raw_mean_bond_length",
        MetricValue::from_option(mean(&bonds.lengths), 4),
    );
    raw.set(
        "raw_std_bond_length",
        MetricValue::from_option(population_std_dev(&bonds.lengths), 4),
    );

    let angles = backbone::backbone_angles(structure, thresholds.backbone_angle);
    pass.set("bond_angles", angles.n_outliers == 0);
    raw.set("raw_n_backbone_angles", MetricValue::count(angles.angles.len()));
    raw.set("raw_n_angle_outliers", MetricValue::count(angles.n_outliers));
    raw.set(
        "raw_mean_angle",
        MetricValue::from_option(mean(&angles.angles), 2),
    );
    raw.set(
        "raw_std_angle",
        MetricValue::from_option(population_std_dev(&angles.angles), 2),
    );

    let clash_report = clashes::find_clashes(structure, thresholds.clash_overlap);
    pass.set("steric_clashes", clash_report.count() < thresholds.max_clashes);
    raw.set("raw_n_clashes", MetricValue::count(clash_report.count()));
    raw.set(
        "raw_worst_clash",
        MetricValue::rounded(clash_report.worst_overlap(), 3),
    );

    let flatness = rings::aromatic_flatness(structure, thresholds.ring_planarity);
    pass.set("aromatic_flatness", flatness.n_nonplanar == 0);
    raw.set("raw_n_aromatic_rings", MetricValue::count(flatness.n_rings));
    raw.set("raw_n_nonplanar_rings", MetricValue::count(flatness.n_nonplanar));
    raw.set(
        "raw_max_ring_deviation",
        MetricValue::rounded(flatness.max_deviation, 3),
    );

    let planarity = omega::PeptidePlanarity::classify(
        &omega::omega_angles(structure),
        thresholds.omega_cis,
        thresholds.omega_trans,
    );
    pass.set("peptide_planarity", planarity.n_twisted == 0);
    raw.set("raw_n_omega_angles", MetricValue::count(planarity.n_omega));
    raw.set("raw_n_cis", MetricValue::count(planarity.n_cis));
    raw.set("raw_n_trans", MetricValue::count(planarity.n_trans));
    raw.set("raw_n_twisted", MetricValue::count(planarity.n_twisted));
    raw.set(
        "raw_mean_abs_omega",
        MetricValue::from_option(planarity.mean_abs_omega, 2),
    );

    let chiral = chirality::chirality(structure, thresholds.chirality);
    pass.set("chirality", chiral.n_d_residues == 0);
    raw.set("raw_n_chiral_centers", MetricValue::count(chiral.n_centers));
    raw.set("raw_n_d_amino_acids", MetricValue::count(chiral.n_d_residues));

    let complete = backbone::completeness(structure);
    pass.set("complete_residues", complete.n_incomplete == 0);
    raw.set("raw_n_residues", MetricValue::count(complete.n_residues));
    raw.set(
        "raw_n_incomplete_residues",
        MetricValue::count(complete.n_incomplete),
    );
    raw.set(
        "raw_n_missing_backbone_atoms",
        MetricValue::count(complete.n_missing_atoms),
    );

    let bridges = disulfide::disulfides(
        structure,
        thresholds.disulfide_bond,
        thresholds.disulfide_ideal,
    );
    pass.set("disulfide_geometry", bridges.n_bad == 0);
    raw.set("raw_n_disulfides", MetricValue::count(bridges.n_bonds));
    raw.set("raw_n_bad_disulfides", MetricValue::count(bridges.n_bad));

    match rosetta_score {
        Some(score) => pass.set("internal_energy", score < 0.0),
        None => pass.set("internal_energy", MetricValue::Missing),
    }
    raw.set("raw_rosetta_score", MetricValue::from_option(rosetta_score, 3));

    let phi_psi = ramachandran::phi_psi(structure);
    raw.set("raw_n_phi_psi", MetricValue::count(phi_psi.n_residues));
    raw.set("raw_n_phi_psi_outliers", MetricValue::count(phi_psi.n_outliers));

    let outcomes: Vec<bool> = TESTS
        .iter()
        .filter_map(|test| pass.get(test).and_then(MetricValue::as_bool))
        .collect();
    let n_pass = outcomes.iter().filter(|&&ok| ok).count();
    let all_pass = n_pass == outcomes.len();
    pass.set("all_pass", all_pass);
    pass.set("n_pass", MetricValue::count(n_pass));

    debug!(n_atoms, n_pass, all_pass, "PoseBusters tests finished");
    PoseBustersReport { pass, raw }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mirrored, structure_from, tri_alanine, tri_alanine_atoms};

    fn passed(report: &PoseBustersReport, test: &str) -> Option<bool> {
        report.pass.get(test).and_then(MetricValue::as_bool)
    }

    #[test]
    fn ideal_tripeptide_passes_every_test() {
        let report = evaluate(&tri_alanine(), &PoseBustersThresholds::default(), None);
        for test in &TESTS[..11] {
            assert_eq!(passed(&report, test), Some(true), "{test} failed");
        }
        assert!(report.pass.get("internal_energy").unwrap().is_missing());
        assert!(report.all_pass());
        assert_eq!(report.pass.number("n_pass"), Some(11.0));

        let raw = &report.raw;
        assert_eq!(raw.number("raw_n_atoms"), Some(15.0));
        assert_eq!(raw.number("raw_n_peptide_bonds"), Some(2.0));
        assert!((raw.number("raw_mean_bond_length").unwrap() - 1.329).abs() < 0.002);
        assert!((raw.number("raw_mean_angle").unwrap() - 111.2).abs() < 0.1);
        assert_eq!(raw.number("raw_n_trans"), Some(2.0));
        assert_eq!(raw.number("raw_n_chiral_centers"), Some(3.0));
        assert_eq!(raw.number("raw_n_clashes"), Some(0.0));
        assert_eq!(raw.number("raw_n_phi_psi_outliers"), Some(0.0));
        assert_eq!(raw.text("raw_non_standard_residues"), Some(""));
    }

    #[test]
    fn mirror_image_is_flagged_as_d_amino_acids() {
        let structure = structure_from(&mirrored(&tri_alanine_atoms()));
        let report = evaluate(&structure, &PoseBustersThresholds::default(), None);
        assert_eq!(passed(&report, "chirality"), Some(false));
        assert_eq!(report.raw.number("raw_n_d_amino_acids"), Some(3.0));
        assert_eq!(passed(&report, "peptide_planarity"), Some(true));
        assert!(!report.all_pass());
        assert_eq!(report.pass.number("n_pass"), Some(10.0));
    }

    #[test]
    fn displaced_residue_breaks_backbone_and_clashes() {
        let atoms: Vec<_> = tri_alanine_atoms()
            .into_iter()
            .map(|(c, s, r, n, p)| {
                let (dx, dy) = if s == 3 { (-5.0, -3.0) } else { (0.0, 0.0) };
                (c, s, r, n, [p[0] + dx, p[1] + dy, p[2]])
            })
            .collect();
        let report = evaluate(&structure_from(&atoms), &PoseBustersThresholds::default(), None);
        assert_eq!(passed(&report, "backbone_connected"), Some(false));
        assert_eq!(report.raw.number("raw_n_backbone_breaks"), Some(1.0));
        assert!(report.raw.number("raw_max_break_distance").unwrap() > 5.0);
        assert_eq!(passed(&report, "steric_clashes"), Some(false));
        assert!(report.raw.number("raw_n_clashes").unwrap() >= 5.0);
        assert!(report.raw.number("raw_worst_clash").unwrap() > 2.0);
        assert!(!report.all_pass());
    }

    #[test]
    fn rosetta_score_gates_internal_energy() {
        let thresholds = PoseBustersThresholds::default();
        let good = evaluate(&tri_alanine(), &thresholds, Some(-42.1234));
        assert_eq!(passed(&good, "internal_energy"), Some(true));
        assert_eq!(good.raw.number("raw_rosetta_score"), Some(-42.123));
        assert_eq!(good.pass.number("n_pass"), Some(12.0));

        let bad = evaluate(&tri_alanine(), &thresholds, Some(15.0));
        assert_eq!(passed(&bad, "internal_energy"), Some(false));
        assert!(!bad.all_pass());
    }

    #[test]
    fn unknown_residues_are_listed() {
        let mut atoms = tri_alanine_atoms();
        atoms.push(('A', 4, "MSE", "SE", [20.0, 20.0, 20.0]));
        atoms.push(('A', 5, "HOH", "O", [30.0, 20.0, 20.0]));
        atoms.push(('A', 6, "LIG", "C1", [40.0, 20.0, 20.0]));
        let report = evaluate(&structure_from(&atoms), &PoseBustersThresholds::default(), None);
        assert_eq!(passed(&report, "valid_residues"), Some(false));
        assert_eq!(report.raw.text("raw_non_standard_residues"), Some("LIG;MSE"));
        assert_eq!(report.raw.number("raw_n_residue_types"), Some(3.0));
        assert_eq!(report.raw.number("raw_n_valid_residue_types"), Some(1.0));
    }

    #[test]
    fn combined_record_keeps_pass_columns_first() {
        let report = evaluate(&tri_alanine(), &PoseBustersThresholds::default(), None);
        let combined = report.combined();
        let first: Vec<&str> = combined.iter().map(|(name, _)| name).take(2).collect();
        assert_eq!(first, ["structure_loaded", "valid_residues"]);
        assert!(combined.get("raw_n_atoms").is_some());
    }
}
