use super::{adjacent_residues, atom_positions};
use crate::core::models::structure::Structure;
use crate::core::stats::descriptive::{mean, population_std_dev};
use crate::core::table::{MetricRecord, MetricValue};
use crate::core::utils::geometry::dihedral;

/// ω = CA(i)-C(i)-N(i+1)-CA(i+1) for every pair of neighbouring residues.
pub fn omega_angles(structure: &Structure) -> Vec<f64> {
    adjacent_residues(structure)
        .into_iter()
        .filter_map(|(prev, next)| {
            let [ca1, c1] = atom_positions(structure, prev, ["CA", "C"])?;
            let [n2, ca2] = atom_positions(structure, next, ["N", "CA"])?;
            Some(dihedral(&ca1, &c1, &n2, &ca2))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeptidePlanarity {
    pub n_omega: usize,
    pub n_cis: usize,
    pub n_trans: usize,
    pub n_twisted: usize,
    pub mean_abs_omega: Option<f64>,
}

impl PeptidePlanarity {
    /// Cis below `cis_max` degrees of |ω|, trans above `trans_min`, twisted in between.
    pub fn classify(omegas: &[f64], cis_max: f64, trans_min: f64) -> Self {
        let mut report = Self {
            n_omega: omegas.len(),
            ..Self::default()
        };
        for omega in omegas.iter().map(|w| w.abs()) {
            if omega < cis_max {
                report.n_cis += 1;
            } else if omega > trans_min {
                report.n_trans += 1;
            } else {
                report.n_twisted += 1;
            }
        }
        let abs: Vec<f64> = omegas.iter().map(|w| w.abs()).collect();
        report.mean_abs_omega = mean(&abs);
        report
    }
}

/// Distribution columns of the extended geometry suite.
pub fn distribution(omegas: &[f64]) -> MetricRecord {
    let mut record = MetricRecord::new();
    record.set("omega_n", MetricValue::count(omegas.len()));
    let min = omegas.iter().copied().reduce(f64::min);
    let max = omegas.iter().copied().reduce(f64::max);
    record.set("omega_mean", MetricValue::from_option(mean(omegas), 2));
    record.set(
        "omega_std",
        MetricValue::from_option(population_std_dev(omegas), 2),
    );
    record.set("omega_min", MetricValue::from_option(min, 2));
    record.set("omega_max", MetricValue::from_option(max, 2));
    let trans = omegas
        .iter()
        .filter(|w| (w.abs() - 180.0).abs() < 30.0)
        .count();
    let cis = omegas.iter().filter(|w| w.abs() < 30.0).count();
    record.set("omega_trans", MetricValue::count(trans));
    record.set("omega_cis", MetricValue::count(cis));
    record
}
