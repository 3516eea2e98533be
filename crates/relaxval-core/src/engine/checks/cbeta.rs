use super::{atom_positions, polymer_residues};
use crate::core::models::structure::Structure;
use crate::core::stats::descriptive::{mean, population_std_dev};
use crate::core::table::{MetricRecord, MetricValue};
use crate::core::utils::geometry::{calculate_cb_position, distance};

/// Deviation, in Angstrom, beyond which a C-beta atom is an outlier.
pub const CBETA_OUTLIER: f64 = 0.25;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CbetaDeviations {
    pub deviations: Vec<f64>,
}

impl CbetaDeviations {
    /// Distance between each observed C-beta and the one ideal backbone geometry predicts.
    pub fn measure(structure: &Structure) -> Self {
        let deviations = polymer_residues(structure)
            .filter(|&id| {
                structure
                    .residue(id)
                    .is_some_and(|r| r.is_standard() && r.name.trim() != "GLY")
            })
            .filter_map(|id| {
                let [n, ca, c, cb] = atom_positions(structure, id, ["N", "CA", "C", "CB"])?;
                Some(distance(&calculate_cb_position(&n, &ca, &c), &cb))
            })
            .collect();
        Self { deviations }
    }

    pub fn n_outliers(&self) -> usize {
        self.deviations.iter().filter(|&&d| d > CBETA_OUTLIER).count()
    }

    /// RMS deviation in units of the outlier cut-off.
    pub fn rmsz(&self) -> Option<f64> {
        let squares: Vec<f64> = self.deviations.iter().map(|d| d * d).collect();
        mean(&squares).map(|ms| ms.sqrt() / CBETA_OUTLIER)
    }

    pub fn to_record(&self) -> MetricRecord {
        let d = &self.deviations;
        let mut record = MetricRecord::new();
        record.set("cbeta_n", MetricValue::count(d.len()));
        record.set("cbeta_mean", MetricValue::from_option(mean(d), 4));
        record.set(
            "cbeta_max",
            MetricValue::from_option(d.iter().copied().reduce(f64::max), 4),
        );
        record.set("cbeta_std", MetricValue::from_option(population_std_dev(d), 4));
        record.set("cbeta_rmsz", MetricValue::from_option(self.rmsz(), 3));
        record.set("cbeta_outliers", MetricValue::count(self.n_outliers()));
        record
    }
}
