use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Unknown validation suite '{0}' (expected posebusters, molprobity or geometry)")]
    UnknownSuite(String),
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// A group of validation metrics computed per structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suite {
    PoseBusters,
    MolProbity,
    Geometry,
}

impl Suite {
    pub const ALL: [Suite; 3] = [Suite::PoseBusters, Suite::MolProbity, Suite::Geometry];

    pub fn as_str(self) -> &'static str {
        match self {
            Suite::PoseBusters => "posebusters",
            Suite::MolProbity => "molprobity",
            Suite::Geometry => "geometry",
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "posebusters" => Ok(Suite::PoseBusters),
            "molprobity" => Ok(Suite::MolProbity),
            "geometry" => Ok(Suite::Geometry),
            other => Err(ConfigError::UnknownSuite(other.to_string())),
        }
    }
}

/// Locations of the external validation binaries.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolPaths {
    /// Prepended to `ramalyze`, `rotalyze`, ... to form the MolProbity command names.
    pub molprobity_prefix: String,
    pub reduce: PathBuf,
    pub probe: PathBuf,
    pub reduce_het_dict: Option<PathBuf>,
    /// Explicit `score_jd2` binary; searched on `PATH` when absent.
    pub rosetta_score: Option<PathBuf>,
    pub dockq: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            molprobity_prefix: "molprobity.".to_string(),
            reduce: PathBuf::from("reduce"),
            probe: PathBuf::from("probe"),
            reduce_het_dict: None,
            rosetta_score: None,
            dockq: PathBuf::from("DockQ"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub default: Duration,
    pub cablam: Duration,
    pub rosetta: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(60),
            cablam: Duration::from_secs(120),
            rosetta: Duration::from_secs(120),
        }
    }
}

/// Cut-offs of the native PoseBusters-style checks. Distances in Angstrom, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseBustersThresholds {
    pub clash_overlap: f64,
    pub max_clashes: usize,
    pub backbone_break: f64,
    pub peptide_bond: (f64, f64),
    pub backbone_angle: (f64, f64),
    pub ring_planarity: f64,
    pub omega_cis: f64,
    pub omega_trans: f64,
    pub chirality: f64,
    pub disulfide_bond: (f64, f64),
    pub disulfide_ideal: (f64, f64),
}

impl Default for PoseBustersThresholds {
    fn default() -> Self {
        Self {
            clash_overlap: 0.5,
            max_clashes: 5,
            backbone_break: 2.0,
            peptide_bond: (1.18, 1.48),
            backbone_angle: (100.0, 120.0),
            ring_planarity: 0.1,
            omega_cis: 30.0,
            omega_trans: 150.0,
            chirality: 30.0,
            disulfide_bond: (1.8, 2.5),
            disulfide_ideal: (1.95, 2.15),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationConfig {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub suites: Vec<Suite>,
    pub proteins: Vec<String>,
    pub skip_existing: bool,
    pub tools: ToolPaths,
    pub timeouts: Timeouts,
    pub thresholds: PoseBustersThresholds,
}

impl ValidationConfig {
    pub fn runs(&self, suite: Suite) -> bool {
        self.suites.contains(&suite)
    }

    pub fn proteins_dir(&self) -> PathBuf {
        self.root.join("proteins")
    }

    pub fn analysis_dir(&self, protein: &str) -> PathBuf {
        self.proteins_dir().join(protein).join("analysis")
    }
}

#[derive(Default)]
pub struct ValidationConfigBuilder {
    root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    suites: Option<Vec<Suite>>,
    proteins: Vec<String>,
    skip_existing: bool,
    tools: Option<ToolPaths>,
    timeouts: Option<Timeouts>,
    thresholds: Option<PoseBustersThresholds>,
}

impl ValidationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, path: PathBuf) -> Self {
        self.root = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn suites(mut self, suites: Vec<Suite>) -> Self {
        self.suites = Some(suites);
        self
    }
    pub fn proteins(mut self, proteins: Vec<String>) -> Self {
        self.proteins = proteins;
        self
    }
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }
    pub fn tools(mut self, tools: ToolPaths) -> Self {
        self.tools = Some(tools);
        self
    }
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
    pub fn thresholds(mut self, thresholds: PoseBustersThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn build(self) -> Result<ValidationConfig, ConfigError> {
        let root = self.root.ok_or(ConfigError::MissingParameter("root"))?;
        let mut suites = self.suites.unwrap_or_else(|| Suite::ALL.to_vec());
        suites.sort();
        suites.dedup();
        if suites.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "suites",
                reason: "at least one suite must be selected".to_string(),
            });
        }
        let thresholds = self.thresholds.unwrap_or_default();
        if thresholds.clash_overlap <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "clash_overlap",
                reason: format!("must be positive, got {}", thresholds.clash_overlap),
            });
        }
        Ok(ValidationConfig {
            output_dir: self
                .output_dir
                .unwrap_or_else(|| root.join("validation_results")),
            root,
            suites,
            proteins: self.proteins,
            skip_existing: self.skip_existing,
            tools: self.tools.unwrap_or_default(),
            timeouts: self.timeouts.unwrap_or_default(),
            thresholds,
        })
    }
}

/// Headline metrics used when no explicit list is configured.
pub const DEFAULT_ANALYSIS_METRICS: [&str; 11] = [
    "clashscore",
    "rama_favored_pct",
    "rama_outliers_pct",
    "rota_outliers_pct",
    "cbeta_deviations",
    "bond_rmsz",
    "angle_rmsz",
    "molprobity_score",
    "omega_cis_proline",
    "omega_cis_general",
    "omega_twisted",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Directory holding the compiled `*_results.csv` tables.
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Metrics to analyse; every numeric column present when empty.
    pub metrics: Vec<String>,
}

impl AnalysisConfig {
    pub fn new(input_dir: PathBuf) -> Self {
        Self {
            output_dir: input_dir.join("analysis"),
            input_dir,
            metrics: DEFAULT_ANALYSIS_METRICS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiguresConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Metric drawn in the distribution figure.
    pub distribution_metric: String,
}

impl FiguresConfig {
    pub fn new(input_dir: PathBuf) -> Self {
        Self {
            output_dir: input_dir.join("figures"),
            input_dir,
            distribution_metric: "clashscore".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DockQConfig {
    pub natives_dir: PathBuf,
    pub predictions_dir: PathBuf,
    pub output_dir: PathBuf,
    pub targets: Vec<String>,
    pub dockq: PathBuf,
    pub timeout: Duration,
}

#[derive(Default)]
pub struct DockQConfigBuilder {
    natives_dir: Option<PathBuf>,
    predictions_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    targets: Vec<String>,
    dockq: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl DockQConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn natives_dir(mut self, path: PathBuf) -> Self {
        self.natives_dir = Some(path);
        self
    }
    pub fn predictions_dir(mut self, path: PathBuf) -> Self {
        self.predictions_dir = Some(path);
        self
    }
    pub fn output_dir(mut self, path: PathBuf) -> Self {
        self.output_dir = Some(path);
        self
    }
    pub fn targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
    pub fn dockq(mut self, path: PathBuf) -> Self {
        self.dockq = Some(path);
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<DockQConfig, ConfigError> {
        let predictions_dir = self
            .predictions_dir
            .ok_or(ConfigError::MissingParameter("predictions_dir"))?;
        Ok(DockQConfig {
            natives_dir: self
                .natives_dir
                .ok_or(ConfigError::MissingParameter("natives_dir"))?,
            output_dir: self
                .output_dir
                .unwrap_or_else(|| predictions_dir.join("dockq_results")),
            predictions_dir,
            targets: self.targets,
            dockq: self.dockq.unwrap_or_else(|| ToolPaths::default().dockq),
            timeout: self.timeout.unwrap_or(Duration::from_secs(60)),
        })
    }
}

/// Metrics compared across repeated validation runs.
pub const TRIAL_METRICS: [&str; 7] = [
    "clashscore",
    "rama_favored_pct",
    "rota_outliers_pct",
    "cbeta_deviations",
    "bond_rmsz",
    "angle_rmsz",
    "molprobity_score",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TrialsConfig {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Coefficient of variation, in percent, below which a metric is consistent.
    pub cv_threshold_pct: f64,
}

impl TrialsConfig {
    pub fn new(inputs: Vec<PathBuf>, output_dir: PathBuf) -> Self {
        Self {
            inputs,
            output_dir,
            cv_threshold_pct: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_builder_requires_root() {
        assert_eq!(
            ValidationConfigBuilder::new().build(),
            Err(ConfigError::MissingParameter("root"))
        );
    }

    #[test]
    fn validation_builder_applies_defaults() {
        let config = ValidationConfigBuilder::new()
            .root(PathBuf::from("/data"))
            .build()
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/data/validation_results"));
        assert_eq!(config.suites, Suite::ALL.to_vec());
        assert_eq!(config.timeouts.cablam, Duration::from_secs(120));
        assert_eq!(config.thresholds.max_clashes, 5);
        assert_eq!(config.tools.molprobity_prefix, "molprobity.");
        assert_eq!(
            config.analysis_dir("1ABC"),
            PathBuf::from("/data/proteins/1ABC/analysis")
        );
    }

    #[test]
    fn suites_are_sorted_and_deduplicated() {
        let config = ValidationConfigBuilder::new()
            .root(PathBuf::from("."))
            .suites(vec![Suite::Geometry, Suite::PoseBusters, Suite::Geometry])
            .build()
            .unwrap();
        assert_eq!(config.suites, vec![Suite::PoseBusters, Suite::Geometry]);
        assert!(!config.runs(Suite::MolProbity));
    }

    #[test]
    fn empty_suite_list_is_rejected() {
        let result = ValidationConfigBuilder::new()
            .root(PathBuf::from("."))
            .suites(Vec::new())
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { name: "suites", .. })
        ));
    }

    #[test]
    fn suite_names_parse_case_insensitively() {
        assert_eq!("MolProbity".parse::<Suite>(), Ok(Suite::MolProbity));
        assert_eq!(
            "cctbx".parse::<Suite>(),
            Err(ConfigError::UnknownSuite("cctbx".into()))
        );
    }

    #[test]
    fn dockq_builder_requires_both_directories() {
        let missing = DockQConfigBuilder::new()
            .predictions_dir(PathBuf::from("preds"))
            .build();
        assert_eq!(missing, Err(ConfigError::MissingParameter("natives_dir")));

        let config = DockQConfigBuilder::new()
            .predictions_dir(PathBuf::from("preds"))
            .natives_dir(PathBuf::from("natives"))
            .build()
            .unwrap();
        assert_eq!(config.output_dir, PathBuf::from("preds/dockq_results"));
        assert_eq!(config.dockq, PathBuf::from("DockQ"));
    }
}
