use crate::cli::{AnalyzeArgs, ConfigArgs, DockqArgs, ValidateArgs};
use crate::error::{CliError, Result};
use relaxval::engine::config::{
    AnalysisConfig, DockQConfig, DockQConfigBuilder, PoseBustersThresholds,
    Suite, Timeouts, ToolPaths, ValidationConfig, ValidationConfigBuilder,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialToolsConfig {
    molprobity_prefix: Option<String>,
    reduce: Option<PathBuf>,
    probe: Option<PathBuf>,
    reduce_het_dict: Option<PathBuf>,
    rosetta_score: Option<PathBuf>,
    dockq: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialValidationConfig {
    suites: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    skip_existing: Option<bool>,
    clash_overlap: Option<f64>,
    max_clashes: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct PartialAnalysisConfig {
    metrics: Option<Vec<String>>,
}

/// The TOML configuration file, every field optional.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    tools: Option<PartialToolsConfig>,
    validation: Option<PartialValidationConfig>,
    analysis: Option<PartialAnalysisConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// The file named by `--config` (or an empty configuration) with `-S` overrides applied.
    pub fn load(args: &ConfigArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_set_values(&args.set_values)?;
        Ok(config)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let (key, value) = (key.trim(), value.trim());

            let tools = PartialToolsConfig::default;
            let validation = PartialValidationConfig::default;
            match key {
                "tools.molprobity-prefix" => {
                    self.tools.get_or_insert_with(tools).molprobity_prefix = Some(value.to_string());
                }
                "tools.reduce" => {
                    self.tools.get_or_insert_with(tools).reduce = Some(value.into());
                }
                "tools.probe" => {
                    self.tools.get_or_insert_with(tools).probe = Some(value.into());
                }
                "tools.reduce-het-dict" => {
                    self.tools.get_or_insert_with(tools).reduce_het_dict = Some(value.into());
                }
                "tools.rosetta-score" => {
                    self.tools.get_or_insert_with(tools).rosetta_score = Some(value.into());
                }
                "tools.dockq" => {
                    self.tools.get_or_insert_with(tools).dockq = Some(value.into());
                }
                "validation.suites" => {
                    self.validation.get_or_insert_with(validation).suites = Some(split_list(value));
                }
                "validation.timeout-secs" => {
                    self.validation.get_or_insert_with(validation).timeout_secs =
                        Some(parse_value(key, value, "integer")?);
                }
                "validation.skip-existing" => {
                    self.validation.get_or_insert_with(validation).skip_existing =
                        Some(parse_value(key, value, "boolean")?);
                }
                "validation.clash-overlap" => {
                    self.validation.get_or_insert_with(validation).clash_overlap =
                        Some(parse_value(key, value, "float")?);
                }
                "validation.max-clashes" => {
                    self.validation.get_or_insert_with(validation).max_clashes =
                        Some(parse_value(key, value, "integer")?);
                }
                "analysis.metrics" => {
                    self.analysis.get_or_insert_with(Default::default).metrics =
                        Some(split_list(value));
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }

    fn tool_paths(&mut self) -> ToolPaths {
        let file = self.tools.take().unwrap_or_default();
        let defaults = ToolPaths::default();
        ToolPaths {
            molprobity_prefix: file.molprobity_prefix.unwrap_or(defaults.molprobity_prefix),
            reduce: file.reduce.unwrap_or(defaults.reduce),
            probe: file.probe.unwrap_or(defaults.probe),
            reduce_het_dict: file.reduce_het_dict.or(defaults.reduce_het_dict),
            rosetta_score: file.rosetta_score.or(defaults.rosetta_score),
            dockq: file.dockq.unwrap_or(defaults.dockq),
        }
    }

    /// Tool calls get the base timeout; cablam and Rosetta twice that.
    fn timeouts(seconds: Option<u64>) -> Timeouts {
        match seconds {
            Some(secs) => Timeouts {
                default: Duration::from_secs(secs),
                cablam: Duration::from_secs(secs * 2),
                rosetta: Duration::from_secs(secs * 2),
            },
            None => Timeouts::default(),
        }
    }

    pub fn into_validation_config(mut self, args: &ValidateArgs) -> Result<ValidationConfig> {
        let mut tools = self.tool_paths();
        if let Some(path) = &args.rosetta_score {
            tools.rosetta_score = Some(path.clone());
        }
        let file = self.validation.take().unwrap_or_default();

        let suites = if !args.suites.is_empty() {
            args.suites.clone()
        } else if let Some(names) = &file.suites {
            names
                .iter()
                .map(|name| Suite::from_str(name))
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            Suite::ALL.to_vec()
        };

        let skip_existing = match (
            args.skip_existing.skip_existing,
            args.skip_existing.no_skip_existing,
        ) {
            (true, false) => true,
            (false, true) => false,
            _ => file.skip_existing.unwrap_or(false),
        };

        let defaults = PoseBustersThresholds::default();
        let thresholds = PoseBustersThresholds {
            clash_overlap: file.clash_overlap.unwrap_or(defaults.clash_overlap),
            max_clashes: file.max_clashes.unwrap_or(defaults.max_clashes),
            ..defaults
        };

        let mut builder = ValidationConfigBuilder::new()
            .root(args.root.clone())
            .suites(suites)
            .proteins(args.proteins.clone())
            .skip_existing(skip_existing)
            .tools(tools)
            .timeouts(Self::timeouts(args.timeout_secs.or(file.timeout_secs)))
            .thresholds(thresholds);
        if let Some(output) = &args.output {
            builder = builder.output_dir(output.clone());
        }
        Ok(builder.build()?)
    }

    pub fn into_analysis_config(mut self, args: &AnalyzeArgs) -> AnalysisConfig {
        let mut config = AnalysisConfig::new(args.input.clone());
        if let Some(output) = &args.output {
            config.output_dir = output.clone();
        }
        let file_metrics = self.analysis.take().and_then(|a| a.metrics);
        if args.all_metrics {
            config.metrics.clear();
        } else if !args.metrics.is_empty() {
            config.metrics = args.metrics.clone();
        } else if let Some(metrics) = file_metrics {
            config.metrics = metrics;
        }
        config
    }

    pub fn into_dockq_config(mut self, args: &DockqArgs) -> Result<DockQConfig> {
        let tools = self.tool_paths();
        let file = self.validation.take().unwrap_or_default();
        let mut builder = DockQConfigBuilder::new()
            .natives_dir(args.natives.clone())
            .predictions_dir(args.predictions.clone())
            .targets(args.targets.clone())
            .dockq(args.dockq.clone().unwrap_or(tools.dockq));
        if let Some(output) = &args.output {
            builder = builder.output_dir(output.clone());
        }
        if let Some(secs) = args.timeout_secs.or(file.timeout_secs) {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}
