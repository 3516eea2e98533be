use clap::{Args, Parser, Subcommand};
use relaxval::engine::config::Suite;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "relaxval - Validation metric aggregation and relaxation analysis for experimental and predicted protein structures.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every structure found under `<ROOT>/proteins` and where it came from.
    Discover(DiscoverArgs),
    /// Run the validation suites over every discovered structure.
    Validate(ValidateArgs),
    /// Compute descriptive statistics, tests and effect sizes over compiled results.
    Analyze(AnalyzeArgs),
    /// Render SVG figures from compiled results.
    Figures(FiguresArgs),
    /// Score predicted complexes against bound natives with DockQ.
    Dockq(DockqArgs),
    /// Check that repeated validation runs agree.
    Trials(TrialsArgs),
}

/// Options shared by the subcommands that read the TOML configuration file.
#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S validation.timeout-secs=120
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Project root containing the `proteins/` directory.
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    pub root: PathBuf,

    /// Restrict discovery to these protein identifiers.
    #[arg(short, long = "protein", value_name = "ID")]
    pub proteins: Vec<String>,

    /// Write the catalog as CSV to this file instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Project root containing the `proteins/` directory.
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    pub root: PathBuf,

    /// Directory for the compiled tables. Defaults to `<ROOT>/validation_results`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Validation suites to run (posebusters, molprobity, geometry). Defaults to all.
    #[arg(short, long = "suite", value_name = "SUITE")]
    pub suites: Vec<Suite>,

    /// Restrict validation to these protein identifiers.
    #[arg(short, long = "protein", value_name = "ID")]
    pub proteins: Vec<String>,

    #[command(flatten)]
    pub skip_existing: SkipExisting,

    /// Timeout for each external tool call, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Path to the Rosetta `score_jd2` binary, overriding the config file.
    #[arg(long, value_name = "PATH")]
    pub rosetta_score: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

/// A group to handle mutually exclusive flags for reusing per-protein results.
#[derive(Args, Debug, Clone, Copy, Default)]
#[group(required = false, multiple = false)]
pub struct SkipExisting {
    /// Reuse the tables of proteins that already have a complete set of results.
    #[arg(long)]
    pub skip_existing: bool,
    /// Revalidate every protein even when results exist.
    #[arg(long)]
    pub no_skip_existing: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Directory holding the compiled validation tables.
    #[arg(short, long, default_value = "validation_results", value_name = "PATH")]
    pub input: PathBuf,

    /// Directory for the statistics tables. Defaults to `<INPUT>/analysis`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Metrics to analyse, overriding the config file.
    #[arg(short, long = "metric", value_name = "NAME")]
    pub metrics: Vec<String>,

    /// Analyse every numeric column instead of the configured metrics.
    #[arg(long, conflicts_with = "metrics")]
    pub all_metrics: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Debug)]
pub struct FiguresArgs {
    /// Directory holding the compiled validation tables.
    #[arg(short, long, default_value = "validation_results", value_name = "PATH")]
    pub input: PathBuf,

    /// Directory for the SVG figures. Defaults to `<INPUT>/figures`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Metric drawn in the per-group distribution figure.
    #[arg(short, long, value_name = "NAME")]
    pub metric: Option<String>,
}

#[derive(Args, Debug)]
pub struct DockqArgs {
    /// Directory of bound native complexes.
    #[arg(short, long, value_name = "PATH")]
    pub natives: PathBuf,

    /// Directory with one sub-directory of predictions per target.
    #[arg(short, long, value_name = "PATH")]
    pub predictions: PathBuf,

    /// Directory for the DockQ tables. Defaults to `<PREDICTIONS>/dockq_results`.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Restrict scoring to these targets.
    #[arg(short, long = "target", value_name = "ID")]
    pub targets: Vec<String>,

    /// Path to the DockQ executable, overriding the config file.
    #[arg(long, value_name = "PATH")]
    pub dockq: Option<PathBuf>,

    /// Timeout for each DockQ call, in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Debug)]
pub struct TrialsArgs {
    /// Trial result CSVs, or a single directory of `trial_<N>_results.csv` files.
    #[arg(required = true, value_name = "PATH")]
    pub inputs: Vec<PathBuf>,

    /// Directory for the comparison table and summary. Defaults to the first input's directory.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Coefficient of variation, in percent, below which a metric counts as consistent.
    #[arg(long, default_value_t = 1.0, value_name = "PCT")]
    pub cv_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_repeated_suites_and_overrides() {
        let cli = Cli::parse_from([
            "relaxval",
            "-vv",
            "validate",
            "--root",
            "project",
            "-s",
            "molprobity",
            "-s",
            "geometry",
            "--skip-existing",
            "-S",
            "validation.max-clashes=10",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.root, PathBuf::from("project"));
        assert_eq!(args.suites, [Suite::MolProbity, Suite::Geometry]);
        assert!(args.skip_existing.skip_existing);
        assert_eq!(args.config.set_values, ["validation.max-clashes=10"]);
    }

    #[test]
    fn skip_flags_are_mutually_exclusive() {
        let result = Cli::try_parse_from([
            "relaxval",
            "validate",
            "--skip-existing",
            "--no-skip-existing",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_suite_is_rejected() {
        assert!(Cli::try_parse_from(["relaxval", "validate", "-s", "whatif"]).is_err());
    }

    #[test]
    fn trials_require_an_input() {
        assert!(Cli::try_parse_from(["relaxval", "trials"]).is_err());
        let cli = Cli::parse_from(["relaxval", "trials", "a.csv", "b.csv", "--cv-threshold", "0.5"]);
        let Commands::Trials(args) = cli.command else {
            panic!("expected trials");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.cv_threshold, 0.5);
    }
}
