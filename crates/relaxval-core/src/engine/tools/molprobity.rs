use super::clashscore::{self, ClashscoreResult};
use super::runner::{CommandRunner, ToolCommand, ToolError};
use crate::core::table::{MetricRecord, MetricValue};
use crate::engine::config::{Timeouts, ToolPaths};
use regex::{Regex, RegexBuilder};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static RAMA_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) Favored, (\d+) Allowed, (\d+) Outlier.* out of (\d+)")
        .expect("ramalyze pattern is valid")
});
static ROTA_OUTLIER_PCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)%\s+outliers").expect("rotalyze pattern is valid"));
static CBETA_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) C-beta deviation").expect("cbetadev pattern is valid"));

fn case_insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("omegalyze/cablam pattern is valid")
}

static OMEGA_CIS_PRO: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"(\d+)\s+cis\s+prolines?"));
static OMEGA_TWISTED_PRO: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"(\d+)\s+twisted\s+prolines?"));
static OMEGA_CIS_OTHER: LazyLock<Regex> = LazyLock::new(|| case_insensitive(r"(\d+)\s+other\s+cis"));
static OMEGA_TWISTED_OTHER: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"(\d+)\s+other\s+twisted"));
static CABLAM_OUTLIERS: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"([\d.]+)%\s+CaBLAM outliers"));
static CABLAM_DISFAVORED: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"([\d.]+)%\s+CaBLAM disfavored"));
static CABLAM_CA_OUTLIERS: LazyLock<Regex> =
    LazyLock::new(|| case_insensitive(r"([\d.]+)%\s+CA geometry outliers"));

/// Column names written by the MolProbity suite, in output order.
pub const COLUMNS: [&str; 23] = [
    "rama_favored",
    "rama_allowed",
    "rama_outliers",
    "rama_total",
    "rama_favored_pct",
    "rama_allowed_pct",
    "rama_outliers_pct",
    "rota_total",
    "rota_favored",
    "rota_outliers",
    "rota_favored_pct",
    "rota_outliers_pct",
    "cbeta_deviations",
    "omega_cis_proline",
    "omega_cis_general",
    "omega_twisted",
    "cablam_outliers_pct",
    "cablam_disfavored_pct",
    "cablam_ca_outliers_pct",
    "clash_count",
    "atom_count",
    "clashscore",
    "molprobity_score",
];

fn capture<T: std::str::FromStr>(re: &Regex, line: &str, group: usize) -> Option<T> {
    re.captures(line)?.get(group)?.as_str().parse().ok()
}

fn pct(part: usize, total: usize) -> f64 {
    100.0 * part as f64 / total as f64
}

fn summary_lines(output: &str) -> impl Iterator<Item = &str> {
    output.lines().filter(|line| line.contains("SUMMARY:"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RamaSummary {
    pub favored: usize,
    pub allowed: usize,
    pub outliers: usize,
    pub total: usize,
}

impl RamaSummary {
    pub fn favored_pct(&self) -> f64 {
        pct(self.favored, self.total)
    }

    fn write(&self, record: &mut MetricRecord) {
        record.set("rama_favored", MetricValue::count(self.favored));
        record.set("rama_allowed", MetricValue::count(self.allowed));
        record.set("rama_outliers", MetricValue::count(self.outliers));
        record.set("rama_total", MetricValue::count(self.total));
        record.set("rama_favored_pct", MetricValue::rounded(self.favored_pct(), 2));
        record.set("rama_allowed_pct", MetricValue::rounded(pct(self.allowed, self.total), 2));
        record.set("rama_outliers_pct", MetricValue::rounded(pct(self.outliers, self.total), 2));
    }
}

pub fn parse_ramalyze(output: &str) -> Option<RamaSummary> {
    summary_lines(output)
        .filter_map(|line| RAMA_SUMMARY.captures(line))
        .filter_map(|caps| {
            Some(RamaSummary {
                favored: caps[1].parse().ok()?,
                allowed: caps[2].parse().ok()?,
                outliers: caps[3].parse().ok()?,
                total: caps[4].parse().ok()?,
            })
        })
        .last()
        .filter(|summary| summary.total > 0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotaSummary {
    /// Per-residue lines were found and classified.
    Residues {
        total: usize,
        favored: usize,
        outliers: usize,
    },
    /// Only the summary percentage was available.
    OutliersPct(f64),
}

impl RotaSummary {
    pub fn outliers_pct(&self) -> f64 {
        match *self {
            RotaSummary::Residues {
                total, outliers, ..
            } => pct(outliers, total),
            RotaSummary::OutliersPct(value) => value,
        }
    }

    fn write(&self, record: &mut MetricRecord) {
        if let RotaSummary::Residues {
            total,
            favored,
            outliers,
        } = *self
        {
            record.set("rota_total", MetricValue::count(total));
            record.set("rota_favored", MetricValue::count(favored));
            record.set("rota_outliers", MetricValue::count(outliers));
            record.set("rota_favored_pct", MetricValue::rounded(pct(favored, total), 2));
        }
        record.set("rota_outliers_pct", MetricValue::rounded(self.outliers_pct(), 2));
    }
}

pub fn parse_rotalyze(output: &str) -> Option<RotaSummary> {
    let (mut total, mut favored, mut outliers) = (0, 0, 0);
    for line in output.lines() {
        if line.trim().is_empty()
            || line.starts_with("SUMMARY")
            || line.starts_with("residue:")
            || line.split(':').count() < 7
        {
            continue;
        }
        total += 1;
        let upper = line.to_ascii_uppercase();
        if upper.contains("OUTLIER") {
            outliers += 1;
        } else if upper.contains("FAVORED") {
            favored += 1;
        }
    }
    if total > 0 {
        return Some(RotaSummary::Residues {
            total,
            favored,
            outliers,
        });
    }
    summary_lines(output)
        .find_map(|line| capture(&ROTA_OUTLIER_PCT, line, 1))
        .map(RotaSummary::OutliersPct)
}

pub fn parse_cbetadev(output: &str) -> Option<usize> {
    summary_lines(output).find_map(|line| capture(&CBETA_SUMMARY, line, 1))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OmegaSummary {
    pub cis_proline: usize,
    pub cis_general: usize,
    pub twisted: usize,
}

/// Returns `None` when the output carries no SUMMARY line at all.
pub fn parse_omegalyze(output: &str) -> Option<OmegaSummary> {
    let mut summary = OmegaSummary::default();
    let mut seen = false;
    for line in summary_lines(output) {
        seen = true;
        if let Some(n) = capture(&OMEGA_CIS_PRO, line, 1) {
            summary.cis_proline = n;
        }
        if let Some(n) = capture(&OMEGA_CIS_OTHER, line, 1) {
            summary.cis_general = n;
        }
        summary.twisted += capture::<usize>(&OMEGA_TWISTED_PRO, line, 1).unwrap_or(0);
        summary.twisted += capture::<usize>(&OMEGA_TWISTED_OTHER, line, 1).unwrap_or(0);
    }
    seen.then_some(summary)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CablamSummary {
    pub outliers_pct: Option<f64>,
    pub disfavored_pct: Option<f64>,
    pub ca_outliers_pct: Option<f64>,
}

pub fn parse_cablam(output: &str) -> Option<CablamSummary> {
    let mut summary = CablamSummary::default();
    for line in output.lines() {
        summary.outliers_pct = summary
            .outliers_pct
            .or_else(|| capture(&CABLAM_OUTLIERS, line, 1));
        summary.disfavored_pct = summary
            .disfavored_pct
            .or_else(|| capture(&CABLAM_DISFAVORED, line, 1));
        summary.ca_outliers_pct = summary
            .ca_outliers_pct
            .or_else(|| capture(&CABLAM_CA_OUTLIERS, line, 1));
    }
    (summary != CablamSummary::default()).then_some(summary)
}

/// MolProbity score, rounded to two decimals.
///
/// `0.426 ln(1 + clashscore) + 0.33 ln(1 + max(0, rota_out - 1))
///  + 0.25 ln(1 + max(0, (100 - rama_fav) - 2)) + 0.5`
pub fn molprobity_score(clashscore: f64, rota_outliers_pct: f64, rama_favored_pct: f64) -> f64 {
    let score = 0.426 * (1.0 + clashscore).ln()
        + 0.33 * (1.0 + (rota_outliers_pct - 1.0).max(0.0)).ln()
        + 0.25 * (1.0 + ((100.0 - rama_favored_pct) - 2.0).max(0.0)).ln()
        + 0.5;
    (score * 100.0).round() / 100.0
}

/// Runs the MolProbity command-line suite and reduce/probe over single structures.
pub struct MolProbity<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    tools: &'a ToolPaths,
    timeouts: Timeouts,
}

impl<'a, R: CommandRunner + ?Sized> MolProbity<'a, R> {
    pub fn new(runner: &'a R, tools: &'a ToolPaths, timeouts: Timeouts) -> Self {
        Self {
            runner,
            tools,
            timeouts,
        }
    }

    fn run_tool(&self, tool: &str, pdb: &Path, timeout: Duration) -> Option<String> {
        let program = format!("{}{}", self.tools.molprobity_prefix, tool);
        let command = ToolCommand::new(&program, timeout).arg(pdb);
        match self.runner.run(&command) {
            Ok(output) => Some(output.combined()),
            Err(ToolError::NotFound { .. }) => {
                debug!(tool = %program, "Tool not installed; columns left empty.");
                None
            }
            Err(e) => {
                warn!(tool = %program, structure = %pdb.display(), "{}", e);
                None
            }
        }
    }

    /// Every MolProbity column for the plain-text PDB at `pdb`. Columns of
    /// tools that fail or print nothing parsable are Missing.
    pub fn evaluate(&self, pdb: &Path) -> MetricRecord {
        let mut record: MetricRecord = COLUMNS
            .iter()
            .map(|&name| (name, MetricValue::Missing))
            .collect();

        let default = self.timeouts.default;
        let rama = self
            .run_tool("ramalyze", pdb, default)
            .and_then(|out| parse_ramalyze(&out));
        if let Some(rama) = &rama {
            rama.write(&mut record);
        }

        let rota = self
            .run_tool("rotalyze", pdb, default)
            .and_then(|out| parse_rotalyze(&out));
        if let Some(rota) = &rota {
            rota.write(&mut record);
        }

        if let Some(n) = self
            .run_tool("cbetadev", pdb, default)
            .and_then(|out| parse_cbetadev(&out))
        {
            record.set("cbeta_deviations", MetricValue::count(n));
        }

        if let Some(omega) = self
            .run_tool("omegalyze", pdb, default)
            .and_then(|out| parse_omegalyze(&out))
        {
            record.set("omega_cis_proline", MetricValue::count(omega.cis_proline));
            record.set("omega_cis_general", MetricValue::count(omega.cis_general));
            record.set("omega_twisted", MetricValue::count(omega.twisted));
        }

        if let Some(cablam) = self
            .run_tool("cablam", pdb, self.timeouts.cablam)
            .and_then(|out| parse_cablam(&out))
        {
            record.set("cablam_outliers_pct", MetricValue::from_option(cablam.outliers_pct, 2));
            record.set(
                "cablam_disfavored_pct",
                MetricValue::from_option(cablam.disfavored_pct, 2),
            );
            record.set(
                "cablam_ca_outliers_pct",
                MetricValue::from_option(cablam.ca_outliers_pct, 2),
            );
        }

        let clashes = match clashscore::run(self.runner, self.tools, default, pdb) {
            Ok(result) => result,
            Err(e) => {
                warn!(structure = %pdb.display(), "Clashscore failed: {}", e);
                None
            }
        };
        if let Some(ClashscoreResult {
            clash_count,
            atom_count,
            clashscore,
        }) = clashes
        {
            record.set("clash_count", MetricValue::count(clash_count));
            record.set("atom_count", MetricValue::count(atom_count));
            record.set("clashscore", MetricValue::rounded(clashscore, 2));
        }

        if let (Some(c), Some(rota), Some(rama)) = (clashes, rota, rama) {
            record.set(
                "molprobity_score",
                MetricValue::Float(molprobity_score(
                    c.clashscore,
                    rota.outliers_pct(),
                    rama.favored_pct(),
                )),
            );
        }
        record
    }
}
