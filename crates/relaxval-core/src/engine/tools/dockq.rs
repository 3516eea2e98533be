use super::runner::{CommandRunner, ToolCommand, ToolError};
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static DOCKQ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"DockQ[:\s]+([\d.]+)").expect("DockQ pattern is valid"));
static FNAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Fnat[:\s]+([\d.]+)").expect("Fnat pattern is valid"));
static IRMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"iRMS[:\s]+([\d.]+)").expect("iRMS pattern is valid"));
static LRMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LRMS[:\s]+([\d.]+)").expect("LRMS pattern is valid"));

/// CAPRI-style interface quality bands of the DockQ score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Quality {
    Incorrect,
    Acceptable,
    Medium,
    High,
}

impl Quality {
    pub fn of(dockq: f64) -> Self {
        if dockq >= 0.80 {
            Quality::High
        } else if dockq >= 0.49 {
            Quality::Medium
        } else if dockq >= 0.23 {
            Quality::Acceptable
        } else {
            Quality::Incorrect
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Incorrect => "incorrect",
            Quality::Acceptable => "acceptable",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DockQScore {
    pub dockq: Option<f64>,
    pub fnat: Option<f64>,
    pub irms: Option<f64>,
    pub lrms: Option<f64>,
}

impl DockQScore {
    pub fn quality(&self) -> Option<Quality> {
        self.dockq.map(Quality::of)
    }
}

fn first_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures_iter(text)
        .find_map(|caps| caps.get(1)?.as_str().parse().ok())
}

pub fn parse_dockq(output: &str) -> DockQScore {
    DockQScore {
        dockq: first_number(&DOCKQ, output),
        fnat: first_number(&FNAT, output),
        irms: first_number(&IRMS, output),
        lrms: first_number(&LRMS, output),
    }
}

/// Runs `DockQ MODEL NATIVE` and parses its report from stdout.
pub fn assess<R: CommandRunner + ?Sized>(
    runner: &R,
    dockq: &Path,
    model: &Path,
    native: &Path,
    timeout: Duration,
) -> Result<DockQScore, ToolError> {
    let command = ToolCommand::new(dockq, timeout).arg(model).arg(native);
    let output = runner.run(&command)?;
    Ok(parse_dockq(&output.stdout))
}
