use super::runner::{CommandRunner, ToolCommand, ToolError};
use crate::engine::config::ToolPaths;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClashscoreResult {
    pub clash_count: usize,
    pub atom_count: usize,
    /// Serious clashes per 1000 atoms, hydrogens included.
    pub clashscore: f64,
}

impl ClashscoreResult {
    pub fn new(clash_count: usize, atom_count: usize) -> Option<Self> {
        (atom_count > 0).then(|| Self {
            clash_count,
            atom_count,
            clashscore: clash_count as f64 * 1000.0 / atom_count as f64,
        })
    }
}

/// Number of coordinate records in a PDB text.
pub fn count_atoms(pdb: &str) -> usize {
    pdb.lines()
        .filter(|line| line.starts_with("ATOM") || line.starts_with("HETATM"))
        .count()
}

/// Unique bad-overlap contacts in `probe -unformated` output.
///
/// Each `:bo:` record names its source and target atoms in the fourth and fifth
/// colon-separated fields; A-B and B-A are the same contact.
pub fn count_bad_overlaps(probe_output: &str) -> usize {
    probe_output
        .lines()
        .filter(|line| line.starts_with(':') && line.contains(":bo:"))
        .filter_map(|line| {
            let mut fields = line.split(':').skip(3);
            let (src, targ) = (fields.next()?.trim(), fields.next()?.trim());
            Some(if src <= targ { (src, targ) } else { (targ, src) })
        })
        .collect::<HashSet<_>>()
        .len()
}

/// Adds hydrogens with reduce, then counts clashes with probe.
///
/// Returns `Ok(None)` when reduce produces no coordinates.
pub fn run<R: CommandRunner + ?Sized>(
    runner: &R,
    tools: &ToolPaths,
    timeout: Duration,
    pdb: &Path,
) -> Result<Option<ClashscoreResult>, ToolError> {
    let mut reduce = ToolCommand::new(&tools.reduce, timeout).arg("-build").arg(pdb);
    if let Some(dict) = &tools.reduce_het_dict {
        reduce = reduce.env("REDUCE_HET_DICT", dict);
    }
    let reduced = runner.run(&reduce)?.stdout;
    let atom_count = count_atoms(&reduced);
    if atom_count == 0 {
        debug!(structure = %pdb.display(), "reduce produced no coordinates.");
        return Ok(None);
    }

    let mut with_h = tempfile::Builder::new()
        .prefix("relaxval-reduced-")
        .suffix(".pdb")
        .tempfile()?;
    with_h.write_all(reduced.as_bytes())?;
    with_h.flush()?;

    let probe = ToolCommand::new(&tools.probe, timeout)
        .args(["-4H", "-mc", "-self", "ALL", "-unformated"])
        .arg(with_h.path());
    let clashes = count_bad_overlaps(&runner.run(&probe)?.stdout);
    Ok(ClashscoreResult::new(clashes, atom_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tools::runner::ToolOutput;
    use crate::test_support::FakeRunner;
    use std::ffi::OsString;
    use std::path::PathBuf;

    const PROBE: &str = "\
:1->2:bo: A  10 LEU  HD11A: A  14 ILE  HG12A:-0.512:-0.441:1.2:3.4:5.6:0.1:0.2:C:H
:1->2:bo: A  14 ILE  HG12A: A  10 LEU  HD11A:-0.512:-0.441:1.2:3.4:5.6:0.1:0.2:H:C
:1->2:bo: A  20 SER  OG  A: A  22 THR  HG1 A:-0.430:-0.400:1.2:3.4:5.6:0.1:0.2:O:H
:1->2:so: A  30 ALA  HB1 A: A  31 GLY  H   A:-0.210:-0.100:1.2:3.4:5.6:0.1:0.2:H:H
:1->2:wc: A  40 ALA  HB1 A: A  41 GLY  H   A:0.210:0.100:1.2:3.4:5.6:0.1:0.2:H:H
";

    #[test]
    fn reciprocal_contacts_count_once() {
        assert_eq!(count_bad_overlaps(PROBE), 2);
        assert_eq!(count_bad_overlaps(""), 0);
    }

    #[test]
    fn clashscore_is_per_thousand_atoms() {
        let result = ClashscoreResult::new(3, 1500).unwrap();
        assert_eq!(result.clashscore, 2.0);
        assert_eq!(ClashscoreResult::new(1, 0), None);
    }

    #[test]
    fn atom_records_are_counted() {
        let pdb = "HEADER x\nATOM      1  N   ALA\nHETATM    2  O   HOH\nTER\nATOM      3  CA  ALA\n";
        assert_eq!(count_atoms(pdb), 3);
    }

    #[test]
    fn reduce_output_feeds_probe() {
        let reduced: String = (1..=4000)
            .map(|i| format!("ATOM  {:>5}  H   ALA A   1\n", i))
            .collect();
        let runner = FakeRunner::new(move |command| match command.program_name().as_str() {
            "reduce" => {
                assert_eq!(
                    command.env,
                    vec![(
                        OsString::from("REDUCE_HET_DICT"),
                        OsString::from("/opt/het_dict.txt")
                    )]
                );
                Ok(ToolOutput::ok(reduced.clone()))
            }
            "probe" => {
                let staged = PathBuf::from(command.args.last().unwrap());
                assert_eq!(count_atoms(&std::fs::read_to_string(staged).unwrap()), 4000);
                Ok(ToolOutput::ok(PROBE))
            }
            other => panic!("unexpected tool {other}"),
        });
        let tools = ToolPaths {
            reduce_het_dict: Some(PathBuf::from("/opt/het_dict.txt")),
            ..ToolPaths::default()
        };

        let result = run(&runner, &tools, Duration::from_secs(5), Path::new("in.pdb"))
            .unwrap()
            .unwrap();
        assert_eq!(result.clash_count, 2);
        assert_eq!(result.atom_count, 4000);
        assert_eq!(result.clashscore, 0.5);
    }

    #[test]
    fn empty_reduce_output_yields_nothing() {
        let runner = FakeRunner::new(|_| Ok(ToolOutput::ok("")));
        let result = run(
            &runner,
            &ToolPaths::default(),
            Duration::from_secs(5),
            Path::new("in.pdb"),
        )
        .unwrap();
        assert_eq!(result, None);
        assert_eq!(runner.calls().len(), 1);
    }
}
