use super::runner::{CommandRunner, ToolCommand, ToolError, find_on_path};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// `score_jd2` build names tried on `PATH`, in order.
pub const SCORE_BINARIES: [&str; 3] = [
    "score_jd2.default.linuxgccrelease",
    "score_jd2.default.macosclangrelease",
    "score_jd2",
];

/// The configured `score_jd2` binary, or the first known build found on `PATH`.
pub fn locate_score_binary(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    SCORE_BINARIES.iter().find_map(|name| find_on_path(name))
}

/// Total score of the first data row of a Rosetta score file.
pub fn parse_score_file(content: &str) -> Option<f64> {
    content
        .lines()
        .filter(|line| line.starts_with("SCORE:"))
        .find_map(|line| {
            let total = line.split_whitespace().nth(1)?;
            if total == "total_score" {
                return None;
            }
            total.parse().ok()
        })
}

/// Scores `pdb` with `score_jd2` inside a scratch directory.
///
/// `Ok(None)` means the tool ran but left no usable score file.
pub fn score<R: CommandRunner + ?Sized>(
    runner: &R,
    binary: &Path,
    pdb: &Path,
    timeout: Duration,
) -> Result<Option<f64>, ToolError> {
    let scratch = tempfile::Builder::new().prefix("relaxval-rosetta-").tempdir()?;
    let score_file = scratch.path().join("score.sc");
    let command = ToolCommand::new(binary, timeout)
        .arg("-in:file:s")
        .arg(pdb)
        .arg("-out:file:scorefile")
        .arg(&score_file)
        .args(["-ignore_unrecognized_res", "-mute", "all"])
        .current_dir(scratch.path());
    runner.run(&command)?;

    match fs::read_to_string(&score_file) {
        Ok(content) => Ok(parse_score_file(&content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(structure = %pdb.display(), "score_jd2 wrote no score file.");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tools::runner::ToolOutput;
    use crate::test_support::FakeRunner;

    const SCORE_SC: &str = "\
SEQUENCE:
SCORE: total_score       score dslf_fa13    fa_atr    fa_dun description
SCORE:    -312.457     -312.457     0.000  -845.112   120.330 model_0001
";

    #[test]
    fn header_row_is_skipped() {
        assert_eq!(parse_score_file(SCORE_SC), Some(-312.457));
        assert_eq!(parse_score_file("SEQUENCE:\n"), None);
    }

    #[test]
    fn explicit_binary_wins() {
        let path = Path::new("/opt/rosetta/bin/score_jd2.static");
        assert_eq!(locate_score_binary(Some(path)), Some(path.to_path_buf()));
    }

    #[test]
    fn score_reads_the_file_written_by_the_tool() {
        let runner = FakeRunner::new(|command| {
            let target = command
                .args
                .iter()
                .skip_while(|a| a.as_os_str() != "-out:file:scorefile")
                .nth(1)
                .unwrap();
            assert_eq!(
                command.working_dir.as_deref(),
                Path::new(target).parent()
            );
            std::fs::write(target, SCORE_SC).unwrap();
            Ok(ToolOutput::ok(""))
        });
        let total = score(
            &runner,
            Path::new("score_jd2"),
            Path::new("model.pdb"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(total, Some(-312.457));
    }

    #[test]
    fn missing_score_file_is_not_an_error() {
        let runner = FakeRunner::new(|_| Ok(ToolOutput::ok("")));
        let total = score(
            &runner,
            Path::new("score_jd2"),
            Path::new("model.pdb"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(total, None);
    }
}
