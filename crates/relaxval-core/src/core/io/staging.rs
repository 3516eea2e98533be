use super::traits::is_gzip_path;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A structure file made available as plain text on disk for external tools.
///
/// Compressed inputs are decompressed into a temporary `.pdb` file that is
/// removed when the value is dropped, whichever way the caller exits.
#[derive(Debug)]
pub enum StagedFile {
    Original(PathBuf),
    Decompressed(NamedTempFile),
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        match self {
            StagedFile::Original(path) => path,
            StagedFile::Decompressed(file) => file.path(),
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, StagedFile::Decompressed(_))
    }
}

/// Stages a structure file, decompressing it when it is gzip-compressed.
pub fn stage(path: &Path) -> io::Result<StagedFile> {
    if !is_gzip_path(path) {
        return Ok(StagedFile::Original(path.to_path_buf()));
    }

    let mut decoder = GzDecoder::new(BufReader::new(File::open(path)?));
    let mut temp = tempfile::Builder::new()
        .prefix("relaxval-")
        .suffix(".pdb")
        .tempfile()?;
    io::copy(&mut decoder, temp.as_file_mut())?;
    debug!(source = %path.display(), staged = %temp.path().display(), "Decompressed structure for external tools.");
    Ok(StagedFile::Decompressed(temp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn plain_files_are_used_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1ABC.pdb");
        std::fs::write(&path, "END\n").unwrap();

        let staged = stage(&path).unwrap();
        assert_eq!(staged.path(), path.as_path());
        assert!(!staged.is_temporary());
    }

    #[test]
    fn compressed_files_are_decompressed_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1ABC_r1.pdb.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"ATOM content\nEND\n").unwrap();
        encoder.finish().unwrap();

        let staged = stage(&path).unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged.is_temporary());
        assert_eq!(staged_path.extension().unwrap(), "pdb");
        assert_eq!(
            std::fs::read_to_string(&staged_path).unwrap(),
            "ATOM content\nEND\n"
        );

        drop(staged);
        assert!(!staged_path.exists());
    }

    #[test]
    fn missing_compressed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(stage(&dir.path().join("absent.pdb.gz")).is_err());
    }
}
