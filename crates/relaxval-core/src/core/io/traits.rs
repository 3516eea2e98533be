use crate::core::models::structure::Structure;
use flate2::read::GzDecoder;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Defines the interface for reading coordinate file formats.
///
/// Implementors handle format-specific parsing; the provided methods add file
/// handling, including transparent gzip decompression for `.gz` paths.
pub trait StructureFile {
    /// The type of metadata associated with the file format.
    type Metadata;

    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a structure from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error>;

    /// Reads a structure from a file path, decompressing `.gz` files on the fly.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<(Structure, Self::Metadata), Self::Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if is_gzip_path(path) {
            let mut reader = BufReader::new(GzDecoder::new(file));
            Self::read_from(&mut reader)
        } else {
            let mut reader = BufReader::new(file);
            Self::read_from(&mut reader)
        }
    }
}

/// `true` when the path carries a `.gz` extension.
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}
