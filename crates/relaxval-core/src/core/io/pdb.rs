use crate::core::io::traits::StructureFile;
use crate::core::models::atom::{Atom, Element};
use crate::core::models::structure::Structure;
use nalgebra::Point3;
use std::io::{self, BufRead};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdbMetadata {
    /// HEADER and TITLE records, verbatim.
    pub header_lines: Vec<String>,
    /// Atom records dropped because their alternate location was not blank or `A`.
    pub skipped_alt_locs: usize,
    /// `true` when reading stopped at the end of the first MODEL.
    pub truncated_models: bool,
}

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Required field in columns {columns} is empty")]
    MissingRequiredField { columns: String },
    #[error("Line is too short for ATOM/HETATM record (must reach column 54)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn column_char(line: &str, index: usize) -> Option<char> {
    line.get(index..index + 1)
        .and_then(|s| s.chars().next())
        .filter(|c| !c.is_whitespace())
}

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

fn parse_optional_float(
    line: &str,
    start: usize,
    end: usize,
    line_num: usize,
    default: f64,
) -> Result<f64, PdbError> {
    if slice_and_trim(line, start, end).is_empty() {
        Ok(default)
    } else {
        parse_float(line, start, end, line_num)
    }
}

/// Reader for the fixed-column Protein Data Bank format.
///
/// Only the first model is read. Atoms with an alternate location other than
/// blank or `A` are skipped and counted in [`PdbMetadata::skipped_alt_locs`].
pub struct PdbFile;

impl StructureFile for PdbFile {
    type Metadata = PdbMetadata;
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<(Structure, Self::Metadata), Self::Error> {
        let mut structure = Structure::new();
        let mut metadata = PdbMetadata::default();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;

            match slice_and_trim(&line, 0, 6) {
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }

                    let alt_loc = column_char(&line, 16);
                    if alt_loc.is_some_and(|c| c != 'A') {
                        metadata.skipped_alt_locs += 1;
                        continue;
                    }

                    let serial_str = slice_and_trim(&line, 6, 11);
                    let serial: usize = serial_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "7-11".into(),
                            value: serial_str.into(),
                        },
                    })?;

                    let name = slice_and_trim(&line, 12, 16);
                    if name.is_empty() {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::MissingRequiredField {
                                columns: "13-16".into(),
                            },
                        });
                    }
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_label = column_char(&line, 21).unwrap_or('A');

                    let seq_str = slice_and_trim(&line, 22, 26);
                    let seq: isize = seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: seq_str.into(),
                        },
                    })?;
                    let icode = column_char(&line, 26);

                    let x = parse_float(&line, 30, 38, line_num)?;
                    let y = parse_float(&line, 38, 46, line_num)?;
                    let z = parse_float(&line, 46, 54, line_num)?;
                    let occupancy = parse_optional_float(&line, 54, 60, line_num, 1.0)?;
                    let b_factor = parse_optional_float(&line, 60, 66, line_num, 0.0)?;

                    let element = slice_and_trim(&line, 76, 78)
                        .parse::<Element>()
                        .unwrap_or_else(|_| Element::from_atom_name(name));

                    let chain_id = structure.add_chain(chain_label);
                    let Some(residue_id) = structure.add_residue(chain_id, seq, icode, res_name)
                    else {
                        continue;
                    };
                    let atom = Atom {
                        serial,
                        name: name.to_string(),
                        residue_id,
                        element,
                        alt_loc,
                        position: Point3::new(x, y, z),
                        occupancy,
                        b_factor,
                        is_hetero: line.starts_with("HETATM"),
                    };
                    structure.add_atom_to_residue(residue_id, atom);
                }
                "HEADER" | "TITLE" => metadata.header_lines.push(line.clone()),
                "ENDMDL" => {
                    metadata.truncated_models = true;
                    break;
                }
                "END" => break,
                _ => {}
            }
        }

        Ok((structure, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ids::ResidueKey;
    use crate::test_support::{atom_line, tri_alanine_pdb};
    use std::io::{BufReader, Cursor, Write};

    fn parse(content: &str) -> Result<(Structure, PdbMetadata), PdbError> {
        let mut reader = BufReader::new(Cursor::new(content.as_bytes()));
        PdbFile::read_from(&mut reader)
    }

    #[test]
    fn reads_fixed_columns_of_atom_records() {
        let (structure, metadata) = parse(&tri_alanine_pdb()).unwrap();
        assert_eq!(structure.atom_count(), 15);
        assert_eq!(structure.residue_count(), 3);
        assert_eq!(metadata.skipped_alt_locs, 0);

        let res2 = structure.find_residue(ResidueKey::new('A', 2, None)).unwrap();
        let ca = structure.residue_atom(res2, "CA").unwrap();
        assert_eq!(ca.serial, 7);
        assert_eq!(ca.element, Element::C);
        assert!((ca.position.x - 3.545).abs() < 1e-9);
        assert!((ca.position.z - 1.021).abs() < 1e-9);
        assert_eq!(structure.residue(res2).unwrap().name, "ALA");
    }

    #[test]
    fn keeps_only_blank_or_first_alternate_location() {
        let mut a = atom_line(1, "CA", "SER", 'A', 1, [0.0, 0.0, 0.0]);
        a.replace_range(16..17, "A");
        let mut b = atom_line(2, "CA", "SER", 'A', 1, [5.0, 0.0, 0.0]);
        b.replace_range(16..17, "B");
        let content = format!("{}\n{}\n", a, b);

        let (structure, metadata) = parse(&content).unwrap();
        assert_eq!(structure.atom_count(), 1);
        assert_eq!(metadata.skipped_alt_locs, 1);
        let (_, atom) = structure.atoms_iter().next().unwrap();
        assert_eq!(atom.alt_loc, Some('A'));
        assert_eq!(atom.position.x, 0.0);
    }

    #[test]
    fn stops_at_end_of_first_model() {
        let content = format!(
            "MODEL        1\n{}\nENDMDL\nMODEL        2\n{}\nENDMDL\n",
            atom_line(1, "CA", "GLY", 'A', 1, [0.0, 0.0, 0.0]),
            atom_line(1, "CA", "GLY", 'A', 1, [1.0, 0.0, 0.0]),
        );
        let (structure, metadata) = parse(&content).unwrap();
        assert_eq!(structure.atom_count(), 1);
        assert!(metadata.truncated_models);
    }

    #[test]
    fn reports_line_and_columns_for_invalid_coordinates() {
        let good = atom_line(1, "N", "ALA", 'A', 1, [0.0, 0.0, 0.0]);
        let mut bad = atom_line(2, "CA", "ALA", 'A', 1, [1.0, 0.0, 0.0]);
        bad.replace_range(38..46, "   abc  ");
        let content = format!("HEADER    TEST\n{}\n{}\n", good, bad);

        match parse(&content) {
            Err(PdbError::Parse {
                line,
                kind: PdbParseErrorKind::InvalidFloat { columns, value },
            }) => {
                assert_eq!(line, 3);
                assert_eq!(columns, "39-46");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn rejects_truncated_atom_records() {
        let line = atom_line(1, "CA", "ALA", 'A', 1, [0.0, 0.0, 0.0]);
        let content = format!("{}\n", &line[..40]);
        assert!(matches!(
            parse(&content),
            Err(PdbError::Parse {
                line: 1,
                kind: PdbParseErrorKind::LineTooShort
            })
        ));
    }

    #[test]
    fn hetatm_records_are_flagged_and_elements_fall_back_to_names() {
        let mut het = atom_line(1, "O", "HOH", 'W', 201, [0.0, 0.0, 0.0]);
        het.replace_range(0..6, "HETATM");
        het.truncate(66);
        let (structure, metadata) = parse(&format!("TITLE     WATER\n{}\n", het)).unwrap();
        let (_, atom) = structure.atoms_iter().next().unwrap();
        assert!(atom.is_hetero);
        assert_eq!(atom.element, Element::O);
        assert_eq!(metadata.header_lines.len(), 1);
    }

    #[test]
    fn reads_gzip_compressed_files_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pdb.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(tri_alanine_pdb().as_bytes()).unwrap();
        encoder.finish().unwrap();

        let (structure, _) = PdbFile::read_from_path(&path).unwrap();
        assert_eq!(structure.atom_count(), 15);
    }
}
