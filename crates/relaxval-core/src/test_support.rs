use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::StructureFile;
use crate::core::models::atom::Atom;
use crate::core::models::structure::Structure;
use crate::engine::tools::runner::{CommandRunner, ToolCommand, ToolError, ToolOutput};
use nalgebra::Point3;
use std::io::{BufReader, Cursor};
use std::sync::Mutex;

/// Ideal tri-alanine (phi -120, psi 130, omega 180) built from Engh & Huber geometry.
pub(crate) const TRI_ALANINE: [(isize, &str, [f64; 3]); 15] = [
    (1, "N", [0.000, 0.000, 0.000]),
    (1, "CA", [1.458, 0.000, 0.000]),
    (1, "C", [2.009, 1.422, 0.000]),
    (1, "O", [1.594, 2.245, -0.816]),
    (1, "CB", [1.988, -0.769, -1.208]),
    (2, "N", [2.936, 1.692, 0.913]),
    (2, "CA", [3.545, 3.012, 1.021]),
    (2, "C", [5.054, 2.943, 0.812]),
    (2, "O", [5.727, 2.124, 1.438]),
    (2, "CB", [3.231, 3.632, 2.380]),
    (3, "N", [5.565, 3.801, -0.064]),
    (3, "CA", [6.993, 3.839, -0.357]),
    (3, "C", [7.587, 5.204, -0.028]),
    (3, "O", [7.051, 6.229, -0.450]),
    (3, "CB", [7.243, 3.496, -1.823]),
];

pub(crate) fn atom_line(
    serial: usize,
    name: &str,
    res_name: &str,
    chain: char,
    seq: isize,
    pos: [f64; 3],
) -> String {
    let element = name.chars().next().unwrap_or('C');
    format!(
        "ATOM  {:>5}  {:<3} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           {}",
        serial, name, res_name, chain, seq, pos[0], pos[1], pos[2], element
    )
}

pub(crate) fn pdb_from_atoms(atoms: &[(char, isize, &str, &str, [f64; 3])]) -> String {
    let mut out = String::new();
    for (i, (chain, seq, res_name, name, pos)) in atoms.iter().enumerate() {
        out.push_str(&atom_line(i + 1, name, res_name, *chain, *seq, *pos));
        out.push('\n');
    }
    out.push_str("END\n");
    out
}

pub(crate) fn tri_alanine_atoms() -> Vec<(char, isize, &'static str, &'static str, [f64; 3])> {
    TRI_ALANINE
        .iter()
        .map(|&(seq, name, pos)| ('A', seq, "ALA", name, pos))
        .collect()
}

pub(crate) fn tri_alanine_pdb() -> String {
    pdb_from_atoms(&tri_alanine_atoms())
}

pub(crate) fn parse_pdb(content: &str) -> Structure {
    let mut reader = BufReader::new(Cursor::new(content.as_bytes()));
    PdbFile::read_from(&mut reader).unwrap().0
}

pub(crate) fn tri_alanine() -> Structure {
    parse_pdb(&tri_alanine_pdb())
}

/// Builds a structure directly, without going through the PDB reader.
pub(crate) fn structure_from(atoms: &[(char, isize, &str, &str, [f64; 3])]) -> Structure {
    let mut structure = Structure::new();
    for (chain, seq, res_name, name, pos) in atoms {
        let chain_id = structure.add_chain(*chain);
        let residue_id = structure
            .add_residue(chain_id, *seq, None, res_name)
            .unwrap();
        let atom = Atom::new(name, residue_id, Point3::new(pos[0], pos[1], pos[2]));
        structure.add_atom_to_residue(residue_id, atom).unwrap();
    }
    structure
}

/// Mirror image through the xy-plane; turns every L residue into its D form.
pub(crate) fn mirrored(
    atoms: &[(char, isize, &'static str, &'static str, [f64; 3])],
) -> Vec<(char, isize, &'static str, &'static str, [f64; 3])> {
    atoms
        .iter()
        .map(|&(c, s, r, n, p)| (c, s, r, n, [p[0], p[1], -p[2]]))
        .collect()
}

type Responder = Box<dyn Fn(&ToolCommand) -> Result<ToolOutput, ToolError> + Send + Sync>;

/// Answers tool invocations with canned output and records every command it saw.
pub(crate) struct FakeRunner {
    respond: Responder,
    calls: Mutex<Vec<ToolCommand>>,
}

impl FakeRunner {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<ToolOutput, ToolError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner on a machine where no external tool is installed.
    pub(crate) fn missing_tools() -> Self {
        Self::new(|command| {
            Err(ToolError::NotFound {
                program: command.program_name(),
            })
        })
    }

    pub(crate) fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, ToolError> {
        self.calls.lock().unwrap().push(command.clone());
        (self.respond)(command)
    }
}
