use phf::{Map, Set, phf_map, phf_set};

static STANDARD_RESIDUES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE",
    "LEU", "LYS", "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
};

static WATER_RESIDUES: Set<&'static str> = phf_set! { "HOH", "WAT", "DOD", "H2O" };

static AROMATIC_RING_ATOMS: Map<&'static str, &'static [&'static str]> = phf_map! {
    "PHE" => &["CG", "CD1", "CD2", "CE1", "CE2", "CZ"],
    "TYR" => &["CG", "CD1", "CD2", "CE1", "CE2", "CZ"],
    "TRP" => &["CG", "CD1", "CD2", "NE1", "CE2", "CE3", "CZ2", "CZ3", "CH2"],
    "HIS" => &["CG", "ND1", "CD2", "CE1", "NE2"],
};

/// Backbone heavy atoms every complete amino acid residue carries.
pub const BACKBONE_ATOMS: [&str; 4] = ["N", "CA", "C", "O"];

pub fn is_standard_residue(res_name: &str) -> bool {
    STANDARD_RESIDUES.contains(res_name.trim())
}

pub fn is_water(res_name: &str) -> bool {
    WATER_RESIDUES.contains(res_name.trim())
}

/// Ring atom names of an aromatic residue, `None` for non-aromatic residues.
pub fn aromatic_ring_atoms(res_name: &str) -> Option<&'static [&'static str]> {
    AROMATIC_RING_ATOMS.get(res_name.trim()).copied()
}
