use super::ids::ResidueId;
use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Chemical element of an atom, reduced to the set the validation checks tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Element {
    C,
    N,
    O,
    S,
    H,
    Se,
    /// Any element without a dedicated rule (metals, halogens, ...).
    #[default]
    Other,
}

#[derive(Debug, Error)]
#[error("Invalid element symbol")]
pub struct ParseElementError;

impl FromStr for Element {
    type Err = ParseElementError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" => Ok(Element::C),
            "N" => Ok(Element::N),
            "O" => Ok(Element::O),
            "S" => Ok(Element::S),
            "H" | "D" => Ok(Element::H),
            "SE" => Ok(Element::Se),
            "" => Err(ParseElementError),
            _ => Ok(Element::Other),
        }
    }
}

impl Element {
    /// Infers the element from a PDB atom name when the element columns are blank.
    ///
    /// The first alphabetic character of the name decides, which matches the
    /// convention for the protein atoms this crate validates.
    pub fn from_atom_name(name: &str) -> Self {
        name.chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| Element::from_str(&c.to_string()).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Van der Waals radius in Angstroms used by the steric clash test.
    pub fn vdw_radius(self) -> f64 {
        match self {
            Element::C => 1.7,
            Element::N => 1.55,
            Element::O => 1.52,
            Element::S => 1.8,
            Element::H => 1.2,
            Element::Se | Element::Other => 1.7,
        }
    }

    pub fn is_hydrogen(self) -> bool {
        self == Element::H
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Element::C => "C",
                Element::N => "N",
                Element::O => "O",
                Element::S => "S",
                Element::H => "H",
                Element::Se => "SE",
                Element::Other => "X",
            }
        )
    }
}

/// A single atom record as read from a coordinate file.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number from the source file.
    pub serial: usize,
    /// The name of the atom (e.g., "CA", "N", "O").
    pub name: String,
    /// The ID of the parent residue this atom belongs to.
    pub residue_id: ResidueId,
    pub element: Element,
    /// Alternate location indicator, `None` when the column is blank.
    pub alt_loc: Option<char>,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    pub occupancy: f64,
    pub b_factor: f64,
    /// `true` for HETATM records.
    pub is_hetero: bool,
}

impl Atom {
    pub fn new(name: &str, residue_id: ResidueId, position: Point3<f64>) -> Self {
        Self {
            serial: 0,
            name: name.to_string(),
            residue_id,
            element: Element::from_atom_name(name),
            alt_loc: None,
            position,
            occupancy: 1.0,
            b_factor: 0.0,
            is_hetero: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    #[test]
    fn element_parses_known_symbols_case_insensitively() {
        assert_eq!("c".parse::<Element>().unwrap(), Element::C);
        assert_eq!(" N".parse::<Element>().unwrap(), Element::N);
        assert_eq!("Se".parse::<Element>().unwrap(), Element::Se);
        assert_eq!("D".parse::<Element>().unwrap(), Element::H);
        assert_eq!("ZN".parse::<Element>().unwrap(), Element::Other);
        assert!("".parse::<Element>().is_err());
    }

    #[test]
    fn element_is_inferred_from_atom_name() {
        assert_eq!(Element::from_atom_name("CA"), Element::C);
        assert_eq!(Element::from_atom_name("OXT"), Element::O);
        assert_eq!(Element::from_atom_name("1HB"), Element::H);
        assert_eq!(Element::from_atom_name("SG"), Element::S);
        assert_eq!(Element::from_atom_name("123"), Element::Other);
    }

    #[test]
    fn vdw_radius_uses_carbon_default_for_unlisted_elements() {
        assert_eq!(Element::O.vdw_radius(), 1.52);
        assert_eq!(Element::S.vdw_radius(), 1.8);
        assert_eq!(Element::Other.vdw_radius(), 1.7);
    }

    #[test]
    fn new_atom_infers_element_and_uses_full_occupancy() {
        let residue_id = ResidueId::from(KeyData::from_ffi(1));
        let atom = Atom::new("NZ", residue_id, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.element, Element::N);
        assert_eq!(atom.occupancy, 1.0);
        assert!(atom.alt_loc.is_none());
        assert!(!atom.is_hetero);
    }
}
