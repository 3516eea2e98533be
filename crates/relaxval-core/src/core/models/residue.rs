use super::ids::{AtomId, ChainId, ResidueKey};
use crate::core::utils::identifiers;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub name: String,                       // Residue name (e.g., "ALA", "HOH")
    pub seq: isize,                         // Residue sequence number from source file
    pub icode: Option<char>,                // Insertion code, if any
    pub chain_id: ChainId,                  // ID of the parent chain
    chain_label: char,                      // Chain letter, cached for keys
    pub(crate) atoms: Vec<AtomId>,          // Atoms in file order
    atom_name_map: HashMap<String, AtomId>, // Map from atom name to its stable ID
}

impl Residue {
    pub(crate) fn new(
        name: &str,
        seq: isize,
        icode: Option<char>,
        chain_id: ChainId,
        chain_label: char,
    ) -> Self {
        Self {
            name: name.to_string(),
            seq,
            icode,
            chain_id,
            chain_label,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    /// Registers an atom. The first atom with a given name wins, so a duplicated
    /// name (e.g., a second alternate location) keeps the earlier coordinates.
    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.to_string())
            .or_insert(atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn atom_id(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    pub fn has_atom(&self, name: &str) -> bool {
        self.atom_name_map.contains_key(name)
    }

    pub fn key(&self) -> ResidueKey {
        ResidueKey::new(self.chain_label, self.seq, self.icode)
    }

    pub fn chain_label(&self) -> char {
        self.chain_label
    }

    pub fn is_standard(&self) -> bool {
        identifiers::is_standard_residue(&self.name)
    }

    pub fn is_water(&self) -> bool {
        identifiers::is_water(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_atom_id(n: u64) -> AtomId {
        AtomId::from(KeyData::from_ffi(n))
    }

    fn dummy_chain_id(n: u64) -> ChainId {
        ChainId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn new_residue_initializes_fields_correctly() {
        let chain_id = dummy_chain_id(1);
        let residue = Residue::new("GLY", 10, None, chain_id, 'A');
        assert_eq!(residue.seq, 10);
        assert_eq!(residue.name, "GLY");
        assert_eq!(residue.chain_id, chain_id);
        assert_eq!(residue.key(), ResidueKey::new('A', 10, None));
        assert!(residue.atoms().is_empty());
        assert!(residue.atom_id("CA").is_none());
    }

    #[test]
    fn add_atom_adds_atom_and_maps_name() {
        let mut residue = Residue::new("ALA", 5, None, dummy_chain_id(2), 'A');
        let atom_id = dummy_atom_id(42);
        residue.add_atom("CA", atom_id);
        assert_eq!(residue.atoms(), &[atom_id]);
        assert_eq!(residue.atom_id("CA"), Some(atom_id));
        assert!(residue.has_atom("CA"));
    }

    #[test]
    fn duplicated_atom_name_keeps_first_mapping() {
        let mut residue = Residue::new("SER", 7, Some('A'), dummy_chain_id(3), 'B');
        residue.add_atom("OG", dummy_atom_id(1));
        residue.add_atom("OG", dummy_atom_id(2));
        assert_eq!(residue.atoms().len(), 2);
        assert_eq!(residue.atom_id("OG"), Some(dummy_atom_id(1)));
        assert_eq!(residue.key().to_string(), "B:7A");
    }

    #[test]
    fn classification_helpers_follow_residue_name() {
        let chain_id = dummy_chain_id(4);
        assert!(Residue::new("TRP", 1, None, chain_id, 'A').is_standard());
        assert!(!Residue::new("MSE", 2, None, chain_id, 'A').is_standard());
        assert!(Residue::new("HOH", 3, None, chain_id, 'A').is_water());
    }
}
