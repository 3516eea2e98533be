use super::atom::Atom;
use super::chain::Chain;
use super::ids::{AtomId, ChainId, ResidueId, ResidueKey};
use super::residue::Residue;
use nalgebra::Point3;
use slotmap::SlotMap;
use std::collections::HashMap;

/// A parsed macromolecular structure: chains, residues and atoms with stable IDs.
///
/// Chains and residues keep the order in which they first appeared in the source
/// file, which is the order every sequential check (peptide bonds, omega, phi/psi)
/// walks them in.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    atoms: SlotMap<AtomId, Atom>,
    residues: SlotMap<ResidueId, Residue>,
    chains: SlotMap<ChainId, Chain>,
    /// Chains in order of first appearance.
    chain_order: Vec<ChainId>,
    residue_id_map: HashMap<(ChainId, isize, Option<char>), ResidueId>,
    chain_id_map: HashMap<char, ChainId>,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn residue(&self, id: ResidueId) -> Option<&Residue> {
        self.residues.get(id)
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn chain(&self, id: ChainId) -> Option<&Chain> {
        self.chains.get(id)
    }

    /// Chains in order of first appearance.
    pub fn chains_iter(&self) -> impl Iterator<Item = (ChainId, &Chain)> {
        self.chain_order
            .iter()
            .filter_map(|&id| self.chains.get(id).map(|chain| (id, chain)))
    }

    /// All residues, chain by chain, in file order.
    pub fn residues_iter(&self) -> impl Iterator<Item = (ResidueId, &Residue)> {
        self.chains_iter().flat_map(move |(_, chain)| {
            chain
                .residues()
                .iter()
                .filter_map(move |&id| self.residues.get(id).map(|res| (id, res)))
        })
    }

    /// Residues of every chain as ordered lists, skipping water.
    ///
    /// # Return
    ///
    /// One `Vec<ResidueId>` per chain that contains at least one non-water residue.
    pub fn polymer_segments(&self) -> Vec<Vec<ResidueId>> {
        self.chains_iter()
            .map(|(_, chain)| {
                chain
                    .residues()
                    .iter()
                    .copied()
                    .filter(|&id| self.residues.get(id).is_some_and(|r| !r.is_water()))
                    .collect::<Vec<_>>()
            })
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    pub fn find_chain_by_id(&self, id: char) -> Option<ChainId> {
        self.chain_id_map.get(&id).copied()
    }

    pub fn find_residue(&self, key: ResidueKey) -> Option<ResidueId> {
        let chain_id = self.find_chain_by_id(key.chain)?;
        self.residue_id_map
            .get(&(chain_id, key.seq, key.icode))
            .copied()
    }

    /// Looks up an atom of a residue by name.
    pub fn residue_atom(&self, residue_id: ResidueId, name: &str) -> Option<&Atom> {
        let atom_id = self.residues.get(residue_id)?.atom_id(name)?;
        self.atoms.get(atom_id)
    }

    /// Position of a named atom of a residue.
    pub fn atom_position(&self, residue_id: ResidueId, name: &str) -> Option<Point3<f64>> {
        self.residue_atom(residue_id, name).map(|atom| atom.position)
    }

    /// Adds a new chain or returns the existing one with the same identifier.
    pub fn add_chain(&mut self, id: char) -> ChainId {
        if let Some(&existing) = self.chain_id_map.get(&id) {
            return existing;
        }
        let chain_id = self.chains.insert(Chain::new(id));
        self.chain_id_map.insert(id, chain_id);
        self.chain_order.push(chain_id);
        chain_id
    }

    /// Adds a new residue to a chain or returns the existing one.
    ///
    /// # Return
    ///
    /// Returns `None` when the chain does not exist.
    pub fn add_residue(
        &mut self,
        chain_id: ChainId,
        seq: isize,
        icode: Option<char>,
        name: &str,
    ) -> Option<ResidueId> {
        let chain = self.chains.get_mut(chain_id)?;
        let key = (chain_id, seq, icode);

        if let Some(&existing) = self.residue_id_map.get(&key) {
            return Some(existing);
        }

        let residue_id = self
            .residues
            .insert(Residue::new(name, seq, icode, chain_id, chain.id));
        chain.residues.push(residue_id);
        self.residue_id_map.insert(key, residue_id);
        Some(residue_id)
    }

    /// Adds an atom to a residue, rewriting the atom's `residue_id` to match.
    ///
    /// # Return
    ///
    /// Returns `None` when the residue does not exist.
    pub fn add_atom_to_residue(&mut self, residue_id: ResidueId, mut atom: Atom) -> Option<AtomId> {
        let residue = self.residues.get_mut(residue_id)?;
        atom.residue_id = residue_id;
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        residue.add_atom(&name, atom_id);
        Some(atom_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_two_chain_structure() -> Structure {
        let mut structure = Structure::new();
        let chain_b = structure.add_chain('B');
        let chain_a = structure.add_chain('A');
        let res_b1 = structure.add_residue(chain_b, 1, None, "GLY").unwrap();
        let res_a5 = structure.add_residue(chain_a, 5, None, "ALA").unwrap();
        let res_a5a = structure.add_residue(chain_a, 5, Some('A'), "SER").unwrap();
        let water = structure.add_residue(chain_a, 100, None, "HOH").unwrap();

        for (res, name, x) in [
            (res_b1, "CA", 0.0),
            (res_a5, "N", 1.0),
            (res_a5, "CA", 2.0),
            (res_a5a, "CA", 3.0),
            (water, "O", 4.0),
        ] {
            let atom = Atom::new(name, res, Point3::new(x, 0.0, 0.0));
            structure.add_atom_to_residue(res, atom).unwrap();
        }
        structure
    }

    #[test]
    fn add_chain_is_idempotent() {
        let mut structure = Structure::new();
        let first = structure.add_chain('A');
        let second = structure.add_chain('A');
        assert_eq!(first, second);
        assert_eq!(structure.chains_iter().count(), 1);
    }

    #[test]
    fn add_residue_is_idempotent_and_distinguishes_insertion_codes() {
        let mut structure = Structure::new();
        let chain = structure.add_chain('A');
        let plain = structure.add_residue(chain, 10, None, "ALA").unwrap();
        let again = structure.add_residue(chain, 10, None, "ALA").unwrap();
        let inserted = structure.add_residue(chain, 10, Some('A'), "ALA").unwrap();
        assert_eq!(plain, again);
        assert_ne!(plain, inserted);
        assert_eq!(structure.residue_count(), 2);
    }

    #[test]
    fn chains_and_residues_iterate_in_order_of_first_appearance() {
        let structure = build_two_chain_structure();
        let chain_ids: Vec<char> = structure.chains_iter().map(|(_, c)| c.id).collect();
        assert_eq!(chain_ids, vec!['B', 'A']);

        let keys: Vec<String> = structure
            .residues_iter()
            .map(|(_, r)| r.key().to_string())
            .collect();
        assert_eq!(keys, vec!["B:1", "A:5", "A:5A", "A:100"]);
    }

    #[test]
    fn polymer_segments_skip_water() {
        let structure = build_two_chain_structure();
        let segments = structure.polymer_segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].len(), 1);
        assert_eq!(segments[1].len(), 2);
    }

    #[test]
    fn atom_lookup_by_residue_and_name() {
        let structure = build_two_chain_structure();
        let res = structure
            .find_residue(ResidueKey::new('A', 5, None))
            .unwrap();
        assert_eq!(
            structure.atom_position(res, "CA"),
            Some(Point3::new(2.0, 0.0, 0.0))
        );
        assert!(structure.atom_position(res, "CB").is_none());
        assert_eq!(structure.atom_count(), 5);
    }

    #[test]
    fn add_residue_to_missing_chain_returns_none() {
        let mut structure = Structure::new();
        let chain = structure.add_chain('A');
        let mut other = Structure::new();
        other.add_chain('X');
        let foreign = other.add_chain('Y');
        assert!(structure.add_residue(foreign, 1, None, "ALA").is_none());
        assert!(structure.add_residue(chain, 1, None, "ALA").is_some());
    }
}
