use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    pub struct AtomId;
    pub struct ResidueId;
    pub struct ChainId;
}

/// Identifies a residue the way structure files do: chain letter, sequence
/// number and optional insertion code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResidueKey {
    pub chain: char,
    pub seq: isize,
    pub icode: Option<char>,
}

impl ResidueKey {
    pub fn new(chain: char, seq: isize, icode: Option<char>) -> Self {
        Self { chain, seq, icode }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.icode {
            Some(icode) => write!(f, "{}:{}{}", self.chain, self.seq, icode),
            None => write!(f, "{}:{}", self.chain, self.seq),
        }
    }
}
