//! Minimal molecular graph used by the similarity metrics.
//!
//! Only what the metrics and the SDF writer consume is modelled: elements,
//! aromaticity, formal charge, isotope, hydrogen counts, and bond orders.
//! Coordinates, stereochemistry, and valence sanitisation are out of scope.
//!
//! Molecules are normally built from SMILES with [`Molecule::from_smiles`].
//! Construction normalises aromaticity (Kekulé rings become aromatic, bonds
//! between rings become single), so one structure always has one graph, and
//! [`Molecule::canonical_smiles`] gives it one string.

mod aromatic;
mod canon;
mod sdf;
mod smiles;

pub use sdf::{export_sdf, write_sdf};

use crate::error::Result;

/// Chemical element, identified by atomic number. Atomic number 0 is the
/// dummy/attachment atom `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

const SYMBOLS: [&str; 119] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd",
    "Tb", "Dy", "Ho", "Er", "Tm", "Yb", "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm",
    "Bk", "Cf", "Es", "Fm", "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds", "Rg", "Cn",
    "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

impl Element {
    /// Dummy atom (`*`), used for BRICS attachment points.
    pub const DUMMY: Element = Element(0);
    pub const HYDROGEN: Element = Element(1);
    pub const BORON: Element = Element(5);
    pub const CARBON: Element = Element(6);
    pub const NITROGEN: Element = Element(7);
    pub const OXYGEN: Element = Element(8);
    pub const FLUORINE: Element = Element(9);
    pub const PHOSPHORUS: Element = Element(15);
    pub const SULFUR: Element = Element(16);
    pub const CHLORINE: Element = Element(17);
    pub const BROMINE: Element = Element(35);
    pub const IODINE: Element = Element(53);

    /// Look up an element by its symbol (case-sensitive, e.g. `"Cl"`).
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        SYMBOLS
            .iter()
            .position(|s| *s == symbol)
            .map(|z| Element(z as u8))
    }

    pub fn atomic_number(self) -> u8 {
        self.0
    }

    pub fn symbol(self) -> &'static str {
        SYMBOLS.get(self.0 as usize).copied().unwrap_or("*")
    }

    /// Default valences for elements of the SMILES organic subset.
    fn default_valences(self) -> &'static [u8] {
        match self.0 {
            5 => &[3],
            6 => &[4],
            7 => &[3, 5],
            8 => &[2],
            15 => &[3, 5],
            16 => &[2, 4, 6],
            9 | 17 | 35 | 53 => &[1],
            _ => &[],
        }
    }
}

/// Bond order. Aromatic bonds are kept distinct from single/double.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Quadruple,
    Aromatic,
}

impl BondOrder {
    /// Stable numeric code, used for hashing and canonical ranking.
    pub fn code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Quadruple => 5,
            BondOrder::Aromatic => 4,
        }
    }

    /// Valence contribution in units of half bonds.
    fn half_valence(self) -> u32 {
        match self {
            BondOrder::Single => 2,
            BondOrder::Double => 4,
            BondOrder::Triple => 6,
            BondOrder::Quadruple => 8,
            BondOrder::Aromatic => 2,
        }
    }
}

/// A single atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    /// Mass number, 0 if unspecified. For dummy atoms this is the BRICS
    /// attachment label (`[4*]`).
    pub isotope: u16,
    /// Explicit hydrogen count from a bracket atom; `None` for organic-subset
    /// atoms whose hydrogens are implied by default valence.
    pub explicit_hydrogens: Option<u8>,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            aromatic: false,
            charge: 0,
            isotope: 0,
            explicit_hydrogens: None,
        }
    }
}

/// A bond between two atom indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bond {
    pub begin: usize,
    pub end: usize,
    pub order: BondOrder,
}

impl Bond {
    /// The atom at the other end of this bond.
    pub fn other(&self, atom: usize) -> usize {
        if self.begin == atom {
            self.end
        } else {
            self.begin
        }
    }
}

/// Molecular graph: atoms, bonds, and a cached adjacency list.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    // atom -> [(neighbor, bond index)]
    adjacency: Vec<Vec<(usize, usize)>>,
    ring_bonds: Vec<bool>,
}

impl Molecule {
    /// Build a molecule from atoms and bonds. Bond endpoints must be valid
    /// atom indices. Aromaticity is normalised.
    pub fn new(atoms: Vec<Atom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (idx, bond) in bonds.iter().enumerate() {
            adjacency[bond.begin].push((bond.end, idx));
            adjacency[bond.end].push((bond.begin, idx));
        }
        let ring_bonds = perceive_ring_bonds(atoms.len(), &bonds, &adjacency);
        let mut mol = Self {
            atoms,
            bonds,
            adjacency,
            ring_bonds,
        };
        aromatic::normalize(&mut mol);
        mol
    }

    /// Parse a SMILES string.
    pub fn from_smiles(smiles: &str) -> Result<Self> {
        smiles::parse(smiles)
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom(&self, idx: usize) -> &Atom {
        &self.atoms[idx]
    }

    /// Neighbours of `atom` as `(neighbor, bond index)` pairs.
    pub fn neighbors(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.adjacency[a]
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, bond)| &self.bonds[bond])
    }

    pub fn is_ring_bond(&self, bond: usize) -> bool {
        self.ring_bonds[bond]
    }

    pub fn is_ring_atom(&self, atom: usize) -> bool {
        self.adjacency[atom]
            .iter()
            .any(|&(_, bond)| self.ring_bonds[bond])
    }

    /// Hydrogens attached to `atom`: explicit for bracket atoms, otherwise the
    /// gap to the lowest default valence that fits the bonds.
    pub fn hydrogen_count(&self, atom: usize) -> u8 {
        match self.atoms[atom].explicit_hydrogens {
            Some(h) => h,
            None => self.implicit_hydrogens(atom),
        }
    }

    /// Hydrogens implied by default valence, ignoring any explicit count.
    pub(crate) fn implicit_hydrogens(&self, atom: usize) -> u8 {
        let a = &self.atoms[atom];
        let valences = a.element.default_valences();
        if valences.is_empty() {
            return 0;
        }

        let half: u32 = self.adjacency[atom]
            .iter()
            .map(|&(_, bond)| self.bonds[bond].order.half_valence())
            .sum();
        // An aromatic atom donates one extra bond to the pi system.
        let used = if a.aromatic { half / 2 + 1 } else { half.div_ceil(2) };

        if a.aromatic {
            return (valences[0] as u32).saturating_sub(used) as u8;
        }
        valences
            .iter()
            .map(|&v| v as u32)
            .find(|&v| v >= used)
            .map_or(0, |v| (v - used) as u8)
    }

    /// Element histogram keyed by atomic number.
    pub(crate) fn element_counts(&self) -> Vec<(Element, usize)> {
        let mut counts: Vec<(Element, usize)> = Vec::new();
        for atom in &self.atoms {
            match counts.iter_mut().find(|(e, _)| *e == atom.element) {
                Some((_, c)) => *c += 1,
                None => counts.push((atom.element, 1)),
            }
        }
        counts.sort_unstable();
        counts
    }
}

/// A bond is a ring bond iff it is not a bridge. Bridges are found with an
/// iterative Tarjan low-link traversal.
fn perceive_ring_bonds(n: usize, bonds: &[Bond], adjacency: &[Vec<(usize, usize)>]) -> Vec<bool> {
    let mut ring = vec![true; bonds.len()];
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut time = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        // (atom, bond used to enter, next adjacency slot)
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];
        disc[root] = time;
        low[root] = time;
        time += 1;

        while let Some(frame) = stack.last_mut() {
            let (u, via, slot) = *frame;
            if slot < adjacency[u].len() {
                frame.2 += 1;
                let (v, bond) = adjacency[u][slot];
                if bond == via {
                    continue;
                }
                if disc[v] == usize::MAX {
                    disc[v] = time;
                    low[v] = time;
                    time += 1;
                    stack.push((v, bond, 0));
                } else {
                    low[u] = low[u].min(disc[v]);
                }
            } else {
                stack.pop();
                if let Some(&(parent, _, _)) = stack.last() {
                    low[parent] = low[parent].min(low[u]);
                    if low[u] > disc[parent] {
                        ring[via] = false;
                    }
                }
            }
        }
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_lookup() {
        assert_eq!(Element::from_symbol("Cl"), Some(Element::CHLORINE));
        assert_eq!(Element::from_symbol("*"), Some(Element::DUMMY));
        assert_eq!(Element::CARBON.symbol(), "C");
        assert_eq!(Element::from_symbol("Xx"), None);
    }

    #[test]
    fn heavy_elements_parse() {
        assert_eq!(Element::from_symbol("Pt").map(Element::atomic_number), Some(78));
        assert_eq!(Element::from_symbol("Og").map(Element::atomic_number), Some(118));
        let mol = Molecule::from_smiles("Cl[Pt](Cl)([NH3])[NH3]").unwrap();
        assert_eq!(mol.atom(1).element.symbol(), "Pt");
        assert!(Molecule::from_smiles("[Hg+2]").is_ok());
    }

    #[test]
    fn ring_perception_on_toluene() {
        let mol = Molecule::from_smiles("Cc1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 7);
        assert!(!mol.is_ring_atom(0));
        for atom in 1..7 {
            assert!(mol.is_ring_atom(atom));
        }
        let methyl_bond = mol.neighbors(0)[0].1;
        assert!(!mol.is_ring_bond(methyl_bond));
    }

    #[test]
    fn implicit_hydrogens() {
        let ethanol = Molecule::from_smiles("CCO").unwrap();
        assert_eq!(ethanol.hydrogen_count(0), 3);
        assert_eq!(ethanol.hydrogen_count(1), 2);
        assert_eq!(ethanol.hydrogen_count(2), 1);

        let pyridine = Molecule::from_smiles("c1ccncc1").unwrap();
        assert_eq!(pyridine.hydrogen_count(0), 1);
        assert_eq!(pyridine.hydrogen_count(3), 0);

        let acid = Molecule::from_smiles("CC(=O)O").unwrap();
        assert_eq!(acid.hydrogen_count(2), 0);
        assert_eq!(acid.hydrogen_count(3), 1);
    }

    #[test]
    fn bracket_hydrogens_are_explicit() {
        let pyrrole = Molecule::from_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(pyrrole.hydrogen_count(3), 1);
        let ammonium = Molecule::from_smiles("[NH4+]").unwrap();
        assert_eq!(ammonium.hydrogen_count(0), 4);
        assert_eq!(ammonium.atom(0).charge, 1);
    }
}
