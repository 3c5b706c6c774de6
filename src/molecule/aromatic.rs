//! Aromaticity normalisation.
//!
//! Two fixes are applied to every parsed molecule so that one structure has
//! one graph regardless of how it was written:
//!
//! 1. Aromatic bonds outside rings (the implicit bond between two aromatic
//!    atoms in `c1ccccc1c1ccccc1`) become single bonds.
//! 2. Kekulé rings are perceived as aromatic with a Hückel count over the
//!    smallest ring through each ring bond. An atom with a double bond inside
//!    the ring system gives one pi electron, an exocyclic double bond gives
//!    none, and a neutral N, P, O or S without double bonds gives its lone
//!    pair. A ring is aromatic when the count is `4n + 2`.
//!
//! Atoms that become aromatic keep the hydrogen count they had as Kekulé
//! atoms, so the `NH` of `C1=CNC=C1` survives as `[nH]`.

use std::collections::{BTreeSet, VecDeque};

use super::{BondOrder, Element, Molecule};

pub(super) fn normalize(mol: &mut Molecule) {
    for (idx, bond) in mol.bonds.iter_mut().enumerate() {
        if bond.order == BondOrder::Aromatic && !mol.ring_bonds[idx] {
            bond.order = BondOrder::Single;
        }
    }

    let aromatic_rings: Vec<Vec<usize>> = smallest_rings(mol)
        .into_iter()
        .filter(|ring| is_kekule_aromatic(mol, ring))
        .collect();
    if aromatic_rings.is_empty() {
        return;
    }

    let frozen: Vec<u8> = (0..mol.atom_count()).map(|i| mol.hydrogen_count(i)).collect();
    for ring in &aromatic_rings {
        for (k, &a) in ring.iter().enumerate() {
            let b = ring[(k + 1) % ring.len()];
            if let Some(&(_, bond)) = mol.adjacency[a].iter().find(|&&(n, _)| n == b) {
                mol.bonds[bond].order = BondOrder::Aromatic;
            }
        }
    }
    for &a in aromatic_rings.iter().flatten() {
        let atom = &mut mol.atoms[a];
        if !atom.aromatic {
            atom.aromatic = true;
            atom.explicit_hydrogens = Some(frozen[a]);
        }
    }
}

/// Smallest ring through each ring bond, deduplicated, as atom cycles in
/// walking order.
fn smallest_rings(mol: &Molecule) -> Vec<Vec<usize>> {
    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut rings = Vec::new();
    for (idx, bond) in mol.bonds.iter().enumerate() {
        if !mol.ring_bonds[idx] {
            continue;
        }
        let Some(path) = shortest_path_avoiding(mol, bond.begin, bond.end, idx) else {
            continue;
        };
        let mut key = path.clone();
        key.sort_unstable();
        if seen.insert(key) {
            rings.push(path);
        }
    }
    rings
}

/// BFS over ring bonds from `from` to `to` without using `skip`.
fn shortest_path_avoiding(
    mol: &Molecule,
    from: usize,
    to: usize,
    skip: usize,
) -> Option<Vec<usize>> {
    let mut prev = vec![usize::MAX; mol.atom_count()];
    prev[from] = from;
    let mut queue = VecDeque::from([from]);
    while let Some(u) = queue.pop_front() {
        if u == to {
            let mut path = vec![to];
            let mut cur = to;
            while cur != from {
                cur = prev[cur];
                path.push(cur);
            }
            return Some(path);
        }
        for &(v, bond) in &mol.adjacency[u] {
            if bond != skip && mol.ring_bonds[bond] && prev[v] == usize::MAX {
                prev[v] = u;
                queue.push_back(v);
            }
        }
    }
    None
}

fn is_kekule_aromatic(mol: &Molecule, ring: &[usize]) -> bool {
    // Rings written in aromatic form are left as they are.
    if ring.iter().any(|&a| mol.atoms[a].aromatic) {
        return false;
    }
    let mut electrons = 0u32;
    for &a in ring {
        match pi_electrons(mol, a) {
            Some(e) => electrons += e,
            None => return false,
        }
    }
    electrons >= 2 && (electrons - 2) % 4 == 0
}

fn pi_electrons(mol: &Molecule, a: usize) -> Option<u32> {
    let atom = &mol.atoms[a];
    let mut endocyclic = false;
    let mut exocyclic = false;
    for &(_, bond) in &mol.adjacency[a] {
        match mol.bonds[bond].order {
            BondOrder::Double if mol.ring_bonds[bond] => endocyclic = true,
            BondOrder::Double => exocyclic = true,
            BondOrder::Triple | BondOrder::Quadruple => return None,
            _ => {}
        }
    }
    if endocyclic {
        return Some(1);
    }
    if exocyclic {
        return Some(0);
    }
    let lone_pair = match atom.element {
        Element::NITROGEN | Element::PHOSPHORUS => {
            atom.charge == 0 && mol.degree(a) + mol.hydrogen_count(a) as usize == 3
        }
        Element::OXYGEN | Element::SULFUR => atom.charge == 0 && mol.degree(a) == 2,
        Element::CARBON => atom.charge == -1,
        _ => false,
    };
    lone_pair.then_some(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aromatic_atoms(smiles: &str) -> usize {
        let mol = Molecule::from_smiles(smiles).unwrap();
        mol.atoms().iter().filter(|a| a.aromatic).count()
    }

    #[test]
    fn bond_between_rings_is_single() {
        let mol = Molecule::from_smiles("c1ccc(cc1)c1ccccc1").unwrap();
        let link = mol.bond_between(3, 6).unwrap();
        assert_eq!(link.order, BondOrder::Single);
        assert_eq!(
            mol.bonds().iter().filter(|b| b.order == BondOrder::Aromatic).count(),
            12
        );
    }

    #[test]
    fn kekule_rings_are_perceived() {
        assert_eq!(aromatic_atoms("C1=CC=CC=C1"), 6);
        assert_eq!(aromatic_atoms("C1=CC=NC=C1"), 6);
        assert_eq!(aromatic_atoms("C1=CC=C2C=CC=CC2=C1"), 10);
        assert_eq!(aromatic_atoms("C1=COC=C1"), 5);
        assert_eq!(aromatic_atoms("O=C1C=CC=CN1"), 6);
    }

    #[test]
    fn non_aromatic_rings_are_untouched() {
        assert_eq!(aromatic_atoms("C1CCCCC1"), 0);
        assert_eq!(aromatic_atoms("C1=CCCC=C1"), 0);
        assert_eq!(aromatic_atoms("C1=CC=CC=CC=C1"), 0);
    }

    #[test]
    fn pyrrole_keeps_its_hydrogen() {
        let mol = Molecule::from_smiles("C1=CNC=C1").unwrap();
        assert!(mol.atom(2).aromatic);
        assert_eq!(mol.hydrogen_count(2), 1);
        assert_eq!(mol.hydrogen_count(0), 1);
    }
}
