//! Canonical SMILES.
//!
//! # Algorithm
//!
//! Atoms are ranked by an initial invariant (element, isotope, charge,
//! degree, hydrogen count, aromaticity, ring membership), and the ranks are
//! refined Morgan-style by the sorted `(bond, neighbour rank)` lists until the
//! partition stops splitting. Remaining ties are symmetric atoms; the first
//! tied atom of the lowest tied class is split off and refinement resumes
//! until every rank is unique.
//!
//! The string is then written by a depth-first walk that starts each
//! connected component at its lowest-ranked atom and visits neighbours in
//! rank order. Ring-closure digits are reused lowest first.
//!
//! ## References
//!
//! Weininger, D., Weininger, A., Weininger, J. L. (1989). "SMILES. 2.
//! Algorithm for generation of unique SMILES notation." J. Chem. Inf.
//! Comput. Sci. 29(2).

use std::fmt::Write;

use super::{BondOrder, Molecule};

impl Molecule {
    /// Canonical SMILES: equal for every way of writing the same structure.
    pub fn canonical_smiles(&self) -> String {
        let ranks = canonical_ranks(self);
        Writer::new(self, &ranks).write()
    }
}

fn atom_invariant(mol: &Molecule, i: usize) -> [u32; 7] {
    let a = mol.atom(i);
    [
        a.element.atomic_number() as u32,
        a.isotope as u32,
        (a.charge as i32 + 128) as u32,
        mol.degree(i) as u32,
        mol.hydrogen_count(i) as u32,
        a.aromatic as u32,
        mol.is_ring_atom(i) as u32,
    ]
}

/// Replace keys by their dense position in sorted order.
fn dense_ranks<K: Ord + Clone>(keys: &[K]) -> Vec<usize> {
    let mut sorted: Vec<K> = keys.to_vec();
    sorted.sort();
    sorted.dedup();
    keys.iter()
        .map(|k| sorted.binary_search(k).unwrap_or(0))
        .collect()
}

fn class_count(ranks: &[usize]) -> usize {
    let mut r = ranks.to_vec();
    r.sort_unstable();
    r.dedup();
    r.len()
}

fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    let mut classes = class_count(&ranks);
    loop {
        let keys: Vec<(usize, Vec<(u8, usize)>)> = (0..mol.atom_count())
            .map(|i| {
                let mut env: Vec<(u8, usize)> = mol
                    .neighbors(i)
                    .iter()
                    .map(|&(nbr, bond)| (mol.bonds()[bond].order.code(), ranks[nbr]))
                    .collect();
                env.sort_unstable();
                (ranks[i], env)
            })
            .collect();
        let next = dense_ranks(&keys);
        let next_classes = class_count(&next);
        if next_classes == classes {
            return next;
        }
        ranks = next;
        classes = next_classes;
    }
}

fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let n = mol.atom_count();
    let initial: Vec<[u32; 7]> = (0..n).map(|i| atom_invariant(mol, i)).collect();
    let mut ranks = refine(mol, dense_ranks(&initial));

    while class_count(&ranks) < n {
        // Lowest rank shared by more than one atom.
        let mut counts = vec![0usize; n];
        for &r in &ranks {
            counts[r] += 1;
        }
        let Some(tied) = counts.iter().position(|&c| c > 1) else {
            break;
        };
        let Some(pick) = ranks.iter().position(|&r| r == tied) else {
            break;
        };
        let mut split: Vec<usize> = ranks.iter().map(|&r| r * 2 + 1).collect();
        split[pick] -= 1;
        ranks = refine(mol, dense_ranks(&split));
    }
    ranks
}

struct Writer<'m> {
    mol: &'m Molecule,
    ranks: &'m [usize],
    visited: Vec<bool>,
    bond_used: Vec<bool>,
    // Per atom: ring-closure bonds in the order they are written.
    closures: Vec<Vec<usize>>,
    // Per atom: tree children as (child, bond), rank ordered.
    children: Vec<Vec<(usize, usize)>>,
    // Ring bond -> digit while the ring is open.
    open_digit: Vec<Option<u32>>,
    digits_in_use: Vec<bool>,
    out: String,
}

impl<'m> Writer<'m> {
    fn new(mol: &'m Molecule, ranks: &'m [usize]) -> Self {
        let n = mol.atom_count();
        Self {
            mol,
            ranks,
            visited: vec![false; n],
            bond_used: vec![false; mol.bond_count()],
            closures: vec![Vec::new(); n],
            children: vec![Vec::new(); n],
            open_digit: vec![None; mol.bond_count()],
            digits_in_use: Vec::new(),
            out: String::new(),
        }
    }

    fn write(mut self) -> String {
        let mut order: Vec<usize> = (0..self.mol.atom_count()).collect();
        order.sort_by_key(|&i| self.ranks[i]);
        let mut roots = Vec::new();
        for &start in &order {
            if !self.visited[start] {
                roots.push(start);
                self.plan(start);
            }
        }
        for (k, &root) in roots.iter().enumerate() {
            if k > 0 {
                self.out.push('.');
            }
            self.emit(root);
        }
        self.out
    }

    /// First pass: split bonds into tree edges and ring closures.
    fn plan(&mut self, root: usize) {
        self.visited[root] = true;
        // Iterative DFS in recursive order: (atom, neighbours by rank, cursor).
        let mut frames = vec![(root, self.sorted_neighbors(root), 0usize)];

        while let Some((atom, nbrs, next)) = frames.last_mut() {
            let atom = *atom;
            let Some(&(nbr, bond)) = nbrs.get(*next) else {
                frames.pop();
                continue;
            };
            *next += 1;
            if self.bond_used[bond] {
                continue;
            }
            self.bond_used[bond] = true;
            if self.visited[nbr] {
                // Opened at the earlier atom, closed here.
                self.closures[nbr].push(bond);
                self.closures[atom].push(bond);
            } else {
                self.visited[nbr] = true;
                self.children[atom].push((nbr, bond));
                let nbrs = self.sorted_neighbors(nbr);
                frames.push((nbr, nbrs, 0));
            }
        }
    }

    fn sorted_neighbors(&self, atom: usize) -> Vec<(usize, usize)> {
        let mut nbrs = self.mol.neighbors(atom).to_vec();
        nbrs.sort_by_key(|&(n, _)| self.ranks[n]);
        nbrs
    }

    /// Second pass: write atoms, closures, and branches.
    fn emit(&mut self, root: usize) {
        enum Step {
            Atom(usize, Option<usize>),
            Text(&'static str),
        }
        let mut steps = vec![Step::Atom(root, None)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Text(t) => self.out.push_str(t),
                Step::Atom(atom, via) => {
                    if let Some(bond) = via {
                        let symbol = self.bond_symbol(bond);
                        self.out.push_str(symbol);
                    }
                    self.atom_symbol(atom);
                    self.ring_digits(atom);

                    let children = self.children[atom].clone();
                    // Pushed in reverse so the first child is written first;
                    // every child but the last goes in parentheses.
                    for (k, &(child, bond)) in children.iter().enumerate().rev() {
                        let last = k + 1 == children.len();
                        if !last {
                            steps.push(Step::Text(")"));
                        }
                        steps.push(Step::Atom(child, Some(bond)));
                        if !last {
                            steps.push(Step::Text("("));
                        }
                    }
                }
            }
        }
    }

    fn ring_digits(&mut self, atom: usize) {
        let closures = self.closures[atom].clone();
        for bond in closures {
            match self.open_digit[bond].take() {
                Some(digit) => {
                    self.digits_in_use[digit as usize] = false;
                    push_digit(&mut self.out, digit);
                }
                None => {
                    let digit = match self.digits_in_use.iter().skip(1).position(|&u| !u) {
                        Some(p) => p + 1,
                        None => self.digits_in_use.len().max(1),
                    };
                    if digit >= self.digits_in_use.len() {
                        self.digits_in_use.resize(digit + 1, false);
                    }
                    self.digits_in_use[digit] = true;
                    self.open_digit[bond] = Some(digit as u32);
                    let symbol = self.bond_symbol(bond);
                    self.out.push_str(symbol);
                    push_digit(&mut self.out, digit as u32);
                }
            }
        }
    }

    fn bond_symbol(&self, bond: usize) -> &'static str {
        let b = &self.mol.bonds()[bond];
        let both_aromatic = self.mol.atom(b.begin).aromatic && self.mol.atom(b.end).aromatic;
        match b.order {
            BondOrder::Single if both_aromatic => "-",
            BondOrder::Single => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Quadruple => "$",
            BondOrder::Aromatic if both_aromatic => "",
            BondOrder::Aromatic => ":",
        }
    }

    fn atom_symbol(&mut self, i: usize) {
        let atom = self.mol.atom(i);
        let symbol = atom.element.symbol();
        let organic = matches!(
            symbol,
            "*" | "B" | "C" | "N" | "O" | "P" | "S" | "F" | "Cl" | "Br" | "I"
        );
        let aromatic_organic = matches!(symbol, "B" | "C" | "N" | "O" | "P" | "S");
        let hydrogens = self.mol.hydrogen_count(i);
        let plain = organic
            && (!atom.aromatic || aromatic_organic)
            && atom.charge == 0
            && atom.isotope == 0
            && hydrogens == self.mol.implicit_hydrogens(i);

        let written = if atom.aromatic {
            symbol.to_ascii_lowercase()
        } else {
            symbol.to_string()
        };
        if plain {
            self.out.push_str(&written);
            return;
        }

        self.out.push('[');
        if atom.isotope != 0 {
            let _ = write!(self.out, "{}", atom.isotope);
        }
        self.out.push_str(&written);
        match hydrogens {
            0 => {}
            1 => self.out.push('H'),
            h => {
                let _ = write!(self.out, "H{h}");
            }
        }
        match atom.charge {
            0 => {}
            1 => self.out.push('+'),
            -1 => self.out.push('-'),
            c if c > 0 => {
                let _ = write!(self.out, "+{c}");
            }
            c => {
                let _ = write!(self.out, "-{}", -(c as i32));
            }
        }
        self.out.push(']');
    }
}

fn push_digit(out: &mut String, digit: u32) {
    if digit < 10 {
        out.push(char::from(b'0' + digit as u8));
    } else {
        let _ = write!(out, "%{digit:02}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(smiles: &str) -> String {
        Molecule::from_smiles(smiles).unwrap().canonical_smiles()
    }

    fn assert_same(forms: &[&str]) {
        let first = canon(forms[0]);
        for form in &forms[1..] {
            assert_eq!(canon(form), first, "{form} vs {}", forms[0]);
        }
    }

    #[test]
    fn atom_order_does_not_matter() {
        assert_same(&["CCO", "OCC", "C(O)C"]);
        assert_same(&["c1ccccc1O", "Oc1ccccc1", "c1cc(O)ccc1"]);
        assert_same(&["CC(=O)N", "NC(C)=O", "O=C(N)C"]);
        assert_same(&["c1ccncc1", "n1ccccc1", "c1cnccc1"]);
    }

    #[test]
    fn kekule_and_aromatic_forms_agree() {
        assert_same(&["C1=CC=CC=C1", "c1ccccc1"]);
        assert_same(&["C1=CNC=C1", "c1cc[nH]c1", "[nH]1cccc1"]);
        assert_same(&["c1ccccc1-c1ccccc1", "c1ccc(cc1)c1ccccc1"]);
    }

    #[test]
    fn redundant_brackets_are_dropped() {
        assert_eq!(canon("[CH3][CH3]"), "CC");
        assert_same(&["[CH3]C(=O)[OH]", "CC(=O)O"]);
    }

    #[test]
    fn output_parses_back_to_itself() {
        for smiles in [
            "CC(C)(C)c1ccc(O)cc1",
            "[4*]CC(=O)[16*]",
            "C1CC2CCC1CC2",
            "c1ccc2ccccc2c1",
            "[13CH3][O-]",
            "CC[N+](C)(C)C.[Cl-]",
            "[Pt]",
        ] {
            let once = canon(smiles);
            assert_eq!(canon(&once), once, "{smiles}");
        }
    }

    #[test]
    fn distinct_structures_differ() {
        assert_ne!(canon("CCO"), canon("COC"));
        assert_ne!(canon("[4*]CC"), canon("[5*]CC"));
        assert_ne!(canon("C=CC"), canon("CCC"));
    }

    #[test]
    fn empty_molecule() {
        assert_eq!(canon(""), "");
    }
}
