//! SMILES reader.
//!
//! Supports the organic subset, bracket atoms (`[13CH3+]`, `[nH]`, `[4*]`),
//! aromatic lower-case atoms, branches, ring closures (including `%nn`),
//! explicit bond symbols, and `.` disconnections. Stereo markers (`@`, `/`,
//! `\`) are accepted and dropped.

use std::collections::HashMap;

use super::{Atom, Bond, BondOrder, Element, Molecule};
use crate::error::{Error, Result};

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    // ring label -> (atom, bond symbol at the opening digit)
    open_rings: HashMap<u16, (usize, Option<BondOrder>)>,
}

pub(super) fn parse(smiles: &str) -> Result<Molecule> {
    let mut parser = Parser {
        bytes: smiles.trim().as_bytes(),
        pos: 0,
        atoms: Vec::new(),
        bonds: Vec::new(),
        open_rings: HashMap::new(),
    };
    parser.run()?;
    Ok(Molecule::new(parser.atoms, parser.bonds))
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn run(&mut self) -> Result<()> {
        let mut prev: Option<usize> = None;
        let mut branches: Vec<Option<usize>> = Vec::new();
        let mut pending_bond: Option<BondOrder> = None;

        while let Some(c) = self.peek() {
            match c {
                b'(' => {
                    if prev.is_none() {
                        return Err(Error::smiles(self.pos, "branch without a preceding atom"));
                    }
                    branches.push(prev);
                    self.pos += 1;
                }
                b')' => {
                    prev = branches
                        .pop()
                        .ok_or_else(|| Error::smiles(self.pos, "unbalanced ')'"))?;
                    self.pos += 1;
                }
                b'.' => {
                    if pending_bond.is_some() {
                        return Err(Error::smiles(self.pos, "bond before '.'"));
                    }
                    prev = None;
                    self.pos += 1;
                }
                b'-' | b'=' | b'#' | b'$' | b':' | b'/' | b'\\' => {
                    if pending_bond.is_some() {
                        return Err(Error::smiles(self.pos, "consecutive bond symbols"));
                    }
                    pending_bond = Some(match c {
                        b'=' => BondOrder::Double,
                        b'#' => BondOrder::Triple,
                        b'$' => BondOrder::Quadruple,
                        b':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    self.pos += 1;
                }
                b'0'..=b'9' | b'%' => {
                    let at = self.pos;
                    let label = self.ring_label()?;
                    let atom =
                        prev.ok_or_else(|| Error::smiles(at, "ring closure without an atom"))?;
                    self.ring_closure(at, atom, label, pending_bond.take())?;
                }
                _ => {
                    let atom = if c == b'[' {
                        self.bracket_atom()?
                    } else {
                        self.organic_atom()?
                    };
                    let idx = self.atoms.len();
                    self.atoms.push(atom);
                    if let Some(p) = prev {
                        let order =
                            pending_bond.take().unwrap_or_else(|| self.implied_order(p, idx));
                        self.bonds.push(Bond {
                            begin: p,
                            end: idx,
                            order,
                        });
                    } else if pending_bond.is_some() {
                        return Err(Error::smiles(self.pos, "bond without a preceding atom"));
                    }
                    prev = Some(idx);
                }
            }
        }

        if pending_bond.is_some() {
            return Err(Error::smiles(self.pos, "dangling bond"));
        }
        if !branches.is_empty() {
            return Err(Error::smiles(self.pos, "unclosed branch"));
        }
        if let Some(label) = self.open_rings.keys().min() {
            return Err(Error::smiles(self.pos, format!("unclosed ring {label}")));
        }
        Ok(())
    }

    fn implied_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].aromatic && self.atoms[b].aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn ring_label(&mut self) -> Result<u16> {
        if self.peek() == Some(b'%') {
            let start = self.pos;
            let digits = self.bytes.get(self.pos + 1..self.pos + 3);
            match digits {
                Some(d) if d.iter().all(u8::is_ascii_digit) => {
                    self.pos += 3;
                    Ok(((d[0] - b'0') * 10 + (d[1] - b'0')) as u16)
                }
                _ => Err(Error::smiles(start, "'%' must be followed by two digits")),
            }
        } else {
            let d = self.bytes[self.pos] - b'0';
            self.pos += 1;
            Ok(d as u16)
        }
    }

    fn ring_closure(
        &mut self,
        at: usize,
        atom: usize,
        label: u16,
        bond: Option<BondOrder>,
    ) -> Result<()> {
        match self.open_rings.remove(&label) {
            None => {
                self.open_rings.insert(label, (atom, bond));
            }
            Some((partner, opening)) => {
                if partner == atom || self.bonds.iter().any(|b| {
                    (b.begin == partner && b.end == atom) || (b.begin == atom && b.end == partner)
                }) {
                    return Err(Error::smiles(at, "ring closure duplicates an existing bond"));
                }
                let order = match (opening, bond) {
                    (Some(x), Some(y)) if x != y => {
                        return Err(Error::smiles(at, "conflicting ring-closure bond orders"))
                    }
                    (Some(x), _) | (None, Some(x)) => x,
                    (None, None) => self.implied_order(partner, atom),
                };
                self.bonds.push(Bond {
                    begin: partner,
                    end: atom,
                    order,
                });
            }
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<Atom> {
        let start = self.pos;
        let c = self.bytes[self.pos];
        let next = self.bytes.get(self.pos + 1).copied();

        let (element, aromatic, len) = match (c, next) {
            (b'C', Some(b'l')) => (Element::CHLORINE, false, 2),
            (b'B', Some(b'r')) => (Element::BROMINE, false, 2),
            (b'B', _) => (Element::BORON, false, 1),
            (b'C', _) => (Element::CARBON, false, 1),
            (b'N', _) => (Element::NITROGEN, false, 1),
            (b'O', _) => (Element::OXYGEN, false, 1),
            (b'P', _) => (Element::PHOSPHORUS, false, 1),
            (b'S', _) => (Element::SULFUR, false, 1),
            (b'F', _) => (Element::FLUORINE, false, 1),
            (b'I', _) => (Element::IODINE, false, 1),
            (b'b', _) => (Element::BORON, true, 1),
            (b'c', _) => (Element::CARBON, true, 1),
            (b'n', _) => (Element::NITROGEN, true, 1),
            (b'o', _) => (Element::OXYGEN, true, 1),
            (b'p', _) => (Element::PHOSPHORUS, true, 1),
            (b's', _) => (Element::SULFUR, true, 1),
            (b'*', _) => (Element::DUMMY, false, 1),
            _ => {
                return Err(Error::smiles(
                    start,
                    format!("unexpected character '{}'", c as char),
                ))
            }
        };
        self.pos += len;

        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        if element == Element::DUMMY {
            atom.explicit_hydrogens = Some(0);
        }
        Ok(atom)
    }

    fn bracket_atom(&mut self) -> Result<Atom> {
        let start = self.pos;
        let close = self.bytes[start..]
            .iter()
            .position(|&b| b == b']')
            .map(|off| start + off)
            .ok_or_else(|| Error::smiles(start, "unterminated bracket atom"))?;
        let body = &self.bytes[start + 1..close];
        self.pos = close + 1;

        let mut i = 0;
        let number = |i: &mut usize| -> Option<u32> {
            let from = *i;
            while *i < body.len() && body[*i].is_ascii_digit() {
                *i += 1;
            }
            std::str::from_utf8(&body[from..*i]).ok()?.parse().ok()
        };

        let isotope = number(&mut i).unwrap_or(0);

        // Element symbol: '*', an aromatic symbol, or Upper[lower].
        let sym_start = i;
        if i < body.len() && body[i] == b'*' {
            i += 1;
        } else if i + 1 < body.len() && (&body[i..i + 2] == b"se" || &body[i..i + 2] == b"as") {
            i += 2;
        } else if i < body.len() && body[i].is_ascii_lowercase() {
            i += 1;
        } else if i < body.len() && body[i].is_ascii_uppercase() {
            i += 1;
            if i < body.len() && body[i].is_ascii_lowercase() {
                let two = std::str::from_utf8(&body[sym_start..i + 1]).unwrap_or("");
                if Element::from_symbol(two).is_some() {
                    i += 1;
                }
            }
        }
        let raw = std::str::from_utf8(&body[sym_start..i]).unwrap_or("");
        if raw.is_empty() {
            return Err(Error::smiles(start + 1 + sym_start, "missing element symbol"));
        }
        let aromatic = raw.as_bytes()[0].is_ascii_lowercase();
        let symbol = if aromatic {
            let mut s = raw.to_string();
            s[..1].make_ascii_uppercase();
            s
        } else {
            raw.to_string()
        };
        let element = Element::from_symbol(&symbol).ok_or_else(|| {
            Error::smiles(start + 1 + sym_start, format!("unknown element '{raw}'"))
        })?;

        while i < body.len() && body[i] == b'@' {
            i += 1;
        }
        // Chirality classes such as @TH1 are not supported; plain @/@@ only.

        let mut hydrogens = 0u8;
        if i < body.len() && body[i] == b'H' {
            i += 1;
            hydrogens = number(&mut i).unwrap_or(1) as u8;
        }

        let mut charge: i32 = 0;
        if i < body.len() && (body[i] == b'+' || body[i] == b'-') {
            let sign = if body[i] == b'+' { 1 } else { -1 };
            let symbol = body[i];
            i += 1;
            match number(&mut i) {
                Some(n) => charge = sign * n as i32,
                None => {
                    charge = sign;
                    while i < body.len() && body[i] == symbol {
                        charge += sign;
                        i += 1;
                    }
                }
            }
        }

        if i < body.len() && body[i] == b':' {
            i += 1;
            if number(&mut i).is_none() {
                return Err(Error::smiles(start + 1 + i, "atom class needs a number"));
            }
        }

        if i != body.len() {
            return Err(Error::smiles(start + 1 + i, "unexpected content in bracket atom"));
        }

        let mut atom = Atom::new(element);
        atom.aromatic = aromatic;
        atom.isotope = isotope as u16;
        atom.charge = charge as i8;
        atom.explicit_hydrogens = Some(hydrogens);
        Ok(atom)
    }
}
