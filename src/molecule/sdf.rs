//! SD file export.
//!
//! Writes one V2000 record per fragment. Coordinates are all zero since no
//! layout is computed; the record title and a `SMILES` data field carry the
//! fragment's canonical SMILES.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use super::{BondOrder, Molecule};
use crate::error::Result;
use crate::fragment::Fragment;

/// Write `fragments` to `path` as an SD file.
pub fn export_sdf(path: impl AsRef<Path>, fragments: &[Fragment]) -> Result<()> {
    let path = path.as_ref();
    debug!(count = fragments.len(), path = %path.display(), "saving fragments to SDF");
    let mut out = BufWriter::new(File::create(path)?);
    write_sdf(&mut out, fragments)?;
    out.flush()?;
    debug!(count = fragments.len(), path = %path.display(), "saved fragments to SDF");
    Ok(())
}

/// Write `fragments` as SD records to any writer.
pub fn write_sdf<W: Write>(out: &mut W, fragments: &[Fragment]) -> Result<()> {
    for fragment in fragments {
        write_molblock(out, fragment.canonical_smiles(), fragment.molecule())?;
        writeln!(out, "> <SMILES>")?;
        writeln!(out, "{}", fragment.canonical_smiles())?;
        writeln!(out)?;
        writeln!(out, "$$$$")?;
    }
    Ok(())
}

fn write_molblock<W: Write>(out: &mut W, title: &str, mol: &Molecule) -> Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "  fragclump")?;
    writeln!(out)?;
    writeln!(
        out,
        "{:>3}{:>3}  0  0  0  0  0  0  0  0999 V2000",
        mol.atom_count(),
        mol.bond_count()
    )?;

    for atom in mol.atoms() {
        writeln!(
            out,
            "{:>10.4}{:>10.4}{:>10.4} {:<3} 0  0  0  0  0  0  0  0  0  0  0  0",
            0.0,
            0.0,
            0.0,
            atom.element.symbol()
        )?;
    }
    for bond in mol.bonds() {
        writeln!(
            out,
            "{:>3}{:>3}{:>3}  0",
            bond.begin + 1,
            bond.end + 1,
            molfile_bond_type(bond.order)
        )?;
    }

    let charged: Vec<(usize, i8)> = mol
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.charge != 0)
        .map(|(i, a)| (i + 1, a.charge))
        .collect();
    for chunk in charged.chunks(8) {
        write!(out, "M  CHG{:>3}", chunk.len())?;
        for (idx, charge) in chunk {
            write!(out, " {idx:>3} {charge:>3}")?;
        }
        writeln!(out)?;
    }

    let isotopes: Vec<(usize, u16)> = mol
        .atoms()
        .iter()
        .enumerate()
        .filter(|(_, a)| a.isotope != 0)
        .map(|(i, a)| (i + 1, a.isotope))
        .collect();
    for chunk in isotopes.chunks(8) {
        write!(out, "M  ISO{:>3}", chunk.len())?;
        for (idx, mass) in chunk {
            write!(out, " {idx:>3} {mass:>3}")?;
        }
        writeln!(out)?;
    }

    writeln!(out, "M  END")?;
    Ok(())
}

/// V2000 bond type. Types 5 to 8 are query bonds, so a quadruple bond,
/// which has no molfile type, is written as 0.
fn molfile_bond_type(order: BondOrder) -> u8 {
    match order {
        BondOrder::Single => 1,
        BondOrder::Double => 2,
        BondOrder::Triple => 3,
        BondOrder::Aromatic => 4,
        BondOrder::Quadruple => 0,
    }
}
