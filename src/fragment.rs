//! Fragments: immutable molecular structures addressed by list position.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::molecule::Molecule;

/// A molecular fragment.
///
/// Cloning is cheap; the molecule is shared. Within a clustering run a
/// fragment is identified by its index in the fragment list, not by value, so
/// duplicates are allowed and clustered like any other member.
///
/// Outside a run, the identity of a fragment is its canonical SMILES:
/// `CCO` and `OCC` are the same fragment.
#[derive(Debug, Clone)]
pub struct Fragment {
    smiles: Arc<str>,
    canonical: Arc<str>,
    molecule: Arc<Molecule>,
}

impl Fragment {
    /// Parse a fragment from SMILES. The trimmed input is kept as written.
    pub fn from_smiles(smiles: &str) -> Result<Self> {
        let molecule = Molecule::from_smiles(smiles)?;
        Ok(Self::new(smiles.trim(), molecule))
    }

    /// Wrap an already-built molecule under the given input string.
    pub fn new(smiles: impl Into<Arc<str>>, molecule: Molecule) -> Self {
        Self {
            smiles: smiles.into(),
            canonical: Arc::from(molecule.canonical_smiles()),
            molecule: Arc::new(molecule),
        }
    }

    /// The SMILES the fragment was created from.
    pub fn smiles(&self) -> &str {
        &self.smiles
    }

    /// Canonical SMILES, used for export and de-duplication.
    pub fn canonical_smiles(&self) -> &str {
        &self.canonical
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn atom_count(&self) -> usize {
        self.molecule.atom_count()
    }
}

impl FromStr for Fragment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_smiles(s)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.smiles)
    }
}

/// Atom-count window applied to fragments before clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentFilter {
    /// Smallest accepted atom count (inclusive).
    pub min_atoms: usize,
    /// Largest accepted atom count (inclusive).
    pub max_atoms: usize,
}

impl Default for FragmentFilter {
    fn default() -> Self {
        Self {
            min_atoms: 5,
            max_atoms: 100,
        }
    }
}

impl FragmentFilter {
    pub fn new(min_atoms: usize, max_atoms: usize) -> Self {
        Self {
            min_atoms,
            max_atoms,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_atoms > self.max_atoms {
            return Err(Error::InvalidParameter {
                name: "filter",
                message: "min_atoms must not exceed max_atoms",
            });
        }
        Ok(())
    }

    pub fn accepts(&self, fragment: &Fragment) -> bool {
        (self.min_atoms..=self.max_atoms).contains(&fragment.atom_count())
    }

    /// Keep the fragments inside the window, preserving order.
    pub fn apply(&self, fragments: impl IntoIterator<Item = Fragment>) -> Vec<Fragment> {
        fragments.into_iter().filter(|f| self.accepts(f)).collect()
    }
}

/// Drop fragments whose canonical SMILES was already seen; the first
/// occurrence wins and order is preserved.
pub fn dedup_fragments(fragments: impl IntoIterator<Item = Fragment>) -> Vec<Fragment> {
    let mut seen: HashSet<Arc<str>> = HashSet::new();
    fragments
        .into_iter()
        .filter(|f| seen.insert(Arc::clone(&f.canonical)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frags(smiles: &[&str]) -> Vec<Fragment> {
        smiles.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn filter_window_is_inclusive() {
        let filter = FragmentFilter::new(2, 3);
        let kept = filter.apply(frags(&["C", "CC", "CCC", "CCCC"]));
        let kept: Vec<&str> = kept.iter().map(Fragment::smiles).collect();
        assert_eq!(kept, vec!["CC", "CCC"]);
    }

    #[test]
    fn inverted_filter_is_rejected() {
        assert!(FragmentFilter::new(10, 2).validate().is_err());
        assert!(FragmentFilter::default().validate().is_ok());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let out = dedup_fragments(frags(&["CCO", "c1ccccc1", "CCO", "CCN", "c1ccccc1"]));
        let out: Vec<&str> = out.iter().map(Fragment::smiles).collect();
        assert_eq!(out, vec!["CCO", "c1ccccc1", "CCN"]);
    }

    #[test]
    fn dedup_matches_differently_written_structures() {
        let out = dedup_fragments(frags(&["CCO", "OCC", "c1ccccc1O", "Oc1ccccc1"]));
        let out: Vec<&str> = out.iter().map(Fragment::smiles).collect();
        assert_eq!(out, vec!["CCO", "c1ccccc1O"]);

        let out = dedup_fragments(frags(&["C1=CC=CC=C1", "c1ccccc1", "C1CCCCC1"]));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn input_string_is_trimmed() {
        let f: Fragment = "  CCO \n".parse().unwrap();
        assert_eq!(f.smiles(), "CCO");
        assert_eq!(f.to_string(), "CCO");
        assert_eq!(f.atom_count(), 3);
        let g: Fragment = "OCC".parse().unwrap();
        assert_eq!(f.canonical_smiles(), g.canonical_smiles());
    }
}
