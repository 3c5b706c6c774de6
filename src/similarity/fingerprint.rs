//! Morgan (ECFP-style) circular fingerprints and Tanimoto similarity.
//!
//! Each atom starts from an invariant built from its element, heavy degree,
//! hydrogen count, charge, isotope, and ring membership. Every iteration folds
//! the sorted `(bond order, neighbour id)` list into a new identifier. The
//! identifiers of all iterations `0..=radius` are folded into `n_bits` by
//! modulo. Radius 2 with 2048 bits is the ECFP4 convention.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Dissimilarity;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::molecule::Molecule;

/// Fingerprint shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintParams {
    /// Number of neighbourhood expansion rounds.
    pub radius: u32,
    /// Bit width; must be a positive multiple of 64.
    pub n_bits: usize,
}

impl Default for FingerprintParams {
    fn default() -> Self {
        Self {
            radius: 2,
            n_bits: 2048,
        }
    }
}

impl FingerprintParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_bits == 0 || self.n_bits % 64 != 0 {
            return Err(Error::InvalidParameter {
                name: "n_bits",
                message: "must be a positive multiple of 64",
            });
        }
        Ok(())
    }
}

/// Fixed-width bit vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    words: Box<[u64]>,
}

impl Fingerprint {
    /// All-zero fingerprint of `n_bits` bits (rounded up to a word).
    pub fn zeros(n_bits: usize) -> Self {
        Self {
            words: vec![0u64; n_bits.div_ceil(64)].into_boxed_slice(),
        }
    }

    pub fn n_bits(&self) -> usize {
        self.words.len() * 64
    }

    pub fn set(&mut self, bit: usize) {
        self.words[bit / 64] |= 1u64 << (bit % 64);
    }

    pub fn contains(&self, bit: usize) -> bool {
        self.words[bit / 64] & (1u64 << (bit % 64)) != 0
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Indices of set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..64).filter(move |b| w & (1u64 << b) != 0).map(move |b| wi * 64 + b)
        })
    }

    /// Tanimoto similarity `|a ∧ b| / |a ∨ b|`; 0 when both are empty.
    pub fn tanimoto(&self, other: &Fingerprint) -> f64 {
        debug_assert_eq!(self.words.len(), other.words.len());
        let (mut both, mut either) = (0u32, 0u32);
        for (a, b) in self.words.iter().zip(other.words.iter()) {
            both += (a & b).count_ones();
            either += (a | b).count_ones();
        }
        if either == 0 {
            0.0
        } else {
            both as f64 / either as f64
        }
    }
}

#[inline]
fn hash_combine(seed: u32, value: u32) -> u32 {
    seed ^ value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2)
}

fn atom_invariant(mol: &Molecule, atom: usize) -> u32 {
    let a = mol.atom(atom);
    [
        a.element.atomic_number() as u32,
        mol.degree(atom) as u32,
        mol.hydrogen_count(atom) as u32,
        (a.charge as i32 + 128) as u32,
        a.isotope as u32,
        mol.is_ring_atom(atom) as u32,
    ]
    .into_iter()
    .fold(0u32, hash_combine)
}

/// Compute the Morgan fingerprint of `mol`.
pub fn morgan_fingerprint(mol: &Molecule, params: &FingerprintParams) -> Fingerprint {
    let n_bits = params.n_bits.max(1);
    let mut fp = Fingerprint::zeros(n_bits);
    let n = mol.atom_count();

    let mut ids: Vec<u32> = (0..n).map(|i| atom_invariant(mol, i)).collect();
    for &id in &ids {
        fp.set(id as usize % n_bits);
    }

    let mut env: Vec<(u32, u32)> = Vec::new();
    for round in 1..=params.radius {
        let next: Vec<u32> = (0..n)
            .map(|i| {
                env.clear();
                env.extend(
                    mol.neighbors(i)
                        .iter()
                        .map(|&(nbr, bond)| (mol.bonds()[bond].order.code() as u32, ids[nbr])),
                );
                env.sort_unstable();
                env.iter().fold(
                    hash_combine(hash_combine(round, ids[i]), env.len() as u32),
                    |seed, &(order, id)| hash_combine(hash_combine(seed, order), id),
                )
            })
            .collect();
        for &id in &next {
            fp.set(id as usize % n_bits);
        }
        ids = next;
    }
    fp
}

/// Fingerprints for a fragment list, computed once and shared by the
/// distance matrix and the centroid selector. Indexed by fragment position.
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    params: FingerprintParams,
    fingerprints: Vec<Fingerprint>,
}

impl FingerprintCache {
    pub fn build(fragments: &[Fragment], params: FingerprintParams) -> Self {
        let fingerprints: Vec<Fingerprint> = fragments
            .iter()
            .map(|f| morgan_fingerprint(f.molecule(), &params))
            .collect();
        debug!(
            count = fingerprints.len(),
            radius = params.radius,
            n_bits = params.n_bits,
            "computed fingerprints"
        );
        Self {
            params,
            fingerprints,
        }
    }

    pub fn params(&self) -> &FingerprintParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn get(&self, idx: usize) -> &Fingerprint {
        &self.fingerprints[idx]
    }
}

/// `1 - Tanimoto` over a [`FingerprintCache`].
#[derive(Debug, Clone)]
pub struct FingerprintMetric {
    cache: FingerprintCache,
}

impl FingerprintMetric {
    pub fn new(fragments: &[Fragment], params: FingerprintParams) -> Self {
        Self {
            cache: FingerprintCache::build(fragments, params),
        }
    }

    pub fn from_cache(cache: FingerprintCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }
}

impl Dissimilarity for FingerprintMetric {
    fn len(&self) -> usize {
        self.cache.len()
    }

    fn dissimilarity(&self, i: usize, j: usize) -> f64 {
        1.0 - self.cache.get(i).tanimoto(self.cache.get(j))
    }
}
