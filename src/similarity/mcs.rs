//! Maximum common substructure (MCS) with a per-pair time budget.
//!
//! The search looks for the largest *connected* common substructure, counted
//! in atoms. Atoms match on element (dummy atoms match dummies). Bonds match on
//! order, except that single and aromatic bonds match each other.
//!
//! # Algorithm
//!
//! Candidate atom pairs `(a, b)` with equal elements form the nodes of a
//! product graph; two pairs are adjacent when `a`-`a'` and `b`-`b'` are both
//! bonds with compatible orders. A connected common substructure is then a
//! connected, injective node set of that graph. Sets are enumerated without
//! repetition by extension with an exclusion list (the ESU scheme), and
//! branches are cut with an element-count upper bound.
//!
//! The search is exponential in the worst case. It stops at the deadline and
//! reports [`McsOutcome::TimedOut`]; [`McsMetric`] then treats the pair as
//! maximally dissimilar.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Dissimilarity;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::molecule::{BondOrder, Molecule};

/// MCS search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McsParams {
    /// Wall-clock budget per pair, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for McsParams {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl McsParams {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidParameter {
                name: "mcs_timeout_ms",
                message: "must be positive",
            });
        }
        Ok(())
    }
}

/// Result of one MCS search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McsOutcome {
    /// The search finished; `atoms` is the exact MCS size.
    Complete { atoms: usize },
    /// The deadline passed; `best` is the largest match seen so far.
    TimedOut { best: usize },
}

/// Size of the maximum connected common substructure of `a` and `b`.
pub fn maximum_common_substructure(a: &Molecule, b: &Molecule, timeout: Duration) -> McsOutcome {
    if a.is_empty() || b.is_empty() {
        return McsOutcome::Complete { atoms: 0 };
    }
    let mut search = Search::new(a, b, Instant::now() + timeout);
    search.run();
    if search.timed_out {
        McsOutcome::TimedOut { best: search.best }
    } else {
        McsOutcome::Complete { atoms: search.best }
    }
}

#[inline]
fn bonds_match(x: BondOrder, y: BondOrder) -> bool {
    x == y
        || matches!(
            (x, y),
            (BondOrder::Single, BondOrder::Aromatic) | (BondOrder::Aromatic, BondOrder::Single)
        )
}

struct Search<'m> {
    a: &'m Molecule,
    b: &'m Molecule,
    nb: usize,
    // Element bucket per atom, `usize::MAX` when the element is absent from
    // the other molecule.
    bucket_a: Vec<usize>,
    bucket_b: Vec<usize>,
    // Unmapped atoms per bucket: (in a, in b).
    remaining: Vec<(usize, usize)>,
    mapped_a: Vec<bool>,
    mapped_b: Vec<bool>,
    // Product nodes excluded from the current branch, indexed `ia * nb + ib`.
    excluded: Vec<bool>,
    size: usize,
    best: usize,
    target: usize,
    deadline: Instant,
    timed_out: bool,
}

impl<'m> Search<'m> {
    fn new(a: &'m Molecule, b: &'m Molecule, deadline: Instant) -> Self {
        let counts_a = a.element_counts();
        let counts_b = b.element_counts();
        let shared: Vec<_> = counts_a
            .iter()
            .filter_map(|&(e, ca)| {
                counts_b
                    .iter()
                    .find(|(eb, _)| *eb == e)
                    .map(|&(_, cb)| (e, ca, cb))
            })
            .collect();

        let bucket_of = |mol: &Molecule| -> Vec<usize> {
            mol.atoms()
                .iter()
                .map(|atom| {
                    shared
                        .iter()
                        .position(|(e, _, _)| *e == atom.element)
                        .unwrap_or(usize::MAX)
                })
                .collect()
        };
        let bucket_a = bucket_of(a);
        let bucket_b = bucket_of(b);
        let remaining: Vec<(usize, usize)> = shared.iter().map(|&(_, ca, cb)| (ca, cb)).collect();
        let target = remaining.iter().map(|&(x, y)| x.min(y)).sum();

        Self {
            a,
            b,
            nb: b.atom_count(),
            bucket_a,
            bucket_b,
            remaining,
            mapped_a: vec![false; a.atom_count()],
            mapped_b: vec![false; b.atom_count()],
            excluded: vec![false; a.atom_count() * b.atom_count()],
            size: 0,
            best: 0,
            target,
            deadline,
            timed_out: false,
        }
    }

    fn bound(&self) -> usize {
        self.remaining.iter().map(|&(x, y)| x.min(y)).sum()
    }

    fn compatible(&self, ia: usize, ib: usize) -> bool {
        self.bucket_a[ia] != usize::MAX && self.bucket_a[ia] == self.bucket_b[ib]
    }

    fn usable(&self, node: usize) -> bool {
        !self.excluded[node] && !self.mapped_a[node / self.nb] && !self.mapped_b[node % self.nb]
    }

    fn finished(&self) -> bool {
        self.timed_out || self.best >= self.target
    }

    fn map(&mut self, ia: usize, ib: usize) {
        self.mapped_a[ia] = true;
        self.mapped_b[ib] = true;
        let slot = &mut self.remaining[self.bucket_a[ia]];
        slot.0 -= 1;
        slot.1 -= 1;
        self.size += 1;
        if self.size > self.best {
            self.best = self.size;
        }
    }

    fn unmap(&mut self, ia: usize, ib: usize) {
        self.mapped_a[ia] = false;
        self.mapped_b[ib] = false;
        let slot = &mut self.remaining[self.bucket_a[ia]];
        slot.0 += 1;
        slot.1 += 1;
        self.size -= 1;
    }

    fn product_neighbors(&self, ia: usize, ib: usize, out: &mut Vec<usize>) {
        for &(a2, bond_a) in self.a.neighbors(ia) {
            let order_a = self.a.bonds()[bond_a].order;
            for &(b2, bond_b) in self.b.neighbors(ib) {
                let node = a2 * self.nb + b2;
                if self.compatible(a2, b2)
                    && bonds_match(order_a, self.b.bonds()[bond_b].order)
                    && self.usable(node)
                    && !out.contains(&node)
                {
                    out.push(node);
                }
            }
        }
    }

    fn run(&mut self) {
        let na = self.a.atom_count();
        for ia in 0..na {
            for ib in 0..self.nb {
                if self.finished() {
                    return;
                }
                if !self.compatible(ia, ib) {
                    continue;
                }
                // Every connected set containing this root is enumerated
                // below, so later roots never revisit it.
                let root = ia * self.nb + ib;
                self.excluded[root] = true;
                self.map(ia, ib);
                let mut extension = Vec::new();
                self.product_neighbors(ia, ib, &mut extension);
                self.grow(&extension);
                self.unmap(ia, ib);
            }
        }
    }

    fn grow(&mut self, extension: &[usize]) {
        if self.finished() {
            return;
        }
        if Instant::now() >= self.deadline {
            self.timed_out = true;
            return;
        }
        if self.size + self.bound() <= self.best {
            return;
        }

        let mut marked = Vec::new();
        for (k, &node) in extension.iter().enumerate() {
            if self.finished() {
                break;
            }
            if !self.usable(node) {
                continue;
            }
            let (ia, ib) = (node / self.nb, node % self.nb);
            self.excluded[node] = true;
            marked.push(node);

            self.map(ia, ib);
            let mut next: Vec<usize> = extension[k + 1..]
                .iter()
                .copied()
                .filter(|&n| self.usable(n))
                .collect();
            self.product_neighbors(ia, ib, &mut next);
            self.grow(&next);
            self.unmap(ia, ib);
        }
        for node in marked {
            self.excluded[node] = false;
        }
    }
}

/// `1 - mcs_atoms / max(atoms_a, atoms_b)`; 1 for a zero-atom fragment or a
/// timed-out search.
pub fn mcs_distance(a: &Molecule, b: &Molecule, params: &McsParams) -> f64 {
    let max_atoms = a.atom_count().max(b.atom_count());
    if max_atoms == 0 {
        return 1.0;
    }
    match maximum_common_substructure(a, b, params.timeout()) {
        McsOutcome::Complete { atoms } => 1.0 - atoms as f64 / max_atoms as f64,
        McsOutcome::TimedOut { .. } => 1.0,
    }
}

/// MCS dissimilarity over a fragment list.
///
/// Nothing is cached; every call runs a fresh search. Timeouts are counted
/// and absorbed as distance 1.
#[derive(Debug)]
pub struct McsMetric<'a> {
    fragments: &'a [Fragment],
    params: McsParams,
    timeouts: AtomicUsize,
}

impl<'a> McsMetric<'a> {
    pub fn new(fragments: &'a [Fragment], params: McsParams) -> Self {
        Self {
            fragments,
            params,
            timeouts: AtomicUsize::new(0),
        }
    }

    pub fn params(&self) -> &McsParams {
        &self.params
    }

    /// Number of pair searches that hit the deadline so far.
    pub fn timeouts(&self) -> usize {
        self.timeouts.load(Ordering::Relaxed)
    }
}

impl Dissimilarity for McsMetric<'_> {
    fn len(&self) -> usize {
        self.fragments.len()
    }

    fn dissimilarity(&self, i: usize, j: usize) -> f64 {
        let (a, b) = (self.fragments[i].molecule(), self.fragments[j].molecule());
        let max_atoms = a.atom_count().max(b.atom_count());
        if max_atoms == 0 {
            return 1.0;
        }
        let common = match maximum_common_substructure(a, b, self.params.timeout()) {
            McsOutcome::Complete { atoms } => atoms,
            McsOutcome::TimedOut { best } => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(i, j, best, "MCS search timed out; treating pair as maximally dissimilar");
                0
            }
        };
        1.0 - common as f64 / max_atoms as f64
    }
}
