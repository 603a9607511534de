//! Canonical reduction of moment-matrix entries.
//!
//! Entry `(i, j)` of the moment matrix stands for `<S_i† S_j>`, a product
//! of per-player projector labels. Many index pairs denote the same
//! physical moment; reducing each pair to a canonical word and merging
//! equal words is what keeps the SDP variable count bounded.
//!
//! Reduction rules of the projective operator algebra:
//! - identity labels (0) vanish;
//! - operators owned by different players commute, so the word is grouped
//!   by owner;
//! - projectors are idempotent, so adjacent equal labels collapse;
//! - the moment matrix is real symmetric, so a word and its reverse denote
//!   the same value and are identified by taking the smaller of the two.

use ndarray::Array2;
use rustc_hash::FxHashMap;

/// Operator-sequence element of the moment-matrix index set.
///
/// Labels: 0 is the identity; labels `2p + 1` and `2p + 2` are the
/// answer-0 projectors of player `p` for question types 0 and 1.
pub type Monomial = Vec<u8>;

/// Canonical form of one moment: per-owner reduced words, concatenated in
/// owner order.
pub type CanonicKey = Vec<u8>;

/// Player owning a non-identity operator label.
#[must_use]
pub fn owner(label: u8) -> usize {
    debug_assert!(label > 0);
    usize::from((label - 1) / 2)
}

/// Canonical key of moment-matrix entry `(i, j)`.
///
/// Deterministic and total; two entries share a key iff their operator
/// products are equal under the reduction rules above.
#[must_use]
pub fn canonical_key(monomials: &[Monomial], i: usize, j: usize) -> CanonicKey {
    // S_i† reverses the label order; projectors are self-adjoint.
    let word: Vec<u8> = monomials[i]
        .iter()
        .rev()
        .chain(monomials[j].iter())
        .copied()
        .filter(|&label| label != 0)
        .collect();

    let forward = reduce(word.iter().copied());
    let backward = reduce(word.iter().rev().copied());
    forward.min(backward)
}

/// Group a word by owner (cross-player commutation) and collapse adjacent
/// equal labels (idempotence), preserving same-owner order.
fn reduce(word: impl Iterator<Item = u8>) -> CanonicKey {
    let mut per_owner: Vec<Vec<u8>> = Vec::new();
    for label in word {
        let slot = owner(label);
        if slot >= per_owner.len() {
            per_owner.resize_with(slot + 1, Vec::new);
        }
        if per_owner[slot].last() != Some(&label) {
            per_owner[slot].push(label);
        }
    }
    per_owner.into_iter().flatten().collect()
}

/// Deduplicated variable structure of an `n × n` moment matrix.
#[derive(Debug, Clone)]
pub struct CanonicClasses {
    /// Class id of each entry.
    pub class_of: Array2<usize>,
    /// First entry encountered per class, in row-major scan order.
    pub representative: Vec<(usize, usize)>,
}

impl CanonicClasses {
    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.representative.len()
    }
}

/// One O(n²) pass assigning every moment-matrix entry to its canonical
/// class.
#[must_use]
pub fn build_classes(monomials: &[Monomial]) -> CanonicClasses {
    let n = monomials.len();
    let mut ids: FxHashMap<CanonicKey, usize> = FxHashMap::default();
    let mut class_of = Array2::zeros((n, n));
    let mut representative = Vec::new();

    for i in 0..n {
        for j in 0..n {
            let key = canonical_key(monomials, i, j);
            let next_id = ids.len();
            let id = *ids.entry(key).or_insert(next_id);
            if id == representative.len() {
                representative.push((i, j));
            }
            class_of[[i, j]] = id;
        }
    }

    CanonicClasses {
        class_of,
        representative,
    }
}
