//! Measurement-operator storage and random POVM sampling.
//!
//! A POVM family per (player, question type) consists of two PSD outcome
//! operators summing to the identity. `PovmStore` keeps the current family
//! of every player in fixed-size indexed arrays; only the SeeSaw commit
//! step mutates it.

use ndarray::Array2;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::linalg;

/// Current measurement operators of all players.
///
/// Indexed as `(player, question type, answer)`; types and answers are
/// binary. Completeness (`M_0 + M_1 = I` per type) holds by construction
/// for sampled stores and is preserved by SeeSaw commits, whose solved
/// operators satisfy the same equality constraint.
#[derive(Debug, Clone)]
pub struct PovmStore {
    dimension: usize,
    // [player][type][answer]
    ops: Vec<[[Array2<f64>; 2]; 2]>,
}

impl PovmStore {
    /// Initialize every player with an independently sampled random POVM
    /// family per question type.
    pub fn sample<R: Rng>(nb_players: usize, dimension: usize, rng: &mut R) -> Self {
        let ops = (0..nb_players)
            .map(|_| {
                let family = random_povm(dimension, 2, 2, rng);
                [
                    [family[0][0].clone(), family[0][1].clone()],
                    [family[1][0].clone(), family[1][1].clone()],
                ]
            })
            .collect();
        Self { dimension, ops }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn nb_players(&self) -> usize {
        self.ops.len()
    }

    /// Operator of `player` for the given question type and answer.
    #[must_use]
    pub fn operator(&self, player: usize, question_type: u8, answer: u8) -> &Array2<f64> {
        &self.ops[player][question_type as usize][answer as usize]
    }

    /// Replace one operator. Used only by the SeeSaw commit step.
    pub fn set(&mut self, player: usize, question_type: u8, answer: u8, op: Array2<f64>) {
        debug_assert_eq!(op.nrows(), self.dimension);
        self.ops[player][question_type as usize][answer as usize] = op;
    }
}

/// Sample a random POVM family: `nb_inputs` measurements with `nb_outputs`
/// outcomes each, on a `dim`-dimensional system.
///
/// Per input, Gram matrices `G_k = A_k A_kᵀ` with Gaussian `A_k` are
/// normalized by `S^{-1/2} G_k S^{-1/2}` where `S = Σ G_k`, so the outcomes
/// are PSD and sum to the identity. Returns `result[input][output]`.
pub fn random_povm<R: Rng>(
    dim: usize,
    nb_inputs: usize,
    nb_outputs: usize,
    rng: &mut R,
) -> Vec<Vec<Array2<f64>>> {
    (0..nb_inputs)
        .map(|_| {
            let grams: Vec<Array2<f64>> = (0..nb_outputs)
                .map(|_| {
                    let a =
                        Array2::from_shape_fn((dim, dim), |_| rng.sample::<f64, _>(StandardNormal));
                    a.dot(&a.t())
                })
                .collect();

            let mut total: Array2<f64> = Array2::zeros((dim, dim));
            for g in &grams {
                total += g;
            }
            let whitener = linalg::inv_sqrt(&total);

            grams
                .iter()
                .map(|g| whitener.dot(g).dot(&whitener))
                .collect()
        })
        .collect()
}
