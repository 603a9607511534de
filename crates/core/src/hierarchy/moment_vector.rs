//! Probability functionals over the first row of the moment matrix.
//!
//! `P(a|q)` is linear in the moments: each player contributes its answer-0
//! projector for the asked question type, and an answer-1 projector is
//! `I - P`, so the probability expands by inclusion-exclusion into a signed
//! combination of monomial expectations. The encoder turns an
//! (answer, question) pair into the coefficient vector of that combination
//! against the monomial list.

use rustc_hash::FxHashMap;

use super::canonic::Monomial;

/// Encoder from (answer, question) pairs to moment-vector coefficients.
///
/// Expansion terms whose monomial falls outside the list are dropped; a
/// nonzero drop count means the relaxation level is too low to express the
/// requested functional exactly, so drops are counted and logged rather
/// than silently ignored.
#[derive(Debug)]
pub struct MomentEncoder {
    nb_players: usize,
    len: usize,
    /// First occurrence of each monomial in the list.
    index: FxHashMap<Monomial, usize>,
    truncated: u64,
}

impl MomentEncoder {
    #[must_use]
    pub fn new(nb_players: usize, monomials: &[Monomial]) -> Self {
        let mut index = FxHashMap::default();
        for (i, monomial) in monomials.iter().enumerate() {
            index.entry(monomial.clone()).or_insert(i);
        }
        Self {
            nb_players,
            len: monomials.len(),
            index,
            truncated: 0,
        }
    }

    /// Coefficient vector of `P(answer | question)` against the monomial
    /// list, to be applied to the first row of the moment matrix.
    pub fn encode(&mut self, answer: &[u8], question: &[u8]) -> Vec<f64> {
        debug_assert_eq!(answer.len(), self.nb_players);
        debug_assert_eq!(question.len(), self.nb_players);

        // Per player: answer-0 projector label for the asked type, with a
        // negative sign standing for "answer 1", i.e. identity minus the
        // projector.
        let operator: Vec<i16> = (0..self.nb_players)
            .map(|p| {
                let p16 = i16::try_from(p).unwrap_or(i16::MAX);
                let label = if question[p] == 1 {
                    2 * (p16 + 1)
                } else {
                    2 * p16 + 1
                };
                if answer[p] == 1 { -label } else { label }
            })
            .collect();

        let mut vec = vec![0.0; self.len];
        self.expand(&operator, 1.0, &mut vec);
        vec
    }

    /// Inclusion-exclusion over the negative slots:
    /// `P(..1..) = P(..I..) - P(..0..)`.
    fn expand(&mut self, operator: &[i16], coef: f64, vec: &mut [f64]) {
        match operator.iter().position(|&label| label < 0) {
            Some(neg) => {
                let mut with_identity = operator.to_vec();
                with_identity[neg] = 0;
                let mut with_projector = operator.to_vec();
                with_projector[neg] = -with_projector[neg];

                self.expand(&with_identity, coef, vec);
                self.expand(&with_projector, -coef, vec);
            }
            None => {
                #[allow(clippy::cast_sign_loss)]
                let monomial: Monomial = operator.iter().map(|&label| label as u8).collect();
                if let Some(&i) = self.index.get(&monomial) {
                    vec[i] = coef;
                } else {
                    self.truncated += 1;
                    tracing::warn!(?monomial, coef, "moment term outside monomial list, dropped");
                }
            }
        }
    }

    /// Number of expansion terms dropped so far because their monomial was
    /// not in the list.
    #[must_use]
    pub fn truncated_terms(&self) -> u64 {
        self.truncated
    }
}
