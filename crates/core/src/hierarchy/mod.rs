//! Moment-matrix relaxation of the quantum social-welfare problem.
//!
//! Builds an NPA-style hierarchy: a PSD moment matrix indexed by operator
//! monomials, entries identified through their canonical algebraic form,
//! social welfare as a linear functional over the first row, and optional
//! no-deviation constraints that restrict the feasible set to (approximate)
//! quantum Nash equilibria. Solving the relaxation upper-bounds the welfare
//! any equilibrium strategy can reach.

mod canonic;
mod moment_vector;

pub use canonic::{CanonicClasses, CanonicKey, Monomial, build_classes, canonical_key};
pub use moment_vector::MomentEncoder;

use std::fmt;

use ndarray::Array2;

use crate::error::{SolverError, Subproblem};
use crate::game::Game;
use crate::sdp::{LinearExpr, Relation, SdpProblem, SdpSolve, SolveOptions, entry_selector};

/// Moment-matrix relaxation of one game at a fixed level.
pub struct MomentHierarchy<G: Game> {
    game: G,
    level: u8,
    monomials: Vec<Monomial>,
    classes: CanonicClasses,
    encoder: MomentEncoder,
    /// Social-welfare coefficients against the first row of the matrix.
    objective: Vec<f64>,
    /// No-deviation functionals, each constrained `>= 0`.
    nash_constraints: Vec<Vec<f64>>,
    last_solution: Option<Array2<f64>>,
}

impl<G: Game> fmt::Debug for MomentHierarchy<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MomentHierarchy")
            .field("level", &self.level)
            .field("nb_monomials", &self.monomials.len())
            .field("nb_classes", &self.classes.nb_classes())
            .field("nb_nash_constraints", &self.nash_constraints.len())
            .finish_non_exhaustive()
    }
}

impl<G: Game> MomentHierarchy<G> {
    /// Build the relaxation for `game` at the given level.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::InvalidLevel`] for levels outside 1..=3 and
    /// [`SolverError::LevelPlayerMismatch`] for level 2 with a player count
    /// other than 3.
    pub fn new(game: G, level: u8) -> Result<Self, SolverError> {
        let monomials = generate_monomials(&game, level)?;
        let classes = build_classes(&monomials);
        let mut encoder = MomentEncoder::new(game.nb_players(), &monomials);

        tracing::debug!(
            level,
            nb_monomials = monomials.len(),
            nb_classes = classes.nb_classes(),
            "moment matrix assembled"
        );

        let mut objective = vec![0.0; monomials.len()];
        for question in game.questions() {
            for answer in game.valid_answers(&question) {
                let coef = game.question_distribution() * game.answer_payout_win(&answer);
                accumulate(&mut objective, &encoder.encode(&answer, &question), coef);
            }
        }

        Ok(Self {
            game,
            level,
            monomials,
            classes,
            encoder,
            objective,
            nash_constraints: Vec::new(),
            last_solution: None,
        })
    }

    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    #[must_use]
    pub fn nb_monomials(&self) -> usize {
        self.monomials.len()
    }

    #[must_use]
    pub fn nb_classes(&self) -> usize {
        self.classes.nb_classes()
    }

    /// Social-welfare coefficients over the first row of the matrix.
    #[must_use]
    pub fn objective_row(&self) -> &[f64] {
        &self.objective
    }

    #[must_use]
    pub fn nb_nash_constraints(&self) -> usize {
        self.nash_constraints.len()
    }

    /// Expansion terms dropped because the monomial list could not express
    /// them. Nonzero means the level is too low for some functional.
    #[must_use]
    pub fn truncated_terms(&self) -> u64 {
        self.encoder.truncated_terms()
    }

    /// Moment matrix from the most recent successful solve.
    #[must_use]
    pub fn last_solution(&self) -> Option<&Array2<f64>> {
        self.last_solution.as_ref()
    }

    /// Add the no-deviation constraints: for every player and every
    /// deviation rule "when my question is `ty` and my advice is `flip`,
    /// answer the opposite", the equilibrium payout must be at least the
    /// deviation payout.
    pub fn set_nash_constraints(&mut self) {
        for player in 0..self.game.nb_players() {
            let faithful = self.player_payout_vec(player);

            for ty in 0..2u8 {
                for flip in 0..2u8 {
                    let deviating = self.deviation_payout_vec(player, ty, flip);
                    let mut constraint = faithful.clone();
                    accumulate(&mut constraint, &deviating, -1.0);
                    self.nash_constraints.push(constraint);
                }
            }
        }
    }

    /// Expected payout of `player` under the recommended strategy.
    fn player_payout_vec(&mut self, player: usize) -> Vec<f64> {
        let mut vec = vec![0.0; self.monomials.len()];
        for question in self.game.questions() {
            for answer in self.game.valid_answers(&question) {
                let coef =
                    self.game.question_distribution() * self.game.player_payout_win(&answer, player);
                accumulate(&mut vec, &self.encoder.encode(&answer, &question), coef);
            }
        }
        vec
    }

    /// Expected payout of `player` when deviating: on question type `ty`
    /// with advice `flip`, it answers the opposite bit.
    ///
    /// Advice profiles untouched by the rule keep the faithful payout.
    /// Where the rule fires, an uninvolved player still scores on the
    /// same accepted set, while an involved player scores on the advice
    /// profiles its flipped answer turns from rejected into accepted.
    fn deviation_payout_vec(&mut self, player: usize, ty: u8, flip: u8) -> Vec<f64> {
        let mut vec = vec![0.0; self.monomials.len()];
        for question in self.game.questions() {
            let untouched = |answer: &crate::game::Answer| {
                question[player] != ty || answer[player] != flip
            };
            let involved = self.game.involved_players(&question).contains(&player);

            for answer in self.game.valid_answers(&question) {
                if untouched(&answer) {
                    let coef = self.game.question_distribution()
                        * self.game.player_payout_win(&answer, player);
                    accumulate(&mut vec, &self.encoder.encode(&answer, &question), coef);
                }
            }

            let deviated: Vec<_> = if involved {
                self.game.wrong_answers(&question)
            } else {
                self.game.valid_answers(&question)
            }
            .into_iter()
            .filter(|answer| !untouched(answer))
            .collect();

            for answer in deviated {
                let coef = self.game.question_distribution()
                    * self.game.not_player_payout_win(&answer, player);
                accumulate(&mut vec, &self.encoder.encode(&answer, &question), coef);
            }
        }
        vec
    }

    /// Assemble the SDP: one PSD matrix variable, unit normalization,
    /// canonical-class entry identifications, the welfare objective and any
    /// no-deviation constraints.
    #[must_use]
    pub fn to_problem(&self) -> SdpProblem {
        let n = self.monomials.len();
        let mut problem = SdpProblem::new();
        let x = problem.add_var(n, true);

        let mut normalization = LinearExpr::new();
        normalization.push(x, entry_selector(n, 0, 0));
        problem.add_constraint(normalization, Relation::Eq, 1.0);

        // Tie every upper-triangle entry to its class representative.
        for i in 0..n {
            for j in i..n {
                let rep = self.classes.representative[self.classes.class_of[[i, j]]];
                if (i, j) == rep || (j, i) == rep {
                    continue;
                }
                let mut expr = LinearExpr::new();
                expr.push(x, entry_selector(n, i, j));
                let mut minus = entry_selector(n, rep.0, rep.1);
                minus *= -1.0;
                expr.push(x, minus);
                problem.add_constraint(expr, Relation::Eq, 0.0);
            }
        }

        problem.maximize(row_functional(x, n, &self.objective));

        for coeffs in &self.nash_constraints {
            problem.add_constraint(row_functional(x, n, coeffs), Relation::Ge, 0.0);
        }

        problem
    }

    /// Solve the relaxation, returning the welfare upper bound and keeping
    /// the solved moment matrix.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Sdp`] tagged with the moment-matrix
    /// sub-problem when the backend fails.
    pub fn optimize<B: SdpSolve>(
        &mut self,
        backend: &mut B,
        options: &SolveOptions,
    ) -> Result<f64, SolverError> {
        let problem = self.to_problem();
        let solution = backend
            .solve(&problem, options)
            .map_err(|e| SolverError::sdp(Subproblem::MomentMatrix, e))?;

        tracing::info!(
            objective = solution.objective,
            truncated = self.truncated_terms(),
            "moment-matrix relaxation solved"
        );

        let objective = solution.objective;
        if let Some(x) = solution.values.into_iter().next() {
            self.last_solution = Some(x);
        }
        Ok(objective)
    }
}

/// `sum_j coeffs[j] * X[0][j]` as a linear expression over variable `x`.
fn row_functional(x: usize, n: usize, coeffs: &[f64]) -> LinearExpr {
    let mut matrix: Array2<f64> = Array2::zeros((n, n));
    for (j, &c) in coeffs.iter().enumerate() {
        if c != 0.0 {
            matrix += &(entry_selector(n, 0, j) * c);
        }
    }
    let mut expr = LinearExpr::new();
    expr.push(x, matrix);
    expr
}

fn accumulate(into: &mut [f64], from: &[f64], scale: f64) {
    for (t, v) in into.iter_mut().zip(from) {
        *t += scale * v;
    }
}

/// Operator labels of one player: identity plus the answer-0 projectors of
/// its two question types.
fn player_labels(player: usize) -> [u8; 3] {
    let p = u8::try_from(player).unwrap_or(u8::MAX);
    [0, 2 * p + 1, 2 * p + 2]
}

fn generate_monomials<G: Game>(game: &G, level: u8) -> Result<Vec<Monomial>, SolverError> {
    let nb_players = game.nb_players();

    if level == 3 {
        // Full product over all labels in every slot.
        let labels: Vec<u8> = (0..=2 * nb_players)
            .map(|l| u8::try_from(l).unwrap_or(u8::MAX))
            .collect();
        return Ok(cartesian(&vec![labels; nb_players]));
    }

    let per_player: Vec<Vec<u8>> = (0..nb_players)
        .map(|p| player_labels(p).to_vec())
        .collect();
    let mut monomials = cartesian(&per_player);

    match level {
        1 => {}
        2 => {
            // Same-player second-degree words; the trailing slots stay
            // identity, which pins the monomial length to three.
            if nb_players != 3 {
                return Err(SolverError::LevelPlayerMismatch(nb_players));
            }
            for labels in &per_player {
                let sets = vec![labels.clone(), labels.clone(), vec![0]];
                monomials.extend(cartesian(&sets));
            }
        }
        _ => return Err(SolverError::InvalidLevel(level)),
    }

    Ok(monomials)
}

/// Cartesian product of label sets, one slot per set, in row-major order.
fn cartesian(sets: &[Vec<u8>]) -> Vec<Monomial> {
    let mut out: Vec<Monomial> = vec![Vec::new()];
    for set in sets {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                set.iter().map(move |&label| {
                    let mut next = prefix.clone();
                    next.push(label);
                    next
                })
            })
            .collect();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{ChshGame, GhzGame};
    use crate::sdp::scripted::ScriptedBackend;
    use test_macros::timed_test;

    fn consistent_candidate<G: Game>(hierarchy: &MomentHierarchy<G>, value: f64) -> Array2<f64> {
        // All moments equal: consistent with every class identification,
        // with the normalization entry forced to 1.
        let n = hierarchy.nb_monomials();
        let mut x = Array2::from_elem((n, n), value);
        x[[0, 0]] = 1.0;
        // Entries sharing a class with (0, 0) must match it.
        let zero_class = hierarchy.classes.class_of[[0, 0]];
        for i in 0..n {
            for j in 0..n {
                if hierarchy.classes.class_of[[i, j]] == zero_class {
                    x[[i, j]] = 1.0;
                }
            }
        }
        x
    }

    #[timed_test]
    fn level_one_has_three_labels_per_player() {
        let hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        assert_eq!(hierarchy.nb_monomials(), 9);
        assert!(hierarchy.nb_classes() < 81);
    }

    #[timed_test]
    fn debug_output_summarizes_the_relaxation() {
        // `unwrap_err` on construction results formats the Ok side, so the
        // relaxation has to render without requiring `G: Debug`.
        let hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        let rendered = format!("{hierarchy:?}");
        assert!(rendered.contains("MomentHierarchy"), "got: {rendered}");
        assert!(rendered.contains("nb_monomials: 9"), "got: {rendered}");
    }

    #[timed_test]
    fn level_two_requires_three_players() {
        let err = MomentHierarchy::new(ChshGame::new(), 2).unwrap_err();
        assert!(matches!(err, SolverError::LevelPlayerMismatch(2)));
    }

    #[timed_test]
    fn level_two_appends_same_player_pairs() {
        let hierarchy = MomentHierarchy::new(GhzGame::new(), 2).unwrap();
        // 3^3 first-degree monomials plus 3 * 3^2 same-player pairs.
        assert_eq!(hierarchy.nb_monomials(), 27 + 27);
    }

    #[timed_test]
    fn level_three_enumerates_all_label_words() {
        let hierarchy = MomentHierarchy::new(ChshGame::new(), 3).unwrap();
        // Labels 0..=4 in both slots.
        assert_eq!(hierarchy.nb_monomials(), 25);
    }

    #[timed_test]
    fn out_of_range_level_rejected() {
        let err = MomentHierarchy::new(ChshGame::new(), 4).unwrap_err();
        assert!(matches!(err, SolverError::InvalidLevel(4)));
    }

    #[timed_test]
    fn objective_encodes_classical_all_zero_strategy() {
        // With every moment equal to 1 (all players answer 0 with
        // certainty), the welfare functional evaluates to the classical
        // score of that strategy: CHSH wins on 3 of 4 questions.
        let hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        let total: f64 = hierarchy.objective_row().iter().sum();
        assert!((total - 0.75).abs() < 1e-12, "got {total}");
    }

    #[timed_test]
    fn no_truncation_at_level_one() {
        let mut hierarchy = MomentHierarchy::new(GhzGame::new(), 1).unwrap();
        hierarchy.set_nash_constraints();
        assert_eq!(hierarchy.truncated_terms(), 0);
    }

    #[timed_test]
    fn nash_constraints_cover_every_deviation_rule() {
        let mut hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        assert_eq!(hierarchy.nb_nash_constraints(), 0);
        hierarchy.set_nash_constraints();
        // Two question types times two forced answers, per player.
        assert_eq!(hierarchy.nb_nash_constraints(), 8);
    }

    #[timed_test]
    fn problem_accepts_class_consistent_candidate() {
        let hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        let problem = hierarchy.to_problem();
        assert_eq!(problem.vars.len(), 1);
        assert_eq!(problem.vars[0].dim, 9);
        assert!(problem.vars[0].psd);

        let candidate = consistent_candidate(&hierarchy, 1.0);
        assert!(problem.max_violation(&[candidate]) < 1e-12);
    }

    #[timed_test]
    fn problem_rejects_class_inconsistent_candidate() {
        let hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        let problem = hierarchy.to_problem();

        let mut candidate = consistent_candidate(&hierarchy, 1.0);
        // Break one identification: entries (0, 3) and (3, 3) share a
        // canonical class (projector idempotence).
        candidate[[3, 3]] = 0.25;
        assert!(problem.max_violation(&[candidate]) > 0.1);
    }

    #[timed_test]
    fn optimize_reports_backend_objective_and_keeps_solution() {
        let mut hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        let candidate = consistent_candidate(&hierarchy, 1.0);

        let mut backend = ScriptedBackend::new();
        backend.push(vec![candidate.clone()]);

        let value = hierarchy
            .optimize(&mut backend, &SolveOptions::default())
            .unwrap();
        assert!((value - 0.75).abs() < 1e-12, "got {value}");
        assert_eq!(hierarchy.last_solution().unwrap(), &candidate);
    }

    #[timed_test]
    fn optimize_tags_backend_failure() {
        let mut hierarchy = MomentHierarchy::new(ChshGame::new(), 1).unwrap();
        let mut backend = ScriptedBackend::new();

        let err = hierarchy
            .optimize(&mut backend, &SolveOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::Sdp {
                subproblem: Subproblem::MomentMatrix,
                ..
            }
        ));
    }
}
