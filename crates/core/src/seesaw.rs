//! Alternating local optimization of a quantum strategy.
//!
//! A strategy is a shared state plus per-player measurements. Fixing all
//! but one ingredient makes the expected payout linear in the free one, so
//! each step is a small SDP: re-optimize one player's POVM family against
//! everyone else, or re-optimize the shared state against all current
//! measurements. Alternating these climbs to a local optimum; with the
//! best-response objective the fixed points are quantum Nash equilibria.
//!
//! The loop itself lives with the caller: `sdp_player`/`update` and
//! `sdp_rho`/`update_rho` are one half-step each, and `last_dif` plus the
//! commit distance are the convergence signals.

use ndarray::Array2;
use rand::Rng;

use crate::error::{SolverError, Subproblem};
use crate::game::{Answer, Game, Question};
use crate::linalg;
use crate::povm::PovmStore;
use crate::sdp::{LinearExpr, Relation, SdpError, SdpProblem, SdpSolve, SolveOptions};

/// Payout difference sentinel, larger than any reachable payout change.
const FRESH_DIF: f64 = 10.0;

/// Solved measurement family of one player, pending commit.
///
/// Indexed `[question type][answer]`.
#[derive(Debug, Clone)]
pub struct PlayerStep {
    pub operators: [[Array2<f64>; 2]; 2],
}

/// Alternating-SDP optimizer state for one game.
pub struct SeeSaw<G: Game> {
    game: G,
    nb_players: usize,
    dimension: usize,
    povms: PovmStore,
    rho: Array2<f64>,
    players_payout: Vec<f64>,
    qsw: f64,
    winrate: f64,
    last_dif: f64,
}

impl<G: Game> SeeSaw<G> {
    /// Fresh optimizer: random POVMs, zero state.
    ///
    /// The zero state is fine as long as the first optimized parameter is
    /// `rho` itself.
    pub fn new<R: Rng>(dimension: usize, game: G, rng: &mut R) -> Self {
        let nb_players = game.nb_players();
        let povms = PovmStore::sample(nb_players, dimension, rng);
        let state_dim = dimension.pow(u32::try_from(nb_players).unwrap_or(u32::MAX));
        Self {
            game,
            nb_players,
            dimension,
            povms,
            rho: Array2::zeros((state_dim, state_dim)),
            players_payout: vec![0.0; nb_players],
            qsw: 0.0,
            winrate: 0.0,
            last_dif: FRESH_DIF,
        }
    }

    #[must_use]
    pub fn qsw(&self) -> f64 {
        self.qsw
    }

    #[must_use]
    pub fn winrate(&self) -> f64 {
        self.winrate
    }

    /// Payout change of the most recent player step.
    #[must_use]
    pub fn last_dif(&self) -> f64 {
        self.last_dif
    }

    #[must_use]
    pub fn player_payout(&self, player: usize) -> f64 {
        self.players_payout[player]
    }

    #[must_use]
    pub fn rho(&self) -> &Array2<f64> {
        &self.rho
    }

    #[must_use]
    pub fn povms(&self) -> &PovmStore {
        &self.povms
    }

    /// `P(answer | question)` under the current state and measurements.
    #[must_use]
    pub fn probability(&self, answer: &Answer, question: &Question) -> f64 {
        let joint = self.joint_operator(answer, question, None);
        linalg::trace(&self.rho.dot(&joint))
    }

    /// Cache `player`'s expected payout under the current strategy.
    pub fn current_payout(&mut self, player: usize) {
        let mut payout = 0.0;
        for question in self.game.questions() {
            for answer in self.game.valid_answers(&question) {
                payout += self.game.question_distribution()
                    * self.game.player_payout(&answer, player)
                    * self.probability(&answer, &question);
            }
        }
        self.players_payout[player] = payout;
    }

    /// Kronecker chain of per-player operators; `skip` substitutes the
    /// identity at one player's slot.
    fn joint_operator(
        &self,
        answer: &Answer,
        question: &Question,
        skip: Option<usize>,
    ) -> Array2<f64> {
        let mut joint = if skip == Some(0) {
            linalg::identity(self.dimension)
        } else {
            self.povms.operator(0, question[0], answer[0]).clone()
        };
        for player in 1..self.nb_players {
            joint = if skip == Some(player) {
                linalg::kron(&joint, &linalg::identity(self.dimension))
            } else {
                let factor = self.povms.operator(player, question[player], answer[player]);
                linalg::kron(&joint, factor)
            };
        }
        joint
    }

    /// Coefficient matrix of `P(answer | question)` as a function of
    /// `player`'s operator: the partial trace of `rho` against everyone
    /// else's fixed operators, reduced to `player`'s subsystem.
    fn reduced_coefficient(
        &self,
        answer: &Answer,
        question: &Question,
        player: usize,
    ) -> Array2<f64> {
        let others = self.joint_operator(answer, question, Some(player));
        let reduced = linalg::partial_trace(
            &self.rho.dot(&others),
            player,
            self.nb_players,
            self.dimension,
        );
        // trace(R M) as a Frobenius product.
        reduced.t().to_owned()
    }

    /// Re-optimize `player`'s measurements against the rest of the
    /// strategy.
    ///
    /// `equilibrium` selects the objective: the player's own payout (best
    /// response) or social welfare. Evaluates the welfare, payout and
    /// winrate functionals at the solution, records
    /// `last_dif = |new payout - old payout|` and returns the solved
    /// family for [`update`](Self::update) to commit.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Sdp`] tagged with the player's sub-problem
    /// when the backend fails.
    pub fn sdp_player<B: SdpSolve>(
        &mut self,
        player: usize,
        equilibrium: bool,
        backend: &mut B,
        options: &SolveOptions,
    ) -> Result<PlayerStep, SolverError> {
        let dim = self.dimension;
        let mut problem = SdpProblem::new();

        // vars[type][answer]
        let vars = [
            [problem.add_var(dim, true), problem.add_var(dim, true)],
            [problem.add_var(dim, true), problem.add_var(dim, true)],
        ];
        problem.add_sum_to_identity(&vars[0], dim);
        problem.add_sum_to_identity(&vars[1], dim);

        let mut welfare = LinearExpr::new();
        let mut payout = LinearExpr::new();
        let mut winrate = LinearExpr::new();

        for question in self.game.questions() {
            for answer in self.game.valid_answers(&question) {
                let coeff = self.reduced_coefficient(&answer, &question, player);
                let var = vars[question[player] as usize][answer[player] as usize];
                let dist = self.game.question_distribution();

                welfare.push(var, &coeff * (dist * self.game.answer_payout(&answer)));
                payout.push(var, &coeff * (dist * self.game.player_payout(&answer, player)));
                winrate.push(var, &coeff * dist);
            }
        }

        problem.maximize(if equilibrium {
            payout.clone()
        } else {
            welfare.clone()
        });

        let solution = backend
            .solve(&problem, options)
            .map_err(|e| SolverError::sdp(Subproblem::Player(player), e))?;

        // A backend populating the wrong number of variables broke the
        // `SdpSolve` contract; surface it instead of guessing operators.
        let ops: [Array2<f64>; 4] = match solution.values.try_into() {
            Ok(ops) => ops,
            Err(values) => {
                return Err(SolverError::sdp(
                    Subproblem::Player(player),
                    SdpError::Backend(format!(
                        "backend returned {} values for the four measurement variables",
                        values.len()
                    )),
                ));
            }
        };

        self.qsw = welfare.eval(&ops);
        self.winrate = winrate.eval(&ops);
        let new_payout = payout.eval(&ops);
        self.last_dif = (new_payout - self.players_payout[player]).abs();
        tracing::debug!(
            player,
            payout = new_payout,
            dif = self.last_dif,
            "player step solved"
        );
        self.players_payout[player] = new_payout;

        let [t0a0, t0a1, t1a0, t1a1] = ops;
        Ok(PlayerStep {
            operators: [[t0a0, t0a1], [t1a0, t1a1]],
        })
    }

    /// Commit a solved player step; returns the largest entrywise-norm
    /// change across the four operators.
    pub fn update(&mut self, player: usize, step: PlayerStep) -> f64 {
        let mut dist: f64 = 0.0;
        for (ty, by_answer) in step.operators.into_iter().enumerate() {
            for (answer, op) in by_answer.into_iter().enumerate() {
                let (ty, answer) = (ty as u8, answer as u8);
                let old = self.povms.operator(player, ty, answer);
                dist = dist.max(linalg::norm(&(&op - old)));
                self.povms.set(player, ty, answer, op);
            }
        }
        dist
    }

    /// Re-optimize the shared state against all current measurements.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Sdp`] tagged with the state sub-problem when
    /// the backend fails.
    pub fn sdp_rho<B: SdpSolve>(
        &mut self,
        backend: &mut B,
        options: &SolveOptions,
    ) -> Result<Array2<f64>, SolverError> {
        let state_dim = self.rho.nrows();
        let mut problem = SdpProblem::new();
        let rho = problem.add_var(state_dim, true);

        let mut unit_trace = LinearExpr::new();
        unit_trace.push(rho, linalg::identity(state_dim));
        problem.add_constraint(unit_trace, Relation::Eq, 1.0);

        let mut welfare = LinearExpr::new();
        for question in self.game.questions() {
            for answer in self.game.valid_answers(&question) {
                let joint = self.joint_operator(&answer, &question, None);
                let scale = self.game.question_distribution() * self.game.answer_payout(&answer);
                welfare.push(rho, joint.t().to_owned() * scale);
            }
        }
        problem.maximize(welfare);

        let solution = backend
            .solve(&problem, options)
            .map_err(|e| SolverError::sdp(Subproblem::State, e))?;
        tracing::debug!(welfare = solution.objective, "state step solved");

        match <[Array2<f64>; 1]>::try_from(solution.values) {
            Ok([rho]) => Ok(rho),
            Err(values) => Err(SolverError::sdp(
                Subproblem::State,
                SdpError::Backend(format!(
                    "backend returned {} values for the single state variable",
                    values.len()
                )),
            )),
        }
    }

    /// Commit a solved shared state.
    pub fn update_rho(&mut self, rho: Array2<f64>) {
        self.rho = rho;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ChshGame;
    use crate::sdp::scripted::ScriptedBackend;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use test_macros::timed_test;

    fn fresh_chsh(seed: u64) -> SeeSaw<ChshGame> {
        let mut rng = StdRng::seed_from_u64(seed);
        SeeSaw::new(2, ChshGame::new(), &mut rng)
    }

    /// Deterministic all-answer-0 measurements and the |00..0> state.
    fn deterministic_zero(seesaw: &mut SeeSaw<ChshGame>) {
        let project_zero = array![[1.0, 0.0], [0.0, 0.0]];
        let project_one = array![[0.0, 0.0], [0.0, 1.0]];
        for player in 0..2 {
            for ty in 0..2u8 {
                seesaw.povms.set(player, ty, 0, project_zero.clone());
                seesaw.povms.set(player, ty, 1, project_one.clone());
            }
        }
        let mut rho = Array2::zeros((4, 4));
        rho[[0, 0]] = 1.0;
        seesaw.update_rho(rho);
    }

    #[timed_test]
    fn fresh_state_has_sentinel_dif_and_zero_rho() {
        let seesaw = fresh_chsh(1);
        assert!((seesaw.last_dif() - 10.0).abs() < 1e-15);
        assert!((seesaw.qsw()).abs() < 1e-15);
        assert_eq!(seesaw.rho().nrows(), 4);
        assert!(linalg::norm(seesaw.rho()) < 1e-15);
    }

    #[timed_test]
    fn probability_normalizes_over_answers() {
        let mut seesaw = fresh_chsh(2);
        // Any unit-trace product state works; use |00><00|.
        let mut rho = Array2::zeros((4, 4));
        rho[[0, 0]] = 1.0;
        seesaw.update_rho(rho);

        for question in seesaw.game.questions() {
            let total: f64 = crate::game::all_answers(2)
                .iter()
                .map(|answer| seesaw.probability(answer, &question))
                .sum();
            assert!((total - 1.0).abs() < 1e-9, "got {total}");
        }
    }

    #[timed_test]
    fn deterministic_strategy_scores_classical_value() {
        let mut seesaw = fresh_chsh(3);
        deterministic_zero(&mut seesaw);

        // All-zero answers win CHSH on 3 of 4 questions.
        seesaw.current_payout(0);
        assert!((seesaw.player_payout(0) - 0.75).abs() < 1e-12);
    }

    #[timed_test]
    fn sdp_player_evaluates_functionals_at_scripted_solution() {
        let mut seesaw = fresh_chsh(4);
        deterministic_zero(&mut seesaw);
        seesaw.current_payout(0);

        // Replay the same deterministic family through the backend: the
        // payout must be unchanged, so last_dif hits zero.
        let project_zero = array![[1.0, 0.0], [0.0, 0.0]];
        let project_one = array![[0.0, 0.0], [0.0, 1.0]];
        let mut backend = ScriptedBackend::new();
        backend.push(vec![
            project_zero.clone(),
            project_one.clone(),
            project_zero.clone(),
            project_one.clone(),
        ]);

        let step = seesaw
            .sdp_player(0, true, &mut backend, &SolveOptions::default())
            .unwrap();

        assert!((seesaw.player_payout(0) - 0.75).abs() < 1e-9);
        assert!(seesaw.last_dif() < 1e-9);
        assert!((seesaw.qsw() - 0.75).abs() < 1e-9);
        assert!((seesaw.winrate() - 0.75).abs() < 1e-9);

        // Commit is a no-op move: zero distance.
        let dist = seesaw.update(0, step);
        assert!(dist < 1e-12);
    }

    #[timed_test]
    fn update_reports_operator_movement() {
        let mut seesaw = fresh_chsh(5);
        deterministic_zero(&mut seesaw);

        let swapped = PlayerStep {
            operators: [
                [
                    array![[0.0, 0.0], [0.0, 1.0]],
                    array![[1.0, 0.0], [0.0, 0.0]],
                ],
                [
                    array![[1.0, 0.0], [0.0, 0.0]],
                    array![[0.0, 0.0], [0.0, 1.0]],
                ],
            ],
        };
        let dist = seesaw.update(0, swapped);
        // Flipping both type-0 outcome projectors moves by sqrt(2).
        assert!((dist - std::f64::consts::SQRT_2).abs() < 1e-12);
    }

    #[timed_test]
    fn sdp_rho_builds_unit_trace_problem() {
        let mut seesaw = fresh_chsh(6);
        deterministic_zero(&mut seesaw);

        // Scripted state: maximally mixed.
        let mixed = linalg::identity(4) * 0.25;
        let mut backend = ScriptedBackend::new();
        backend.push(vec![mixed.clone()]);

        let rho = seesaw
            .sdp_rho(&mut backend, &SolveOptions::default())
            .unwrap();
        assert!((linalg::trace(&rho) - 1.0).abs() < 1e-12);
        seesaw.update_rho(rho);

        // Under the mixed state every answer comes up with probability
        // 1/4; two of the four answers win each question.
        seesaw.current_payout(0);
        assert!((seesaw.player_payout(0) - 0.5).abs() < 1e-9);
    }

    #[timed_test]
    fn short_player_solution_breaks_the_backend_contract() {
        let mut seesaw = fresh_chsh(8);
        deterministic_zero(&mut seesaw);

        // Three values scripted for the four measurement variables.
        let project_zero = array![[1.0, 0.0], [0.0, 0.0]];
        let mut backend = ScriptedBackend::new();
        backend.push(vec![
            project_zero.clone(),
            project_zero.clone(),
            project_zero,
        ]);

        let err = seesaw
            .sdp_player(0, true, &mut backend, &SolveOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::Sdp {
                subproblem: Subproblem::Player(0),
                ..
            }
        ));
        assert!(err.to_string().contains("3 values"), "got: {err}");
    }

    #[timed_test]
    fn empty_state_solution_breaks_the_backend_contract() {
        let mut seesaw = fresh_chsh(9);
        deterministic_zero(&mut seesaw);

        let mut backend = ScriptedBackend::new();
        backend.push(Vec::new());

        let err = seesaw
            .sdp_rho(&mut backend, &SolveOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::Sdp {
                subproblem: Subproblem::State,
                ..
            }
        ));
        assert!(err.to_string().contains("0 values"), "got: {err}");
    }

    #[timed_test]
    fn backend_failure_is_tagged_with_subproblem() {
        let mut seesaw = fresh_chsh(7);
        let mut backend = ScriptedBackend::new();

        let err = seesaw
            .sdp_player(1, false, &mut backend, &SolveOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::Sdp {
                subproblem: Subproblem::Player(1),
                ..
            }
        ));

        let err = seesaw
            .sdp_rho(&mut backend, &SolveOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SolverError::Sdp {
                subproblem: Subproblem::State,
                ..
            }
        ));
    }
}
