use super::{Answer, Game, Question, all_answers};

/// The CHSH game: two players, uniform binary questions, answers accepted
/// when `a0 ⊕ a1 = q0 · q1`.
///
/// The classical value is 0.75 and the quantum value is
/// `(2 + √2) / 4 ≈ 0.8536`, which makes the game a convenient reference
/// point for both engines. In the common-interest form every player earns 1
/// on a win; the conflicting-interest form pays the player answering 0 more
/// than the player answering 1, so the Nash constraints bite.
#[derive(Debug, Clone)]
pub struct ChshGame {
    conflicting: bool,
}

impl ChshGame {
    /// Common-interest CHSH: every player earns 1 on a win.
    #[must_use]
    pub const fn new() -> Self {
        Self { conflicting: false }
    }

    /// Conflicting-interest CHSH: on a win, a player answering 0 earns 1.5
    /// and a player answering 1 earns 0.5.
    #[must_use]
    pub const fn conflicting() -> Self {
        Self { conflicting: true }
    }

    fn wins(answer: &Answer, question: &Question) -> bool {
        (answer[0] ^ answer[1]) == (question[0] & question[1])
    }

    fn win_payout(&self, answer: &Answer, player: usize) -> f64 {
        if !self.conflicting {
            return 1.0;
        }
        if answer[player] == 0 { 1.5 } else { 0.5 }
    }
}

impl Default for ChshGame {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for ChshGame {
    fn nb_players(&self) -> usize {
        2
    }

    fn question_distribution(&self) -> f64 {
        0.25
    }

    fn questions(&self) -> Vec<Question> {
        // Questions range over the same bitstrings as answers.
        all_answers(2)
    }

    fn valid_answers(&self, question: &Question) -> Vec<Answer> {
        all_answers(2)
            .into_iter()
            .filter(|a| Self::wins(a, question))
            .collect()
    }

    fn wrong_answers(&self, question: &Question) -> Vec<Answer> {
        all_answers(2)
            .into_iter()
            .filter(|a| !Self::wins(a, question))
            .collect()
    }

    fn involved_players(&self, _question: &Question) -> Vec<usize> {
        vec![0, 1]
    }

    fn player_payout(&self, answer: &Answer, player: usize) -> f64 {
        self.win_payout(answer, player)
    }

    fn player_payout_win(&self, answer: &Answer, player: usize) -> f64 {
        self.win_payout(answer, player)
    }

    fn not_player_payout_win(&self, answer: &Answer, player: usize) -> f64 {
        // The defector answered the opposite of its listed bit.
        if !self.conflicting {
            return 1.0;
        }
        if answer[player] == 1 { 1.5 } else { 0.5 }
    }

    fn answer_payout(&self, answer: &Answer) -> f64 {
        self.answer_payout_win(answer)
    }

    fn answer_payout_win(&self, answer: &Answer) -> f64 {
        (self.win_payout(answer, 0) + self.win_payout(answer, 1)) / 2.0
    }
}
