use super::{Answer, Game, Question, all_answers};

/// The three-player GHZ (parity) game.
///
/// Questions are restricted to the promise set `{000, 011, 101, 110}`,
/// drawn uniformly. Answers are accepted when the parity of the answer
/// bits equals the OR of the question bits: `a0 ⊕ a1 ⊕ a2 = q0 ∨ q1 ∨ q2`.
/// Classically the game is won with probability at most 0.75; a GHZ state
/// wins it with certainty. Every player earns 1 on a win.
#[derive(Debug, Clone, Default)]
pub struct GhzGame;

impl GhzGame {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn wins(answer: &Answer, question: &Question) -> bool {
        let parity = answer[0] ^ answer[1] ^ answer[2];
        let any_one = question[0] | question[1] | question[2];
        parity == any_one
    }
}

impl Game for GhzGame {
    fn nb_players(&self) -> usize {
        3
    }

    fn question_distribution(&self) -> f64 {
        0.25
    }

    fn questions(&self) -> Vec<Question> {
        [[0, 0, 0], [0, 1, 1], [1, 0, 1], [1, 1, 0]]
            .into_iter()
            .map(|q| q.into_iter().collect())
            .collect()
    }

    fn valid_answers(&self, question: &Question) -> Vec<Answer> {
        all_answers(3)
            .into_iter()
            .filter(|a| Self::wins(a, question))
            .collect()
    }

    fn wrong_answers(&self, question: &Question) -> Vec<Answer> {
        all_answers(3)
            .into_iter()
            .filter(|a| !Self::wins(a, question))
            .collect()
    }

    fn involved_players(&self, _question: &Question) -> Vec<usize> {
        vec![0, 1, 2]
    }

    fn player_payout(&self, _answer: &Answer, _player: usize) -> f64 {
        1.0
    }

    fn player_payout_win(&self, _answer: &Answer, _player: usize) -> f64 {
        1.0
    }

    fn not_player_payout_win(&self, _answer: &Answer, _player: usize) -> f64 {
        1.0
    }

    fn answer_payout(&self, _answer: &Answer) -> f64 {
        1.0
    }

    fn answer_payout_win(&self, _answer: &Answer) -> f64 {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    #[timed_test]
    fn promise_set_has_four_questions() {
        let game = GhzGame::new();
        let questions = game.questions();
        assert_eq!(questions.len(), 4);
        for q in &questions {
            // Promise: an even number of question bits are set.
            assert_eq!((q[0] + q[1] + q[2]) % 2, 0);
        }
    }

    #[timed_test]
    fn half_of_all_answers_win_each_question() {
        let game = GhzGame::new();
        for question in game.questions() {
            assert_eq!(game.valid_answers(&question).len(), 4);
            assert_eq!(game.wrong_answers(&question).len(), 4);
        }
    }

    #[timed_test]
    fn parity_rule_on_all_zero_question() {
        let game = GhzGame::new();
        let q000: Question = [0, 0, 0].into_iter().collect();
        let a000: Answer = [0, 0, 0].into_iter().collect();
        let a110: Answer = [1, 1, 0].into_iter().collect();
        let a100: Answer = [1, 0, 0].into_iter().collect();
        let valid = game.valid_answers(&q000);
        assert!(valid.contains(&a000));
        assert!(valid.contains(&a110));
        assert!(!valid.contains(&a100));
    }
}
