mod chsh;
mod ghz;

use arrayvec::ArrayVec;

pub use chsh::ChshGame;
pub use ghz::GhzGame;

/// Maximum number of players any game may declare.
pub const MAX_PLAYERS: usize = 8;

/// Joint answer: one binary outcome label per player.
pub type Answer = ArrayVec<u8, MAX_PLAYERS>;

/// Joint question: one binary type label per player.
pub type Question = ArrayVec<u8, MAX_PLAYERS>;

/// A multi-player non-local game, seen from the solver's side.
///
/// The referee draws a joint question, each player answers a bit, and the
/// game splits answers into accepted ("valid") and rejected ("wrong") sets
/// with per-player payouts on acceptance. Both engines consume games only
/// through this trait.
pub trait Game {
    fn nb_players(&self) -> usize;

    /// Probability of each joint question (uniform distributions only).
    fn question_distribution(&self) -> f64;

    /// Every joint question the referee may ask.
    fn questions(&self) -> Vec<Question>;

    /// Answers accepted for `question`.
    fn valid_answers(&self, question: &Question) -> Vec<Answer>;

    /// Answers rejected for `question`.
    fn wrong_answers(&self, question: &Question) -> Vec<Answer>;

    /// Players whose answer the referee actually checks for `question`.
    fn involved_players(&self, question: &Question) -> Vec<usize>;

    /// Payout received by `player` when `answer` is the accepted outcome.
    fn player_payout(&self, answer: &Answer, player: usize) -> f64;

    /// Payout of `player` on a win with `answer`.
    fn player_payout_win(&self, answer: &Answer, player: usize) -> f64;

    /// Payout of `player` on a win after defecting: `answer` lists the
    /// advice profile, and the player actually answered the opposite of
    /// its own bit.
    fn not_player_payout_win(&self, answer: &Answer, player: usize) -> f64;

    /// Mean payout over all players when `answer` is accepted.
    fn answer_payout(&self, answer: &Answer) -> f64;

    /// Mean payout over all players on a win with `answer`.
    fn answer_payout_win(&self, answer: &Answer) -> f64;
}

/// All `2^nb_players` joint answers, in lexicographic order.
#[must_use]
pub fn all_answers(nb_players: usize) -> Vec<Answer> {
    let count = 1usize << nb_players;
    (0..count)
        .map(|bits| {
            (0..nb_players)
                .map(|p| u8::from(bits >> (nb_players - 1 - p) & 1 == 1))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_macros::timed_test;

    #[timed_test]
    fn all_answers_enumerates_bitstrings() {
        let answers = all_answers(2);
        assert_eq!(answers.len(), 4);
        assert_eq!(answers[0].as_slice(), &[0, 0]);
        assert_eq!(answers[1].as_slice(), &[0, 1]);
        assert_eq!(answers[2].as_slice(), &[1, 0]);
        assert_eq!(answers[3].as_slice(), &[1, 1]);
    }

    #[timed_test]
    fn all_answers_three_players() {
        let answers = all_answers(3);
        assert_eq!(answers.len(), 8);
        assert_eq!(answers[5].as_slice(), &[1, 0, 1]);
    }
}
