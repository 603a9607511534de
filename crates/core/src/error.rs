use std::fmt;

use thiserror::Error;

use crate::sdp::SdpError;

/// Which sub-problem a solver failure came from.
///
/// An infeasible per-player step may be a recoverable iteration-level
/// issue; an infeasible moment-matrix relaxation is structural. Callers
/// need to tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subproblem {
    /// Per-player measurement re-optimization in the SeeSaw loop.
    Player(usize),
    /// Shared-state re-optimization in the SeeSaw loop.
    State,
    /// The moment-matrix relaxation.
    MomentMatrix,
}

impl fmt::Display for Subproblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player(id) => write!(f, "player {id} step"),
            Self::State => write!(f, "state step"),
            Self::MomentMatrix => write!(f, "moment-matrix relaxation"),
        }
    }
}

/// Errors from the equilibrium engines.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Relaxation level outside the supported range.
    #[error("invalid relaxation level {0} (supported: 1, 2, 3)")]
    InvalidLevel(u8),

    /// Level 2 monomial generation is only implemented for three players.
    #[error("relaxation level 2 requires exactly 3 players, got {0}")]
    LevelPlayerMismatch(usize),

    /// The backend failed while solving one of the sub-problems.
    #[error("{subproblem} failed: {source}")]
    Sdp {
        subproblem: Subproblem,
        #[source]
        source: SdpError,
    },
}

impl SolverError {
    pub(crate) fn sdp(subproblem: Subproblem, source: SdpError) -> Self {
        Self::Sdp { subproblem, source }
    }
}
