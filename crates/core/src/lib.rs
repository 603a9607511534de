#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! Nonlocal Game Solver Core Library
//!
//! Quantum Nash equilibria of multi-player non-local games, via two
//! engines: an alternating see-saw optimization over measurements and a
//! shared state, and an NPA-style moment-matrix relaxation with
//! no-deviation constraints.
//!
//! # Modules
//!
//! - `game` - Game trait and implementations (CHSH, GHZ)
//! - `seesaw` - Alternating-SDP local optimizer
//! - `hierarchy` - Moment-matrix relaxation
//! - `povm` - Measurement storage and random POVM sampling
//! - `sdp` - SDP problem model and backend trait
//! - `linalg` - Small dense symmetric-matrix kernels
//! - `config` - YAML run configuration
//! - `error` - Error types

pub mod config;
pub mod error;
pub mod game;
pub mod hierarchy;
pub mod linalg;
pub mod povm;
pub mod sdp;
pub mod seesaw;

pub use config::SolveConfig;
pub use error::{SolverError, Subproblem};
pub use game::{Answer, ChshGame, Game, GhzGame, Question};
pub use hierarchy::MomentHierarchy;
pub use povm::PovmStore;
pub use sdp::{SdpProblem, SdpSolve, SolveOptions, Solver};
pub use seesaw::SeeSaw;
