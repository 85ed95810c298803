//! Tradewinds - a hex-board settlement game engine
//!
//! This crate holds the rules of the game as pure functions over an
//! immutable state record:
//! - Hex and corner coordinates, and the static board topology
//! - Board generation with fair number-token placement
//! - Player hands, structure pools and development cards
//! - Action validation, the reducer, and the turn controller
//!
//! # Architecture
//!
//! Nothing here does I/O or logging. A host (see `tradewinds-server`) keeps a
//! `GameState` per match, calls [`apply`] with each incoming action, persists
//! the result and broadcasts the returned events.
//!
//! # Modules
//!
//! - [`hex`]: Axial coordinates and corner keys
//! - [`board`]: Topology, layouts, generation, placement queries
//! - [`player`]: Resources, costs, pools, cards
//! - [`game`]: Match state, phases, errors, snapshots
//! - [`rules`]: Action validation
//! - [`reducer`]: Applying actions
//! - [`turn`]: Turn order

pub mod actions;
pub mod board;
pub mod config;
pub mod game;
pub mod hex;
pub mod player;
pub mod reducer;
pub mod rules;
pub mod turn;

use rand::Rng;

// Re-export commonly used types
pub use actions::{CardPlay, GameEvent, PlayerAction, TradeId, TradeOffer};
pub use board::{
    Board, EdgeId, EdgeOccupant, HexId, Layout, NodeId, NodeOccupant, PlayerId, Resource,
    Terrain, Topology,
};
pub use config::{GameConfig, TurnOrder};
pub use game::{GameError, GameState, Phase, Rejection, Snapshot, TurnState};
pub use hex::{Corner, Direction, HexCoord, Pole};
pub use player::{costs, DevelopmentCard, HeldCard, PlayerState, ResourceHand, SpecialCard};
pub use reducer::apply;
pub use rules::validate;
pub use turn::advance_turn;

/// Start a match for the given participants.
pub fn initialize<R: Rng>(
    participants: &[String],
    config: GameConfig,
    rng: &mut R,
) -> Result<GameState, GameError> {
    GameState::new(participants, config, rng)
}
