//! Match configuration.

use crate::board::Layout;
use serde::{Deserialize, Serialize};

/// How the participant list becomes the turn order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOrder {
    /// Players take turns in the order they joined
    #[default]
    JoinOrder,
    /// Participants are shuffled once at initialization
    Random,
}

/// Rules knobs fixed for the lifetime of a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub min_players: usize,
    pub max_players: usize,
    pub turn_order: TurnOrder,
    /// Knights a player must play to earn Largest Army
    pub largest_army_threshold: u32,
    /// Setup placements cost nothing and the second settlement pays out
    pub free_setup_builds: bool,
    /// Force a board layout instead of choosing by player count
    pub layout: Option<Layout>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 6,
            turn_order: TurnOrder::JoinOrder,
            largest_army_threshold: 3,
            free_setup_builds: false,
            layout: None,
        }
    }
}
