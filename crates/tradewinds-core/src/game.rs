//! Game state model and initialization.
//!
//! This module contains the `GameState` record, the turn phase, the error
//! types of the engine, and the snapshot handed to late joiners.

use crate::actions::{TradeId, TradeOffer};
use crate::board::{Board, Layout, NodeId, PlayerId};
use crate::config::{GameConfig, TurnOrder};
use crate::player::{DevelopmentCard, PlayerState, ResourceHand};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Turn phase. The round number is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Round 1: setup placements in forward order
    Setup1,
    /// Round 2: setup placements in reverse order
    Setup2,
    /// Round 3: regular play, forward order
    Main,
}

impl Phase {
    pub fn round(self) -> u8 {
        match self {
            Phase::Setup1 => 1,
            Phase::Setup2 => 2,
            Phase::Main => 3,
        }
    }

    pub fn is_setup(self) -> bool {
        !matches!(self, Phase::Main)
    }
}

/// Errors creating a match
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Need at least {min} players, got {got}")]
    NotEnoughPlayers { min: usize, got: usize },

    #[error("At most {max} players supported, got {got}")]
    TooManyPlayers { max: usize, got: usize },

    #[error("Player {0} is listed twice")]
    DuplicatePlayer(String),

    #[error("Number tokens cannot be placed fairly on this layout")]
    UnbalancedLayout,
}

/// Why an action was refused. A refused action changes nothing.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejection {
    #[error("Unknown player")]
    UnknownPlayer,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("No such node")]
    UnknownNode,

    #[error("No such edge")]
    UnknownEdge,

    #[error("No such hex")]
    UnknownHex,

    #[error("Location already occupied")]
    Occupied,

    #[error("Too close to another settlement")]
    TooClose,

    #[error("Not connected to your network")]
    NotConnected,

    #[error("Not your settlement")]
    NotYourSettlement,

    #[error("Cannot afford this")]
    CannotAfford,

    #[error("No pieces remaining")]
    NoPiecesRemaining,

    #[error("Already placed a settlement this turn")]
    SettlementAlreadyPlaced,

    #[error("Place a settlement before its road")]
    SettlementFirst,

    #[error("Already placed a road this turn")]
    RoadAlreadyPlaced,

    #[error("No development cards left in deck")]
    EmptyDeck,

    #[error("No playable copy of that card")]
    NoSuchCard,

    #[error("Already played a development card this turn")]
    CardAlreadyPlayed,

    #[error("The robber is already there")]
    RobberAlreadyThere,

    #[error("The bank cannot cover this")]
    BankExhausted,

    #[error("Invalid trade")]
    InvalidTrade,

    #[error("No such trade offer")]
    NoSuchTrade,

    #[error("That offer is not addressed to you")]
    NotCounterparty,

    #[error("Only the offering player may withdraw")]
    NotOfferer,

    #[error("Dice already rolled this turn")]
    AlreadyRolled,
}

/// Bookkeeping that resets whenever the turn passes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    /// Settlement placed during this setup turn
    pub setup_settlement: Option<NodeId>,
    pub setup_road_placed: bool,
    pub rolled: bool,
    pub development_card_played: bool,
    /// Roads left from a Road Building card
    pub free_roads: u8,
}

/// The complete state of one match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub players: Vec<PlayerState>,
    pub current_player: PlayerId,
    pub phase: Phase,
    /// Turns completed so far; every FinishStep counts
    pub turn: u32,
    pub turn_state: TurnState,
    /// Draw stack; the last element is the top
    pub development_deck: Vec<DevelopmentCard>,
    pub bank: ResourceHand,
    pub trades: Vec<TradeOffer>,
    pub next_trade_id: TradeId,
    /// Set once, the first time anyone reaches the knight threshold
    pub largest_army: Option<PlayerId>,
    pub config: GameConfig,
    dice_seed: u64,
}

impl GameState {
    /// Build a fresh match for the given participants.
    pub fn new<R: Rng>(
        participants: &[String],
        config: GameConfig,
        rng: &mut R,
    ) -> Result<Self, GameError> {
        let count = participants.len();
        let min = config.min_players.max(1);
        if count < min {
            return Err(GameError::NotEnoughPlayers { min, got: count });
        }
        let max = config.max_players.min(PlayerId::MAX as usize);
        if count > max {
            return Err(GameError::TooManyPlayers { max, got: count });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = participants.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(GameError::DuplicatePlayer(dup.clone()));
        }

        let mut order = participants.to_vec();
        if config.turn_order == TurnOrder::Random {
            order.shuffle(rng);
        }

        let layout = config.layout.unwrap_or_else(|| Layout::for_players(count));
        let board = Board::generate(layout, rng)?;

        let mut development_deck = layout.development_deck();
        development_deck.shuffle(rng);

        let players = order
            .into_iter()
            .enumerate()
            .map(|(i, name)| PlayerState::new(i as PlayerId, name))
            .collect();

        Ok(Self {
            board,
            players,
            current_player: 0,
            phase: Phase::Setup1,
            turn: 0,
            turn_state: TurnState::default(),
            development_deck,
            bank: ResourceHand::uniform(layout.bank_size()),
            trades: Vec::new(),
            next_trade_id: 1,
            largest_army: None,
            config,
            dice_seed: rng.gen(),
        })
    }

    pub fn round(&self) -> u8 {
        self.phase.round()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(id as usize)
    }

    /// Resolve a username to its seat
    pub fn player_index(&self, username: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.username == username)
            .map(|p| p.id)
    }

    pub fn trade(&self, id: TradeId) -> Option<&TradeOffer> {
        self.trades.iter().find(|t| t.id == id)
    }

    pub(crate) fn dice_seed(&self) -> u64 {
        self.dice_seed
    }

    /// First player, in turn order, whose total points reach `target`
    pub fn leader(&self, target: u32) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|p| p.score + p.hidden_points() >= target)
            .map(|p| p.id)
    }

    /// State for a (re)joining client, tagged with that client's seat.
    ///
    /// Hidden information is reduced to counts: the deck order, the dice seed
    /// and every other player's development cards are stripped.
    pub fn snapshot_for(&self, username: &str) -> Snapshot {
        let my_index = self.player_index(username);
        let mut state = self.clone();
        state.dice_seed = 0;
        state.development_deck.clear();
        for player in &mut state.players {
            if Some(player.id) != my_index {
                player.development_cards.clear();
            }
        }
        Snapshot {
            my_index,
            deck_size: self.development_deck.len(),
            card_counts: self
                .players
                .iter()
                .map(|p| p.development_cards.len())
                .collect(),
            state,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a stored state, refusing one whose shape does not fit its board.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let state: Self = serde_json::from_str(json)?;
        state
            .check_shape()
            .map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(state)
    }

    fn check_shape(&self) -> Result<(), &'static str> {
        self.board.check_shape()?;
        if self.players.iter().enumerate().any(|(i, p)| p.id as usize != i) {
            return Err("player ids do not match their seats");
        }
        if self.current_player as usize >= self.players.len() {
            return Err("current player has no seat");
        }
        Ok(())
    }
}

/// What a late joiner receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub my_index: Option<PlayerId>,
    /// Cards left in the development deck
    pub deck_size: usize,
    /// Development cards held, per seat. Only the requester's own cards are
    /// listed in `state`.
    pub card_counts: Vec<usize>,
    pub state: GameState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::{HeldCard, StructurePools};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn new_game(list: &[&str]) -> Result<GameState, GameError> {
        GameState::new(&names(list), GameConfig::default(), &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn test_new_game_starts_in_setup() {
        let game = new_game(&["a", "b", "c"]).unwrap();
        assert_eq!(game.phase, Phase::Setup1);
        assert_eq!(game.round(), 1);
        assert_eq!(game.current_player, 0);
        assert_eq!(game.turn, 0);
    }

    #[test]
    fn test_players_start_empty_with_full_pools() {
        let game = new_game(&["a", "b", "c", "d"]).unwrap();
        for (i, player) in game.players.iter().enumerate() {
            assert_eq!(player.id as usize, i);
            assert!(player.resources.is_empty());
            assert_eq!(player.pools, StructurePools::full());
            assert!(player.settlements.is_empty() && player.roads.is_empty());
            assert_eq!(player.score, 0);
        }
    }

    #[test]
    fn test_join_order_is_kept() {
        let game = new_game(&["c", "a", "b"]).unwrap();
        let order: Vec<&str> = game.players.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_random_order_is_a_permutation() {
        let config = GameConfig {
            turn_order: TurnOrder::Random,
            ..GameConfig::default()
        };
        let list = names(&["a", "b", "c", "d", "e"]);
        let game = GameState::new(&list, config, &mut StdRng::seed_from_u64(9)).unwrap();
        let mut order: Vec<String> = game.players.iter().map(|p| p.username.clone()).collect();
        order.sort();
        assert_eq!(order, list);
    }

    #[test]
    fn test_player_count_limits() {
        assert_eq!(
            new_game(&["a", "b"]).unwrap_err(),
            GameError::NotEnoughPlayers { min: 3, got: 2 }
        );
        assert_eq!(
            new_game(&["a", "b", "c", "d", "e", "f", "g"]).unwrap_err(),
            GameError::TooManyPlayers { max: 6, got: 7 }
        );
        assert_eq!(
            new_game(&["a", "b", "a"]).unwrap_err(),
            GameError::DuplicatePlayer("a".into())
        );
    }

    #[test]
    fn test_layout_follows_player_count() {
        assert_eq!(new_game(&["a", "b", "c"]).unwrap().board.layout(), Layout::Standard);
        let big = new_game(&["a", "b", "c", "d", "e"]).unwrap();
        assert_eq!(big.board.layout(), Layout::Extended);
        assert_eq!(big.development_deck.len(), 34);
        assert_eq!(big.bank, ResourceHand::uniform(24));
    }

    #[test]
    fn test_deck_and_bank() {
        let game = new_game(&["a", "b", "c"]).unwrap();
        assert_eq!(game.development_deck.len(), 25);
        let knights = game
            .development_deck
            .iter()
            .filter(|c| **c == DevelopmentCard::Knight)
            .count();
        assert_eq!(knights, 14);
        assert_eq!(game.bank, ResourceHand::uniform(19));
    }

    #[test]
    fn test_snapshot_resolves_own_index() {
        let game = new_game(&["a", "b", "c"]).unwrap();
        assert_eq!(game.snapshot_for("b").my_index, Some(1));
        assert_eq!(game.snapshot_for("zed").my_index, None);
        assert_eq!(game.snapshot_for("a").state.dice_seed, 0);
    }

    #[test]
    fn test_snapshot_hides_deck_and_other_hands() {
        let mut game = new_game(&["ana", "bo", "cy"]).unwrap();
        game.players[0].development_cards.push(HeldCard {
            card: DevelopmentCard::Monopoly,
            drawn_on_turn: 0,
        });
        game.players[1].development_cards.push(HeldCard {
            card: DevelopmentCard::Knight,
            drawn_on_turn: 0,
        });

        let snap = game.snapshot_for("bo");
        assert!(snap.state.development_deck.is_empty());
        assert_eq!(snap.deck_size, 25);
        assert_eq!(snap.card_counts, vec![1, 1, 0]);
        assert!(snap.state.players[0].development_cards.is_empty());
        assert_eq!(
            snap.state.players[1].development_cards,
            game.players[1].development_cards
        );

        let text = serde_json::to_string(&snap).unwrap();
        assert!(!text.contains("Monopoly"));
        assert!(!text.contains("VictoryPoint"));

        let watcher = game.snapshot_for("zed");
        assert!(watcher.state.players.iter().all(|p| p.development_cards.is_empty()));
    }

    #[test]
    fn test_json_round_trip_keeps_state() {
        let game = new_game(&["a", "b", "c"]).unwrap();
        let restored = GameState::from_json(&game.to_json().unwrap()).unwrap();
        assert_eq!(restored, game);
    }

    #[test]
    fn test_json_with_mismatched_board_is_refused() {
        let game = new_game(&["a", "b", "c"]).unwrap();
        let mut value = serde_json::to_value(&game).unwrap();
        value["board"]["nodes"].as_array_mut().unwrap().pop();
        assert!(GameState::from_json(&value.to_string()).is_err());

        let mut value = serde_json::to_value(&game).unwrap();
        value["current_player"] = 7.into();
        assert!(GameState::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn test_leader_counts_hidden_points() {
        let mut game = new_game(&["a", "b", "c"]).unwrap();
        assert_eq!(game.leader(10), None);
        game.players[2].score = 9;
        game.players[2].development_cards.push(HeldCard {
            card: DevelopmentCard::VictoryPoint,
            drawn_on_turn: 0,
        });
        assert_eq!(game.leader(10), Some(2));
    }
}
