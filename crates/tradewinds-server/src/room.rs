//! Game room management.

use thiserror::Error;
use tracing::warn;
use tradewinds_core::{
    apply, GameConfig, GameError, GameEvent, GameState, PlayerAction, Rejection, Snapshot,
};
use uuid::Uuid;

use crate::protocol::{RoomInfo, RoomStatus};
use crate::store::{StateStore, StoreError};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is full")]
    RoomFull,

    #[error("{0} is already in this room")]
    AlreadyMember(String),

    #[error("Player not in room")]
    PlayerNotInRoom,

    #[error("{0} is not playing in this match")]
    PlayerNotInMatch(String),

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Game not started")]
    GameNotStarted,

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Cannot start game: {0}")]
    Game(#[from] GameError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A connected member of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub connection: Uuid,
    pub username: String,
}

/// A named room hosting at most one match. The match state itself lives in
/// the state store under the room's name.
pub struct GameRoom {
    pub name: String,
    pub status: RoomStatus,
    /// Members in join order, which is the default turn order
    pub members: Vec<Member>,
    config: GameConfig,
}

impl GameRoom {
    pub fn new(name: String, config: GameConfig) -> Self {
        Self {
            name,
            status: RoomStatus::Waiting,
            members: Vec::new(),
            config,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn add_member(&mut self, connection: Uuid, username: String) -> Result<(), RoomError> {
        if self.members.iter().any(|m| m.username == username) {
            return Err(RoomError::AlreadyMember(username));
        }
        if self.status == RoomStatus::Waiting && self.members.len() >= self.config.max_players {
            return Err(RoomError::RoomFull);
        }
        self.members.push(Member {
            connection,
            username,
        });
        Ok(())
    }

    /// Remove a member; returns whether the room is now empty
    pub fn remove_member(&mut self, connection: Uuid) -> Result<bool, RoomError> {
        let index = self
            .members
            .iter()
            .position(|m| m.connection == connection)
            .ok_or(RoomError::PlayerNotInRoom)?;
        self.members.remove(index);
        Ok(self.members.is_empty())
    }

    pub fn connections(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.members.iter().map(|m| m.connection)
    }

    /// Initialize a match for the current members and store it.
    pub fn start<R: rand::Rng>(
        &mut self,
        store: &dyn StateStore,
        rng: &mut R,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::GameAlreadyStarted);
        }
        let participants: Vec<String> = self.members.iter().map(|m| m.username.clone()).collect();
        let state = GameState::new(&participants, self.config.clone(), rng)?;
        store.save(&self.name, &state)?;
        self.status = RoomStatus::Playing;
        Ok(())
    }

    /// Load, apply and store one action. Callers hold this room exclusively
    /// for the whole cycle, so actions within a room never interleave.
    pub fn apply_action(
        &mut self,
        store: &dyn StateStore,
        username: &str,
        action: &PlayerAction,
    ) -> Result<Vec<GameEvent>, RoomError> {
        if self.status != RoomStatus::Playing {
            return Err(RoomError::GameNotStarted);
        }
        let state = store.load_existing(&self.name)?;

        let Some(actor) = state.player_index(username) else {
            warn!("{} not found in match in room {}", username, self.name);
            return Err(RoomError::PlayerNotInMatch(username.to_string()));
        };

        let (next, events) = apply(&state, action, actor)?;
        store.save(&self.name, &next)?;
        Ok(events)
    }

    pub fn snapshot(&self, store: &dyn StateStore, username: &str) -> Result<Snapshot, RoomError> {
        if self.status != RoomStatus::Playing {
            return Err(RoomError::GameNotStarted);
        }
        Ok(store.load_existing(&self.name)?.snapshot_for(username))
    }

    pub fn to_info(&self) -> RoomInfo {
        RoomInfo {
            name: self.name.clone(),
            members: self.members.iter().map(|m| m.username.clone()).collect(),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tradewinds_core::{NodeOccupant, Phase};

    fn room_with(names: &[&str]) -> GameRoom {
        let mut room = GameRoom::new("harbor".into(), GameConfig::default());
        for name in names {
            room.add_member(Uuid::new_v4(), name.to_string()).unwrap();
        }
        room
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(21)
    }

    struct DownStore;

    impl StateStore for DownStore {
        fn load(&self, _room: &str) -> Result<Option<GameState>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn save(&self, _room: &str, _state: &GameState) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        fn remove(&self, _room: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_add_remove_members() {
        let mut room = room_with(&["ana", "bo"]);
        assert!(matches!(
            room.add_member(Uuid::new_v4(), "ana".into()),
            Err(RoomError::AlreadyMember(_))
        ));

        let bo = room.members[1].connection;
        assert!(!room.remove_member(bo).unwrap());
        assert_eq!(room.to_info().members, vec!["ana".to_string()]);
        assert!(matches!(
            room.remove_member(bo),
            Err(RoomError::PlayerNotInRoom)
        ));
    }

    #[test]
    fn test_room_full_while_waiting() {
        let mut room = room_with(&["a", "b", "c", "d", "e", "f"]);
        assert!(matches!(
            room.add_member(Uuid::new_v4(), "g".into()),
            Err(RoomError::RoomFull)
        ));
    }

    #[test]
    fn test_start_needs_enough_players() {
        let store = MemoryStore::new();
        let mut room = room_with(&["ana", "bo"]);
        assert!(matches!(
            room.start(&store, &mut rng()),
            Err(RoomError::Game(GameError::NotEnoughPlayers { .. }))
        ));
        assert_eq!(room.status, RoomStatus::Waiting);
    }

    #[test]
    fn test_start_stores_state() {
        let store = MemoryStore::new();
        let mut room = room_with(&["ana", "bo", "cy"]);
        room.start(&store, &mut rng()).unwrap();

        assert_eq!(room.status, RoomStatus::Playing);
        let state = store.load("harbor").unwrap().unwrap();
        assert_eq!(state.player_index("cy"), Some(2));
        assert!(matches!(
            room.start(&store, &mut rng()),
            Err(RoomError::GameAlreadyStarted)
        ));
    }

    #[test]
    fn test_actions_round_trip_through_store() {
        let store = MemoryStore::new();
        let mut room = room_with(&["ana", "bo", "cy"]);
        room.start(&store, &mut rng()).unwrap();

        let events = room
            .apply_action(&store, "ana", &PlayerAction::FinishStep)
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(store.load("harbor").unwrap().unwrap().current_player, 1);

        assert!(matches!(
            room.apply_action(&store, "ana", &PlayerAction::FinishStep),
            Err(RoomError::Rejected(Rejection::NotYourTurn))
        ));
        assert_eq!(store.load("harbor").unwrap().unwrap().current_player, 1);
    }

    #[test]
    fn test_outsider_is_not_in_match() {
        let store = MemoryStore::new();
        let mut room = room_with(&["ana", "bo", "cy"]);
        room.start(&store, &mut rng()).unwrap();
        room.add_member(Uuid::new_v4(), "dee".into()).unwrap();

        assert!(matches!(
            room.apply_action(&store, "dee", &PlayerAction::FinishStep),
            Err(RoomError::PlayerNotInMatch(name)) if name == "dee"
        ));
        assert_eq!(room.snapshot(&store, "dee").unwrap().my_index, None);
        assert_eq!(room.snapshot(&store, "bo").unwrap().my_index, Some(1));
    }

    #[test]
    fn test_default_server_match_gets_through_setup() {
        let game = ServerConfig::from_lookup(|_| None).unwrap().game;
        let store = MemoryStore::new();
        let mut room = GameRoom::new("harbor".into(), game);
        for name in ["ana", "bo", "cy"] {
            room.add_member(Uuid::new_v4(), name.into()).unwrap();
        }
        room.start(&store, &mut rng()).unwrap();

        for _ in 0..6 {
            let state = store.load_existing("harbor").unwrap();
            let seat = state.current_player;
            let username = state.players[seat as usize].username.clone();
            let node = state
                .board
                .topology()
                .nodes()
                .iter()
                .map(|n| n.id)
                .find(|&n| {
                    state.board.node(n) == Some(NodeOccupant::Empty)
                        && state.board.satisfies_distance_rule(n)
                })
                .unwrap();
            let edge = state.board.topology().node(node).unwrap().edges[0];

            for action in [
                PlayerAction::BuildSettlement { node },
                PlayerAction::BuildRoad { edge },
                PlayerAction::FinishStep,
            ] {
                room.apply_action(&store, &username, &action).unwrap();
            }
        }

        let state = store.load_existing("harbor").unwrap();
        assert_eq!(state.phase, Phase::Main);
        for player in &state.players {
            assert_eq!(player.settlements.len(), 2);
            assert_eq!(player.roads.len(), 2);
            assert_eq!(player.score, 2);
        }
        let held: u32 = state.players.iter().map(|p| p.resources.total()).sum();
        assert!(held > 0, "second settlements pay out");
    }

    #[test]
    fn test_action_before_start() {
        let store = MemoryStore::new();
        let mut room = room_with(&["ana", "bo", "cy"]);
        assert!(matches!(
            room.apply_action(&store, "ana", &PlayerAction::FinishStep),
            Err(RoomError::GameNotStarted)
        ));
    }

    #[test]
    fn test_store_failures_propagate() {
        let mut room = room_with(&["ana", "bo", "cy"]);
        assert!(matches!(
            room.start(&DownStore, &mut rng()),
            Err(RoomError::Store(StoreError::Unavailable(_)))
        ));

        room.status = RoomStatus::Playing;
        assert!(matches!(
            room.apply_action(&DownStore, "ana", &PlayerAction::FinishStep),
            Err(RoomError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[test]
    fn test_missing_state_is_reported() {
        let store = MemoryStore::new();
        let mut room = room_with(&["ana", "bo", "cy"]);
        room.status = RoomStatus::Playing;
        assert!(matches!(
            room.snapshot(&store, "ana"),
            Err(RoomError::Store(StoreError::Missing(_)))
        ));
    }
}
