//! Board topology and the generated board.
//!
//! This module contains:
//! - Resource and terrain types
//! - Board layouts (standard and extended)
//! - The static topology graph of hexes, nodes and edges, addressed by index
//! - The board instance: generated hexes, node/edge occupants and the robber
//! - Placement and production queries used by the rules and the reducer

use crate::game::GameError;
use crate::hex::{Corner, HexCoord};
use crate::player::{DevelopmentCard, ResourceHand};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Player identifier: the player's index in the turn order
pub type PlayerId = u8;

/// Index of a hex on the board
pub type HexId = u8;

/// Index of a corner node (settlement/city slot)
pub type NodeId = u16;

/// Index of an edge (road slot)
pub type EdgeId = u16;

/// The five tradeable resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Brick,
    Lumber,
    Ore,
    Grain,
    Wool,
}

impl Resource {
    pub const ALL: [Resource; 5] = [
        Resource::Brick,
        Resource::Lumber,
        Resource::Ore,
        Resource::Grain,
        Resource::Wool,
    ];
}

/// What a hex produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    Resource(Resource),
    Desert,
}

/// A generated hex tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hex {
    pub id: HexId,
    pub coord: HexCoord,
    pub terrain: Terrain,
    /// Production number, absent on the desert
    pub token: Option<u8>,
}

impl Hex {
    pub fn resource(&self) -> Option<Resource> {
        match self.terrain {
            Terrain::Resource(r) => Some(r),
            Terrain::Desert => None,
        }
    }
}

/// Shape and contents of the board, chosen by player count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layout {
    /// 19 hexes in rows of 3-4-5-4-3, for 3 or 4 players
    Standard,
    /// 30 hexes in rows of 3-4-5-6-5-4-3, for 5 or 6 players
    Extended,
}

impl Layout {
    pub fn for_players(count: usize) -> Self {
        if count <= 4 {
            Layout::Standard
        } else {
            Layout::Extended
        }
    }

    fn row_lengths(self) -> &'static [i32] {
        match self {
            Layout::Standard => &[3, 4, 5, 4, 3],
            Layout::Extended => &[3, 4, 5, 6, 5, 4, 3],
        }
    }

    /// Hex coordinates in reading order, rows centred on each other
    pub fn coords(self) -> Vec<HexCoord> {
        let rows = self.row_lengths();
        let first_row = -(rows.len() as i32 / 2);
        // Row lengths change by one per row, so (len - 1 + row) keeps its parity
        let parity = (rows[0] - 1 + first_row).rem_euclid(2);

        let mut coords = Vec::new();
        for (i, &len) in rows.iter().enumerate() {
            let row = first_row + i as i32;
            let start = -(len - 1 + row - parity).div_euclid(2);
            coords.extend((start..start + len).map(|col| HexCoord::new(row, col)));
        }
        coords
    }

    /// Terrain deck: exactly one desert
    fn terrain_pool(self) -> Vec<Terrain> {
        let counts: [(Resource, usize); 5] = match self {
            Layout::Standard => [
                (Resource::Lumber, 4),
                (Resource::Grain, 4),
                (Resource::Wool, 4),
                (Resource::Ore, 3),
                (Resource::Brick, 3),
            ],
            Layout::Extended => [
                (Resource::Lumber, 6),
                (Resource::Grain, 6),
                (Resource::Wool, 6),
                (Resource::Ore, 5),
                (Resource::Brick, 6),
            ],
        };
        let mut pool: Vec<Terrain> = counts
            .iter()
            .flat_map(|&(r, n)| std::iter::repeat(Terrain::Resource(r)).take(n))
            .collect();
        pool.push(Terrain::Desert);
        pool
    }

    /// Number tokens, one per producing hex
    fn number_tokens(self) -> Vec<u8> {
        match self {
            Layout::Standard => vec![2, 3, 3, 4, 4, 5, 5, 6, 6, 8, 8, 9, 9, 10, 10, 11, 11, 12],
            Layout::Extended => vec![
                2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 8, 8, 8, 9, 9, 9, 10, 10, 10, 11, 11,
                11, 12, 12,
            ],
        }
    }

    /// Initial bank size per resource
    pub fn bank_size(self) -> u32 {
        match self {
            Layout::Standard => 19,
            Layout::Extended => 24,
        }
    }

    /// Unshuffled development card stack
    pub fn development_deck(self) -> Vec<DevelopmentCard> {
        let (knights, others) = match self {
            Layout::Standard => (14, 2),
            Layout::Extended => (20, 3),
        };
        let mut deck = Vec::new();
        deck.extend(std::iter::repeat(DevelopmentCard::Knight).take(knights));
        deck.extend(std::iter::repeat(DevelopmentCard::VictoryPoint).take(5));
        deck.extend(std::iter::repeat(DevelopmentCard::RoadBuilding).take(others));
        deck.extend(std::iter::repeat(DevelopmentCard::YearOfPlenty).take(others));
        deck.extend(std::iter::repeat(DevelopmentCard::Monopoly).take(others));
        deck
    }
}

/// Static adjacency of one hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexSlot {
    pub coord: HexCoord,
    /// Corners clockwise from the top
    pub nodes: [NodeId; 6],
    pub neighbors: Vec<HexId>,
}

/// Static adjacency of a settlement/city slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Up to three hexes meeting here
    pub hexes: Vec<HexId>,
    /// Up to three edges leaving this node
    pub edges: Vec<EdgeId>,
    /// Nodes one edge away
    pub neighbors: Vec<NodeId>,
}

/// Static adjacency of a road slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub nodes: [NodeId; 2],
    pub hexes: Vec<HexId>,
}

impl Edge {
    /// The endpoint that is not `node`
    pub fn other_end(&self, node: NodeId) -> NodeId {
        if self.nodes[0] == node {
            self.nodes[1]
        } else {
            self.nodes[0]
        }
    }
}

/// The board graph, derived once from hex geometry and shared by every
/// version of a match's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub layout: Layout,
    hexes: Vec<HexSlot>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl Topology {
    pub fn build(layout: Layout) -> Self {
        let coords = layout.coords();
        let hex_ids: HashMap<HexCoord, HexId> = coords
            .iter()
            .enumerate()
            .map(|(i, c)| (*c, i as HexId))
            .collect();

        let mut corner_ids: HashMap<Corner, NodeId> = HashMap::new();
        let mut edge_ids: HashMap<(NodeId, NodeId), EdgeId> = HashMap::new();
        let mut hexes = Vec::with_capacity(coords.len());
        let mut nodes: Vec<Node> = Vec::new();
        let mut edges: Vec<Edge> = Vec::new();

        for (hex_index, coord) in coords.iter().enumerate() {
            let hex_id = hex_index as HexId;

            let corner_nodes = coord.corners().map(|corner| {
                *corner_ids.entry(corner).or_insert_with(|| {
                    let id = nodes.len() as NodeId;
                    nodes.push(Node {
                        id,
                        hexes: Vec::new(),
                        edges: Vec::new(),
                        neighbors: Vec::new(),
                    });
                    id
                })
            });

            for &node in &corner_nodes {
                nodes[node as usize].hexes.push(hex_id);
            }

            for i in 0..6 {
                let a = corner_nodes[i];
                let b = corner_nodes[(i + 1) % 6];
                let key = (a.min(b), a.max(b));
                let edge_id = *edge_ids.entry(key).or_insert_with(|| {
                    let id = edges.len() as EdgeId;
                    edges.push(Edge {
                        id,
                        nodes: [key.0, key.1],
                        hexes: Vec::new(),
                    });
                    nodes[a as usize].edges.push(id);
                    nodes[a as usize].neighbors.push(b);
                    nodes[b as usize].edges.push(id);
                    nodes[b as usize].neighbors.push(a);
                    id
                });
                edges[edge_id as usize].hexes.push(hex_id);
            }

            let neighbors = coord
                .neighbors()
                .iter()
                .filter_map(|n| hex_ids.get(n).copied())
                .collect();

            hexes.push(HexSlot {
                coord: *coord,
                nodes: corner_nodes,
                neighbors,
            });
        }

        Self {
            layout,
            hexes,
            nodes,
            edges,
        }
    }

    pub fn hex_count(&self) -> usize {
        self.hexes.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn hex(&self, id: HexId) -> Option<&HexSlot> {
        self.hexes.get(id as usize)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id as usize)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn hexes_adjacent(&self, a: HexId, b: HexId) -> bool {
        self.hex(a).is_some_and(|h| h.neighbors.contains(&b))
    }
}

/// What occupies a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NodeOccupant {
    #[default]
    Empty,
    Settlement(PlayerId),
    City(PlayerId),
}

impl NodeOccupant {
    pub fn owner(&self) -> Option<PlayerId> {
        match self {
            NodeOccupant::Empty => None,
            NodeOccupant::Settlement(p) | NodeOccupant::City(p) => Some(*p),
        }
    }

    /// Resources produced per matching roll
    pub fn yield_multiplier(&self) -> u32 {
        match self {
            NodeOccupant::Empty => 0,
            NodeOccupant::Settlement(_) => 1,
            NodeOccupant::City(_) => 2,
        }
    }
}

/// What occupies an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EdgeOccupant {
    #[default]
    Empty,
    Road(PlayerId),
}

impl EdgeOccupant {
    pub fn owner(&self) -> Option<PlayerId> {
        match self {
            EdgeOccupant::Empty => None,
            EdgeOccupant::Road(p) => Some(*p),
        }
    }
}

/// The robber marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Robber {
    pub hex: HexId,
}

/// A generated board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    topology: Arc<Topology>,
    hexes: Vec<Hex>,
    nodes: Vec<NodeOccupant>,
    edges: Vec<EdgeOccupant>,
    robber: Robber,
}

impl Board {
    /// Generate a board: shuffle terrain and deal number tokens so that no
    /// two adjacent hexes both carry a 6 or an 8.
    pub fn generate<R: Rng>(layout: Layout, rng: &mut R) -> Result<Self, GameError> {
        let topology = Arc::new(Topology::build(layout));

        let mut terrain = layout.terrain_pool();
        terrain.shuffle(rng);

        let producing: Vec<HexId> = terrain
            .iter()
            .enumerate()
            .filter(|(_, t)| matches!(t, Terrain::Resource(_)))
            .map(|(i, _)| i as HexId)
            .collect();
        let desert = terrain
            .iter()
            .position(|t| *t == Terrain::Desert)
            .ok_or(GameError::UnbalancedLayout)? as HexId;

        let (hot, mut cold): (Vec<u8>, Vec<u8>) = layout
            .number_tokens()
            .into_iter()
            .partition(|&n| n == 6 || n == 8);
        cold.shuffle(rng);

        let hot_hexes = spread_hexes(&topology, &producing, hot.len(), rng)
            .ok_or(GameError::UnbalancedLayout)?;

        let mut tokens: HashMap<HexId, u8> = hot_hexes.iter().copied().zip(hot).collect();
        let cold_hexes: Vec<HexId> = producing
            .iter()
            .copied()
            .filter(|h| !tokens.contains_key(h))
            .collect();
        tokens.extend(cold_hexes.into_iter().zip(cold));

        let hexes = terrain
            .into_iter()
            .enumerate()
            .map(|(i, terrain)| {
                let id = i as HexId;
                Hex {
                    id,
                    coord: topology.hexes[i].coord,
                    terrain,
                    token: tokens.get(&id).copied(),
                }
            })
            .collect();

        Ok(Self {
            nodes: vec![NodeOccupant::Empty; topology.node_count()],
            edges: vec![EdgeOccupant::Empty; topology.edge_count()],
            topology,
            hexes,
            robber: Robber { hex: desert },
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn layout(&self) -> Layout {
        self.topology.layout
    }

    pub fn hexes(&self) -> &[Hex] {
        &self.hexes
    }

    pub fn hex(&self, id: HexId) -> Option<&Hex> {
        self.hexes.get(id as usize)
    }

    pub fn robber(&self) -> Robber {
        self.robber
    }

    /// Occupant of a node; `None` if the node does not exist
    pub fn node(&self, id: NodeId) -> Option<NodeOccupant> {
        self.nodes.get(id as usize).copied()
    }

    /// Occupant of an edge; `None` if the edge does not exist
    pub fn edge(&self, id: EdgeId) -> Option<EdgeOccupant> {
        self.edges.get(id as usize).copied()
    }

    /// Check that a deserialized board fits its own layout. The placement
    /// queries index the occupant lists by topology ids.
    pub(crate) fn check_shape(&self) -> Result<(), &'static str> {
        if *self.topology != Topology::build(self.topology.layout) {
            return Err("board graph does not match its layout");
        }
        if self.hexes.len() != self.topology.hex_count()
            || self.nodes.len() != self.topology.node_count()
            || self.edges.len() != self.topology.edge_count()
        {
            return Err("board occupants do not match the board graph");
        }
        if self.robber.hex as usize >= self.hexes.len() {
            return Err("robber is off the board");
        }
        Ok(())
    }

    // ==================== Placement Queries ====================

    /// No occupied node is one edge away
    pub fn satisfies_distance_rule(&self, node: NodeId) -> bool {
        self.topology.node(node).is_some_and(|n| {
            n.neighbors
                .iter()
                .all(|adj| self.nodes[*adj as usize] == NodeOccupant::Empty)
        })
    }

    /// The node touches one of the player's roads
    pub fn touches_own_road(&self, node: NodeId, player: PlayerId) -> bool {
        self.topology.node(node).is_some_and(|n| {
            n.edges
                .iter()
                .any(|e| self.edges[*e as usize] == EdgeOccupant::Road(player))
        })
    }

    /// The edge extends the player's network: one endpoint is the player's
    /// building, or carries another of the player's roads without an opponent
    /// building in between.
    pub fn extends_network(&self, edge: EdgeId, player: PlayerId) -> bool {
        let Some(e) = self.topology.edge(edge) else {
            return false;
        };
        e.nodes.iter().any(|&endpoint| match self.nodes[endpoint as usize].owner() {
            Some(owner) => owner == player,
            None => self.topology.nodes[endpoint as usize]
                .edges
                .iter()
                .any(|&adj| adj != edge && self.edges[adj as usize] == EdgeOccupant::Road(player)),
        })
    }

    /// Whether the edge has `node` as an endpoint
    pub fn edge_touches(&self, edge: EdgeId, node: NodeId) -> bool {
        self.topology.edge(edge).is_some_and(|e| e.nodes.contains(&node))
    }

    // ==================== Mutation ====================

    pub(crate) fn place_settlement(&mut self, node: NodeId, player: PlayerId) {
        self.nodes[node as usize] = NodeOccupant::Settlement(player);
    }

    pub(crate) fn upgrade_to_city(&mut self, node: NodeId, player: PlayerId) {
        self.nodes[node as usize] = NodeOccupant::City(player);
    }

    pub(crate) fn place_road(&mut self, edge: EdgeId, player: PlayerId) {
        self.edges[edge as usize] = EdgeOccupant::Road(player);
    }

    pub(crate) fn move_robber(&mut self, hex: HexId) {
        self.robber = Robber { hex };
    }

    // ==================== Production ====================

    /// Resources owed to each player for a roll, ignoring bank limits.
    /// The robber's hex produces nothing.
    pub fn production(&self, roll: u8) -> Vec<(PlayerId, ResourceHand)> {
        let mut owed: HashMap<PlayerId, ResourceHand> = HashMap::new();

        for hex in &self.hexes {
            if hex.token != Some(roll) || hex.id == self.robber.hex {
                continue;
            }
            let Some(resource) = hex.resource() else {
                continue;
            };
            for node in self.topology.hexes[hex.id as usize].nodes {
                let occupant = self.nodes[node as usize];
                if let Some(owner) = occupant.owner() {
                    owed.entry(owner)
                        .or_default()
                        .add(resource, occupant.yield_multiplier());
                }
            }
        }

        let mut owed: Vec<_> = owed.into_iter().collect();
        owed.sort_by_key(|(player, _)| *player);
        owed
    }

    /// Resources of the hexes around a node, one per hex
    pub fn resources_around(&self, node: NodeId) -> ResourceHand {
        let mut hand = ResourceHand::new();
        if let Some(n) = self.topology.node(node) {
            for hex in &n.hexes {
                if let Some(resource) = self.hexes[*hex as usize].resource() {
                    hand.add(resource, 1);
                }
            }
        }
        hand
    }
}

/// Pick `count` producing hexes, no two adjacent, by randomized backtracking.
fn spread_hexes<R: Rng>(
    topology: &Topology,
    candidates: &[HexId],
    count: usize,
    rng: &mut R,
) -> Option<Vec<HexId>> {
    fn search(
        topology: &Topology,
        order: &[HexId],
        start: usize,
        count: usize,
        chosen: &mut Vec<HexId>,
    ) -> bool {
        if chosen.len() == count {
            return true;
        }
        for i in start..order.len() {
            let hex = order[i];
            if chosen.iter().any(|&c| topology.hexes_adjacent(c, hex)) {
                continue;
            }
            chosen.push(hex);
            if search(topology, order, i + 1, count, chosen) {
                return true;
            }
            chosen.pop();
        }
        false
    }

    let mut order = candidates.to_vec();
    order.shuffle(rng);
    let mut chosen = Vec::with_capacity(count);
    search(topology, &order, 0, count, &mut chosen).then_some(chosen)
}
