//! Axial hex coordinates and corner keys.
//!
//! Hexes are addressed by `(row, col)` in axial form on a pointy-top grid:
//! - `col` increases going east
//! - `row` increases going south-east
//!
//! Every corner of the grid is either the north pole of exactly one hex or the
//! south pole of exactly one hex, so `Corner { hex, pole }` is already a unique
//! key. The board topology uses these keys once, while it is being built, and
//! addresses everything by index afterwards.

use serde::{Deserialize, Serialize};

/// Which pole of a hex a corner sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pole {
    North,
    South,
}

/// The six neighbour directions of a pointy-top hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    NorthEast,
    East,
    SouthEast,
    SouthWest,
    West,
    NorthWest,
}

impl Direction {
    /// All directions, clockwise from north-east
    pub const ALL: [Direction; 6] = [
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];
}

/// Axial coordinate of a hex tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct HexCoord {
    pub row: i32,
    pub col: i32,
}

impl HexCoord {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Neighbouring hex in a given direction
    pub fn neighbor(&self, direction: Direction) -> HexCoord {
        match direction {
            Direction::East => HexCoord::new(self.row, self.col + 1),
            Direction::NorthEast => HexCoord::new(self.row - 1, self.col + 1),
            Direction::NorthWest => HexCoord::new(self.row - 1, self.col),
            Direction::West => HexCoord::new(self.row, self.col - 1),
            Direction::SouthWest => HexCoord::new(self.row + 1, self.col - 1),
            Direction::SouthEast => HexCoord::new(self.row + 1, self.col),
        }
    }

    /// All six neighbours, clockwise from north-east
    pub fn neighbors(&self) -> [HexCoord; 6] {
        Direction::ALL.map(|d| self.neighbor(d))
    }

    /// The six corners of this hex, clockwise from the top.
    ///
    /// Consecutive corners (wrapping around) are joined by the hex's edges.
    pub fn corners(&self) -> [Corner; 6] {
        [
            Corner::new(*self, Pole::North),
            Corner::new(self.neighbor(Direction::NorthEast), Pole::South),
            Corner::new(self.neighbor(Direction::SouthEast), Pole::North),
            Corner::new(*self, Pole::South),
            Corner::new(self.neighbor(Direction::SouthWest), Pole::North),
            Corner::new(self.neighbor(Direction::NorthWest), Pole::South),
        ]
    }
}

/// Unique key of a grid corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Corner {
    pub hex: HexCoord,
    pub pole: Pole,
}

impl Corner {
    pub const fn new(hex: HexCoord, pole: Pole) -> Self {
        Self { hex, pole }
    }
}
