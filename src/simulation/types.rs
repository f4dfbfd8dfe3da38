//! Core types for the traffic simulation
//!
//! Identifiers, directions and the small geometry primitives shared by every
//! other module.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use super::error::SimError;

/// A wrapper type for vehicle IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub usize);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

/// Grid coordinates of a junction, which double as its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JunctionId {
    pub row: usize,
    pub col: usize,
}

impl JunctionId {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The grid cell one step towards `direction`, if it lies inside a
    /// `rows x cols` grid.
    pub fn neighbor(&self, direction: Direction, rows: usize, cols: usize) -> Option<JunctionId> {
        let (dr, dc) = direction.offset();
        let row = self.row.checked_add_signed(dr)?;
        let col = self.col.checked_add_signed(dc)?;
        (row < rows && col < cols).then_some(JunctionId { row, col })
    }

    /// Direction of travel leading from `self` to an adjacent junction
    pub fn direction_to(&self, other: JunctionId) -> Option<Direction> {
        Direction::ALL.into_iter().find(|direction| {
            let (dr, dc) = direction.offset();
            self.row.checked_add_signed(dr) == Some(other.row)
                && self.col.checked_add_signed(dc) == Some(other.col)
        })
    }
}

impl fmt::Display for JunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Travel axis. Both directions of an axis share a green/red state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// East/West traffic
    Horizontal,
    /// North/South traffic
    Vertical,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

/// Compass direction on the grid. Row 0 is the northern edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Fixed visiting order; BFS tie-breaks depend on it.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// (row, col) step
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::North => (-1, 0),
            Direction::South => (1, 0),
            Direction::East => (0, 1),
            Direction::West => (0, -1),
        }
    }

    /// Unit vector in screen coordinates (y grows southwards)
    pub fn unit(self) -> (f32, f32) {
        match self {
            Direction::North => (0.0, -1.0),
            Direction::South => (0.0, 1.0),
            Direction::East => (1.0, 0.0),
            Direction::West => (-1.0, 0.0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::Vertical,
            Direction::East | Direction::West => Axis::Horizontal,
        }
    }

    fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    pub fn token(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Direction {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "N" | "n" => Ok(Direction::North),
            "S" | "s" => Ok(Direction::South),
            "E" | "e" => Ok(Direction::East),
            "W" | "w" => Ok(Direction::West),
            other => Err(SimError::InvalidDirection(other.to_string())),
        }
    }
}

/// One value per direction, always fully populated
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirMap<T>([T; 4]);

impl<T> DirMap<T> {
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        DirMap(Direction::ALL.map(&mut f))
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(Direction) -> Result<T, E>) -> Result<Self, E> {
        let [north, south, east, west] = Direction::ALL;
        Ok(DirMap([f(north)?, f(south)?, f(east)?, f(west)?]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T> Index<Direction> for DirMap<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        &self.0[direction.index()]
    }
}

impl<T> IndexMut<Direction> for DirMap<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.0[direction.index()]
    }
}

/// A 2D position in layout units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Shift by `offset` to the right-hand side of travel towards `heading`
    pub fn right_of(&self, heading: Direction, offset: f32) -> Position {
        let (dx, dy) = heading.unit();
        Position {
            x: self.x - dy * offset,
            y: self.y + dx * offset,
        }
    }
}
