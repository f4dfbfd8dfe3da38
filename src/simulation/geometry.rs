//! Junction layout boxes
//!
//! Pixel layout belongs to the renderer; the core only needs each junction's
//! bounding boxes, supplied through [`GeometryProvider`].

use super::config::SimConfig;
use super::types::{Direction, JunctionId, Position};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn centered(center: Position, half_extent: f32) -> Self {
        Self {
            left: center.x - half_extent,
            top: center.y - half_extent,
            right: center.x + half_extent,
            bottom: center.y + half_extent,
        }
    }

    /// Point where the road centerline through `center` crosses the edge on
    /// `side`
    pub fn edge_point(&self, center: Position, side: Direction) -> Position {
        match side {
            Direction::North => Position::new(center.x, self.top),
            Direction::South => Position::new(center.x, self.bottom),
            Direction::East => Position::new(self.right, center.y),
            Direction::West => Position::new(self.left, center.y),
        }
    }
}

/// Junction box: `inner` is the square where the crossing roads overlap,
/// `outer` is the cell the junction owns, including half of each road
/// towards its neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionBox {
    pub center: Position,
    pub inner: Rect,
    pub outer: Rect,
}

pub trait GeometryProvider {
    fn junction_box(&self, id: JunctionId) -> JunctionBox;
}

/// Square cells laid out edge to edge, row 0 at the top
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformLayout {
    pub origin: Position,
    pub cell_size: f32,
    pub road_thickness: f32,
}

impl UniformLayout {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            origin: Position::default(),
            cell_size: config.cell_size,
            road_thickness: config.road_thickness,
        }
    }
}

impl GeometryProvider for UniformLayout {
    fn junction_box(&self, id: JunctionId) -> JunctionBox {
        let center = Position::new(
            self.origin.x + (id.col as f32 + 0.5) * self.cell_size,
            self.origin.y + (id.row as f32 + 0.5) * self.cell_size,
        );
        JunctionBox {
            center,
            inner: Rect::centered(center, self.road_thickness / 2.0),
            outer: Rect::centered(center, self.cell_size / 2.0),
        }
    }
}
