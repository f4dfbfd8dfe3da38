//! Junction logic for the traffic simulation
//!
//! A junction owns one approach lane per side, the signal controller gating
//! them, and the exit flags consulted by the router.

use std::fmt;

use super::config::SimConfig;
use super::error::SimError;
use super::geometry::{GeometryProvider, JunctionBox};
use super::lane::{Lane, LaneState};
use super::signal::{PhaseChange, SignalController, SignalSnapshot, SignalTimings};
use super::types::{DirMap, Direction, JunctionId, Position};

/// Published whenever an exit flag changes. Junctions linked as mirrors
/// receive it through [`Junction::apply_exit_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitToggled {
    pub junction: JunctionId,
    pub direction: Direction,
    pub enabled: bool,
}

/// The two points a departing vehicle passes on its way out of the box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Departure {
    /// On the inner box edge
    pub start: Position,
    /// On the outer cell edge, shared with the neighbour's approach entry
    pub end: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JunctionState {
    pub id: JunctionId,
    pub position: Position,
    pub signal: SignalSnapshot,
    pub lanes: Vec<LaneState>,
    pub exits: DirMap<bool>,
    pub total_queued: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JunctionMetrics {
    pub total_vehicles: usize,
    pub total_capacity: usize,
    pub average_occupancy: f64,
    pub utilization: f64,
}

pub struct Junction {
    id: JunctionId,
    layout: JunctionBox,
    lanes: DirMap<Lane>,
    departures: DirMap<Departure>,
    signal: SignalController,
    exits: DirMap<bool>,
}

impl fmt::Debug for Junction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Junction")
            .field("id", &self.id)
            .field("signal", &self.signal)
            .field("exits", &self.exits)
            .finish_non_exhaustive()
    }
}

impl Junction {
    /// Build the junction at `id`, derive its lane geometry and start its
    /// signal.
    pub fn new(
        id: JunctionId,
        config: &SimConfig,
        geometry: &dyn GeometryProvider,
    ) -> Result<Self, SimError> {
        let layout = geometry.junction_box(id);
        let offset = config.lane_offset();
        if offset <= 0.0 {
            return Err(SimError::Configuration {
                field: "road_thickness",
                value: config.road_thickness as f64,
            });
        }

        let lanes = DirMap::try_from_fn(|side| {
            let heading = side.opposite();
            let entry = layout
                .outer
                .edge_point(layout.center, side)
                .right_of(heading, offset);

            // Pull the stop point back from the box edge by the stop line
            let edge = layout.inner.edge_point(layout.center, side);
            let (hx, hy) = heading.unit();
            let stop = Position::new(
                edge.x - hx * config.stopline_thickness,
                edge.y - hy * config.stopline_thickness,
            )
            .right_of(heading, offset);

            Lane::new(side, entry, stop, config.lane_capacity)
        })?;

        let departures = DirMap::from_fn(|side| Departure {
            start: layout
                .inner
                .edge_point(layout.center, side)
                .right_of(side, offset),
            end: layout
                .outer
                .edge_point(layout.center, side)
                .right_of(side, offset),
        });

        let mut signal = SignalController::new(SignalTimings::from_config(config)?);
        signal.start();

        Ok(Self {
            id,
            layout,
            lanes,
            departures,
            signal,
            exits: DirMap::from_fn(|_| true),
        })
    }

    pub fn id(&self) -> JunctionId {
        self.id
    }

    pub fn center(&self) -> Position {
        self.layout.center
    }

    pub fn layout(&self) -> &JunctionBox {
        &self.layout
    }

    /// Approach lane for traffic arriving from `side`
    pub fn lane(&self, side: Direction) -> &Lane {
        &self.lanes[side]
    }

    pub fn lane_mut(&mut self, side: Direction) -> &mut Lane {
        &mut self.lanes[side]
    }

    pub fn lanes(&self) -> impl Iterator<Item = (Direction, &Lane)> {
        self.lanes.iter()
    }

    pub fn departure(&self, side: Direction) -> Departure {
        self.departures[side]
    }

    /// Canonical point where traffic leaves through `side`
    pub fn exit_point(&self, side: Direction) -> Position {
        self.departures[side].end
    }

    pub fn signal(&self) -> &SignalController {
        &self.signal
    }

    pub fn signal_mut(&mut self) -> &mut SignalController {
        &mut self.signal
    }

    /// Whether the lane approaching from `side` may cross now
    pub fn is_green_for(&self, side: Direction) -> bool {
        self.signal.is_green(self.lanes[side].axis())
    }

    /// Forward phase changes to a renderer
    pub fn subscribe_phase_changes(
        &mut self,
        mut callback: Box<dyn FnMut(JunctionId, &PhaseChange)>,
    ) {
        let id = self.id;
        self.signal
            .subscribe(Box::new(move |change: &PhaseChange| callback(id, change)));
    }

    pub fn is_exit_enabled(&self, side: Direction) -> bool {
        self.exits[side]
    }

    pub fn exits(&self) -> DirMap<bool> {
        self.exits
    }

    /// Toggle an exit. Returns the event to publish when the flag changed.
    pub fn set_exit_enabled(&mut self, side: Direction, enabled: bool) -> Option<ExitToggled> {
        if self.exits[side] == enabled {
            return None;
        }
        self.exits[side] = enabled;
        Some(ExitToggled {
            junction: self.id,
            direction: side,
            enabled,
        })
    }

    /// Mirror an exit change published by another junction. Mirrored changes
    /// are not republished.
    pub fn apply_exit_event(&mut self, event: &ExitToggled) -> bool {
        if event.junction == self.id || self.exits[event.direction] == event.enabled {
            return false;
        }
        self.exits[event.direction] = event.enabled;
        true
    }

    pub fn total_queued(&self) -> usize {
        self.lanes.values().map(Lane::queue_length).sum()
    }

    pub fn state(&self, current_time: f64) -> JunctionState {
        JunctionState {
            id: self.id,
            position: self.layout.center,
            signal: self.signal.snapshot(),
            lanes: self.lanes.values().map(|lane| lane.state(current_time)).collect(),
            exits: self.exits,
            total_queued: self.total_queued(),
        }
    }

    pub fn metrics(&self) -> JunctionMetrics {
        let total_vehicles = self.total_queued();
        let total_capacity: usize = self.lanes.values().map(Lane::capacity).sum();
        let average_occupancy =
            self.lanes.values().map(Lane::occupancy_rate).sum::<f64>() / 4.0;

        JunctionMetrics {
            total_vehicles,
            total_capacity,
            average_occupancy,
            utilization: total_vehicles as f64 / total_capacity as f64,
        }
    }
}
