//! Vehicle motion contract
//!
//! A vehicle follows a [`TripPlan`]: one leg per junction on its route plus a
//! final leg out of the grid. Each lane leg ends at the stop point of the
//! lane the vehicle is queued in; the engine decides when it may pass.

use std::collections::BTreeMap;

use super::error::SimError;
use super::junction::Junction;
use super::router::Route;
use super::types::{Direction, JunctionId, Position, VehicleId};

/// Identifies the approach lane of a junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneRef {
    pub junction: JunctionId,
    pub approach: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Moving towards the stop point
    Approaching,
    /// Halted by the signal, the queue ahead, or a full downstream lane
    Queued,
    /// Inside or leaving a junction box
    Crossing,
    /// Past the final exit point
    Done,
}

/// Piecewise linear path with precomputed arc lengths
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    points: Vec<Position>,
    cumulative: Vec<f32>,
}

impl Polyline {
    pub fn new(points: Vec<Position>) -> Self {
        let mut cumulative = Vec::with_capacity(points.len());
        let mut total = 0.0;
        for (index, point) in points.iter().enumerate() {
            if index > 0 {
                total += points[index - 1].distance(point);
            }
            cumulative.push(total);
        }
        Self { points, cumulative }
    }

    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    pub fn points(&self) -> &[Position] {
        &self.points
    }

    /// Arc length from the start to `points[index]`
    pub fn distance_to(&self, index: usize) -> f32 {
        self.cumulative.get(index).copied().unwrap_or_else(|| self.length())
    }

    pub fn point_at(&self, distance: f32) -> Position {
        let Some(first) = self.points.first() else {
            return Position::default();
        };
        if distance <= 0.0 {
            return *first;
        }
        for index in 1..self.points.len() {
            let (start, end) = (self.cumulative[index - 1], self.cumulative[index]);
            if distance <= end {
                let span = end - start;
                if span <= f32::EPSILON {
                    return self.points[index];
                }
                return self.points[index - 1].lerp(&self.points[index], (distance - start) / span);
            }
        }
        self.points[self.points.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    /// Lane whose stop point ends this leg; `None` for the exit leg
    pub lane: Option<LaneRef>,
    pub path: Polyline,
    /// Distance along `path` spent crossing the previous junction
    pub crossing_length: f32,
}

impl Leg {
    pub fn length(&self) -> f32 {
        self.path.length()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripPlan {
    legs: Vec<Leg>,
    done: bool,
}

impl TripPlan {
    /// Turn a route into legs using each junction's lane geometry
    pub fn build(
        route: &Route,
        junctions: &BTreeMap<JunctionId, Junction>,
    ) -> Result<Self, SimError> {
        if route.nodes.is_empty() || route.moves.len() != route.nodes.len() {
            return Err(SimError::MalformedRoute(format!(
                "{} moves for {} junctions",
                route.moves.len(),
                route.nodes.len()
            )));
        }
        let junction_at = |index: usize| {
            let id = route.nodes[index];
            junctions.get(&id).ok_or(SimError::UnknownJunction(id))
        };

        let mut legs = Vec::with_capacity(route.nodes.len() + 1);
        for index in 0..route.nodes.len() {
            let approach = route.approach_at(index);
            let lane = junction_at(index)?.lane(approach);
            let lane_ref = LaneRef {
                junction: route.nodes[index],
                approach,
            };

            let leg = if index == 0 {
                Leg {
                    lane: Some(lane_ref),
                    path: Polyline::new(vec![lane.entry(), lane.exit()]),
                    crossing_length: 0.0,
                }
            } else {
                let previous = junction_at(index - 1)?;
                let stop = previous.lane(route.approach_at(index - 1)).exit();
                let departure = previous.departure(route.moves[index - 1]);
                let path = Polyline::new(vec![
                    stop,
                    departure.start,
                    departure.end,
                    lane.entry(),
                    lane.exit(),
                ]);
                let crossing_length = path.distance_to(3);
                Leg {
                    lane: Some(lane_ref),
                    path,
                    crossing_length,
                }
            };
            legs.push(leg);
        }

        let last_index = route.nodes.len() - 1;
        let last = junction_at(last_index)?;
        let stop = last.lane(route.approach_at(last_index)).exit();
        let departure = last.departure(route.moves[last_index]);
        let path = Polyline::new(vec![stop, departure.start, departure.end]);
        let crossing_length = path.length();
        legs.push(Leg {
            lane: None,
            path,
            crossing_length,
        });

        Ok(Self { legs, done: false })
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Total path length from spawn to exit
    pub fn length(&self) -> f32 {
        self.legs.iter().map(Leg::length).sum()
    }
}

#[derive(Debug, Clone)]
pub struct Vehicle {
    id: VehicleId,
    route: Route,
    plan: TripPlan,
    leg_index: usize,
    /// Distance travelled along the current leg
    progress: f32,
    /// Layout units per second
    speed: f32,
    state: MotionState,
    position: Position,
}

impl Vehicle {
    pub fn new(id: VehicleId, route: Route, plan: TripPlan, speed: f32) -> Self {
        let position = plan
            .legs
            .first()
            .map(|leg| leg.path.point_at(0.0))
            .unwrap_or_default();
        Self {
            id,
            route,
            plan,
            leg_index: 0,
            progress: 0.0,
            speed,
            state: MotionState::Approaching,
            position,
        }
    }

    /// Build the plan for `route` and place the vehicle at its first entry
    pub fn on_route(
        id: VehicleId,
        route: Route,
        junctions: &BTreeMap<JunctionId, Junction>,
        speed: f32,
    ) -> Result<Self, SimError> {
        let plan = TripPlan::build(&route, junctions)?;
        Ok(Self::new(id, route, plan, speed))
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn plan(&self) -> &TripPlan {
        &self.plan
    }

    pub fn leg_index(&self) -> usize {
        self.leg_index
    }

    pub fn current_leg(&self) -> Option<&Leg> {
        self.plan.legs.get(self.leg_index)
    }

    /// Lane the vehicle is queued in, if any
    pub fn current_lane(&self) -> Option<LaneRef> {
        self.current_leg().and_then(|leg| leg.lane)
    }

    /// Lane it joins after passing the current stop point
    pub fn next_lane(&self) -> Option<LaneRef> {
        self.plan.legs.get(self.leg_index + 1).and_then(|leg| leg.lane)
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn leg_length(&self) -> f32 {
        self.current_leg().map(Leg::length).unwrap_or(0.0)
    }

    /// Distance left to the end of the current leg (the stop point on lane legs)
    pub fn remaining_on_leg(&self) -> f32 {
        (self.leg_length() - self.progress).max(0.0)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.plan.done
    }

    /// Junctions still ahead, including the one currently being crossed.
    /// A vehicle past the crossing part of its leg has left the previous box.
    pub fn remaining_junctions(&self) -> &[JunctionId] {
        let crossing = self.leg_index > 0
            && self
                .current_leg()
                .is_some_and(|leg| self.progress < leg.crossing_length);
        let from = if crossing {
            self.leg_index - 1
        } else {
            self.leg_index
        };
        &self.route.nodes[from.min(self.route.nodes.len())..]
    }

    pub(crate) fn move_to(&mut self, progress: f32, state: MotionState) {
        self.progress = progress;
        self.state = state;
        if let Some(leg) = self.plan.legs.get(self.leg_index) {
            self.position = leg.path.point_at(progress);
        }
    }

    /// Motion state for an unobstructed vehicle at `progress` on the current leg
    pub(crate) fn free_state_at(&self, progress: f32) -> MotionState {
        match self.current_leg() {
            Some(leg) if leg.lane.is_some() && progress >= leg.crossing_length => {
                MotionState::Approaching
            }
            _ => MotionState::Crossing,
        }
    }

    pub(crate) fn set_state(&mut self, state: MotionState) {
        self.state = state;
    }

    /// Step onto the next leg at its start
    pub(crate) fn advance_leg(&mut self) {
        self.leg_index += 1;
        self.move_to(0.0, MotionState::Crossing);
    }

    pub(crate) fn finish(&mut self) {
        self.plan.done = true;
        self.state = MotionState::Done;
    }
}
