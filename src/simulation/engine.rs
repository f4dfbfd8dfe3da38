//! Main simulation engine that ties everything together
//!
//! The engine owns every junction and vehicle. Each `update` call advances
//! all signals first, then moves every live vehicle, so a light that turns
//! green in a tick releases its queue in that same tick.

use std::collections::BTreeMap;

use log::{debug, trace, warn};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::config::SimConfig;
use super::error::SimError;
use super::geometry::{GeometryProvider, UniformLayout};
use super::junction::{ExitToggled, Junction, JunctionState};
use super::router::{Route, Router};
use super::signal::Phase;
use super::types::{Axis, Direction, JunctionId, Position, VehicleId};
use super::vehicle::{LaneRef, MotionState, Vehicle};

/// Per-vehicle trip bookkeeping, dropped when the vehicle is disposed
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub origin: JunctionId,
    pub destination: JunctionId,
    pub hops: usize,
    pub distance: f32,
    pub spawned_at_ms: f64,
    pub finished_at_ms: Option<f64>,
}

impl TripRecord {
    pub fn travel_time_ms(&self) -> Option<f64> {
        self.finished_at_ms.map(|end| end - self.spawned_at_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub spawned: u64,
    pub completed: u64,
    pub spawn_refused: u64,
    pub disposed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub id: VehicleId,
    pub position: Position,
    pub state: MotionState,
    pub lane: Option<LaneRef>,
    pub leg_index: usize,
    pub progress: f32,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub time_ms: f64,
    pub junctions: Vec<JunctionState>,
    pub vehicles: Vec<VehicleState>,
}

pub struct SimulationEngine {
    config: SimConfig,
    geometry: Box<dyn GeometryProvider>,
    router: Router,

    /// All junctions
    junctions: BTreeMap<JunctionId, Junction>,

    /// All vehicles, finished ones included until disposed
    vehicles: BTreeMap<VehicleId, Vehicle>,

    trips: BTreeMap<VehicleId, TripRecord>,

    /// Junctions mirroring the exit flags of the key junction
    exit_mirrors: BTreeMap<JunctionId, Vec<JunctionId>>,

    next_vehicle_id: usize,

    /// Simulation clock in milliseconds
    clock_ms: f64,

    /// Seeded so identical inputs replay identically
    rng: StdRng,

    completed_last_tick: Vec<VehicleId>,
    stats: EngineStats,
}

impl SimulationEngine {
    /// Empty `rows x cols` grid
    pub fn new(
        rows: usize,
        cols: usize,
        config: SimConfig,
        geometry: Box<dyn GeometryProvider>,
        seed: u64,
    ) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            geometry,
            router: Router::new(rows, cols),
            junctions: BTreeMap::new(),
            vehicles: BTreeMap::new(),
            trips: BTreeMap::new(),
            exit_mirrors: BTreeMap::new(),
            next_vehicle_id: 0,
            clock_ms: 0.0,
            rng: StdRng::seed_from_u64(seed),
            completed_last_tick: Vec::new(),
            stats: EngineStats::default(),
        })
    }

    /// Adopt prebuilt junctions and vehicles. Vehicles are registered in the
    /// queue of their current lane, front-most first.
    pub fn initialize(
        rows: usize,
        cols: usize,
        config: SimConfig,
        geometry: Box<dyn GeometryProvider>,
        junctions: Vec<Junction>,
        vehicles: Vec<Vehicle>,
        seed: u64,
    ) -> Result<Self, SimError> {
        let mut engine = Self::new(rows, cols, config, geometry, seed)?;

        for junction in junctions {
            let id = junction.id();
            engine.router.add_junction(id)?;
            engine.junctions.insert(id, junction);
        }

        let mut vehicles = vehicles;
        vehicles.sort_by_key(|vehicle| (OrderedFloat(vehicle.remaining_on_leg()), vehicle.id()));
        for vehicle in vehicles {
            engine.router.validate_route(vehicle.route())?;
            engine.ensure_exit_open(vehicle.route())?;
            engine.adopt_vehicle(vehicle)?;
        }

        Ok(engine)
    }

    /// A `rows x cols` grid with every junction present, laid out uniformly
    pub fn with_full_grid(
        rows: usize,
        cols: usize,
        config: SimConfig,
        seed: u64,
    ) -> Result<Self, SimError> {
        let layout = UniformLayout::from_config(&config);
        let mut engine = Self::new(rows, cols, config, Box::new(layout), seed)?;
        for row in 0..rows {
            for col in 0..cols {
                engine.add_junction(JunctionId::new(row, col))?;
            }
        }
        Ok(engine)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn time_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn junctions(&self) -> &BTreeMap<JunctionId, Junction> {
        &self.junctions
    }

    pub fn junction(&self, id: JunctionId) -> Option<&Junction> {
        self.junctions.get(&id)
    }

    /// Mutable access for the control surface (timings, forced phases)
    pub fn junction_mut(&mut self, id: JunctionId) -> Option<&mut Junction> {
        self.junctions.get_mut(&id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.values()
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn trip(&self, id: VehicleId) -> Option<&TripRecord> {
        self.trips.get(&id)
    }

    /// Vehicles that reached their exit during the most recent `update`
    pub fn last_completed(&self) -> &[VehicleId] {
        &self.completed_last_tick
    }

    pub fn add_junction(&mut self, id: JunctionId) -> Result<(), SimError> {
        if self.junctions.contains_key(&id) {
            return Err(SimError::DuplicateJunction(id));
        }
        let junction = Junction::new(id, &self.config, self.geometry.as_ref())?;
        self.router.add_junction(id)?;
        self.junctions.insert(id, junction);
        debug!("Added junction {}", id);
        Ok(())
    }

    /// Remove a junction between ticks. Every vehicle whose remaining trip
    /// passes through it is disposed first, releasing its queue slot.
    pub fn remove_junction(&mut self, id: JunctionId) -> Result<Vec<VehicleId>, SimError> {
        if !self.junctions.contains_key(&id) {
            return Err(SimError::UnknownJunction(id));
        }

        let affected: Vec<VehicleId> = self
            .vehicles
            .values()
            .filter(|vehicle| !vehicle.is_done() && vehicle.remaining_junctions().contains(&id))
            .map(Vehicle::id)
            .collect();
        for vehicle_id in &affected {
            self.dispose_vehicle(*vehicle_id);
        }
        if !affected.is_empty() {
            warn!(
                "Removing junction {} dropped {} vehicle(s) routed through it",
                id,
                affected.len()
            );
        }

        self.junctions.remove(&id);
        self.router.remove_junction(id);
        self.exit_mirrors.remove(&id);
        for mirrors in self.exit_mirrors.values_mut() {
            mirrors.retain(|mirror| *mirror != id);
        }

        Ok(affected)
    }

    /// Spawn a vehicle on a randomly planned boundary-to-boundary route.
    /// Returns `CapacityExceeded` when the first lane is full and
    /// `RouteNotFound` when no path exists; neither changes any state.
    pub fn spawn_vehicle(&mut self) -> Result<VehicleId, SimError> {
        let route = match self.router.plan_route(&self.junctions, &mut self.rng) {
            Ok(route) => route,
            Err(err) => {
                self.stats.spawn_refused += 1;
                debug!("Spawn refused: {}", err);
                return Err(err);
            }
        };
        self.spawn_on_route(route)
    }

    /// Spawn a vehicle on an explicit route
    pub fn spawn_on_route(&mut self, route: Route) -> Result<VehicleId, SimError> {
        self.router.validate_route(&route)?;
        self.ensure_exit_open(&route)?;

        let id = VehicleId(self.next_vehicle_id);
        let vehicle = Vehicle::on_route(id, route, &self.junctions, self.config.vehicle_speed)?;

        match self.adopt_vehicle(vehicle) {
            Ok(()) => {
                self.stats.spawned += 1;
                debug!("Spawned vehicle {}", id);
                Ok(id)
            }
            Err(err) => {
                self.stats.spawn_refused += 1;
                debug!("Spawn refused for {}: {}", id, err);
                Err(err)
            }
        }
    }

    /// A route may only leave the grid through an enabled exit
    fn ensure_exit_open(&self, route: &Route) -> Result<(), SimError> {
        let (last, exit) = match (route.end(), route.exit_direction()) {
            (Some(last), Some(exit)) => (last, exit),
            _ => return Err(SimError::MalformedRoute("route has no junctions".into())),
        };
        let junction = self
            .junctions
            .get(&last)
            .ok_or(SimError::UnknownJunction(last))?;
        if !junction.is_exit_enabled(exit) {
            return Err(SimError::MalformedRoute(format!(
                "exit {} of {} is disabled",
                exit, last
            )));
        }
        Ok(())
    }

    /// Register a vehicle and claim its current lane slot
    fn adopt_vehicle(&mut self, vehicle: Vehicle) -> Result<(), SimError> {
        let id = vehicle.id();
        if self.vehicles.contains_key(&id) {
            return Err(SimError::DuplicateVehicle(id));
        }

        if let Some(lane) = vehicle.current_lane() {
            self.junctions
                .get_mut(&lane.junction)
                .ok_or(SimError::UnknownJunction(lane.junction))?
                .lane_mut(lane.approach)
                .enqueue(id, self.clock_ms)?;
        }

        let route = vehicle.route();
        let (origin, destination) = match (route.start(), route.end()) {
            (Some(origin), Some(destination)) => (origin, destination),
            _ => return Err(SimError::MalformedRoute("route has no junctions".into())),
        };
        self.trips.insert(
            id,
            TripRecord {
                origin,
                destination,
                hops: route.nodes.len(),
                distance: vehicle.plan().length(),
                spawned_at_ms: self.clock_ms,
                finished_at_ms: None,
            },
        );
        self.next_vehicle_id = self.next_vehicle_id.max(id.0 + 1);
        self.vehicles.insert(id, vehicle);
        Ok(())
    }

    /// Remove a vehicle, release its lane slot and hand back its trip record
    pub fn dispose_vehicle(&mut self, id: VehicleId) -> Option<(Vehicle, TripRecord)> {
        let vehicle = self.vehicles.remove(&id)?;
        if let Some(lane) = vehicle.current_lane() {
            if let Some(junction) = self.junctions.get_mut(&lane.junction) {
                junction.lane_mut(lane.approach).remove(id);
            }
        }
        let trip = self.trips.remove(&id)?;
        self.stats.disposed += 1;
        Some((vehicle, trip))
    }

    /// Dispose every finished vehicle, returning their trip records
    pub fn dispose_finished(&mut self) -> Vec<(VehicleId, TripRecord)> {
        let finished: Vec<VehicleId> = self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.is_done())
            .map(Vehicle::id)
            .collect();

        finished
            .into_iter()
            .filter_map(|id| self.dispose_vehicle(id).map(|(_, trip)| (id, trip)))
            .collect()
    }

    /// Toggle an exit and deliver the resulting event to every junction
    /// linked as a mirror of `id`. Returns the mirrors that changed.
    pub fn set_exit_enabled(
        &mut self,
        id: JunctionId,
        side: Direction,
        enabled: bool,
    ) -> Result<Vec<JunctionId>, SimError> {
        let event = self
            .junctions
            .get_mut(&id)
            .ok_or(SimError::UnknownJunction(id))?
            .set_exit_enabled(side, enabled);

        Ok(match event {
            Some(event) => self.publish_exit_event(&event),
            None => Vec::new(),
        })
    }

    /// Subscribe `mirror` to exit changes made on `source`
    pub fn link_exit_mirror(
        &mut self,
        source: JunctionId,
        mirror: JunctionId,
    ) -> Result<(), SimError> {
        for id in [source, mirror] {
            if !self.junctions.contains_key(&id) {
                return Err(SimError::UnknownJunction(id));
            }
        }
        let mirrors = self.exit_mirrors.entry(source).or_default();
        if source != mirror && !mirrors.contains(&mirror) {
            mirrors.push(mirror);
        }
        Ok(())
    }

    fn publish_exit_event(&mut self, event: &ExitToggled) -> Vec<JunctionId> {
        let subscribers = self
            .exit_mirrors
            .get(&event.junction)
            .cloned()
            .unwrap_or_default();

        subscribers
            .into_iter()
            .filter(|subscriber| {
                self.junctions
                    .get_mut(subscriber)
                    .is_some_and(|junction| junction.apply_exit_event(event))
            })
            .collect()
    }

    /// Advance the whole grid. `elapsed_ms` drives signals, queue clocks and
    /// motion; `dt` scales vehicle motion only (1.0 is nominal speed).
    pub fn update(&mut self, dt: f64, elapsed_ms: f64) {
        self.completed_last_tick.clear();

        let elapsed_ms = if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
            elapsed_ms
        } else {
            0.0
        };
        if elapsed_ms == 0.0 {
            return;
        }

        for junction in self.junctions.values_mut() {
            junction.signal_mut().update(elapsed_ms);
            debug_assert!(
                !(junction.signal().is_green(Axis::Horizontal)
                    && junction.signal().is_green(Axis::Vertical)),
                "both axes green at {}",
                junction.id()
            );
        }
        self.clock_ms += elapsed_ms;

        let scale = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        let distance = (self.config.vehicle_speed as f64 * scale * elapsed_ms / 1000.0) as f32;
        if distance <= 0.0 {
            return;
        }

        // Front-most vehicles move first so followers see the freed space
        let mut order: Vec<(OrderedFloat<f32>, VehicleId)> = self
            .vehicles
            .values()
            .filter(|vehicle| !vehicle.is_done())
            .map(|vehicle| (OrderedFloat(vehicle.remaining_on_leg()), vehicle.id()))
            .collect();
        order.sort();

        for (_, id) in order {
            if self.advance_vehicle(id, distance) {
                self.completed_last_tick.push(id);
            }
        }

        for id in &self.completed_last_tick {
            if let Some(trip) = self.trips.get_mut(id) {
                trip.finished_at_ms = Some(self.clock_ms);
            }
            self.stats.completed += 1;
            debug!("Vehicle {} left the grid", id);
        }
    }

    /// Move one vehicle up to `distance`. Returns true when it finished.
    fn advance_vehicle(&mut self, id: VehicleId, distance: f32) -> bool {
        let spacing = self.config.vehicle_spacing;
        let mut budget = distance;

        loop {
            let Some(vehicle) = self.vehicles.get(&id) else {
                return false;
            };
            if vehicle.is_done() {
                return false;
            }
            let progress = vehicle.progress();
            let leg_length = vehicle.leg_length();
            let lane = vehicle.current_lane();
            let next_lane = vehicle.next_lane();

            let Some(lane) = lane else {
                // Exit leg: nothing left to wait for
                let reached = (progress + budget).min(leg_length);
                let Some(vehicle) = self.vehicles.get_mut(&id) else {
                    return false;
                };
                vehicle.move_to(reached, MotionState::Crossing);
                if reached >= leg_length {
                    vehicle.finish();
                    return true;
                }
                return false;
            };

            let Some(junction) = self.junctions.get(&lane.junction) else {
                return false;
            };
            let limit = match junction.lane(lane.approach).predecessor_of(id) {
                Some(ahead) => {
                    let ahead_remaining = self
                        .vehicles
                        .get(&ahead)
                        .map(Vehicle::remaining_on_leg)
                        .unwrap_or(0.0);
                    leg_length - (ahead_remaining + spacing)
                }
                None => leg_length,
            };

            let wanted = progress + budget;
            let reached = wanted.min(limit).max(progress);
            budget -= reached - progress;

            let Some(vehicle) = self.vehicles.get_mut(&id) else {
                return false;
            };
            let state = if reached < wanted {
                MotionState::Queued
            } else {
                vehicle.free_state_at(reached)
            };
            vehicle.move_to(reached, state);

            if reached < leg_length || budget <= 0.0 {
                return false;
            }

            if !self.may_cross(id, lane, next_lane) {
                if let Some(vehicle) = self.vehicles.get_mut(&id) {
                    vehicle.set_state(MotionState::Queued);
                }
                return false;
            }
            if !self.cross(id, lane, next_lane) {
                return false;
            }
        }
    }

    /// Green for the lane's axis, front of its queue, room downstream
    fn may_cross(&self, id: VehicleId, lane: LaneRef, next_lane: Option<LaneRef>) -> bool {
        let Some(junction) = self.junctions.get(&lane.junction) else {
            return false;
        };
        if !junction.is_green_for(lane.approach) {
            return false;
        }
        if junction.lane(lane.approach).front().map(|queued| queued.vehicle) != Some(id) {
            return false;
        }
        match next_lane {
            Some(next) => self
                .junctions
                .get(&next.junction)
                .is_some_and(|junction| junction.lane(next.approach).has_capacity()),
            None => true,
        }
    }

    fn cross(&mut self, id: VehicleId, lane: LaneRef, next_lane: Option<LaneRef>) -> bool {
        if let Some(next) = next_lane {
            let enqueued = self
                .junctions
                .get_mut(&next.junction)
                .map(|junction| junction.lane_mut(next.approach).enqueue(id, self.clock_ms));
            if !matches!(enqueued, Some(Ok(()))) {
                return false;
            }
        }

        if let Some(junction) = self.junctions.get_mut(&lane.junction) {
            let released = junction.lane_mut(lane.approach).dequeue_front();
            debug_assert_eq!(released.map(|queued| queued.vehicle), Some(id));
        }
        if let Some(vehicle) = self.vehicles.get_mut(&id) {
            vehicle.advance_leg();
        }
        trace!("Vehicle {} crossed {} from {}", id, lane.junction, lane.approach);
        true
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            time_ms: self.clock_ms,
            junctions: self
                .junctions
                .values()
                .map(|junction| junction.state(self.clock_ms))
                .collect(),
            vehicles: self
                .vehicles
                .values()
                .map(|vehicle| VehicleState {
                    id: vehicle.id(),
                    position: vehicle.position(),
                    state: vehicle.state(),
                    lane: vehicle.current_lane(),
                    leg_index: vehicle.leg_index(),
                    progress: vehicle.progress(),
                    done: vehicle.is_done(),
                })
                .collect(),
        }
    }

    /// Total vehicles waiting in lane queues across the grid
    pub fn total_queued(&self) -> usize {
        self.junctions.values().map(Junction::total_queued).sum()
    }

    /// Print a summary of the engine state
    pub fn print_summary(&self) {
        println!("=== Traffic Grid Summary ===");
        println!("Time: {:.2}s", self.clock_ms / 1000.0);
        println!(
            "Junctions: {}, Roads: {}",
            self.router.junction_count(),
            self.router.road_count()
        );
        println!("Vehicles: {}", self.vehicles.len());
        println!("Queued: {}", self.total_queued());
        println!(
            "Spawned: {}, Completed: {}, Refused: {}",
            self.stats.spawned, self.stats.completed, self.stats.spawn_refused
        );

        println!("--- Junctions ---");
        for junction in self.junctions.values() {
            let signal = junction.signal().snapshot();
            let metrics = junction.metrics();
            let cycles = junction.signal().cycle_statistics();
            println!(
                "  Junction {}: phase={:?} ({:.0}ms left), queued={}/{}, utilization={:.0}%, cycles={}",
                junction.id(),
                signal.phase,
                signal.remaining_ms,
                metrics.total_vehicles,
                metrics.total_capacity,
                metrics.utilization * 100.0,
                cycles.cycles_completed
            );
        }
    }

    /// Draw the grid in the terminal: one cell per junction showing the
    /// current green axis and the number of queued vehicles.
    pub fn draw_map(&self) {
        let rows = self.router.rows();
        let cols = self.router.cols();

        for row in 0..rows {
            let mut line = String::new();
            for col in 0..cols {
                let cell = match self.junctions.get(&JunctionId::new(row, col)) {
                    Some(junction) => {
                        let glyph = match junction.signal().phase() {
                            Phase::EwGreen => '-',
                            Phase::NsGreen => '|',
                            Phase::EwYellow | Phase::NsYellow => 'y',
                            Phase::AllRed => 'x',
                        };
                        format!("[{}{:>2}]", glyph, junction.total_queued())
                    }
                    None => "  .  ".to_string(),
                };
                line.push_str(&cell);
                if col + 1 < cols {
                    let joined = self
                        .router
                        .neighbors(JunctionId::new(row, col))
                        .any(|(direction, _)| direction == Direction::East);
                    line.push_str(if joined { "--" } else { "  " });
                }
            }
            println!("{}", line);

            if row + 1 < rows {
                let mut spacer = String::new();
                for col in 0..cols {
                    let joined = self
                        .router
                        .neighbors(JunctionId::new(row, col))
                        .any(|(direction, _)| direction == Direction::South);
                    spacer.push_str(if joined { "  |  " } else { "     " });
                    if col + 1 < cols {
                        spacer.push_str("  ");
                    }
                }
                println!("{}", spacer);
            }
        }
    }
}
