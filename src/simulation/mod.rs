//! Deterministic traffic simulation core
//!
//! Signals, lanes, junctions, routing and the tick-driven engine. Rendering
//! and layout live outside this module and talk to it through
//! [`GeometryProvider`] and the snapshot types.

mod config;
mod engine;
mod error;
mod geometry;
mod junction;
mod lane;
mod router;
mod signal;
mod types;
mod vehicle;

pub use config::{
    SimConfig, ALLRED_MS, CELL_SIZE, GREEN_MS, LANE_CAPACITY, ROAD_THICK, STOPLINE_THICK,
    VEHICLE_SPACING, VEHICLE_SPEED, YELLOW_MS,
};
pub use engine::{EngineState, EngineStats, SimulationEngine, TripRecord, VehicleState};
pub use error::SimError;
pub use geometry::{GeometryProvider, JunctionBox, Rect, UniformLayout};
pub use junction::{Departure, ExitToggled, Junction, JunctionMetrics, JunctionState};
pub use lane::{Lane, LaneState, QueuedVehicle};
pub use router::{Route, Router, MAX_ROUTE_ATTEMPTS};
pub use signal::{
    CycleStatistics, Phase, PhaseChange, PhaseObserver, SignalController, SignalSnapshot,
    SignalTimings, TimingsUpdate,
};
pub use types::{Axis, DirMap, Direction, JunctionId, Position, VehicleId};
pub use vehicle::{LaneRef, Leg, MotionState, Polyline, TripPlan, Vehicle};
