//! Error taxonomy for the simulation core
//!
//! Traffic conditions (red lights, full queues, missing routes during a tick)
//! are ordinary states and never surface from `SimulationEngine::update`.
//! These errors come from construction, configuration and explicit control
//! calls.

use thiserror::Error;

use super::types::{JunctionId, VehicleId};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration value for {field}: {value}")]
    Configuration { field: &'static str, value: f64 },

    #[error("lane is full ({capacity} vehicles)")]
    CapacityExceeded { capacity: usize },

    #[error("no route from {from} to {to}")]
    RouteNotFound { from: JunctionId, to: JunctionId },

    #[error("no route candidates: {0}")]
    NoRouteCandidates(&'static str),

    #[error("invalid direction token {0:?}")]
    InvalidDirection(String),

    #[error("junction {0} does not exist")]
    UnknownJunction(JunctionId),

    #[error("junction {0} already exists")]
    DuplicateJunction(JunctionId),

    #[error("junction {id} lies outside the {rows}x{cols} grid")]
    OutOfGrid {
        id: JunctionId,
        rows: usize,
        cols: usize,
    },

    #[error("vehicle {0} does not exist")]
    UnknownVehicle(VehicleId),

    #[error("vehicle {0} is already registered")]
    DuplicateVehicle(VehicleId),

    #[error("malformed route: {0}")]
    MalformedRoute(String),
}
