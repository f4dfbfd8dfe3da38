//! Simulation configuration
//!
//! Defaults mirror the constants below; the CLI overrides individual fields.

use super::error::SimError;

/// Width of a two-lane road in layout units
pub const ROAD_THICK: f32 = 24.0;

/// Thickness of the painted stop line
pub const STOPLINE_THICK: f32 = 3.0;

/// Green phase duration in milliseconds
pub const GREEN_MS: f64 = 4000.0;

/// Yellow phase duration in milliseconds
pub const YELLOW_MS: f64 = 1000.0;

/// All-red clearance duration in milliseconds
pub const ALLRED_MS: f64 = 1000.0;

/// Vehicles one approach lane can hold. Five cars at `VEHICLE_SPACING` fit
/// the 45 unit default lane.
pub const LANE_CAPACITY: usize = 5;

/// Vehicle speed in layout units per second
pub const VEHICLE_SPEED: f32 = 60.0;

/// Distance kept between consecutive queued vehicles
pub const VEHICLE_SPACING: f32 = 10.0;

/// Side length of one grid cell in layout units
pub const CELL_SIZE: f32 = 120.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub road_thickness: f32,
    pub stopline_thickness: f32,
    pub green_ms: f64,
    pub yellow_ms: f64,
    pub all_red_ms: f64,
    pub lane_capacity: usize,
    pub vehicle_speed: f32,
    pub vehicle_spacing: f32,
    pub cell_size: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            road_thickness: ROAD_THICK,
            stopline_thickness: STOPLINE_THICK,
            green_ms: GREEN_MS,
            yellow_ms: YELLOW_MS,
            all_red_ms: ALLRED_MS,
            lane_capacity: LANE_CAPACITY,
            vehicle_speed: VEHICLE_SPEED,
            vehicle_spacing: VEHICLE_SPACING,
            cell_size: CELL_SIZE,
        }
    }
}

impl SimConfig {
    /// Lateral distance between a road's centerline and each lane center
    pub fn lane_offset(&self) -> f32 {
        (self.road_thickness / 4.0).round()
    }

    /// Rejects any non-positive value that would break lane geometry or
    /// signal timing.
    pub fn validate(&self) -> Result<(), SimError> {
        require_positive("green_ms", self.green_ms)?;
        require_positive("yellow_ms", self.yellow_ms)?;
        require_positive("all_red_ms", self.all_red_ms)?;
        require_positive("lane_capacity", self.lane_capacity as f64)?;
        require_positive("road_thickness", self.road_thickness as f64)?;
        // A zero offset would put both directions of a road on the centerline
        require_positive("lane_offset", self.lane_offset() as f64)?;
        require_positive("vehicle_speed", self.vehicle_speed as f64)?;
        require_positive("vehicle_spacing", self.vehicle_spacing as f64)?;
        require_positive("cell_size", self.cell_size as f64)?;
        if self.stopline_thickness < 0.0 || !self.stopline_thickness.is_finite() {
            return Err(SimError::Configuration {
                field: "stopline_thickness",
                value: self.stopline_thickness as f64,
            });
        }
        if self.road_thickness >= self.cell_size {
            return Err(SimError::Configuration {
                field: "cell_size",
                value: self.cell_size as f64,
            });
        }
        Ok(())
    }
}

pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), SimError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::Configuration { field, value })
    }
}
