//! Approach lanes
//!
//! A lane is the single-file queue in front of one side of a junction. The
//! queue holds every vehicle between the lane's entry point and its stop
//! line, in arrival order.

use std::collections::VecDeque;

use super::error::SimError;
use super::types::{Axis, Direction, Position, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedVehicle {
    pub vehicle: VehicleId,
    pub enqueued_at: f64,
}

/// Read-only summary of one lane
#[derive(Debug, Clone, PartialEq)]
pub struct LaneState {
    pub approach: Direction,
    pub queue_length: usize,
    pub capacity: usize,
    pub occupancy_rate: f64,
    pub average_waiting_ms: f64,
}

#[derive(Debug, Clone)]
pub struct Lane {
    /// Side of the junction the traffic arrives from
    approach: Direction,
    axis: Axis,
    /// +1 when travel increases the coordinate along `axis`, -1 otherwise
    sign: i8,
    entry: Position,
    exit: Position,
    capacity: usize,
    queue: VecDeque<QueuedVehicle>,
}

impl Lane {
    pub fn new(
        approach: Direction,
        entry: Position,
        exit: Position,
        capacity: usize,
    ) -> Result<Self, SimError> {
        if capacity == 0 {
            return Err(SimError::Configuration {
                field: "lane_capacity",
                value: 0.0,
            });
        }
        let heading = approach.opposite();
        let (dx, dy) = heading.unit();
        let sign = if dx + dy > 0.0 { 1 } else { -1 };

        Ok(Self {
            approach,
            axis: heading.axis(),
            sign,
            entry,
            exit,
            capacity,
            queue: VecDeque::with_capacity(capacity),
        })
    }

    pub fn approach(&self) -> Direction {
        self.approach
    }

    /// Direction of travel along the lane
    pub fn heading(&self) -> Direction {
        self.approach.opposite()
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn sign(&self) -> i8 {
        self.sign
    }

    /// Where vehicles join the lane, on the junction's outer edge
    pub fn entry(&self) -> Position {
        self.entry
    }

    /// The stop point just before the stop line
    pub fn exit(&self) -> Position {
        self.exit
    }

    pub fn length(&self) -> f32 {
        self.entry.distance(&self.exit)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn has_capacity(&self) -> bool {
        self.queue.len() < self.capacity
    }

    pub fn enqueue(&mut self, vehicle: VehicleId, at: f64) -> Result<(), SimError> {
        if !self.has_capacity() {
            return Err(SimError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.queue.push_back(QueuedVehicle {
            vehicle,
            enqueued_at: at,
        });
        debug_assert!(self.queue.len() <= self.capacity);
        Ok(())
    }

    /// Remove the earliest arrival; `None` when the lane is empty
    pub fn dequeue_front(&mut self) -> Option<QueuedVehicle> {
        self.queue.pop_front()
    }

    pub fn front(&self) -> Option<&QueuedVehicle> {
        self.queue.front()
    }

    /// Release `vehicle`'s slot wherever it sits in the queue
    pub fn remove(&mut self, vehicle: VehicleId) -> Option<QueuedVehicle> {
        let index = self.position_of(vehicle)?;
        self.queue.remove(index)
    }

    /// Zero-based FIFO position
    pub fn position_of(&self, vehicle: VehicleId) -> Option<usize> {
        self.queue.iter().position(|queued| queued.vehicle == vehicle)
    }

    /// The vehicle queued directly ahead of `vehicle`
    pub fn predecessor_of(&self, vehicle: VehicleId) -> Option<VehicleId> {
        match self.position_of(vehicle)? {
            0 => None,
            index => self.queue.get(index - 1).map(|queued| queued.vehicle),
        }
    }

    pub fn contains(&self, vehicle: VehicleId) -> bool {
        self.position_of(vehicle).is_some()
    }

    pub fn vehicles(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.queue.iter().map(|queued| queued.vehicle)
    }

    pub fn queue_length(&self) -> usize {
        self.queue.len()
    }

    pub fn occupancy_rate(&self) -> f64 {
        self.queue.len() as f64 / self.capacity as f64
    }

    /// Mean time spent in the queue, measured at `current_time`
    pub fn average_waiting_time(&self, current_time: f64) -> f64 {
        if self.queue.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .queue
            .iter()
            .map(|queued| (current_time - queued.enqueued_at).max(0.0))
            .sum();
        total / self.queue.len() as f64
    }

    pub fn state(&self, current_time: f64) -> LaneState {
        LaneState {
            approach: self.approach,
            queue_length: self.queue_length(),
            capacity: self.capacity,
            occupancy_rate: self.occupancy_rate(),
            average_waiting_ms: self.average_waiting_time(current_time),
        }
    }
}
