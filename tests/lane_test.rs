//! Lane queue tests

use traffic_grid::simulation::{Axis, Direction, Lane, Position, SimError, VehicleId};

fn lane(capacity: usize) -> Lane {
    Lane::new(
        Direction::West,
        Position::new(0.0, 66.0),
        Position::new(45.0, 66.0),
        capacity,
    )
    .expect("valid lane")
}

#[test]
fn test_capacity_and_average_wait() {
    let mut lane = lane(2);

    lane.enqueue(VehicleId(1), 0.0).unwrap();
    lane.enqueue(VehicleId(2), 5.0).unwrap();

    let third = lane.enqueue(VehicleId(3), 6.0);
    assert_eq!(third, Err(SimError::CapacityExceeded { capacity: 2 }));
    assert_eq!(lane.queue_length(), 2);

    assert_eq!(lane.average_waiting_time(10.0), 7.5);
    assert_eq!(lane.occupancy_rate(), 1.0);
}

#[test]
fn test_zero_capacity_is_rejected() {
    let result = Lane::new(
        Direction::North,
        Position::default(),
        Position::new(0.0, 10.0),
        0,
    );
    assert!(matches!(result, Err(SimError::Configuration { .. })));
}

#[test]
fn test_fifo_order() {
    let mut lane = lane(4);
    for id in 0..4 {
        lane.enqueue(VehicleId(id), id as f64).unwrap();
    }

    assert_eq!(lane.predecessor_of(VehicleId(0)), None);
    assert_eq!(lane.predecessor_of(VehicleId(2)), Some(VehicleId(1)));

    let order: Vec<usize> = std::iter::from_fn(|| lane.dequeue_front())
        .map(|queued| queued.vehicle.0)
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
    assert!(lane.dequeue_front().is_none());
    assert_eq!(lane.average_waiting_time(100.0), 0.0);
}

#[test]
fn test_length_never_exceeds_capacity() {
    let mut lane = lane(3);
    let mut next = 0;
    for step in 0..50 {
        if step % 3 == 2 {
            lane.dequeue_front();
        } else {
            let _ = lane.enqueue(VehicleId(next), step as f64);
            next += 1;
        }
        assert!(lane.queue_length() <= lane.capacity());
    }
}

#[test]
fn test_remove_releases_slot_in_place() {
    let mut lane = lane(3);
    for id in 0..3 {
        lane.enqueue(VehicleId(id), 0.0).unwrap();
    }
    assert!(!lane.has_capacity());

    let removed = lane.remove(VehicleId(1)).expect("queued");
    assert_eq!(removed.vehicle, VehicleId(1));
    assert!(lane.has_capacity());
    assert_eq!(lane.predecessor_of(VehicleId(2)), Some(VehicleId(0)));
    assert!(lane.remove(VehicleId(1)).is_none());
}

#[test]
fn test_average_wait_grows_without_dequeues() {
    let mut lane = lane(5);
    lane.enqueue(VehicleId(0), 0.0).unwrap();
    lane.enqueue(VehicleId(1), 40.0).unwrap();
    lane.enqueue(VehicleId(2), 90.0).unwrap();

    let mut previous = 0.0;
    for now in (100..2000).step_by(75) {
        let wait = lane.average_waiting_time(now as f64);
        assert!(wait >= 0.0);
        assert!(wait >= previous);
        previous = wait;
    }
}

#[test]
fn test_geometry_is_fixed_at_construction() {
    let lane = lane(2);
    assert_eq!(lane.approach(), Direction::West);
    assert_eq!(lane.heading(), Direction::East);
    assert_eq!(lane.axis(), Axis::Horizontal);
    assert_eq!(lane.sign(), 1);
    assert_eq!(lane.length(), 45.0);

    let state = lane.state(0.0);
    assert_eq!(state.queue_length, 0);
    assert_eq!(state.capacity, 2);
}
