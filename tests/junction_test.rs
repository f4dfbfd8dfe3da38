//! Junction geometry, exit flag and metrics tests

use std::cell::RefCell;
use std::rc::Rc;

use traffic_grid::simulation::{
    Axis, Direction, Junction, JunctionId, Phase, PhaseChange, Position, SimConfig, SimError,
    UniformLayout, VehicleId,
};

fn junction_at(row: usize, col: usize) -> Junction {
    let config = SimConfig::default();
    let layout = UniformLayout::from_config(&config);
    Junction::new(JunctionId::new(row, col), &config, &layout).expect("valid junction")
}

#[test]
fn test_lane_geometry_uses_quarter_road_offset() {
    let junction = junction_at(0, 0);
    assert_eq!(junction.center(), Position::new(60.0, 60.0));

    // Eastbound traffic from the west keeps to the south half of the road
    let west = junction.lane(Direction::West);
    assert_eq!(west.entry(), Position::new(0.0, 66.0));
    assert_eq!(west.exit(), Position::new(45.0, 66.0));
    assert_eq!(west.axis(), Axis::Horizontal);

    let east_departure = junction.departure(Direction::East);
    assert_eq!(east_departure.start, Position::new(72.0, 66.0));
    assert_eq!(east_departure.end, Position::new(120.0, 66.0));
    assert_eq!(junction.exit_point(Direction::East), east_departure.end);

    let layout = junction.layout();
    assert_eq!(layout.inner.left, 48.0);
    assert_eq!(layout.outer.right, 120.0);

    // Southbound traffic from the north keeps to the west half
    let north = junction.lane(Direction::North);
    assert_eq!(north.entry(), Position::new(54.0, 0.0));
    assert_eq!(north.exit(), Position::new(54.0, 45.0));
    assert_eq!(north.axis(), Axis::Vertical);
}

#[test]
fn test_approach_and_departure_never_coincide() {
    let junction = junction_at(1, 2);
    for side in Direction::ALL {
        let lane = junction.lane(side);
        let departure = junction.departure(side);
        assert_ne!(lane.entry(), departure.end, "side {}", side);
        assert!(lane.entry().distance(&departure.end) >= 12.0);
    }
}

#[test]
fn test_adjacent_junctions_share_lane_boundary_points() {
    let left = junction_at(0, 0);
    let right = junction_at(0, 1);
    assert_eq!(
        left.departure(Direction::East).end,
        right.lane(Direction::West).entry()
    );
    assert_eq!(
        right.departure(Direction::West).end,
        left.lane(Direction::East).entry()
    );
}

#[test]
fn test_default_lane_fits_its_capacity() {
    let config = SimConfig::default();
    let junction = junction_at(0, 0);
    for (_, lane) in junction.lanes() {
        assert_eq!(lane.capacity(), config.lane_capacity);
        // The last car of a full queue still starts on the lane
        let tail = (lane.capacity() - 1) as f32 * config.vehicle_spacing;
        assert!(tail <= lane.length(), "{} > {}", tail, lane.length());
    }
}

#[test]
fn test_signal_is_started_and_gates_by_axis() {
    let mut junction = junction_at(0, 0);
    assert!(junction.signal().is_running());
    assert!(junction.is_green_for(Direction::West));
    assert!(junction.is_green_for(Direction::East));
    assert!(!junction.is_green_for(Direction::North));

    junction.signal_mut().set_phase(Phase::NsGreen);
    assert!(junction.is_green_for(Direction::South));
    assert!(!junction.is_green_for(Direction::West));
}

#[test]
fn test_phase_changes_forwarded_to_render_callback() {
    let mut junction = junction_at(2, 1);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    junction.subscribe_phase_changes(Box::new(move |id: JunctionId, change: &PhaseChange| {
        sink.borrow_mut().push((id, change.to));
    }));

    junction.signal_mut().update(4000.0);
    assert_eq!(
        *seen.borrow(),
        vec![(JunctionId::new(2, 1), Phase::EwYellow)]
    );
}

#[test]
fn test_exit_toggle_publishes_event_once() {
    let mut source = junction_at(0, 0);
    let mut mirror = junction_at(0, 2);

    let event = source
        .set_exit_enabled(Direction::North, false)
        .expect("flag changed");
    assert_eq!(event.junction, JunctionId::new(0, 0));
    assert!(!source.is_exit_enabled(Direction::North));
    assert!(source.set_exit_enabled(Direction::North, false).is_none());

    assert!(mirror.apply_exit_event(&event));
    assert!(!mirror.is_exit_enabled(Direction::North));
    assert!(!mirror.apply_exit_event(&event));

    // A junction ignores its own events
    assert!(!source.apply_exit_event(&event));
}

#[test]
fn test_state_and_metrics() {
    let mut junction = junction_at(0, 0);
    junction
        .lane_mut(Direction::West)
        .enqueue(VehicleId(0), 0.0)
        .unwrap();
    junction
        .lane_mut(Direction::West)
        .enqueue(VehicleId(1), 500.0)
        .unwrap();
    junction
        .lane_mut(Direction::North)
        .enqueue(VehicleId(2), 1000.0)
        .unwrap();

    let state = junction.state(2000.0);
    assert_eq!(state.id, JunctionId::new(0, 0));
    assert_eq!(state.total_queued, 3);
    assert_eq!(state.lanes.len(), 4);
    assert_eq!(state.signal.phase, Phase::EwGreen);

    let west = state
        .lanes
        .iter()
        .find(|lane| lane.approach == Direction::West)
        .unwrap();
    assert_eq!(west.queue_length, 2);
    assert_eq!(west.average_waiting_ms, 1750.0);

    let metrics = junction.metrics();
    let capacity = SimConfig::default().lane_capacity;
    assert_eq!(metrics.total_vehicles, 3);
    assert_eq!(metrics.total_capacity, 4 * capacity);
    assert_eq!(metrics.utilization, 3.0 / (4 * capacity) as f64);
    assert_eq!(
        metrics.average_occupancy,
        (2.0 / capacity as f64 + 1.0 / capacity as f64) / 4.0
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let layout = UniformLayout::from_config(&SimConfig::default());

    let config = SimConfig {
        green_ms: 0.0,
        ..SimConfig::default()
    };
    assert!(matches!(
        Junction::new(JunctionId::new(0, 0), &config, &layout),
        Err(SimError::Configuration { .. })
    ));

    let config = SimConfig {
        road_thickness: 1.0,
        ..SimConfig::default()
    };
    assert!(Junction::new(JunctionId::new(0, 0), &config, &layout).is_err());
}

#[test]
fn test_direction_tokens() {
    assert_eq!("N".parse::<Direction>().unwrap(), Direction::North);
    assert_eq!("w".parse::<Direction>().unwrap(), Direction::West);
    assert_eq!(
        "NE".parse::<Direction>(),
        Err(SimError::InvalidDirection("NE".to_string()))
    );
}
