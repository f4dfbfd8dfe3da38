//! Junction adjacency graph and trip planning
//!
//! Roads join every pair of grid-adjacent junctions that both exist. Paths
//! are shortest by hop count; ties go to the first path discovered when
//! neighbours are visited in `Direction::ALL` order.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::algo::dijkstra;
use petgraph::graphmap::UnGraphMap;
use rand::seq::IndexedRandom;
use rand::Rng;

use super::error::SimError;
use super::junction::Junction;
use super::types::{Direction, JunctionId};

/// How many times the end junction is redrawn to avoid `start == end`
pub const MAX_ROUTE_ATTEMPTS: usize = 8;

/// A planned trip through the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Junctions visited, in order
    pub nodes: Vec<JunctionId>,
    /// Side of the first junction the vehicle enters from
    pub entry: Direction,
    /// Travel direction leaving each node; the last one leaves the grid
    pub moves: Vec<Direction>,
}

impl Route {
    /// Side of `nodes[index]` the vehicle arrives from
    pub fn approach_at(&self, index: usize) -> Direction {
        match index {
            0 => self.entry,
            _ => self.moves[index - 1].opposite(),
        }
    }

    pub fn exit_direction(&self) -> Option<Direction> {
        self.moves.last().copied()
    }

    pub fn start(&self) -> Option<JunctionId> {
        self.nodes.first().copied()
    }

    pub fn end(&self) -> Option<JunctionId> {
        self.nodes.last().copied()
    }
}

#[derive(Debug, Clone)]
pub struct Router {
    rows: usize,
    cols: usize,
    graph: UnGraphMap<JunctionId, ()>,
}

impl Router {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            graph: UnGraphMap::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn in_grid(&self, id: JunctionId) -> bool {
        id.row < self.rows && id.col < self.cols
    }

    /// Add a junction and a road to every existing grid neighbour
    pub fn add_junction(&mut self, id: JunctionId) -> Result<(), SimError> {
        if !self.in_grid(id) {
            return Err(SimError::OutOfGrid {
                id,
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.graph.contains_node(id) {
            return Err(SimError::DuplicateJunction(id));
        }

        self.graph.add_node(id);
        for direction in Direction::ALL {
            if let Some(neighbor) = id.neighbor(direction, self.rows, self.cols) {
                if self.graph.contains_node(neighbor) {
                    self.graph.add_edge(id, neighbor, ());
                }
            }
        }
        Ok(())
    }

    /// Remove a junction and its roads. Returns false if it was not present.
    pub fn remove_junction(&mut self, id: JunctionId) -> bool {
        self.graph.remove_node(id)
    }

    pub fn contains(&self, id: JunctionId) -> bool {
        self.graph.contains_node(id)
    }

    pub fn junction_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Roads counted once per junction pair
    pub fn road_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Connected neighbours in fixed N, S, E, W order
    pub fn neighbors(&self, id: JunctionId) -> impl Iterator<Item = (Direction, JunctionId)> + '_ {
        Direction::ALL.into_iter().filter_map(move |direction| {
            let neighbor = id.neighbor(direction, self.rows, self.cols)?;
            self.graph
                .contains_edge(id, neighbor)
                .then_some((direction, neighbor))
        })
    }

    pub fn has_road(&self, id: JunctionId) -> bool {
        self.neighbors(id).next().is_some()
    }

    /// Sides of `id` that face off the grid
    pub fn external_sides(&self, id: JunctionId) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL
            .into_iter()
            .filter(move |direction| id.neighbor(*direction, self.rows, self.cols).is_none())
    }

    pub fn is_boundary(&self, id: JunctionId) -> bool {
        self.external_sides(id).next().is_some()
    }

    /// Shortest path by hop count, `None` when either end is missing or the
    /// two are disconnected.
    pub fn bfs_path(&self, start: JunctionId, end: JunctionId) -> Option<Vec<JunctionId>> {
        if !self.contains(start) || !self.contains(end) {
            return None;
        }
        if start == end {
            return Some(vec![start]);
        }

        let mut visited = HashSet::from([start]);
        let mut parent: HashMap<JunctionId, JunctionId> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for (_, next) in self.neighbors(current) {
                if !visited.insert(next) {
                    continue;
                }
                parent.insert(next, current);
                if next == end {
                    let mut path = vec![end];
                    let mut cursor = end;
                    while let Some(previous) = parent.get(&cursor) {
                        path.push(*previous);
                        cursor = *previous;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Graph distance in hops
    pub fn hop_distance(&self, start: JunctionId, end: JunctionId) -> Option<usize> {
        if !self.contains(start) || !self.contains(end) {
            return None;
        }
        dijkstra(&self.graph, start, Some(end), |_| 1usize)
            .get(&end)
            .copied()
    }

    /// Pick random boundary endpoints and plan a route between them
    pub fn plan_route<R: Rng + ?Sized>(
        &self,
        junctions: &BTreeMap<JunctionId, Junction>,
        rng: &mut R,
    ) -> Result<Route, SimError> {
        let starts: Vec<JunctionId> = junctions
            .keys()
            .copied()
            .filter(|id| self.contains(*id) && self.is_boundary(*id) && self.has_road(*id))
            .collect();

        let ends: Vec<JunctionId> = junctions
            .iter()
            .filter(|(id, junction)| {
                self.contains(**id)
                    && self.has_road(**id)
                    && self
                        .external_sides(**id)
                        .any(|side| junction.is_exit_enabled(side))
            })
            .map(|(id, _)| *id)
            .collect();

        let start = *starts
            .choose(rng)
            .ok_or(SimError::NoRouteCandidates("no boundary junction with a road"))?;

        let entry_sides: Vec<Direction> = self.external_sides(start).collect();
        let entry = *entry_sides
            .choose(rng)
            .ok_or(SimError::NoRouteCandidates("start junction has no external side"))?;

        let mut end = *ends
            .choose(rng)
            .ok_or(SimError::NoRouteCandidates("no junction with an enabled exit"))?;
        let mut attempts = 1;
        while end == start && ends.len() > 1 && attempts < MAX_ROUTE_ATTEMPTS {
            if let Some(candidate) = ends.choose(rng) {
                end = *candidate;
            }
            attempts += 1;
        }

        self.route_between(start, entry, end, junctions, rng)
    }

    /// Plan the route `start -> end`, entering through `entry` and leaving
    /// through an enabled external side of `end`.
    pub fn route_between<R: Rng + ?Sized>(
        &self,
        start: JunctionId,
        entry: Direction,
        end: JunctionId,
        junctions: &BTreeMap<JunctionId, Junction>,
        rng: &mut R,
    ) -> Result<Route, SimError> {
        let nodes = self
            .bfs_path(start, end)
            .ok_or(SimError::RouteNotFound { from: start, to: end })?;

        let mut moves = Vec::with_capacity(nodes.len());
        for pair in nodes.windows(2) {
            let step = pair[0].direction_to(pair[1]).ok_or_else(|| {
                SimError::MalformedRoute(format!("{} and {} are not adjacent", pair[0], pair[1]))
            })?;
            moves.push(step);
        }

        let arrived_from = moves.last().map(|step| step.opposite()).unwrap_or(entry);
        let last = junctions.get(&end).ok_or(SimError::UnknownJunction(end))?;

        let exits: Vec<Direction> = self
            .external_sides(end)
            .filter(|side| last.is_exit_enabled(*side))
            .collect();
        // Leaving through the side we came in on is a U-turn
        let onward: Vec<Direction> = exits
            .iter()
            .copied()
            .filter(|side| *side != arrived_from)
            .collect();
        let pool = if onward.is_empty() { &exits } else { &onward };

        let exit = *pool
            .choose(rng)
            .ok_or(SimError::RouteNotFound { from: start, to: end })?;
        moves.push(exit);

        Ok(Route {
            nodes,
            entry,
            moves,
        })
    }

    /// Check an externally supplied route against the current grid
    pub fn validate_route(&self, route: &Route) -> Result<(), SimError> {
        let (first, last) = match (route.start(), route.end()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SimError::MalformedRoute("route has no junctions".into())),
        };
        if route.moves.len() != route.nodes.len() {
            return Err(SimError::MalformedRoute(format!(
                "{} moves for {} junctions",
                route.moves.len(),
                route.nodes.len()
            )));
        }
        if let Some(missing) = route.nodes.iter().find(|id| !self.contains(**id)) {
            return Err(SimError::UnknownJunction(*missing));
        }
        for (index, pair) in route.nodes.windows(2).enumerate() {
            if pair[0].direction_to(pair[1]) != Some(route.moves[index]) {
                return Err(SimError::MalformedRoute(format!(
                    "move {} from {} does not reach {}",
                    route.moves[index], pair[0], pair[1]
                )));
            }
        }
        if first.neighbor(route.entry, self.rows, self.cols).is_some() {
            return Err(SimError::MalformedRoute(format!(
                "entry side {} of {} is not on the grid boundary",
                route.entry, first
            )));
        }
        let exit = route.moves[route.moves.len() - 1];
        if last.neighbor(exit, self.rows, self.cols).is_some() {
            return Err(SimError::MalformedRoute(format!(
                "exit side {} of {} is not on the grid boundary",
                exit, last
            )));
        }
        Ok(())
    }
}
