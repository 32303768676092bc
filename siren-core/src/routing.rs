//! Shortest weighted paths over the full zone network (Dijkstra).

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use crate::ZoneGraph;

/// An ordered route between two zones and its total weight.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPath {
    zones: Vec<usize>,
    distance: f64,
}

impl ShortestPath {
    /// The zero-length path that stays in `zone`.
    #[must_use]
    pub fn stay(zone: usize) -> Self {
        Self {
            zones: vec![zone],
            distance: 0.0,
        }
    }

    /// Zone indices from source to target inclusive; never empty.
    #[must_use]
    pub fn zones(&self) -> &[usize] {
        &self.zones
    }

    /// Sum of traversed edge weights.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// First zone of the path.
    #[must_use]
    pub fn source(&self) -> Option<usize> {
        self.zones.first().copied()
    }

    /// Last zone of the path.
    #[must_use]
    pub fn target(&self) -> Option<usize> {
        self.zones.last().copied()
    }

    /// The same route walked the other way. Edges are undirected, so the
    /// distance is unchanged.
    #[must_use]
    pub fn reversed(mut self) -> Self {
        self.zones.reverse();
        self
    }

    /// Zone codes along the path.
    #[must_use]
    pub fn codes(&self, graph: &ZoneGraph) -> Vec<String> {
        self.zones
            .iter()
            .filter_map(|&zone| graph.code(zone).map(str::to_owned))
            .collect()
    }
}

/// Single-source distances and predecessors produced by one Dijkstra run.
#[derive(Debug, Clone)]
pub struct ShortestPathTree {
    source: usize,
    distances: Vec<Option<f64>>,
    previous: Vec<Option<usize>>,
}

impl ShortestPathTree {
    /// Zone the tree is rooted at.
    #[must_use]
    pub const fn source(&self) -> usize {
        self.source
    }

    /// Shortest distance from the source to `zone`, if it was reached.
    #[must_use]
    pub fn distance_to(&self, zone: usize) -> Option<f64> {
        self.distances.get(zone).copied().flatten()
    }

    /// Path from the source to `zone`, if it was reached.
    #[must_use]
    pub fn path_to(&self, zone: usize) -> Option<ShortestPath> {
        let distance = self.distance_to(zone)?;
        let mut zones = vec![zone];
        let mut current = zone;
        while current != self.source {
            current = self.previous.get(current).copied().flatten()?;
            zones.push(current);
        }
        zones.reverse();
        Some(ShortestPath { zones, distance })
    }
}

/// Heap entry ordered so the smallest distance pops first; equal distances
/// pop the lower zone index first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    distance: f64,
    zone: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.zone.cmp(&other.zone))
    }
}

/// Computes shortest paths over every edge of a snapshot.
///
/// Each edge contributes both directions. Parallel edges are all kept; the
/// lighter one wins naturally during relaxation.
///
/// # Examples
///
/// ```
/// use siren_core::{Edge, PathFinder, Zone, ZoneGraph};
///
/// let graph = ZoneGraph::new(
///     vec![
///         Zone::new("a", "A", "Alpha"),
///         Zone::new("b", "B", "Bravo"),
///         Zone::new("c", "C", "Charlie"),
///     ],
///     vec![
///         Edge::new("a", "b", 5.0),
///         Edge::new("b", "c", 3.0),
///         Edge::new("a", "c", 10.0),
///     ],
/// )?;
/// let finder = PathFinder::new(&graph);
/// let path = finder.shortest_path(0, 2).expect("reachable");
/// assert_eq!(path.codes(&graph), ["A", "B", "C"]);
/// assert_eq!(path.distance(), 8.0);
/// # Ok::<(), siren_core::GraphError>(())
/// ```
#[derive(Debug, Clone)]
pub struct PathFinder {
    adjacency: Vec<Vec<(usize, f64)>>,
}

impl PathFinder {
    /// Build the adjacency list for a snapshot.
    #[must_use]
    pub fn new(graph: &ZoneGraph) -> Self {
        let mut adjacency = vec![Vec::new(); graph.zone_count()];
        for edge in graph.edges() {
            if let Some(neighbours) = adjacency.get_mut(edge.from) {
                neighbours.push((edge.to, edge.weight));
            }
            if let Some(neighbours) = adjacency.get_mut(edge.to) {
                neighbours.push((edge.from, edge.weight));
            }
        }
        Self { adjacency }
    }

    /// Shortest path from `from` to `to`, or `None` when unreachable or
    /// either index is out of range.
    #[must_use]
    pub fn shortest_path(&self, from: usize, to: usize) -> Option<ShortestPath> {
        if to >= self.adjacency.len() {
            return None;
        }
        if from == to {
            return Some(ShortestPath::stay(from));
        }
        self.run(from, Some(to))?.path_to(to)
    }

    /// Distances from `source` to every reachable zone.
    #[must_use]
    pub fn distances_from(&self, source: usize) -> Option<ShortestPathTree> {
        self.run(source, None)
    }

    #[expect(
        clippy::float_arithmetic,
        reason = "path lengths are sums of floating-point edge weights"
    )]
    fn run(&self, source: usize, target: Option<usize>) -> Option<ShortestPathTree> {
        let zone_count = self.adjacency.len();
        if source >= zone_count {
            return None;
        }
        let mut distances: Vec<Option<f64>> = vec![None; zone_count];
        let mut previous: Vec<Option<usize>> = vec![None; zone_count];
        let mut settled = vec![false; zone_count];
        let mut frontier = BinaryHeap::new();

        set(&mut distances, source, Some(0.0));
        frontier.push(Reverse(Frontier {
            distance: 0.0,
            zone: source,
        }));

        while let Some(Reverse(Frontier { distance, zone })) = frontier.pop() {
            match settled.get_mut(zone) {
                Some(done) if !*done => *done = true,
                _ => continue,
            }
            if Some(zone) == target {
                break;
            }
            let Some(neighbours) = self.adjacency.get(zone) else {
                continue;
            };
            for &(next, weight) in neighbours {
                if settled.get(next).copied().unwrap_or(true) {
                    continue;
                }
                let candidate = distance + weight;
                let improves = distances
                    .get(next)
                    .copied()
                    .flatten()
                    .is_none_or(|known| candidate < known);
                if improves {
                    set(&mut distances, next, Some(candidate));
                    set(&mut previous, next, Some(zone));
                    frontier.push(Reverse(Frontier {
                        distance: candidate,
                        zone: next,
                    }));
                }
            }
        }

        Some(ShortestPathTree {
            source,
            distances,
            previous,
        })
    }
}

fn set<T>(slots: &mut [T], index: usize, value: T) {
    if let Some(slot) = slots.get_mut(index) {
        *slot = value;
    }
}
