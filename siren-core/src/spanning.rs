//! Minimum spanning forest over the zone network (Kruskal).
//!
//! The forest is advisory: it backs network views and display, never the
//! routing decision. Routes always come from [`crate::PathFinder`] over the
//! full edge set, because the forest may omit a shorter cross-branch edge.

use std::cmp::Ordering;

use log::debug;

use crate::ZoneGraph;

/// Union-find over dense zone indices with path compression and
/// union-by-rank.
#[derive(Debug, Clone)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    /// Representative of the set containing `node`.
    pub(crate) fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while let Some(&parent) = self.parent.get(root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut current = node;
        while current != root {
            let Some(slot) = self.parent.get_mut(current) else {
                break;
            };
            current = std::mem::replace(slot, root);
        }
        root
    }

    /// Merge the sets holding `a` and `b`; `false` when already joined.
    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }

        let rank_a = self.rank.get(root_a).copied().unwrap_or_default();
        let rank_b = self.rank.get(root_b).copied().unwrap_or_default();
        let (child, parent) = match rank_a.cmp(&rank_b) {
            Ordering::Less => (root_a, root_b),
            Ordering::Greater | Ordering::Equal => (root_b, root_a),
        };
        if let Some(slot) = self.parent.get_mut(child) {
            *slot = parent;
        }
        if rank_a == rank_b
            && let Some(rank) = self.rank.get_mut(parent)
        {
            *rank = rank.saturating_add(1);
        }
        true
    }
}

/// An edge accepted into the spanning forest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestEdge {
    /// Position of the edge in the snapshot's edge list.
    pub edge: usize,
    /// Index of the first endpoint.
    pub from: usize,
    /// Index of the second endpoint.
    pub to: usize,
    /// Edge weight.
    pub weight: f64,
}

/// A forest edge expressed with zone codes, for display.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeView {
    /// Code of the first endpoint.
    pub source: String,
    /// Code of the second endpoint.
    pub dest: String,
    /// Edge weight.
    pub weight: f64,
}

/// Minimum spanning forest: one tree per connected component.
#[derive(Debug, Clone)]
pub struct SpanningForest {
    edges: Vec<ForestEdge>,
    component_of: Vec<usize>,
    components: usize,
}

impl SpanningForest {
    /// Accepted edges in acceptance order (ascending weight).
    #[must_use]
    pub fn edges(&self) -> &[ForestEdge] {
        &self.edges
    }

    /// Number of connected components, isolated zones included.
    #[must_use]
    pub const fn component_count(&self) -> usize {
        self.components
    }

    /// Whether two zones lie in the same component.
    #[must_use]
    pub fn connected(&self, a: usize, b: usize) -> bool {
        match (self.component_of.get(a), self.component_of.get(b)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// Sum of accepted edge weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|edge| edge.weight).sum()
    }

    /// Forest edges belonging to the component that contains `zone`.
    pub fn restricted_to(&self, zone: usize) -> impl Iterator<Item = &ForestEdge> + '_ {
        let component = self.component_of.get(zone).copied();
        self.edges.iter().filter(move |edge| {
            component.is_some() && self.component_of.get(edge.from).copied() == component
        })
    }

    /// Code-level view of `edges`, skipping any whose endpoints are unknown.
    pub fn views<'a>(
        graph: &'a ZoneGraph,
        edges: impl IntoIterator<Item = &'a ForestEdge> + 'a,
    ) -> impl Iterator<Item = EdgeView> + 'a {
        edges.into_iter().filter_map(|edge| {
            Some(EdgeView {
                source: graph.code(edge.from)?.to_owned(),
                dest: graph.code(edge.to)?.to_owned(),
                weight: edge.weight,
            })
        })
    }
}

/// Builds a [`SpanningForest`] with Kruskal's algorithm.
///
/// Edges are considered in ascending weight order; equal weights keep their
/// input order, so the result is deterministic for a given snapshot.
///
/// # Examples
///
/// ```
/// use siren_core::{Edge, SpanningTreeBuilder, Zone, ZoneGraph};
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
/// let forest = SpanningTreeBuilder::new(&graph).build();
/// assert_eq!(forest.edges().len(), 2);
/// assert_eq!(forest.total_weight(), 8.0);
/// assert_eq!(forest.component_count(), 1);
/// # Ok::<(), siren_core::GraphError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SpanningTreeBuilder<'a> {
    graph: &'a ZoneGraph,
}

impl<'a> SpanningTreeBuilder<'a> {
    /// Prepare a builder over a snapshot.
    #[must_use]
    pub const fn new(graph: &'a ZoneGraph) -> Self {
        Self { graph }
    }

    /// Compute the minimum spanning forest.
    #[must_use]
    pub fn build(&self) -> SpanningForest {
        let zone_count = self.graph.zone_count();
        let edges = self.graph.edges();

        let mut order: Vec<usize> = (0..edges.len()).collect();
        // `sort_by` is stable, which is what keeps ties in input order.
        order.sort_by(|&a, &b| match (edges.get(a), edges.get(b)) {
            (Some(left), Some(right)) => left.weight.total_cmp(&right.weight),
            _ => Ordering::Equal,
        });

        let spanning_size = zone_count.saturating_sub(1);
        let mut sets = DisjointSet::new(zone_count);
        let mut accepted = Vec::with_capacity(spanning_size);
        for position in order {
            // |V| - 1 accepted edges proves the graph is connected.
            if accepted.len() == spanning_size {
                break;
            }
            let Some(edge) = edges.get(position) else {
                continue;
            };
            if sets.union(edge.from, edge.to) {
                accepted.push(ForestEdge {
                    edge: position,
                    from: edge.from,
                    to: edge.to,
                    weight: edge.weight,
                });
            }
        }

        let component_of: Vec<usize> = (0..zone_count).map(|zone| sets.find(zone)).collect();
        let components = zone_count - accepted.len();
        debug!(
            "spanning forest: {} edges over {} zones, {} component(s)",
            accepted.len(),
            zone_count,
            components
        );

        SpanningForest {
            edges: accepted,
            component_of,
            components,
        }
    }
}
