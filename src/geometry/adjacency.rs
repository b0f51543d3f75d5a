use super::rectangle::{Rectangle, SharedBounds, Side};
use std::collections::{BTreeMap, VecDeque};

/// Touching relation between two rectangles of an indexed list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjacencyEdge {
    /// Lower index of the pair
    pub a: usize,
    /// Higher index of the pair
    pub b: usize,
    /// Shared bounds of `a` measured against `b`
    pub sides: SharedBounds,
    /// Gap between the two rectangles, zero when touching
    pub distance: i32,
}

/// Identity of one side pairing inside a canonical graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub a: usize,
    pub b: usize,
    pub a_side: Side,
    pub b_side: Side,
}

/// Order-independent form of an adjacency graph, comparable by equality
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CanonicalGraph {
    node_count: usize,
    edges: BTreeMap<EdgeKey, i32>,
}

impl CanonicalGraph {
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn distance(&self, key: &EdgeKey) -> Option<i32> {
        self.edges.get(key).copied()
    }

    pub fn contains(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EdgeKey, &i32)> {
        self.edges.iter()
    }

    /// Copy of this graph without the given edge
    pub fn without(&self, key: &EdgeKey) -> CanonicalGraph {
        let mut pruned = self.clone();
        pruned.edges.remove(key);
        pruned
    }
}

/// Edge-adjacency graph over a list of rectangles.
///
/// Indices refer to the rectangle slice passed to [`AdjacencyGraph::build`]
/// and are only meaningful for that slice.
#[derive(Debug, Clone)]
pub struct AdjacencyGraph {
    node_count: usize,
    edges: Vec<AdjacencyEdge>,
    neighbors: Vec<Vec<usize>>,
}

impl AdjacencyGraph {
    /// Record an edge for every pair of rectangles sharing at least one bound.
    ///
    /// Candidates are swept in x order and the inner scan stops as soon as a
    /// rectangle starts past `right + tolerance`, which cannot be near.
    pub fn build(rects: &[Rectangle], tolerance: i32) -> Self {
        let mut order: Vec<usize> = (0..rects.len()).collect();
        order.sort_by_key(|&index| (rects[index].x, index));

        let mut edges = Vec::new();
        for (position, &first) in order.iter().enumerate() {
            let reach = rects[first].right() + tolerance;
            for &second in &order[position + 1..] {
                if rects[second].x > reach {
                    break;
                }

                let (a, b) = if first < second {
                    (first, second)
                } else {
                    (second, first)
                };
                let sides = rects[a].shared_bounds(&rects[b], tolerance);
                if sides.has_shared_bounds() {
                    edges.push(AdjacencyEdge {
                        a,
                        b,
                        sides,
                        distance: rects[a].gap_to(&rects[b]),
                    });
                }
            }
        }
        edges.sort_by_key(|edge| (edge.a, edge.b));

        let mut neighbors = vec![Vec::new(); rects.len()];
        for edge in &edges {
            neighbors[edge.a].push(edge.b);
            neighbors[edge.b].push(edge.a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
        }

        Self {
            node_count: rects.len(),
            edges,
            neighbors,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edges(&self) -> &[AdjacencyEdge] {
        &self.edges
    }

    /// Adjacent indices in ascending order
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.neighbors.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_between(&self, first: usize, second: usize) -> Option<&AdjacencyEdge> {
        let (a, b) = (first.min(second), first.max(second));
        self.edges.iter().find(|edge| edge.a == a && edge.b == b)
    }

    /// Breadth-first visitation from `start`; an out-of-range start yields nothing
    pub fn breadth_order(&self, start: usize) -> BreadthOrder<'_> {
        let mut visited = vec![false; self.node_count];
        let mut queue = VecDeque::new();
        if start < self.node_count {
            visited[start] = true;
            queue.push_back(Visit {
                index: start,
                parent: None,
            });
        }

        BreadthOrder {
            graph: self,
            queue,
            visited,
        }
    }

    pub fn canonical(&self) -> CanonicalGraph {
        let mut edges = BTreeMap::new();
        for edge in &self.edges {
            for (a_side, b_side) in edge.sides.pairs() {
                edges.insert(
                    EdgeKey {
                        a: edge.a,
                        b: edge.b,
                        a_side,
                        b_side,
                    },
                    edge.distance,
                );
            }
        }

        CanonicalGraph {
            node_count: self.node_count,
            edges,
        }
    }
}

/// A rectangle reached during a breadth-first walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    pub index: usize,
    /// Already-visited neighbour the rectangle was discovered from
    pub parent: Option<usize>,
}

/// Iterator returned by [`AdjacencyGraph::breadth_order`]
#[derive(Debug, Clone)]
pub struct BreadthOrder<'a> {
    graph: &'a AdjacencyGraph,
    queue: VecDeque<Visit>,
    visited: Vec<bool>,
}

impl Iterator for BreadthOrder<'_> {
    type Item = Visit;

    fn next(&mut self) -> Option<Visit> {
        let visit = self.queue.pop_front()?;
        for &neighbor in self.graph.neighbors(visit.index) {
            if !self.visited[neighbor] {
                self.visited[neighbor] = true;
                self.queue.push_back(Visit {
                    index: neighbor,
                    parent: Some(visit.index),
                });
            }
        }
        Some(visit)
    }
}
