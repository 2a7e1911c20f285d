use crate::error::{GraphError, Result};
use crate::model::{Dir, EdgeId, Stop, VertexId};

use super::Graph;

/// Snapshot of one edge's endpoints and cached siblings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeDetails {
    pub edge: EdgeId,
    pub low_vertex: VertexId,
    pub high_vertex: VertexId,
    pub length: i64,
    pub siblings: Vec<EdgeId>,
}

/// A vertex located on an edge together with its immediate neighbours
/// along that edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexOnEdge {
    pub at: i64,
    pub prior: Option<Stop>,
    pub after: Option<Stop>,
}

/// The stretch of a single edge between two of its stops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub edge: EdgeId,
    /// Direction of travel from the first queried vertex to the second.
    pub dir: Dir,
    pub distance: i64,
    /// Stops strictly between the two, in travel order.
    pub between: Vec<VertexId>,
}

impl Graph {
    pub fn edge_details(&self, id: EdgeId) -> Result<EdgeDetails> {
        let e = self.edge(id)?;
        Ok(EdgeDetails {
            edge: id,
            low_vertex: e.low_vertex(),
            high_vertex: e.high_vertex(),
            length: e.length,
            siblings: e.siblings.iter().copied().collect(),
        })
    }

    /// Nearest stop to `at` on `edge`.
    ///
    /// `dir = None` picks the closest stop by absolute distance, ties
    /// preferring the lower side. `Some(Dir::Up)` wants the nearest stop
    /// strictly above `at`, `Some(Dir::Down)` strictly below; out-of-range
    /// positions resolve to the compatible endpoint when one exists.
    pub fn find_vertex(&self, edge: EdgeId, at: i64, dir: Option<Dir>) -> Result<Option<Stop>> {
        let e = self.edge(edge)?;
        let found = match dir {
            None => e
                .stops
                .iter()
                .min_by_key(|s| ((s.at - at).abs(), s.at))
                .copied(),
            Some(Dir::Up) => e.stops.iter().find(|s| s.at > at).copied(),
            Some(Dir::Down) => e.stops.iter().rev().find(|s| s.at < at).copied(),
        };
        Ok(found)
    }

    /// The vertex sitting exactly at `at`, if any.
    pub fn exact_vertex(&self, edge: EdgeId, at: i64) -> Result<Option<VertexId>> {
        let e = self.edge(edge)?;
        Ok(e.stop_index_at(at).map(|i| e.stops[i].vertex))
    }

    /// Position of `vertex` on `edge` plus its immediate neighbours there.
    pub fn vertex_on_edge(&self, edge: EdgeId, vertex: VertexId) -> Result<VertexOnEdge> {
        let e = self.edge(edge)?;
        let idx = e
            .stop_index_of(vertex)
            .ok_or_else(|| GraphError::UnknownId(format!("{vertex} on {edge}")))?;
        Ok(VertexOnEdge {
            at: e.stops[idx].at,
            prior: idx.checked_sub(1).map(|i| e.stops[i]),
            after: e.stops.get(idx + 1).copied(),
        })
    }

    /// Through-routable neighbour pairs at `vertex`: one entry per
    /// explicit pair, mapped to the vertices one step away along the
    /// paired directions, followed by an implicit straight-through entry
    /// for every edge on which `vertex` sits interior.
    pub fn pairs_at(&self, vertex: VertexId) -> Result<Vec<(VertexId, VertexId)>> {
        let v = self.vertex(vertex)?;
        let mut out = Vec::with_capacity(v.pairs.len());
        for pair in v.pairs() {
            let [sa, sb] = pair.sides();
            let na = self.step_from(vertex, sa)?;
            let nb = self.step_from(vertex, sb)?;
            out.push((na, nb));
        }
        for eid in v.holders() {
            let e = self.edge(eid)?;
            if let Some(idx) = e.stop_index_of(vertex) {
                if idx > 0 && idx + 1 < e.stops.len() {
                    out.push((e.stops[idx - 1].vertex, e.stops[idx + 1].vertex));
                }
            }
        }
        Ok(out)
    }

    /// Adjacent vertices across every incident edge, pairing ignored.
    /// Ordered by edge id, lower neighbour first, deduplicated.
    pub fn dirs_from(&self, vertex: VertexId) -> Result<Vec<VertexId>> {
        let v = self.vertex(vertex)?;
        let mut out = Vec::new();
        for eid in v.holders() {
            let e = self.edge(eid)?;
            if let Some(idx) = e.stop_index_of(vertex) {
                if idx > 0 {
                    push_unique(&mut out, e.stops[idx - 1].vertex);
                }
                if idx + 1 < e.stops.len() {
                    push_unique(&mut out, e.stops[idx + 1].vertex);
                }
            }
        }
        Ok(out)
    }

    /// Neighbours reachable from `vertex` given the incoming direction.
    ///
    /// With `prev == vertex` (no incoming direction) every adjacent
    /// vertex qualifies; otherwise only partners that some pair (explicit
    /// or implicit straight-through) couples with `prev`. Results carry
    /// the edge leading to each neighbour and are ordered by that edge's
    /// id — the order in which edges were connected to the vertex.
    pub fn routable_from(
        &self,
        vertex: VertexId,
        prev: VertexId,
    ) -> Result<Vec<(VertexId, EdgeId)>> {
        let reachable: Vec<VertexId> = if prev == vertex {
            self.dirs_from(vertex)?
        } else {
            let mut out = Vec::new();
            for (na, nb) in self.pairs_at(vertex)? {
                if na == prev {
                    push_unique(&mut out, nb);
                } else if nb == prev {
                    push_unique(&mut out, na);
                }
            }
            out
        };
        let mut with_edges = Vec::with_capacity(reachable.len());
        for n in reachable {
            with_edges.push((n, self.edge_between(vertex, n)?));
        }
        with_edges.sort_by_key(|&(_, e)| e);
        Ok(with_edges)
    }

    /// The segment between two vertices sharing an edge. The shared edge
    /// is unique in a healthy graph.
    pub fn find_between(&self, from: VertexId, to: VertexId) -> Result<Segment> {
        if from == to {
            return Err(GraphError::SameVertex(from));
        }
        let eid = self.edge_between(from, to)?;
        let e = self.edge(eid)?;
        let p_from = e
            .position_of(from)
            .ok_or_else(|| GraphError::internal(format!("{from} missing from {eid}")))?;
        let p_to = e
            .position_of(to)
            .ok_or_else(|| GraphError::internal(format!("{to} missing from {eid}")))?;
        let dir = if p_to > p_from { Dir::Up } else { Dir::Down };
        let (lo, hi) = (p_from.min(p_to), p_from.max(p_to));
        let mut between: Vec<VertexId> = e
            .stops
            .iter()
            .filter(|s| s.at > lo && s.at < hi)
            .map(|s| s.vertex)
            .collect();
        if dir == Dir::Down {
            between.reverse();
        }
        Ok(Segment {
            edge: eid,
            dir,
            distance: hi - lo,
            between,
        })
    }

    /// The vertex one step away from `from` along a pair side.
    fn step_from(&self, from: VertexId, side: (EdgeId, Dir)) -> Result<VertexId> {
        let (eid, dir) = side;
        let e = self.edge(eid)?;
        let idx = e.stop_index_of(from).ok_or_else(|| {
            GraphError::internal(format!("pair at {from} references foreign edge {eid}"))
        })?;
        let neighbour = match dir {
            Dir::Up => e.stops.get(idx + 1),
            Dir::Down => idx.checked_sub(1).and_then(|i| e.stops.get(i)),
        };
        neighbour.map(|s| s.vertex).ok_or_else(|| {
            GraphError::internal(format!("pair at {from} points off the end of {eid}"))
        })
    }
}

fn push_unique(out: &mut Vec<VertexId>, v: VertexId) {
    if !out.contains(&v) {
        out.push(v);
    }
}
