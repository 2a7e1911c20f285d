use std::collections::BTreeSet;

use smallvec::SmallVec;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::model::{Dir, Edge, EdgeId, Pair, Stop, Vertex, VertexId};

use super::Graph;

/// Everything an interval-keyed observer needs to rehome state after a
/// split: the original edge keeps its identifier for the `[0, cut)` flank,
/// `new_edge` takes the `[cut, length)` flank re-coordinated to start at 0.
#[derive(Clone, Copy, Debug)]
pub struct SplitOutcome {
    /// Identifier of the low flank (the original edge's id).
    pub edge: EdgeId,
    /// Identifier minted for the high flank.
    pub new_edge: EdgeId,
    /// The vertex inserted at the cut.
    pub via: VertexId,
    /// Cut position in the original edge's coordinates.
    pub cut: i64,
    /// Original edge length.
    pub length: i64,
    /// Low endpoint of the original edge.
    pub low: VertexId,
    /// High endpoint of the original edge.
    pub high: VertexId,
}

impl SplitOutcome {
    /// Distance from `v` (an endpoint of the original edge) to the cut.
    pub fn distance_to_cut(&self, v: VertexId) -> Option<i64> {
        if v == self.low {
            Some(self.cut)
        } else if v == self.high {
            Some(self.length - self.cut)
        } else {
            None
        }
    }
}

/// Seam between the graph and components that key state by
/// `(edge, position)`. The reservation engine implements this so splits
/// (including the temporary ones a search synthesizes) carry reservations
/// along, and so reverted splits restore them.
pub trait SplitHook {
    fn split_applied(&mut self, outcome: &SplitOutcome);
    fn split_reverted(&mut self, outcome: &SplitOutcome);
}

/// Hook for callers with no interval-keyed state.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSplitHook;

impl SplitHook for NoopSplitHook {
    fn split_applied(&mut self, _outcome: &SplitOutcome) {}
    fn split_reverted(&mut self, _outcome: &SplitOutcome) {}
}

/// Preview of a merge: which identifier survives and which is retired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergePlan {
    pub survivor: VertexId,
    pub retired: VertexId,
}

impl Graph {
    /// Creates an isolated vertex.
    pub fn add_vertex(&mut self) -> VertexId {
        let id = self.alloc_vertex_id();
        self.vertices.insert(id, Vertex::new(id));
        id
    }

    /// Creates an isolated vertex under a caller-chosen identifier.
    pub fn add_vertex_with_id(&mut self, id: VertexId) -> Result<VertexId> {
        if self.vertices.contains_key(&id) {
            return Err(GraphError::DuplicateId(id.to_string()));
        }
        self.claim_vertex_id(id);
        self.vertices.insert(id, Vertex::new(id));
        Ok(id)
    }

    /// Connects two existing vertices with a fresh edge of the given
    /// length. `a` becomes the low endpoint.
    pub fn connect(&mut self, a: VertexId, b: VertexId, length: i64) -> Result<EdgeId> {
        if a == b {
            return Err(GraphError::SameVertex(a));
        }
        if length <= 0 {
            return Err(GraphError::BadLength(length));
        }
        let va = self.vertex(a)?;
        let vb = self.vertex(b)?;
        if !self.shared_edges(va, vb).is_empty() {
            return Err(GraphError::AlreadyConnected(a, b));
        }

        let id = self.alloc_edge_id();
        self.edges.insert(id, Edge::new(id, a, b, length));
        self.vertex_mut(a)?.holders.insert(id);
        self.vertex_mut(b)?.holders.insert(id);
        self.refresh_siblings_around(&[a, b])?;
        debug!(edge = %id, low = %a, high = %b, length, "graph.connect");
        Ok(id)
    }

    /// Inserts `via` into the edge connecting `a` and `b` at integer
    /// position `at` measured from the `a` side (negative `at` measures
    /// from the `b` side). Passing `via = None` mints a fresh vertex.
    ///
    /// The edge is replaced by two flanks; see [`SplitOutcome`] for how
    /// identifiers and coordinates are assigned. Pairs referencing the
    /// reassigned flank are rewritten in place and a straight-through pair
    /// is installed at `via`.
    pub fn split(
        &mut self,
        a: VertexId,
        via: Option<VertexId>,
        b: VertexId,
        at: i64,
    ) -> Result<SplitOutcome> {
        self.split_with(a, via, b, at, &mut NoopSplitHook)
    }

    /// [`Graph::split`] with a [`SplitHook`] observing the rehoming.
    pub fn split_with(
        &mut self,
        a: VertexId,
        via: Option<VertexId>,
        b: VertexId,
        at: i64,
        hook: &mut dyn SplitHook,
    ) -> Result<SplitOutcome> {
        if a == b {
            return Err(GraphError::SameVertex(a));
        }
        let edge_id = self.edge_between(a, b)?;
        let edge = self.edge(edge_id)?;
        if edge.low_vertex() != a && edge.high_vertex() != a
            || edge.low_vertex() != b && edge.high_vertex() != b
        {
            // Both must be endpoints; interior stops cannot anchor a split.
            return Err(GraphError::NotConnected(a, b));
        }
        let length = edge.length;
        let from_a = if at < 0 { length + at } else { at };
        if from_a <= 0 || from_a >= length {
            return Err(GraphError::BadOffset {
                edge: edge_id,
                at,
            });
        }
        let cut = if edge.low_vertex() == a {
            from_a
        } else {
            length - from_a
        };
        if self.edge(edge_id)?.stop_index_at(cut).is_some() {
            return Err(GraphError::BadOffset { edge: edge_id, at });
        }
        if let Some(v) = via {
            let vertex = self.vertex(v)?;
            if v == a || v == b {
                return Err(GraphError::SplitOntoOccupiedVertex(v));
            }
            let va = self.vertex(a)?;
            let vb = self.vertex(b)?;
            if !self.shared_edges(vertex, va).is_empty()
                || !self.shared_edges(vertex, vb).is_empty()
            {
                return Err(GraphError::SplitOntoOccupiedVertex(v));
            }
        }

        self.split_edge_at(edge_id, cut, via, hook)
    }

    /// Splits `edge` at `cut` (edge coordinates), minting `via` when not
    /// supplied. Preconditions are the caller's business; this is the
    /// shared lower half of [`Graph::split`] and of endpoint
    /// materialization during a search.
    pub(crate) fn split_edge_at(
        &mut self,
        edge_id: EdgeId,
        cut: i64,
        via: Option<VertexId>,
        hook: &mut dyn SplitHook,
    ) -> Result<SplitOutcome> {
        let edge = self.edge(edge_id)?;
        let length = edge.length;
        if cut <= 0 || cut >= length || edge.stop_index_at(cut).is_some() {
            return Err(GraphError::BadOffset { edge: edge_id, at: cut });
        }
        let low = edge.low_vertex();
        let high = edge.high_vertex();
        let old_stops: SmallVec<[Stop; 2]> = edge.stops.clone();

        let via = match via {
            Some(v) => v,
            None => self.add_vertex(),
        };
        let new_edge = self.alloc_edge_id();

        // Low flank keeps the id and coordinates; high flank shifts by -cut.
        let mut low_stops: SmallVec<[Stop; 2]> = SmallVec::new();
        let mut high_stops: SmallVec<[Stop; 2]> = SmallVec::new();
        for stop in &old_stops {
            if stop.at < cut {
                low_stops.push(*stop);
            } else {
                high_stops.push(Stop {
                    at: stop.at - cut,
                    vertex: stop.vertex,
                });
            }
        }
        low_stops.push(Stop { at: cut, vertex: via });
        high_stops.insert(0, Stop { at: 0, vertex: via });

        {
            let e = self.edge_mut(edge_id)?;
            e.length = cut;
            e.stops = low_stops;
        }
        self.edges.insert(
            new_edge,
            Edge {
                id: new_edge,
                length: length - cut,
                stops: high_stops,
                siblings: BTreeSet::new(),
            },
        );

        // Holder bookkeeping: stops that moved to the high flank now hold
        // the new id instead of the old one.
        for stop in &old_stops {
            let v = self.vertex_mut(stop.vertex)?;
            if stop.at >= cut {
                v.holders.remove(&edge_id);
                v.holders.insert(new_edge);
            }
        }
        {
            let v = self.vertex_mut(via)?;
            v.holders.insert(edge_id);
            v.holders.insert(new_edge);
        }

        // Pairs at relocated stops keep their direction but follow the id.
        for stop in &old_stops {
            if stop.at < cut {
                continue;
            }
            let v = self.vertex_mut(stop.vertex)?;
            for pair in v.pairs.iter_mut() {
                *pair = pair.rewrite_edge(edge_id, new_edge, |d| d);
            }
        }

        // Straight-through pair at the cut keeps the two flanks routable.
        let through = Pair::new((edge_id, Dir::Down), (new_edge, Dir::Up));
        self.vertex_mut(via)?.add_pair(through);

        let mut affected: Vec<VertexId> = old_stops.iter().map(|s| s.vertex).collect();
        affected.push(via);
        self.refresh_siblings_around(&affected)?;

        let outcome = SplitOutcome {
            edge: edge_id,
            new_edge,
            via,
            cut,
            length,
            low,
            high,
        };
        hook.split_applied(&outcome);
        debug!(
            edge = %edge_id,
            new_edge = %new_edge,
            via = %via,
            cut,
            length,
            "graph.split"
        );
        Ok(outcome)
    }

    /// Reverses a split produced by [`Graph::split_edge_at`], restoring
    /// the original edge under its retained identifier and removing `via`.
    ///
    /// Only legal while `via` carries nothing beyond the straight-through
    /// pair the split installed; anything else means a caller kept using
    /// the synthesized vertex, which is a bug.
    pub(crate) fn unsplit(
        &mut self,
        outcome: &SplitOutcome,
        hook: &mut dyn SplitHook,
    ) -> Result<()> {
        let via = self.vertex(outcome.via)?;
        let expected = Pair::new((outcome.edge, Dir::Down), (outcome.new_edge, Dir::Up));
        if via.holders.len() != 2
            || !via.holders.contains(&outcome.edge)
            || !via.holders.contains(&outcome.new_edge)
        {
            return Err(GraphError::internal(format!(
                "cannot revert split: {} gained incidences",
                outcome.via
            )));
        }
        if via.pairs.len() != 1 || via.pairs[0] != expected {
            return Err(GraphError::internal(format!(
                "cannot revert split: {} gained pairs",
                outcome.via
            )));
        }

        let high_flank = self.edge(outcome.new_edge)?.clone();
        let cut = outcome.cut;

        {
            let e = self.edge_mut(outcome.edge)?;
            e.length = outcome.length;
            // Drop the via stop, then append the high flank shifted back.
            if e.stops.last().map(|s| s.vertex) != Some(outcome.via) {
                return Err(GraphError::internal(format!(
                    "cannot revert split: {} moved on {}",
                    outcome.via, outcome.edge
                )));
            }
            e.stops.pop();
            for stop in high_flank.stops.iter().skip(1) {
                e.stops.push(Stop {
                    at: stop.at + cut,
                    vertex: stop.vertex,
                });
            }
        }

        for stop in high_flank.stops.iter().skip(1) {
            let v = self.vertex_mut(stop.vertex)?;
            v.holders.remove(&outcome.new_edge);
            v.holders.insert(outcome.edge);
            for pair in v.pairs.iter_mut() {
                *pair = pair.rewrite_edge(outcome.new_edge, outcome.edge, |d| d);
            }
        }

        self.edges.remove(&outcome.new_edge);
        self.vertices.remove(&outcome.via);

        let affected: Vec<VertexId> = self
            .edge(outcome.edge)?
            .stops
            .iter()
            .map(|s| s.vertex)
            .collect();
        self.refresh_siblings_around(&affected)?;

        hook.split_reverted(outcome);
        debug!(edge = %outcome.edge, via = %outcome.via, "graph.unsplit");
        Ok(())
    }

    /// Authorizes through-traversal between the `via`-`a` and `via`-`b`
    /// directions at `via`. Returns whether the pair was newly added.
    pub fn join(&mut self, a: VertexId, via: VertexId, b: VertexId) -> Result<bool> {
        let edge_a = self.edge_between(via, a)?;
        let edge_b = self.edge_between(via, b)?;
        if edge_a == edge_b {
            return Err(GraphError::SameEdgeJoin { via, edge: edge_a });
        }
        let side_a = (edge_a, self.direction_at(edge_a, via, a)?);
        let side_b = (edge_b, self.direction_at(edge_b, via, b)?);
        let pair = Pair::new(side_a, side_b);
        let added = self.vertex_mut(via)?.add_pair(pair);
        if added {
            debug!(via = %via, toward_a = %a, toward_b = %b, "graph.join");
        }
        Ok(added)
    }

    /// Fuses two vertices into one. The survivor is the vertex with the
    /// larger holder set, ties keeping the first argument. Preflight
    /// rejects any outcome that would violate the one-shared-vertex or
    /// no-repeat invariants, leaving the graph untouched.
    pub fn merge(&mut self, a: VertexId, b: VertexId) -> Result<VertexId> {
        let plan = self.merge_plan(a, b)?;
        if plan.survivor == plan.retired {
            return Ok(plan.survivor);
        }
        let MergePlan { survivor, retired } = plan;

        let retired_holders: Vec<EdgeId> =
            self.vertex(retired)?.holders.iter().copied().collect();

        // Preflight: no edge may end up holding the survivor twice.
        for &eid in &retired_holders {
            if self.edge(eid)?.contains_vertex(survivor) {
                return Err(GraphError::MergeOnSameEdge {
                    vertex: survivor,
                    edge: eid,
                });
            }
        }
        // Preflight: no two distinct edges may end up sharing two vertices.
        self.check_double_connection(survivor, retired)?;

        // Commit: rewrite stops in place, union holders and pairs.
        for &eid in &retired_holders {
            let e = self.edge_mut(eid)?;
            for stop in e.stops.iter_mut() {
                if stop.vertex == retired {
                    stop.vertex = survivor;
                }
            }
        }
        let retired_vertex = self
            .vertices
            .remove(&retired)
            .ok_or_else(|| GraphError::unknown_vertex(retired))?;
        {
            let v = self.vertex_mut(survivor)?;
            for eid in retired_holders {
                v.holders.insert(eid);
            }
            for pair in retired_vertex.pairs {
                v.add_pair(pair);
            }
        }
        self.refresh_siblings_around(&[survivor])?;
        debug!(survivor = %survivor, retired = %retired, "graph.merge");
        Ok(survivor)
    }

    /// Which vertex would survive a `merge(a, b)` and which would retire.
    /// `a == b` previews as a no-op (`survivor == retired`).
    pub fn merge_plan(&self, a: VertexId, b: VertexId) -> Result<MergePlan> {
        let va = self.vertex(a)?;
        let vb = self.vertex(b)?;
        if a == b {
            return Ok(MergePlan {
                survivor: a,
                retired: a,
            });
        }
        let (survivor, retired) = if vb.holders.len() > va.holders.len() {
            (b, a)
        } else {
            (a, b)
        };
        Ok(MergePlan { survivor, retired })
    }

    fn check_double_connection(&self, survivor: VertexId, retired: VertexId) -> Result<()> {
        let mapped = |v: VertexId| if v == retired { survivor } else { v };
        let candidates: BTreeSet<EdgeId> = self
            .vertex(survivor)?
            .holders
            .union(&self.vertex(retired)?.holders)
            .copied()
            .collect();
        for &e1 in &candidates {
            let edge1 = self.edge(e1)?;
            // Post-merge partners of e1: its current siblings plus every
            // candidate (which all gain the survivor).
            let mut partners: BTreeSet<EdgeId> = edge1.siblings.clone();
            partners.extend(candidates.iter().copied());
            for &e2 in partners.iter().filter(|&&e2| e2 > e1) {
                let edge2 = self.edge(e2)?;
                let set1: BTreeSet<VertexId> =
                    edge1.stops.iter().map(|s| mapped(s.vertex)).collect();
                let shared = edge2
                    .stops
                    .iter()
                    .filter(|s| set1.contains(&mapped(s.vertex)))
                    .count();
                if shared > 1 {
                    return Err(GraphError::DoubleConnectionAfterMerge(e1, e2));
                }
            }
        }
        Ok(())
    }

    /// Direction along `edge` that departs `from` toward `toward`, both of
    /// which must be stops on it.
    pub(crate) fn direction_at(
        &self,
        edge: EdgeId,
        from: VertexId,
        toward: VertexId,
    ) -> Result<Dir> {
        let e = self.edge(edge)?;
        let p_from = e
            .position_of(from)
            .ok_or_else(|| GraphError::UnknownId(format!("{from} on {edge}")))?;
        let p_toward = e
            .position_of(toward)
            .ok_or_else(|| GraphError::UnknownId(format!("{toward} on {edge}")))?;
        if p_toward > p_from {
            Ok(Dir::Up)
        } else if p_toward < p_from {
            Ok(Dir::Down)
        } else {
            Err(GraphError::internal(format!(
                "{from} and {toward} share position {p_from} on {edge}"
            )))
        }
    }

    /// Recomputes the sibling cache of every edge incident to any of the
    /// given vertices. A full local recompute is cheap and cannot leave
    /// stale entries behind.
    pub(crate) fn refresh_siblings_around(&mut self, vertices: &[VertexId]) -> Result<()> {
        let mut edges: BTreeSet<EdgeId> = BTreeSet::new();
        for &v in vertices {
            edges.extend(self.vertex(v)?.holders.iter().copied());
        }
        for &eid in &edges {
            let stops: Vec<VertexId> = self
                .edge(eid)?
                .stops
                .iter()
                .map(|s| s.vertex)
                .collect();
            let mut siblings: BTreeSet<EdgeId> = BTreeSet::new();
            for v in stops {
                siblings.extend(self.vertex(v)?.holders.iter().copied());
            }
            siblings.remove(&eid);
            self.edge_mut(eid)?.siblings = siblings;
        }
        Ok(())
    }
}
