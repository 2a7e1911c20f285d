use std::collections::{HashMap, HashSet, VecDeque};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::{GraphError, Result};
use crate::model::{Dir, EdgeId, VertexId};

use super::build_ops::{NoopSplitHook, SplitHook, SplitOutcome};
use super::{Graph, DEFAULT_SEARCH_BUDGET};

/// One endpoint of a route search: a known vertex, or a position on an
/// edge with an optional vertex hint naming the side the route departs
/// from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchEnd {
    At(VertexId),
    On {
        edge: EdgeId,
        at: i64,
        prev: Option<VertexId>,
    },
}

impl SearchEnd {
    pub fn on(edge: EdgeId, at: i64) -> SearchEnd {
        SearchEnd::On {
            edge,
            at,
            prev: None,
        }
    }
}

/// One step of a found route. Endpoints that had to be synthesized come
/// back as free positions because the temporary vertex is gone by the
/// time the result is returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathPoint {
    Vertex(VertexId),
    Free { edge: EdgeId, at: i64 },
}

/// A materialized endpoint: the vertex standing in for it during the
/// expansion, the free-position label to report when synthesized, and the
/// seed neighbour derived from the caller's hint.
struct Anchor {
    vertex: VertexId,
    seed_prev: Option<VertexId>,
    free_label: Option<(EdgeId, i64)>,
}

impl Graph {
    /// Finds a route between two positions, respecting junction pairs.
    /// Synthesized endpoint vertices are cleaned up on every return path.
    pub fn search(&mut self, from: SearchEnd, to: SearchEnd) -> Result<Vec<PathPoint>> {
        self.search_with(from, to, DEFAULT_SEARCH_BUDGET, &mut NoopSplitHook)
    }

    /// [`Graph::search`] with an explicit expansion budget and a
    /// [`SplitHook`] observing the temporary endpoint splits.
    pub fn search_with(
        &mut self,
        from: SearchEnd,
        to: SearchEnd,
        budget: usize,
        hook: &mut dyn SplitHook,
    ) -> Result<Vec<PathPoint>> {
        self.search_inner(from, to, budget, hook).map(|(path, _)| path)
    }

    pub(crate) fn search_inner(
        &mut self,
        from: SearchEnd,
        to: SearchEnd,
        budget: usize,
        hook: &mut dyn SplitHook,
    ) -> Result<(Vec<PathPoint>, usize)> {
        // Materialize endpoints, tracking synthesized vertices for cleanup.
        let mut synthesized: Vec<SplitOutcome> = Vec::new();
        let source = match self.materialize(from, None, &mut synthesized, hook) {
            Ok(anchor) => anchor,
            Err(err) => {
                self.teardown(&mut synthesized, hook)?;
                return Err(err);
            }
        };
        let first_split = synthesized.last().copied();
        let target = match self.materialize(to, first_split.as_ref(), &mut synthesized, hook) {
            Ok(anchor) => anchor,
            Err(err) => {
                self.teardown(&mut synthesized, hook)?;
                return Err(err);
            }
        };

        let outcome = self.expand(&source, &target, budget);

        // Cleanup runs on every path, success or failure.
        self.teardown(&mut synthesized, hook)?;

        match outcome {
            Ok((chain, pops)) => {
                let path = chain
                    .into_iter()
                    .map(|v| label_point(v, &source, &target))
                    .collect();
                debug!(expansions = pops, "graph.search.found");
                Ok((path, pops))
            }
            Err((err, pops)) => {
                debug!(expansions = pops, error = %err, "graph.search.failed");
                Err(err)
            }
        }
    }

    /// Breadth-first expansion over `(prev, vertex)` hops. Pure: no graph
    /// mutation, so the caller can tear down synthesized vertices
    /// afterwards regardless of what happens here.
    fn expand(
        &self,
        source: &Anchor,
        target: &Anchor,
        budget: usize,
    ) -> std::result::Result<(Vec<VertexId>, usize), (GraphError, usize)> {
        if source.vertex == target.vertex {
            return Ok((vec![source.vertex], 0));
        }

        // The `prev == vertex` seed convention means "no incoming
        // direction"; `routable_from` then offers every neighbour.
        let seed = (source.seed_prev.unwrap_or(source.vertex), source.vertex);
        let mut frontier: VecDeque<(VertexId, VertexId)> = VecDeque::new();
        let mut parents: HashMap<(VertexId, VertexId), Option<(VertexId, VertexId)>> =
            HashMap::new();
        let mut visited: HashSet<(VertexId, VertexId)> = HashSet::new();
        frontier.push_back(seed);
        visited.insert(seed);
        parents.insert(seed, None);

        let mut pops = 0usize;
        while let Some(key) = frontier.pop_front() {
            pops += 1;
            if pops > budget {
                return Err((GraphError::SearchBudgetExceeded(budget), pops));
            }
            let (prev, v) = key;
            if v == target.vertex {
                let mut chain = vec![v];
                let mut cur = key;
                while let Some(Some(parent)) = parents.get(&cur) {
                    chain.push(parent.1);
                    cur = *parent;
                }
                chain.reverse();
                return Ok((chain, pops));
            }
            let hops = self.routable_from(v, prev).map_err(|e| (e, pops))?;
            for (w, edge) in hops {
                let next = (v, w);
                if visited.insert(next) {
                    trace!(from = %v, to = %w, along = %edge, "graph.search.hop");
                    parents.insert(next, Some(key));
                    frontier.push_back(next);
                }
            }
        }
        Err((GraphError::NoPath, pops))
    }

    fn materialize(
        &mut self,
        end: SearchEnd,
        earlier: Option<&SplitOutcome>,
        synthesized: &mut Vec<SplitOutcome>,
        hook: &mut dyn SplitHook,
    ) -> Result<Anchor> {
        let (edge, at, prev) = match end {
            SearchEnd::At(v) => {
                if !self.contains_vertex(v) {
                    return Err(GraphError::InvalidEndpoint(format!("unknown {v}")));
                }
                return Ok(Anchor {
                    vertex: v,
                    seed_prev: None,
                    free_label: None,
                });
            }
            SearchEnd::On { edge, at, prev } => (edge, at, prev),
        };

        if !self.contains_edge(edge) {
            return Err(GraphError::InvalidEndpoint(format!("unknown {edge}")));
        }
        let label = (edge, at);
        // The caller speaks in the coordinates the edge had before this
        // search touched it; an earlier endpoint split on the same edge
        // shifted the high flank.
        let same_line = earlier.filter(|s| s.edge == edge);
        let original_length = same_line.map_or_else(|| self.edge(edge).map(|e| e.length), |s| Ok(s.length))?;
        if at < 0 || at > original_length {
            return Err(GraphError::InvalidEndpoint(format!(
                "{at} outside [0, {original_length}] on {edge}"
            )));
        }
        let hint_side = match prev {
            None => None,
            Some(p) => {
                let p_at = self.original_position(edge, p, same_line).ok_or_else(|| {
                    GraphError::InvalidEndpoint(format!("hint {p} is not on {edge}"))
                })?;
                if p_at == at {
                    return Err(GraphError::InvalidEndpoint(format!(
                        "hint {p} coincides with the endpoint"
                    )));
                }
                Some(if p_at > at { Dir::Up } else { Dir::Down })
            }
        };
        let (flank, flank_at) = match same_line {
            Some(split) if at > split.cut => (split.new_edge, at - split.cut),
            _ => (edge, at),
        };

        // The line this endpoint lives on, as a set of flank edges; hints
        // must resolve along it and nowhere else.
        let mut line: SmallVec<[EdgeId; 3]> = SmallVec::new();
        line.push(edge);
        if let Some(split) = same_line {
            line.push(split.new_edge);
        }

        let vertex = match self.exact_vertex(flank, flank_at)? {
            Some(v) => v,
            None => {
                let outcome = self.split_edge_at(flank, flank_at, None, hook)?;
                synthesized.push(outcome);
                line.push(outcome.new_edge);
                outcome.via
            }
        };
        let free_label = synthesized
            .last()
            .filter(|s| s.via == vertex)
            .map(|_| label);

        let seed_prev = match hint_side {
            None => None,
            Some(side) => Some(self.line_neighbour(vertex, side, &line).ok_or_else(|| {
                GraphError::InvalidEndpoint(format!(
                    "no stop on the {side:?} side of the endpoint on {edge}"
                ))
            })?),
        };
        Ok(Anchor {
            vertex,
            seed_prev,
            free_label,
        })
    }

    /// Position of `p` in the coordinates the caller used, undoing the
    /// shift an earlier same-search split applied to the high flank.
    fn original_position(
        &self,
        edge: EdgeId,
        p: VertexId,
        same_line: Option<&SplitOutcome>,
    ) -> Option<i64> {
        if let Ok(e) = self.edge(edge) {
            if let Some(at) = e.position_of(p) {
                return Some(at);
            }
        }
        let split = same_line?;
        let e = self.edge(split.new_edge).ok()?;
        e.position_of(p).map(|at| at + split.cut)
    }

    /// Adjacent stop of `v` in direction `side`, restricted to the given
    /// line of flank edges.
    fn line_neighbour(&self, v: VertexId, side: Dir, line: &[EdgeId]) -> Option<VertexId> {
        for &eid in line {
            let Ok(e) = self.edge(eid) else { continue };
            let Some(idx) = e.stop_index_of(v) else { continue };
            let neighbour = match side {
                Dir::Up => e.stops.get(idx + 1),
                Dir::Down => idx.checked_sub(1).and_then(|i| e.stops.get(i)),
            };
            if let Some(stop) = neighbour {
                return Some(stop.vertex);
            }
        }
        None
    }

    /// Reverts synthesized endpoint splits, newest first so nested flanks
    /// unwind in order.
    fn teardown(
        &mut self,
        synthesized: &mut Vec<SplitOutcome>,
        hook: &mut dyn SplitHook,
    ) -> Result<()> {
        while let Some(outcome) = synthesized.pop() {
            self.unsplit(&outcome, hook)?;
        }
        Ok(())
    }
}

fn label_point(v: VertexId, source: &Anchor, target: &Anchor) -> PathPoint {
    if v == source.vertex {
        if let Some((edge, at)) = source.free_label {
            return PathPoint::Free { edge, at };
        }
    }
    if v == target.vertex {
        if let Some((edge, at)) = target.free_label {
            return PathPoint::Free { edge, at };
        }
    }
    PathPoint::Vertex(v)
}
