use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::error::{GraphError, Result};
use crate::graph::{Graph, SplitHook, SplitOutcome};
use crate::model::{EdgeId, SnakeId, VertexId};

mod intervals;
mod snake_ops;
mod verify;


pub use intervals::Span;

/// Steering callback consulted whenever a growing snake end faces a
/// branching choice. Candidates arrive ordered by the id of the edge
/// leading to them; the oracle returns one of them or `None` to stop.
pub trait Oracle {
    fn choose(&mut self, at: VertexId, candidates: &[VertexId]) -> Option<VertexId>;
}

impl<F> Oracle for F
where
    F: FnMut(VertexId, &[VertexId]) -> Option<VertexId>,
{
    fn choose(&mut self, at: VertexId, candidates: &[VertexId]) -> Option<VertexId> {
        self(at, candidates)
    }
}

/// Default steering: always take the first offered branch.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstCandidate;

impl Oracle for FirstCandidate {
    fn choose(&mut self, _at: VertexId, candidates: &[VertexId]) -> Option<VertexId> {
        candidates.first().copied()
    }
}

/// A contiguous train occupying integer measure along the network.
///
/// The chain `v0..vk` lists the vertices the snake's path threads, head
/// first. The head sits on the edge between `v0` and `v1`, `head_offset`
/// short of `v0`; the tail sits on the edge between `v(k-1)` and `vk`,
/// `tail_offset` short of `vk`. A chain of one vertex is a point snake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snake {
    pub(crate) length: i64,
    pub(crate) chain: Vec<VertexId>,
    pub(crate) head_offset: i64,
    pub(crate) tail_offset: i64,
}

impl Snake {
    pub fn length(&self) -> i64 {
        self.length
    }

    /// The vertex chain, head end first.
    pub fn vertices(&self) -> &[VertexId] {
        &self.chain
    }

    pub fn head_offset(&self) -> i64 {
        self.head_offset
    }

    pub fn tail_offset(&self) -> i64 {
        self.tail_offset
    }

    /// Vertices the snake's covered region actually touches. End vertices
    /// count only when the matching offset is zero; a point snake touches
    /// its single vertex.
    pub(crate) fn occupied_vertices(&self) -> BTreeSet<VertexId> {
        let mut out = BTreeSet::new();
        let k = self.chain.len();
        if k == 1 {
            out.insert(self.chain[0]);
            return out;
        }
        for &v in &self.chain[1..k - 1] {
            out.insert(v);
        }
        if self.head_offset == 0 {
            out.insert(self.chain[0]);
        }
        if self.tail_offset == 0 {
            out.insert(self.chain[k - 1]);
        }
        out
    }
}

/// Interval-reservation layer on top of a [`Graph`]. Holds only
/// identifiers and positions; every operation re-resolves them at the
/// graph it is handed.
#[derive(Clone, Debug, Default)]
pub struct ReservationEngine {
    pub(crate) spans: BTreeMap<EdgeId, Vec<Span>>,
    pub(crate) occupants: BTreeMap<VertexId, BTreeSet<SnakeId>>,
    pub(crate) snakes: BTreeMap<SnakeId, Snake>,
    next_snake: u64,
}

impl ReservationEngine {
    pub fn new() -> ReservationEngine {
        ReservationEngine::default()
    }

    pub fn snake(&self, id: SnakeId) -> Result<&Snake> {
        self.snakes
            .get(&id)
            .ok_or_else(|| GraphError::unknown_snake(id))
    }

    /// Snapshot of a snake's geometry.
    pub fn snake_state(&self, id: SnakeId) -> Result<Snake> {
        self.snake(id).cloned()
    }

    pub fn snake_count(&self) -> usize {
        self.snakes.len()
    }

    /// All snake ids in creation order.
    pub fn all_snakes(&self) -> impl Iterator<Item = SnakeId> + '_ {
        self.snakes.keys().copied()
    }

    /// Snakes currently touching `vertex`.
    pub fn occupants_of(&self, vertex: VertexId) -> impl Iterator<Item = SnakeId> + '_ {
        self.occupants
            .get(&vertex)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Reserved spans on `edge`, sorted by position.
    pub fn spans_on(&self, edge: EdgeId) -> &[Span] {
        self.spans.get(&edge).map_or(&[], Vec::as_slice)
    }

    /// Creates a zero-length snake sitting on `at`, which it occupies.
    pub fn add_snake(&mut self, graph: &Graph, at: VertexId) -> Result<SnakeId> {
        graph.vertex(at)?;
        let id = SnakeId(self.next_snake);
        self.next_snake += 1;
        self.snakes.insert(
            id,
            Snake {
                length: 0,
                chain: vec![at],
                head_offset: 0,
                tail_offset: 0,
            },
        );
        self.occupants.entry(at).or_default().insert(id);
        debug!(snake = %id, at = %at, "snake.add");
        Ok(id)
    }

    /// Releases everything the snake holds and forgets it.
    pub fn remove_snake(&mut self, id: SnakeId) -> Result<()> {
        if self.snakes.remove(&id).is_none() {
            return Err(GraphError::unknown_snake(id));
        }
        self.spans.retain(|_, list| {
            list.retain(|s| s.snake != id);
            !list.is_empty()
        });
        self.occupants.retain(|_, set| {
            set.remove(&id);
            !set.is_empty()
        });
        debug!(snake = %id, "snake.remove");
        Ok(())
    }

    /// Snakes sharing at least one vertex with `id`, in id order.
    pub fn query(&self, id: SnakeId) -> Result<Vec<SnakeId>> {
        let snake = self.snake(id)?;
        let mut out: BTreeSet<SnakeId> = BTreeSet::new();
        for v in snake.occupied_vertices() {
            if let Some(set) = self.occupants.get(&v) {
                out.extend(set.iter().copied());
            }
        }
        out.remove(&id);
        Ok(out.into_iter().collect())
    }

    /// Whether any snake's chain or occupancy references `vertex`. The
    /// façade consults this before letting a merge retire a vertex.
    pub fn references_vertex(&self, vertex: VertexId) -> bool {
        if self.occupants.get(&vertex).is_some_and(|s| !s.is_empty()) {
            return true;
        }
        self.snakes.values().any(|s| s.chain.contains(&vertex))
    }

    /// Applies the occupancy delta after a snake's geometry changed.
    pub(crate) fn reconcile_occupancy(
        &mut self,
        id: SnakeId,
        before: &BTreeSet<VertexId>,
        after: &BTreeSet<VertexId>,
    ) {
        for v in before.difference(after) {
            if let Some(set) = self.occupants.get_mut(v) {
                set.remove(&id);
                if set.is_empty() {
                    self.occupants.remove(v);
                }
            }
        }
        for v in after.difference(before) {
            self.occupants.entry(*v).or_default().insert(id);
        }
    }
}

impl SplitHook for ReservationEngine {
    /// Rehomes spans and snake chains across the two flanks of a split.
    fn split_applied(&mut self, outcome: &SplitOutcome) {
        let cut = outcome.cut;
        if let Some(list) = self.spans.remove(&outcome.edge) {
            let mut low_list = Vec::new();
            let mut high_list = Vec::new();
            for span in list {
                if span.high <= cut {
                    low_list.push(span);
                } else if span.low >= cut {
                    high_list.push(Span {
                        low: span.low - cut,
                        high: span.high - cut,
                        snake: span.snake,
                    });
                } else {
                    low_list.push(Span {
                        low: span.low,
                        high: cut,
                        snake: span.snake,
                    });
                    high_list.push(Span {
                        low: 0,
                        high: span.high - cut,
                        snake: span.snake,
                    });
                }
            }
            if !low_list.is_empty() {
                self.spans.insert(outcome.edge, low_list);
            }
            if !high_list.is_empty() {
                self.spans.insert(outcome.new_edge, high_list);
            }
        }

        let ids: Vec<SnakeId> = self.snakes.keys().copied().collect();
        for id in ids {
            let Some(snake) = self.snakes.get(&id) else { continue };
            let before = snake.occupied_vertices();
            let Some(snake) = self.snakes.get_mut(&id) else { continue };
            rethread_chain(snake, outcome);
            let after = self.snakes[&id].occupied_vertices();
            self.reconcile_occupancy(id, &before, &after);
        }
    }

    /// Restores spans and chains to the pre-split edge.
    fn split_reverted(&mut self, outcome: &SplitOutcome) {
        let cut = outcome.cut;
        let mut merged = self.spans.remove(&outcome.edge).unwrap_or_default();
        if let Some(high_list) = self.spans.remove(&outcome.new_edge) {
            for span in high_list {
                merged.push(Span {
                    low: span.low + cut,
                    high: span.high + cut,
                    snake: span.snake,
                });
            }
        }
        intervals::coalesce(&mut merged);
        if !merged.is_empty() {
            self.spans.insert(outcome.edge, merged);
        }

        let ids: Vec<SnakeId> = self.snakes.keys().copied().collect();
        for id in ids {
            let Some(snake) = self.snakes.get(&id) else { continue };
            let before = snake.occupied_vertices();
            let Some(snake) = self.snakes.get_mut(&id) else { continue };
            unthread_chain(snake, outcome);
            let after = self.snakes[&id].occupied_vertices();
            self.reconcile_occupancy(id, &before, &after);
        }
    }
}

/// Inserts `via` into a snake's chain wherever it crossed the split edge,
/// adjusting end offsets when the crossing is an end edge.
fn rethread_chain(snake: &mut Snake, outcome: &SplitOutcome) {
    let SplitOutcome {
        via,
        cut,
        length,
        low,
        high,
        ..
    } = *outcome;
    let dist_to_via = |v: VertexId| if v == low { cut } else { length - cut };
    let is_split_hop =
        |u: VertexId, w: VertexId| (u == low && w == high) || (u == high && w == low);

    let k = snake.chain.len();
    if k < 2 {
        return;
    }
    if k == 2 && is_split_hop(snake.chain[0], snake.chain[1]) {
        // Head and tail share the split edge.
        let (v0, v1) = (snake.chain[0], snake.chain[1]);
        let d0 = dist_to_via(v0);
        let h = snake.head_offset;
        let t = snake.tail_offset;
        // Covered stretch in distance-from-v0 terms: [h, length - t].
        if d0 > h && d0 < length - t {
            snake.chain = vec![v0, via, v1];
        } else if d0 == h && d0 == length - t {
            snake.chain = vec![via];
            snake.head_offset = 0;
            snake.tail_offset = 0;
        } else if d0 == h {
            snake.chain = vec![via, v1];
            snake.head_offset = 0;
        } else if d0 == length - t {
            snake.chain = vec![v0, via];
            snake.tail_offset = 0;
        } else if d0 < h {
            snake.chain = vec![via, v1];
            snake.head_offset = h - d0;
        } else {
            snake.chain = vec![v0, via];
            snake.tail_offset = t - (length - d0);
        }
        return;
    }

    let old = snake.chain.clone();
    let mut rebuilt: Vec<VertexId> = Vec::with_capacity(k + 2);
    rebuilt.push(old[0]);
    for i in 0..k - 1 {
        let (u, w) = (old[i], old[i + 1]);
        if !is_split_hop(u, w) {
            rebuilt.push(w);
            continue;
        }
        if i == 0 {
            let d0 = dist_to_via(u);
            if snake.head_offset < d0 {
                rebuilt.push(via);
            } else {
                rebuilt.pop();
                rebuilt.push(via);
                snake.head_offset -= d0;
            }
            rebuilt.push(w);
        } else if i == k - 2 {
            let dk = dist_to_via(w);
            if snake.tail_offset < dk {
                rebuilt.push(via);
                rebuilt.push(w);
            } else {
                rebuilt.push(via);
                snake.tail_offset -= dk;
            }
        } else {
            rebuilt.push(via);
            rebuilt.push(w);
        }
    }
    snake.chain = rebuilt;
}

/// Removes `via` from a snake's chain, undoing [`rethread_chain`].
fn unthread_chain(snake: &mut Snake, outcome: &SplitOutcome) {
    let SplitOutcome {
        via,
        cut,
        length,
        low,
        high,
        ..
    } = *outcome;

    if snake.chain.len() == 1 && snake.chain[0] == via {
        // A collapsed point exactly at the cut spreads back over the
        // restored edge.
        snake.chain = vec![high, low];
        snake.head_offset = length - cut;
        snake.tail_offset = cut;
        return;
    }

    if snake.chain[0] == via {
        let w = snake.chain[1];
        if w == low {
            snake.chain[0] = high;
            snake.head_offset += length - cut;
        } else if w == high {
            snake.chain[0] = low;
            snake.head_offset += cut;
        } else {
            error!(via = %via, "snake.unthread.unexpected_head_neighbour");
        }
    }
    let k = snake.chain.len();
    if k >= 2 && snake.chain[k - 1] == via {
        let w = snake.chain[k - 2];
        if w == low {
            snake.chain[k - 1] = high;
            snake.tail_offset += length - cut;
        } else if w == high {
            snake.chain[k - 1] = low;
            snake.tail_offset += cut;
        } else {
            error!(via = %via, "snake.unthread.unexpected_tail_neighbour");
        }
    }
    // Interior crossings collapse back into a single hop.
    let k = snake.chain.len();
    if k > 2 {
        let mut rebuilt = Vec::with_capacity(k);
        rebuilt.push(snake.chain[0]);
        for &v in &snake.chain[1..k - 1] {
            if v != via {
                rebuilt.push(v);
            }
        }
        rebuilt.push(snake.chain[k - 1]);
        snake.chain = rebuilt;
    }
}
