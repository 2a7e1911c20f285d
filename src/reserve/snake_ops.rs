use tracing::{debug, trace};

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::model::{Dir, EdgeId, End, SnakeId, VertexId};

use super::intervals::{free_run, grow_span, release_span};
use super::{Oracle, ReservationEngine, Snake};

/// Geometry of a snake end resolved against the graph: the edge the end
/// sits on, the positions of the end vertex and the end point, and the
/// direction from the end vertex toward the interior.
struct EndFrame {
    edge: EdgeId,
    seg: i64,
    p_ev: i64,
    p_end: i64,
    dir_in: Dir,
    edge_len: i64,
}

impl ReservationEngine {
    /// Extends the snake by up to `by` units at `end`, consulting the
    /// oracle at every branching choice. Returns the units actually
    /// grown; growth stops early at a refused choice, a foreign
    /// reservation, or a vertex another snake occupies.
    pub fn grow(
        &mut self,
        graph: &Graph,
        id: SnakeId,
        end: End,
        by: i64,
        oracle: &mut dyn Oracle,
    ) -> Result<i64> {
        if by < 0 {
            return Err(GraphError::BadLength(by));
        }
        let before = self.snake(id)?.occupied_vertices();
        let result = self.grow_steps(graph, id, end, by, oracle);
        if let Some(snake) = self.snakes.get(&id) {
            let after = snake.occupied_vertices();
            self.reconcile_occupancy(id, &before, &after);
        }
        let grown = result?;
        debug!(snake = %id, %end, by, grown, "snake.grow");
        Ok(grown)
    }

    /// Contracts the snake by up to `by` units at `end`. Contracting past
    /// the snake's length collapses it onto its opposite end; the snake
    /// itself is never deleted.
    pub fn shrink(&mut self, graph: &Graph, id: SnakeId, end: End, by: i64) -> Result<i64> {
        if by < 0 {
            return Err(GraphError::BadLength(by));
        }
        let before = self.snake(id)?.occupied_vertices();
        let result = self.shrink_steps(graph, id, end, by);
        if let Some(snake) = self.snakes.get(&id) {
            let after = snake.occupied_vertices();
            self.reconcile_occupancy(id, &before, &after);
        }
        let shrunk = result?;
        debug!(snake = %id, %end, by, shrunk, "snake.shrink");
        Ok(shrunk)
    }

    /// Translates the snake: grows at `end`, then shrinks the opposite
    /// end by whatever was achieved, preserving length. Negative `by`
    /// moves the other way. Returns the signed net displacement.
    pub fn move_end(
        &mut self,
        graph: &Graph,
        id: SnakeId,
        end: End,
        by: i64,
        oracle: &mut dyn Oracle,
    ) -> Result<i64> {
        if by < 0 {
            let moved = self.move_end(graph, id, end.opposite(), -by, oracle)?;
            return Ok(-moved);
        }
        let grown = self.grow(graph, id, end, by, oracle)?;
        let shrunk = self.shrink(graph, id, end.opposite(), grown)?;
        if shrunk != grown {
            return Err(GraphError::internal(format!(
                "move of {id} grew {grown} but released {shrunk}"
            )));
        }
        Ok(grown)
    }

    fn grow_steps(
        &mut self,
        graph: &Graph,
        id: SnakeId,
        end: End,
        by: i64,
        oracle: &mut dyn Oracle,
    ) -> Result<i64> {
        let mut remaining = by;
        let mut grown = 0i64;
        while remaining > 0 {
            let snake = self.snake(id)?;
            let at_vertex = snake.chain.len() == 1 || end_offset(snake, end) == 0;

            if !at_vertex {
                // Slack left on the end edge: advance toward the end vertex.
                let frame = end_frame(graph, snake, end)?;
                let off = end_offset(snake, end);
                let toward_ev = frame.dir_in.flip();
                let limit = match toward_ev {
                    Dir::Up => frame.edge_len,
                    Dir::Down => 0,
                };
                let free = free_run(self.spans_on(frame.edge), frame.p_end, toward_ev, limit);
                let take = remaining.min(off).min(free);
                if take > 0 {
                    let to = frame.p_end + take * toward_ev.sign();
                    let (lo, hi) = ordered(frame.p_end, to);
                    grow_span(
                        self.spans.entry(frame.edge).or_default(),
                        frame.edge,
                        id,
                        lo,
                        hi,
                    )?;
                    let snake = self.snake_mut(id)?;
                    set_end_offset(snake, end, off - take);
                    snake.length += take;
                    remaining -= take;
                    grown += take;
                }
                if end_offset(self.snake(id)?, end) > 0 && remaining > 0 {
                    trace!(snake = %id, %end, "snake.grow.blocked_on_edge");
                    break;
                }
                continue;
            }

            // The end sits on its vertex: pick the next edge, if any.
            let snake = self.snake(id)?;
            let ev = end_vertex(snake, end);
            let shared = self
                .occupants
                .get(&ev)
                .is_some_and(|set| set.iter().any(|&o| o != id));
            if shared {
                trace!(snake = %id, at = %ev, "snake.grow.vertex_contended");
                break;
            }
            let prev = if snake.chain.len() == 1 {
                ev
            } else {
                inner_vertex(snake, end)
            };
            let candidates = graph.routable_from(ev, prev)?;
            if candidates.is_empty() {
                break;
            }
            let offered: Vec<VertexId> = candidates.iter().map(|&(v, _)| v).collect();
            let Some(choice) = oracle.choose(ev, &offered) else {
                trace!(snake = %id, at = %ev, "snake.grow.oracle_declined");
                break;
            };
            let Some(&(next, edge)) = candidates.iter().find(|&&(v, _)| v == choice) else {
                return Err(GraphError::OracleChoiceInvalid {
                    at: ev,
                    chosen: choice,
                });
            };

            let e = graph.edge(edge)?;
            let p_ev = stop_position(graph, edge, ev)?;
            let p_next = stop_position(graph, edge, next)?;
            let toward_next = if p_next > p_ev { Dir::Up } else { Dir::Down };
            let limit = match toward_next {
                Dir::Up => e.length(),
                Dir::Down => 0,
            };
            if free_run(self.spans_on(edge), p_ev, toward_next, limit) == 0 {
                trace!(snake = %id, along = %edge, "snake.grow.entry_reserved");
                break;
            }
            let snake = self.snake_mut(id)?;
            match end {
                End::Head => snake.chain.insert(0, next),
                End::Tail => snake.chain.push(next),
            }
            set_end_offset(snake, end, (p_next - p_ev).abs());
        }
        Ok(grown)
    }

    fn shrink_steps(&mut self, graph: &Graph, id: SnakeId, end: End, by: i64) -> Result<i64> {
        let mut remaining = by.min(self.snake(id)?.length);
        let mut shrunk = 0i64;
        while remaining > 0 {
            let snake = self.snake(id)?;
            let chain_len = snake.chain.len();
            if chain_len < 2 {
                return Err(GraphError::internal(format!(
                    "{id} has positive length but a point chain"
                )));
            }
            let frame = end_frame(graph, snake, end)?;
            let off = end_offset(snake, end);
            let covered_here = if chain_len == 2 {
                snake.length
            } else {
                frame.seg - off
            };
            if covered_here <= 0 {
                return Err(GraphError::internal(format!(
                    "{id} end edge carries no coverage to release"
                )));
            }
            let take = remaining.min(covered_here);
            let to = frame.p_end + take * frame.dir_in.sign();
            let (lo, hi) = ordered(frame.p_end, to);
            release_span(
                self.spans.entry(frame.edge).or_default(),
                frame.edge,
                id,
                lo,
                hi,
            )?;
            if self.spans.get(&frame.edge).is_some_and(Vec::is_empty) {
                self.spans.remove(&frame.edge);
            }
            let snake = self.snake_mut(id)?;
            set_end_offset(snake, end, off + take);
            snake.length -= take;
            remaining -= take;
            shrunk += take;

            // The end swallowed its whole edge share: retire the end
            // vertex from the chain.
            if chain_len > 2 && off + take == frame.seg {
                match end {
                    End::Head => {
                        snake.chain.remove(0);
                    }
                    End::Tail => {
                        snake.chain.pop();
                    }
                }
                set_end_offset(snake, end, 0);
            }
        }

        // A snake collapsed exactly onto a vertex becomes a plain point
        // there.
        let snake = self.snake(id)?;
        if snake.length == 0 && snake.chain.len() == 2 {
            let seg = end_frame(graph, snake, End::Head)?.seg;
            let (v0, v1) = (snake.chain[0], snake.chain[1]);
            let (h, t) = (snake.head_offset, snake.tail_offset);
            let point = if h == 0 && t == seg {
                Some(v0)
            } else if t == 0 && h == seg {
                Some(v1)
            } else {
                None
            };
            if let Some(v) = point {
                let snake = self.snake_mut(id)?;
                snake.chain = vec![v];
                snake.head_offset = 0;
                snake.tail_offset = 0;
            }
        }
        Ok(shrunk)
    }

    fn snake_mut(&mut self, id: SnakeId) -> Result<&mut Snake> {
        self.snakes
            .get_mut(&id)
            .ok_or_else(|| GraphError::unknown_snake(id))
    }
}

fn end_vertex(snake: &Snake, end: End) -> VertexId {
    match end {
        End::Head => snake.chain[0],
        End::Tail => snake.chain[snake.chain.len() - 1],
    }
}

fn inner_vertex(snake: &Snake, end: End) -> VertexId {
    match end {
        End::Head => snake.chain[1],
        End::Tail => snake.chain[snake.chain.len() - 2],
    }
}

fn end_offset(snake: &Snake, end: End) -> i64 {
    match end {
        End::Head => snake.head_offset,
        End::Tail => snake.tail_offset,
    }
}

fn set_end_offset(snake: &mut Snake, end: End, value: i64) {
    match end {
        End::Head => snake.head_offset = value,
        End::Tail => snake.tail_offset = value,
    }
}

fn ordered(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn stop_position(graph: &Graph, edge: EdgeId, v: VertexId) -> Result<i64> {
    graph
        .edge(edge)?
        .position_of(v)
        .ok_or_else(|| GraphError::internal(format!("{v} expected on {edge}")))
}

/// Resolves where a snake end currently sits.
fn end_frame(graph: &Graph, snake: &Snake, end: End) -> Result<EndFrame> {
    let ev = end_vertex(snake, end);
    let inner = inner_vertex(snake, end);
    let edge = graph.edge_between(ev, inner)?;
    let e = graph.edge(edge)?;
    let p_ev = stop_position(graph, edge, ev)?;
    let p_inner = stop_position(graph, edge, inner)?;
    let dir_in = if p_inner > p_ev { Dir::Up } else { Dir::Down };
    let off = end_offset(snake, end);
    Ok(EndFrame {
        edge,
        seg: (p_inner - p_ev).abs(),
        p_ev,
        p_end: p_ev + off * dir_in.sign(),
        dir_in,
        edge_len: e.length(),
    })
}
