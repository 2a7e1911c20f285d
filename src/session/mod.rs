use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{GraphError, Result};
use crate::graph::{Graph, PathPoint, SearchEnd, VerifyReport};
use crate::model::{EdgeId, End, SnakeId, VertexId};
use crate::reserve::{FirstCandidate, Oracle, ReservationEngine, Snake};

mod config;
mod metrics;


pub use config::SessionConfig;
pub use metrics::SessionMetrics;

/// Fire-and-forget notifications: subscribers re-read whatever they need.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The network structure changed.
    Update,
    /// One or more snake positions changed.
    UpdateSnakes,
}

/// Where to seat a new snake: on a vertex, or anywhere along an edge
/// (which materializes a vertex there first).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    Vertex(VertexId),
    On { edge: EdgeId, at: i64 },
}

type Subscriber = Box<dyn FnMut(Event)>;

/// A stepped snake's standing state: which way it is heading and how it
/// steers at junctions.
struct Rider {
    heading: End,
    oracle: Box<dyn Oracle>,
}

/// Owner of one graph and one reservation engine. Forwards structural
/// edits, keeps reservations in sync across splits, drives registered
/// snakes one tick at a time, and fans out change notifications.
///
/// All operations run to completion before returning; callers on
/// multiple threads must serialize access themselves.
pub struct Session {
    graph: Graph,
    engine: ReservationEngine,
    riders: BTreeMap<SnakeId, Rider>,
    subscribers: Vec<Subscriber>,
    config: SessionConfig,
    metrics: SessionMetrics,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("vertices", &self.graph.vertex_count())
            .field("edges", &self.graph.edge_count())
            .field("snakes", &self.engine.snake_count())
            .field("subscribers", &self.subscribers.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Session::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Session {
        Session {
            graph: Graph::new(),
            engine: ReservationEngine::new(),
            riders: BTreeMap::new(),
            subscribers: Vec::new(),
            config,
            metrics: SessionMetrics::new(),
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn reservations(&self) -> &ReservationEngine {
        &self.engine
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Registers a notification sink.
    pub fn subscribe(&mut self, subscriber: impl FnMut(Event) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    // Structural edits, forwarded to the graph.

    pub fn add_vertex(&mut self) -> VertexId {
        let id = self.graph.add_vertex();
        self.metrics.vertices_created += 1;
        self.notify(Event::Update);
        id
    }

    pub fn connect(&mut self, a: VertexId, b: VertexId, length: i64) -> Result<EdgeId> {
        let edge = self.graph.connect(a, b, length)?;
        self.metrics.edges_created += 1;
        self.notify(Event::Update);
        Ok(edge)
    }

    /// Splits the edge between `a` and `b`, carrying reservations across
    /// the cut. Returns the inserted vertex.
    pub fn split(
        &mut self,
        a: VertexId,
        via: Option<VertexId>,
        b: VertexId,
        at: i64,
    ) -> Result<VertexId> {
        let outcome = self.graph.split_with(a, via, b, at, &mut self.engine)?;
        self.metrics.splits += 1;
        self.notify(Event::Update);
        Ok(outcome.via)
    }

    pub fn join(&mut self, a: VertexId, via: VertexId, b: VertexId) -> Result<bool> {
        let added = self.graph.join(a, via, b)?;
        if added {
            self.metrics.joins += 1;
            self.notify(Event::Update);
        }
        Ok(added)
    }

    /// Merges two vertices. Refused while any snake references the vertex
    /// that would retire; reservations must be moved off it first.
    pub fn merge(&mut self, a: VertexId, b: VertexId) -> Result<VertexId> {
        let plan = self.graph.merge_plan(a, b)?;
        if plan.survivor != plan.retired && self.engine.references_vertex(plan.retired) {
            return Err(GraphError::OccupiedVertex(plan.retired));
        }
        let survivor = self.graph.merge(a, b)?;
        self.metrics.merges += 1;
        self.notify(Event::Update);
        Ok(survivor)
    }

    /// Route search honouring the session budget. Temporary endpoint
    /// vertices carry reservations along and restore them on cleanup.
    pub fn search(&mut self, from: SearchEnd, to: SearchEnd) -> Result<Vec<PathPoint>> {
        let budget = self.config.search_budget;
        let result = self
            .graph
            .search_inner(from, to, budget, &mut self.engine);
        match result {
            Ok((path, expansions)) => {
                self.metrics.record_search(expansions);
                Ok(path)
            }
            Err(err) => {
                self.metrics.searches += 1;
                Err(err)
            }
        }
    }

    // Snake lifecycle and motion.

    /// Seats a snake heading `Head`-ward with the default steering.
    pub fn add_snake_at(&mut self, at: Anchor) -> Result<SnakeId> {
        self.add_snake_at_with(at, End::Head, FirstCandidate)
    }

    /// Seats a snake with an explicit heading and steering oracle.
    pub fn add_snake_at_with(
        &mut self,
        at: Anchor,
        heading: End,
        oracle: impl Oracle + 'static,
    ) -> Result<SnakeId> {
        let vertex = match at {
            Anchor::Vertex(v) => {
                self.graph.vertex(v)?;
                v
            }
            Anchor::On { edge, at } => self.materialize_seat(edge, at)?,
        };
        let id = self.engine.add_snake(&self.graph, vertex)?;
        self.riders.insert(
            id,
            Rider {
                heading,
                oracle: Box::new(oracle),
            },
        );
        self.metrics.snakes_added += 1;
        self.notify(Event::UpdateSnakes);
        Ok(id)
    }

    pub fn remove_snake(&mut self, id: SnakeId) -> Result<()> {
        self.engine.remove_snake(id)?;
        self.riders.remove(&id);
        self.metrics.snakes_removed += 1;
        self.notify(Event::UpdateSnakes);
        Ok(())
    }

    pub fn snake_state(&self, id: SnakeId) -> Result<Snake> {
        self.engine.snake_state(id)
    }

    /// Snakes currently sharing a vertex with `id`.
    pub fn query(&self, id: SnakeId) -> Result<Vec<SnakeId>> {
        self.engine.query(id)
    }

    /// Current heading of a registered snake.
    pub fn heading_of(&self, id: SnakeId) -> Option<End> {
        self.riders.get(&id).map(|r| r.heading)
    }

    pub fn grow(
        &mut self,
        id: SnakeId,
        end: End,
        by: i64,
        oracle: &mut dyn Oracle,
    ) -> Result<i64> {
        let grown = self.engine.grow(&self.graph, id, end, by, oracle)?;
        self.metrics.record_grow(grown);
        if grown > 0 {
            self.notify(Event::UpdateSnakes);
        }
        Ok(grown)
    }

    pub fn shrink(&mut self, id: SnakeId, end: End, by: i64) -> Result<i64> {
        let shrunk = self.engine.shrink(&self.graph, id, end, by)?;
        self.metrics.record_shrink(shrunk);
        if shrunk > 0 {
            self.notify(Event::UpdateSnakes);
        }
        Ok(shrunk)
    }

    pub fn move_end(
        &mut self,
        id: SnakeId,
        end: End,
        by: i64,
        oracle: &mut dyn Oracle,
    ) -> Result<i64> {
        let moved = self.engine.move_end(&self.graph, id, end, by, oracle)?;
        self.metrics.record_grow(moved.abs());
        self.metrics.record_shrink(moved.abs());
        if moved != 0 {
            self.notify(Event::UpdateSnakes);
        }
        Ok(moved)
    }

    /// Advances every registered snake by `delta` along its heading.
    /// Length is preserved by shrinking the opposite end; a snake whose
    /// growth came up short, or that is touching another snake, flips its
    /// heading for the next tick (unless configured otherwise).
    pub fn step(&mut self, delta: i64) -> Result<()> {
        if delta < 0 {
            return Err(GraphError::BadLength(delta));
        }
        let mut touched = false;
        {
            let Session {
                graph,
                engine,
                riders,
                metrics,
                config,
                ..
            } = self;
            for (&id, rider) in riders.iter_mut() {
                let grown = engine.grow(graph, id, rider.heading, delta, rider.oracle.as_mut())?;
                metrics.record_grow(grown);
                if grown > 0 {
                    let shrunk = engine.shrink(graph, id, rider.heading.opposite(), grown)?;
                    metrics.record_shrink(shrunk);
                    touched = true;
                }
                let contact = !engine.query(id)?.is_empty();
                if (grown < delta || contact) && config.bounce_on_block {
                    rider.heading = rider.heading.opposite();
                    metrics.bounces += 1;
                    touched = true;
                    debug!(snake = %id, heading = %rider.heading, "session.step.bounce");
                }
            }
        }
        self.metrics.steps += 1;
        if touched {
            self.notify(Event::UpdateSnakes);
        }
        Ok(())
    }

    /// Full structural and reservation invariant sweep.
    pub fn verify(&self) -> VerifyReport {
        let mut report = self.graph.verify();
        report.absorb(self.engine.verify(&self.graph));
        report
    }

    /// Resolves an edge position to a vertex, splitting when nothing sits
    /// there yet.
    fn materialize_seat(&mut self, edge: EdgeId, at: i64) -> Result<VertexId> {
        let e = self.graph.edge(edge)?;
        if at < 0 || at > e.length() {
            return Err(GraphError::BadOffset { edge, at });
        }
        if let Some(v) = self.graph.exact_vertex(edge, at)? {
            return Ok(v);
        }
        let outcome = self.graph.split_edge_at(edge, at, None, &mut self.engine)?;
        self.metrics.splits += 1;
        self.notify(Event::Update);
        Ok(outcome.via)
    }

    fn notify(&mut self, event: Event) {
        self.metrics.events_emitted += 1;
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}
