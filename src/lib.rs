pub mod error;
pub mod graph;
pub mod model;
pub mod reserve;
pub mod session;

pub use crate::error::{GraphError, Result};
pub use crate::graph::{
    EdgeDetails, Graph, MergePlan, NoopSplitHook, PathPoint, SearchEnd, Segment, SplitHook,
    SplitOutcome, VerifyCounts, VerifyFinding, VerifyReport, VerifySeverity, VertexOnEdge,
    DEFAULT_SEARCH_BUDGET,
};
pub use crate::model::{Dir, Edge, EdgeId, End, Pair, SnakeId, Stop, Vertex, VertexId};
pub use crate::reserve::{FirstCandidate, Oracle, ReservationEngine, Snake, Span};
pub use crate::session::{Anchor, Event, Session, SessionConfig, SessionMetrics};
