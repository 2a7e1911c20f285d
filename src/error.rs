use thiserror::Error;

use crate::model::{EdgeId, SnakeId, VertexId};

pub type Result<T> = std::result::Result<T, GraphError>;

/// Fault kinds surfaced by the graph core, the reservation engine, and the
/// session façade. Domain and structural faults are reported before any
/// mutation takes place; `InternalInvariant` indicates a corrupted session
/// that must be discarded.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("identifier {0} already exists")]
    DuplicateId(String),
    #[error("unknown identifier {0}")]
    UnknownId(String),
    #[error("edge length {0} is not a positive integer")]
    BadLength(i64),
    #[error("offset {at} is outside the usable range of {edge}")]
    BadOffset { edge: EdgeId, at: i64 },
    #[error("operation needs two distinct vertices, got {0} twice")]
    SameVertex(VertexId),
    #[error("both pair sides at {via} resolve to edge {edge}")]
    SameEdgeJoin { via: VertexId, edge: EdgeId },
    #[error("{0} and {1} are already directly connected")]
    AlreadyConnected(VertexId, VertexId),
    #[error("{0} and {1} are not directly connected")]
    NotConnected(VertexId, VertexId),
    #[error("merge would place {vertex} twice on edge {edge}")]
    MergeOnSameEdge { vertex: VertexId, edge: EdgeId },
    #[error("merge would leave edges {0} and {1} sharing two vertices")]
    DoubleConnectionAfterMerge(EdgeId, EdgeId),
    #[error("split target {0} is already part of the network")]
    SplitOntoOccupiedVertex(VertexId),
    #[error("span [{low}, {high}) on {edge} overlaps a reservation held by {holder}")]
    IntervalConflict {
        edge: EdgeId,
        low: i64,
        high: i64,
        holder: SnakeId,
    },
    #[error("no route between the requested endpoints")]
    NoPath,
    #[error("invalid search endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("search budget of {0} expansions exhausted")]
    SearchBudgetExceeded(usize),
    #[error("oracle chose {chosen} which is not among the offered candidates at {at}")]
    OracleChoiceInvalid { at: VertexId, chosen: VertexId },
    #[error("{0} is referenced by at least one snake")]
    OccupiedVertex(VertexId),
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl GraphError {
    pub(crate) fn unknown_vertex(id: VertexId) -> Self {
        GraphError::UnknownId(id.to_string())
    }

    pub(crate) fn unknown_edge(id: EdgeId) -> Self {
        GraphError::UnknownId(id.to_string())
    }

    pub(crate) fn unknown_snake(id: SnakeId) -> Self {
        GraphError::UnknownId(id.to_string())
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        tracing::error!(%msg, "internal invariant violated");
        GraphError::InternalInvariant(msg)
    }
}
