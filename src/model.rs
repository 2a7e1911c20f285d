use std::collections::BTreeSet;
use std::fmt;

use smallvec::SmallVec;

/// Stable identifier of a vertex. Monotonic per graph, never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VertexId(pub u64);

/// Stable identifier of an edge. Monotonic per graph, never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EdgeId(pub u64);

/// Stable identifier of a snake. Monotonic per engine, never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SnakeId(pub u64);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl fmt::Display for SnakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Direction of travel along an edge's 1-D coordinate.
///
/// `Down` points toward position 0 (the low endpoint), `Up` toward
/// position `length` (the high endpoint). The `Ord` derive makes
/// `(EdgeId, Dir)` tuples totally ordered, which is what pair
/// canonicalization sorts by.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Dir {
    Down,
    Up,
}

impl Dir {
    pub fn flip(self) -> Dir {
        match self {
            Dir::Down => Dir::Up,
            Dir::Up => Dir::Down,
        }
    }

    /// Signed unit step: -1 for `Down`, +1 for `Up`.
    pub fn sign(self) -> i64 {
        match self {
            Dir::Down => -1,
            Dir::Up => 1,
        }
    }
}

/// One side of a pair: an incident edge plus the direction of departure
/// along it.
pub type PairSide = (EdgeId, Dir);

/// An unordered 2-set of pair sides authorizing through-traversal at a
/// vertex.
///
/// Stored as a sorted tuple so that equality is tuple equality and
/// duplicate detection is a plain comparison.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pair {
    sides: [PairSide; 2],
}

impl Pair {
    pub fn new(a: PairSide, b: PairSide) -> Pair {
        if a <= b {
            Pair { sides: [a, b] }
        } else {
            Pair { sides: [b, a] }
        }
    }

    pub fn sides(&self) -> [PairSide; 2] {
        self.sides
    }

    pub fn involves_edge(&self, edge: EdgeId) -> bool {
        self.sides[0].0 == edge || self.sides[1].0 == edge
    }

    /// The opposite side when `side` is one of the two, `None` otherwise.
    pub fn partner_of(&self, side: PairSide) -> Option<PairSide> {
        if self.sides[0] == side {
            Some(self.sides[1])
        } else if self.sides[1] == side {
            Some(self.sides[0])
        } else {
            None
        }
    }

    /// Re-canonicalized copy with every side on `from` rewritten to
    /// `(to, dir)`. Used when a split hands one flank of an edge to a new
    /// identifier.
    pub(crate) fn rewrite_edge(&self, from: EdgeId, to: EdgeId, dir_map: impl Fn(Dir) -> Dir) -> Pair {
        let map = |side: PairSide| -> PairSide {
            if side.0 == from {
                (to, dir_map(side.1))
            } else {
                side
            }
        };
        Pair::new(map(self.sides[0]), map(self.sides[1]))
    }
}

/// A point of the network. Participates in one or more edges (its holder
/// set) and carries the explicit pairs that make it a junction.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub id: VertexId,
    pub(crate) holders: BTreeSet<EdgeId>,
    pub(crate) pairs: SmallVec<[Pair; 2]>,
}

impl Vertex {
    pub(crate) fn new(id: VertexId) -> Vertex {
        Vertex {
            id,
            holders: BTreeSet::new(),
            pairs: SmallVec::new(),
        }
    }

    /// Edges this vertex participates in, in id order.
    pub fn holders(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.holders.iter().copied()
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    pub fn is_isolated(&self) -> bool {
        self.holders.is_empty()
    }

    /// Explicit pairs in insertion order.
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// Adds a pair unless an equal one is already present. Returns whether
    /// the list changed.
    pub(crate) fn add_pair(&mut self, pair: Pair) -> bool {
        if self.pairs.contains(&pair) {
            return false;
        }
        self.pairs.push(pair);
        true
    }
}

/// A vertex pinned at an integer position along an edge.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Stop {
    pub at: i64,
    pub vertex: VertexId,
}

/// A straight 1-D span of integer length.
///
/// The stop list is ordered by position, bracketed by `(0, low)` and
/// `(length, high)`; interior stops sit at strictly increasing positions
/// in `(0, length)`.
#[derive(Clone, Debug)]
pub struct Edge {
    pub id: EdgeId,
    pub(crate) length: i64,
    pub(crate) stops: SmallVec<[Stop; 2]>,
    pub(crate) siblings: BTreeSet<EdgeId>,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, low: VertexId, high: VertexId, length: i64) -> Edge {
        let mut stops = SmallVec::new();
        stops.push(Stop { at: 0, vertex: low });
        stops.push(Stop {
            at: length,
            vertex: high,
        });
        Edge {
            id,
            length,
            stops,
            siblings: BTreeSet::new(),
        }
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    /// Ordered stops, endpoints included.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn low_vertex(&self) -> VertexId {
        self.stops[0].vertex
    }

    pub fn high_vertex(&self) -> VertexId {
        self.stops[self.stops.len() - 1].vertex
    }

    /// The endpoint reached by travelling in `dir` forever.
    pub fn endpoint(&self, dir: Dir) -> VertexId {
        match dir {
            Dir::Down => self.low_vertex(),
            Dir::Up => self.high_vertex(),
        }
    }

    /// Edges sharing at least one vertex with this one, in id order.
    pub fn siblings(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.siblings.iter().copied()
    }

    pub fn contains_vertex(&self, vertex: VertexId) -> bool {
        self.stops.iter().any(|s| s.vertex == vertex)
    }

    pub(crate) fn stop_index_of(&self, vertex: VertexId) -> Option<usize> {
        self.stops.iter().position(|s| s.vertex == vertex)
    }

    pub(crate) fn position_of(&self, vertex: VertexId) -> Option<i64> {
        self.stop_index_of(vertex).map(|i| self.stops[i].at)
    }

    /// Index of the stop sitting exactly at `at`, if any.
    pub(crate) fn stop_index_at(&self, at: i64) -> Option<usize> {
        self.stops
            .binary_search_by_key(&at, |s| s.at)
            .ok()
    }
}

/// Which end of a snake an operation applies to. `Head` is the `+1` end
/// of the interface, `Tail` the `-1` end.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum End {
    Head,
    Tail,
}

impl End {
    pub fn opposite(self) -> End {
        match self {
            End::Head => End::Tail,
            End::Tail => End::Head,
        }
    }
}

impl fmt::Display for End {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            End::Head => write!(f, "head"),
            End::Tail => write!(f, "tail"),
        }
    }
}
