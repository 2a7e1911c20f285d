use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{Dir, EdgeId, Pair, VertexId};

use super::Graph;

pub(crate) const MAX_FINDINGS: usize = 32;

/// Indicates the severity of a verification finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifySeverity {
    /// Suspicious but not structurally fatal.
    Warning,
    /// Structural invariant breach.
    Error,
}

/// A single issue discovered during verification.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyFinding {
    pub severity: VerifySeverity,
    pub message: String,
}

/// Statistics about the structures a verification pass walked.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct VerifyCounts {
    pub vertices: u64,
    pub edges: u64,
    pub stops: u64,
    pub pairs: u64,
    pub spans: u64,
    pub snakes: u64,
}

/// Complete report of a verification pass.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    pub success: bool,
    pub findings: Vec<VerifyFinding>,
    pub counts: VerifyCounts,
}

impl VerifyReport {
    pub(crate) fn new() -> VerifyReport {
        VerifyReport {
            success: true,
            findings: Vec::new(),
            counts: VerifyCounts::default(),
        }
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.success = false;
        if self.findings.len() < MAX_FINDINGS {
            self.findings.push(VerifyFinding {
                severity: VerifySeverity::Error,
                message: message.into(),
            });
        }
    }

    /// Folds another report into this one.
    pub fn absorb(&mut self, other: VerifyReport) {
        self.success &= other.success;
        for finding in other.findings {
            if self.findings.len() < MAX_FINDINGS {
                self.findings.push(finding);
            }
        }
        let c = &mut self.counts;
        let o = other.counts;
        c.vertices += o.vertices;
        c.edges += o.edges;
        c.stops += o.stops;
        c.pairs += o.pairs;
        c.spans += o.spans;
        c.snakes += o.snakes;
    }
}

impl Graph {
    /// Walks every table and reports structural invariant breaches:
    /// endpoint bracketing, stop monotonicity, holder consistency, the
    /// one-shared-vertex rule, no-repeat stops, pair well-formedness, and
    /// sibling-cache accuracy.
    pub fn verify(&self) -> VerifyReport {
        let mut report = VerifyReport::new();
        self.verify_edges(&mut report);
        self.verify_holders(&mut report);
        self.verify_shared_vertices(&mut report);
        self.verify_pairs(&mut report);
        report
    }

    fn verify_edges(&self, report: &mut VerifyReport) {
        for edge in self.edges.values() {
            report.counts.edges += 1;
            report.counts.stops += edge.stops.len() as u64;
            if edge.length <= 0 {
                report.error(format!("{} has non-positive length {}", edge.id, edge.length));
                continue;
            }
            if edge.stops.len() < 2 {
                report.error(format!("{} has {} stops", edge.id, edge.stops.len()));
                continue;
            }
            if edge.stops[0].at != 0 {
                report.error(format!(
                    "{} first stop sits at {}, not 0",
                    edge.id, edge.stops[0].at
                ));
            }
            let last = edge.stops[edge.stops.len() - 1];
            if last.at != edge.length {
                report.error(format!(
                    "{} last stop sits at {}, not {}",
                    edge.id, last.at, edge.length
                ));
            }
            for pair in edge.stops.windows(2) {
                if pair[0].at >= pair[1].at {
                    report.error(format!(
                        "{} stops out of order at {} >= {}",
                        edge.id, pair[0].at, pair[1].at
                    ));
                }
            }
            let mut seen: BTreeSet<VertexId> = BTreeSet::new();
            for stop in &edge.stops {
                if !seen.insert(stop.vertex) {
                    report.error(format!("{} repeats {}", edge.id, stop.vertex));
                }
                if !self.vertices.contains_key(&stop.vertex) {
                    report.error(format!("{} references missing {}", edge.id, stop.vertex));
                }
            }
        }
    }

    fn verify_holders(&self, report: &mut VerifyReport) {
        for vertex in self.vertices.values() {
            report.counts.vertices += 1;
            for eid in vertex.holders() {
                match self.edges.get(&eid) {
                    None => report.error(format!("{} holds missing {}", vertex.id, eid)),
                    Some(e) if !e.contains_vertex(vertex.id) => report.error(format!(
                        "{} holds {} but is not among its stops",
                        vertex.id, eid
                    )),
                    Some(_) => {}
                }
            }
        }
        for edge in self.edges.values() {
            for stop in &edge.stops {
                if let Some(v) = self.vertices.get(&stop.vertex) {
                    if !v.holders.contains(&edge.id) {
                        report.error(format!(
                            "{} lists {} which does not hold it",
                            edge.id, stop.vertex
                        ));
                    }
                }
            }
        }
    }

    fn verify_shared_vertices(&self, report: &mut VerifyReport) {
        for edge in self.edges.values() {
            // Recompute the sibling set and compare against the cache.
            let mut expected: BTreeSet<EdgeId> = BTreeSet::new();
            for stop in &edge.stops {
                if let Some(v) = self.vertices.get(&stop.vertex) {
                    expected.extend(v.holders.iter().copied());
                }
            }
            expected.remove(&edge.id);
            if expected != edge.siblings {
                report.error(format!("{} sibling cache is stale", edge.id));
            }
            for other_id in &expected {
                if *other_id <= edge.id {
                    continue;
                }
                let Some(other) = self.edges.get(other_id) else {
                    continue;
                };
                let shared = edge
                    .stops
                    .iter()
                    .filter(|s| other.contains_vertex(s.vertex))
                    .count();
                if shared > 1 {
                    report.error(format!(
                        "{} and {} share {} vertices",
                        edge.id, other_id, shared
                    ));
                }
            }
        }
    }

    fn verify_pairs(&self, report: &mut VerifyReport) {
        for vertex in self.vertices.values() {
            let mut seen: BTreeSet<Pair> = BTreeSet::new();
            for pair in vertex.pairs() {
                report.counts.pairs += 1;
                if !seen.insert(*pair) {
                    report.error(format!("{} carries a duplicate pair", vertex.id));
                }
                let [a, b] = pair.sides();
                if a == b {
                    report.error(format!("{} pair has identical sides", vertex.id));
                }
                for (eid, _dir) in [a, b] {
                    if !vertex.holders.contains(&eid) {
                        report.error(format!(
                            "{} pair references non-incident {}",
                            vertex.id, eid
                        ));
                    }
                }
                for side in [a, b] {
                    if self.step_along(vertex.id, side).is_none() {
                        report.error(format!(
                            "{} pair side on {} points off the edge",
                            vertex.id, side.0
                        ));
                    }
                }
            }
        }
    }

    fn step_along(&self, from: VertexId, side: (EdgeId, Dir)) -> Option<VertexId> {
        let e = self.edges.get(&side.0)?;
        let idx = e.stop_index_of(from)?;
        let stop = match side.1 {
            Dir::Up => e.stops.get(idx + 1),
            Dir::Down => idx.checked_sub(1).and_then(|i| e.stops.get(i)),
        };
        stop.map(|s| s.vertex)
    }
}
