use std::collections::{BTreeMap, BTreeSet};

use crate::error::{GraphError, Result};
use crate::graph::{Graph, VerifyReport};
use crate::model::{EdgeId, SnakeId, VertexId};

use super::intervals::{coalesce, Span};
use super::{ReservationEngine, Snake};

impl ReservationEngine {
    /// Checks the reservation layer against the graph: span lists sorted,
    /// disjoint, and in bounds; every snake's recomputed footprint equal
    /// to its recorded spans, occupancy, and length; offsets within their
    /// legal ranges.
    pub fn verify(&self, graph: &Graph) -> VerifyReport {
        let mut report = VerifyReport::new();
        self.verify_span_lists(graph, &mut report);
        self.verify_snakes(graph, &mut report);
        report
    }

    fn verify_span_lists(&self, graph: &Graph, report: &mut VerifyReport) {
        for (edge, list) in &self.spans {
            report.counts.spans += list.len() as u64;
            let Ok(e) = graph.edge(*edge) else {
                report.error(format!("spans recorded on missing {edge}"));
                continue;
            };
            if list.is_empty() {
                report.error(format!("empty span list kept for {edge}"));
            }
            for span in list {
                if span.low < 0 || span.low >= span.high || span.high > e.length() {
                    report.error(format!(
                        "span [{}, {}) out of bounds on {edge}",
                        span.low, span.high
                    ));
                }
                if !self.snakes.contains_key(&span.snake) {
                    report.error(format!(
                        "span on {edge} owned by missing {}",
                        span.snake
                    ));
                }
            }
            for pair in list.windows(2) {
                if pair[0].high > pair[1].low {
                    report.error(format!(
                        "spans overlap on {edge} at {}",
                        pair[1].low
                    ));
                }
            }
        }
    }

    fn verify_snakes(&self, graph: &Graph, report: &mut VerifyReport) {
        let mut expected_spans: BTreeMap<EdgeId, Vec<Span>> = BTreeMap::new();
        let mut expected_occupants: BTreeMap<VertexId, BTreeSet<SnakeId>> = BTreeMap::new();

        for (&id, snake) in &self.snakes {
            report.counts.snakes += 1;
            if snake.chain.is_empty() {
                report.error(format!("{id} has an empty chain"));
                continue;
            }
            match footprint(graph, id, snake) {
                Err(err) => report.error(format!("{id} footprint: {err}")),
                Ok(spans) => {
                    let measure: i64 = spans.iter().map(|(_, s)| s.width()).sum();
                    if measure != snake.length {
                        report.error(format!(
                            "{id} covers {measure} units but records length {}",
                            snake.length
                        ));
                    }
                    for (edge, span) in spans {
                        expected_spans.entry(edge).or_default().push(span);
                    }
                }
            }
            self.verify_offsets(graph, id, snake, report);
            for v in snake.occupied_vertices() {
                expected_occupants.entry(v).or_default().insert(id);
            }
        }

        let mut canonical: BTreeMap<EdgeId, Vec<Span>> = BTreeMap::new();
        for (edge, mut list) in expected_spans {
            list.sort_by_key(|s| s.low);
            coalesce(&mut list);
            canonical.insert(edge, list);
        }
        let mut stored: BTreeMap<EdgeId, Vec<Span>> = BTreeMap::new();
        for (&edge, list) in &self.spans {
            let mut list = list.clone();
            coalesce(&mut list);
            stored.insert(edge, list);
        }
        if canonical != stored {
            report.error("recorded spans disagree with recomputed snake footprints");
        }
        if expected_occupants != self.occupants {
            report.error("occupancy index disagrees with recomputed snake footprints");
        }
    }

    fn verify_offsets(
        &self,
        graph: &Graph,
        id: SnakeId,
        snake: &Snake,
        report: &mut VerifyReport,
    ) {
        let k = snake.chain.len();
        if k == 1 {
            if snake.length != 0 || snake.head_offset != 0 || snake.tail_offset != 0 {
                report.error(format!("{id} is a point but carries extent"));
            }
            return;
        }
        let Ok(first) = segment_length(graph, snake.chain[0], snake.chain[1]) else {
            report.error(format!("{id} head hop is not directly connected"));
            return;
        };
        let Ok(last) = segment_length(graph, snake.chain[k - 2], snake.chain[k - 1]) else {
            report.error(format!("{id} tail hop is not directly connected"));
            return;
        };
        if k == 2 {
            if snake.head_offset < 0
                || snake.tail_offset < 0
                || snake.head_offset + snake.tail_offset + snake.length != first
            {
                report.error(format!("{id} offsets do not add up on its edge"));
            }
        } else {
            if snake.head_offset < 0 || snake.head_offset >= first {
                report.error(format!("{id} head offset {} out of range", snake.head_offset));
            }
            if snake.tail_offset < 0 || snake.tail_offset >= last {
                report.error(format!("{id} tail offset {} out of range", snake.tail_offset));
            }
        }
    }
}

/// Recomputes the covered stretch of every hop from chain and offsets.
fn footprint(graph: &Graph, id: SnakeId, snake: &Snake) -> Result<Vec<(EdgeId, Span)>> {
    let k = snake.chain.len();
    let mut out = Vec::new();
    if k < 2 {
        return Ok(out);
    }
    for (i, pair) in snake.chain.windows(2).enumerate() {
        let (u, w) = (pair[0], pair[1]);
        let edge = graph.edge_between(u, w)?;
        let e = graph.edge(edge)?;
        let p_u = e
            .position_of(u)
            .ok_or_else(|| GraphError::internal(format!("{u} not on {edge}")))?;
        let p_w = e
            .position_of(w)
            .ok_or_else(|| GraphError::internal(format!("{w} not on {edge}")))?;
        let toward_w = if p_w > p_u { 1 } else { -1 };
        // Walk in from both ends: the head hop starts at the head point,
        // the tail hop stops at the tail point.
        let mut start = p_u;
        let mut stop = p_w;
        if i == 0 {
            start = p_u + snake.head_offset * toward_w;
        }
        if i == k - 2 {
            stop = p_w - snake.tail_offset * toward_w;
        }
        let (lo, hi) = if start <= stop {
            (start, stop)
        } else {
            (stop, start)
        };
        if lo < hi {
            out.push((
                edge,
                Span {
                    low: lo,
                    high: hi,
                    snake: id,
                },
            ));
        }
    }
    Ok(out)
}

fn segment_length(graph: &Graph, a: VertexId, b: VertexId) -> Result<i64> {
    let edge = graph.edge_between(a, b)?;
    let e = graph.edge(edge)?;
    let p_a = e
        .position_of(a)
        .ok_or_else(|| GraphError::internal(format!("{a} not on {edge}")))?;
    let p_b = e
        .position_of(b)
        .ok_or_else(|| GraphError::internal(format!("{b} not on {edge}")))?;
    Ok((p_b - p_a).abs())
}
