use crate::error::{GraphError, Result};
use crate::model::{Dir, EdgeId, SnakeId};

/// A half-open reserved stretch `[low, high)` of one edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub low: i64,
    pub high: i64,
    pub snake: SnakeId,
}

impl Span {
    pub fn width(&self) -> i64 {
        self.high - self.low
    }
}

/// Distance from `pos` to the nearest blocking span in direction `dir`,
/// capped at `limit` (the edge end in that direction). Every span counts
/// as a blocker; a growing end's own trailing span sits behind `pos` and
/// never registers, which also makes a snake halt before looping onto
/// itself.
pub(crate) fn free_run(list: &[Span], pos: i64, dir: Dir, limit: i64) -> i64 {
    let mut free = (limit - pos).abs();
    for span in list {
        if span.low < pos && pos < span.high {
            return 0;
        }
        let gap = match dir {
            Dir::Up if span.low >= pos => span.low - pos,
            Dir::Down if span.high <= pos => pos - span.high,
            _ => continue,
        };
        free = free.min(gap);
    }
    free
}

/// Extends the owner's span bordering `[lo, hi)` or inserts a fresh one,
/// keeping the list sorted and disjoint. Overlap is rejected before any
/// mutation; callers that measured free space first never see it.
pub(crate) fn grow_span(
    list: &mut Vec<Span>,
    edge: EdgeId,
    snake: SnakeId,
    lo: i64,
    hi: i64,
) -> Result<()> {
    debug_assert!(lo < hi);
    for span in list.iter() {
        if span.low < hi && lo < span.high {
            return Err(GraphError::IntervalConflict {
                edge,
                low: lo,
                high: hi,
                holder: span.snake,
            });
        }
    }
    if let Some(i) = list
        .iter()
        .position(|s| s.snake == snake && (s.high == lo || s.low == hi))
    {
        let span = &mut list[i];
        if span.high == lo {
            span.high = hi;
        } else {
            span.low = lo;
        }
    } else {
        let i = list.partition_point(|s| s.low < lo);
        list.insert(
            i,
            Span {
                low: lo,
                high: hi,
                snake,
            },
        );
    }
    Ok(())
}

/// Releases `[lo, hi)` from the owner's covering span, splitting it when
/// the release lands mid-span.
pub(crate) fn release_span(
    list: &mut Vec<Span>,
    edge: EdgeId,
    snake: SnakeId,
    lo: i64,
    hi: i64,
) -> Result<()> {
    debug_assert!(lo < hi);
    let Some(i) = list
        .iter()
        .position(|s| s.snake == snake && s.low <= lo && hi <= s.high)
    else {
        return Err(GraphError::internal(format!(
            "release of [{lo}, {hi}) for {snake} misses its span on {edge}"
        )));
    };
    let span = list[i];
    match (span.low == lo, span.high == hi) {
        (true, true) => {
            list.remove(i);
        }
        (true, false) => list[i].low = hi,
        (false, true) => list[i].high = lo,
        (false, false) => {
            list[i].high = lo;
            list.insert(
                i + 1,
                Span {
                    low: hi,
                    high: span.high,
                    snake,
                },
            );
        }
    }
    Ok(())
}

/// Merges touching spans of the same owner; used to canonicalize before
/// comparisons.
pub(crate) fn coalesce(list: &mut Vec<Span>) {
    let mut i = 0;
    while i + 1 < list.len() {
        if list[i].snake == list[i + 1].snake && list[i].high == list[i + 1].low {
            list[i].high = list[i + 1].high;
            list.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const S1: SnakeId = SnakeId(1);
    const S2: SnakeId = SnakeId(2);
    const E: EdgeId = EdgeId(0);

    fn span(low: i64, high: i64, snake: SnakeId) -> Span {
        Span { low, high, snake }
    }

    #[test]
    fn free_run_measures_gaps_both_ways() {
        let list = vec![span(20, 40, S1), span(60, 80, S2)];
        assert_eq!(free_run(&list, 40, Dir::Up, 100), 20);
        assert_eq!(free_run(&list, 40, Dir::Down, 0), 0);
        assert_eq!(free_run(&list, 50, Dir::Down, 0), 10);
        assert_eq!(free_run(&list, 90, Dir::Up, 100), 10);
        assert_eq!(free_run(&[], 30, Dir::Up, 100), 70);
        assert_eq!(free_run(&list, 70, Dir::Up, 100), 0);
    }

    #[test]
    fn grow_span_extends_in_place() {
        let mut list = vec![span(20, 40, S1)];
        grow_span(&mut list, E, S1, 40, 55).expect("extend up");
        assert_eq!(list, vec![span(20, 55, S1)]);
        grow_span(&mut list, E, S1, 10, 20).expect("extend down");
        assert_eq!(list, vec![span(10, 55, S1)]);
        grow_span(&mut list, E, S2, 55, 60).expect("fresh span");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn grow_span_rejects_overlap_without_mutating() {
        let mut list = vec![span(20, 40, S1)];
        assert!(matches!(
            grow_span(&mut list, E, S2, 30, 50),
            Err(GraphError::IntervalConflict { holder: S1, .. })
        ));
        assert_eq!(list, vec![span(20, 40, S1)]);
    }

    #[test]
    fn release_span_handles_every_cut() {
        let mut list = vec![span(10, 90, S1)];
        release_span(&mut list, E, S1, 10, 20).expect("trim low");
        assert_eq!(list, vec![span(20, 90, S1)]);
        release_span(&mut list, E, S1, 80, 90).expect("trim high");
        assert_eq!(list, vec![span(20, 80, S1)]);
        release_span(&mut list, E, S1, 40, 50).expect("split middle");
        assert_eq!(list, vec![span(20, 40, S1), span(50, 80, S1)]);
        release_span(&mut list, E, S1, 20, 40).expect("drop whole");
        assert_eq!(list, vec![span(50, 80, S1)]);
    }

    #[test]
    fn coalesce_joins_touching_same_owner_spans() {
        let mut list = vec![span(0, 10, S1), span(10, 20, S1), span(20, 30, S2)];
        coalesce(&mut list);
        assert_eq!(list, vec![span(0, 20, S1), span(20, 30, S2)]);
    }
}
