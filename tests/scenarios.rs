//! End-to-end walks of the canonical behaviours, driven through a
//! session the way an embedder would.

use shunt::{
    Anchor, End, FirstCandidate, GraphError, PathPoint, SearchEnd, Session, VertexId,
};

fn assert_clean(session: &Session) {
    let report = session.verify();
    assert!(report.success, "invariant breach: {:?}", report.findings);
}

#[test]
fn simple_line_reserve() {
    let mut session = Session::new();
    let a = session.add_vertex();
    let b = session.add_vertex();
    session.connect(a, b, 100).expect("connect");
    let s = session.add_snake_at(Anchor::Vertex(a)).expect("snake");
    let mut oracle = FirstCandidate;

    assert_eq!(session.grow(s, End::Head, 10, &mut oracle).expect("grow"), 10);
    let state = session.snake_state(s).expect("state");
    assert_eq!(
        (state.length(), state.head_offset(), state.tail_offset()),
        (10, 90, 0)
    );
    assert_eq!(state.vertices(), &[b, a]);

    assert_eq!(session.grow(s, End::Head, 90, &mut oracle).expect("grow"), 90);
    let state = session.snake_state(s).expect("state");
    assert_eq!(
        (state.length(), state.head_offset(), state.tail_offset()),
        (100, 0, 0)
    );
    let occupants_a: Vec<_> = session.reservations().occupants_of(a).collect();
    let occupants_b: Vec<_> = session.reservations().occupants_of(b).collect();
    assert_eq!(occupants_a, vec![s]);
    assert_eq!(occupants_b, vec![s]);

    assert_eq!(session.shrink(s, End::Tail, 80).expect("shrink"), 80);
    let state = session.snake_state(s).expect("state");
    assert_eq!(
        (state.length(), state.head_offset(), state.tail_offset()),
        (20, 0, 80)
    );
    assert_eq!(session.reservations().occupants_of(a).count(), 0);
    assert_eq!(session.reservations().occupants_of(b).count(), 1);

    assert_eq!(session.shrink(s, End::Head, 25).expect("shrink"), 20);
    let state = session.snake_state(s).expect("state");
    assert_eq!(
        (state.length(), state.head_offset(), state.tail_offset()),
        (0, 20, 80)
    );
    assert_eq!(session.reservations().occupants_of(a).count(), 0);
    assert_eq!(session.reservations().occupants_of(b).count(), 0);
    assert_clean(&session);
}

#[test]
fn split_preserves_straight_through() {
    let mut session = Session::new();
    let a = session.add_vertex();
    let b = session.add_vertex();
    session.connect(a, b, 100).expect("connect");
    let m = session.split(a, None, b, 40).expect("split");

    assert_eq!(session.graph().pairs_at(m).expect("pairs"), vec![(a, b)]);

    let path = session
        .search(SearchEnd::At(a), SearchEnd::At(b))
        .expect("path");
    assert_eq!(
        path,
        vec![
            PathPoint::Vertex(a),
            PathPoint::Vertex(m),
            PathPoint::Vertex(b)
        ]
    );
    assert_clean(&session);
}

#[test]
fn triangle_legality() {
    let mut session = Session::new();
    let a = session.add_vertex();
    let b = session.add_vertex();
    let c = session.add_vertex();
    session.connect(a, b, 100).expect("ab");
    session.connect(b, c, 100).expect("bc");
    session.connect(c, a, 100).expect("ca");
    assert_clean(&session);
}

#[test]
fn double_connection_refusal() {
    let mut session = Session::new();
    let a = session.add_vertex();
    let b = session.add_vertex();
    let a2 = session.add_vertex();
    let b2 = session.add_vertex();
    session.connect(a, b, 10).expect("ab");
    session.connect(a2, b2, 10).expect("a2b2");

    session.merge(a, a2).expect("merge a");
    assert!(matches!(
        session.merge(b, b2),
        Err(GraphError::DoubleConnectionAfterMerge(_, _))
    ));

    // The refused merge left everything as it was.
    assert!(session.graph().contains_vertex(b));
    assert!(session.graph().contains_vertex(b2));
    assert_eq!(session.graph().edge_count(), 2);
    assert_clean(&session);
}

#[test]
fn junction_choice_via_oracle() {
    let mut session = Session::new();
    let a = session.add_vertex();
    let m = session.add_vertex();
    let b = session.add_vertex();
    let c = session.add_vertex();
    session.connect(a, m, 10).expect("am");
    session.connect(m, b, 10).expect("mb");
    session.connect(m, c, 10).expect("mc");
    session.join(a, m, b).expect("join a-m-b");

    let s = session.add_snake_at(Anchor::Vertex(a)).expect("snake");
    let mut offers_at_m: Vec<Vec<VertexId>> = Vec::new();
    {
        let mut oracle = |at: VertexId, candidates: &[VertexId]| {
            if at == m {
                offers_at_m.push(candidates.to_vec());
            }
            candidates.first().copied()
        };
        assert_eq!(session.grow(s, End::Head, 15, &mut oracle).expect("grow"), 15);
    }
    assert_eq!(offers_at_m, vec![vec![b]]);

    let state = session.snake_state(s).expect("state");
    assert!(state.vertices().contains(&b));
    assert!(!state.vertices().contains(&c));
    assert_clean(&session);
}

#[test]
fn contention_stop() {
    let mut session = Session::new();
    let a = session.add_vertex();
    let b = session.add_vertex();
    let edge = session.connect(a, b, 100).expect("connect");
    let mut oracle = FirstCandidate;

    let s1 = session.add_snake_at(Anchor::Vertex(a)).expect("s1");
    session.grow(s1, End::Head, 40, &mut oracle).expect("grow s1");
    session.shrink(s1, End::Tail, 20).expect("shrink s1");

    let s2 = session.add_snake_at(Anchor::Vertex(b)).expect("s2");
    session.grow(s2, End::Tail, 40, &mut oracle).expect("grow s2");
    session.shrink(s2, End::Head, 20).expect("shrink s2");

    let spans = session.reservations().spans_on(edge);
    assert_eq!(
        spans.iter().map(|s| (s.low, s.high)).collect::<Vec<_>>(),
        vec![(20, 40), (60, 80)]
    );

    assert_eq!(session.grow(s1, End::Head, 100, &mut oracle).expect("grow"), 20);
    let spans = session.reservations().spans_on(edge);
    assert_eq!((spans[0].low, spans[0].high, spans[0].snake), (20, 60, s1));
    assert_clean(&session);
}
