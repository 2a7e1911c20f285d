//! Route-search behaviour over junctions, free endpoints, and budgets.

use shunt::{
    Dir, Graph, GraphError, NoopSplitHook, PathPoint, SearchEnd, Stop, VertexId,
};

fn assert_clean(graph: &Graph) {
    let report = graph.verify();
    assert!(report.success, "invariant breach: {:?}", report.findings);
}

/// Structural fingerprint for isomorphism checks after cleanup.
fn fingerprint(graph: &Graph) -> Vec<(u64, i64, Vec<(i64, u64)>)> {
    graph
        .all_edges()
        .map(|e| {
            (
                e.id.0,
                e.length(),
                e.stops()
                    .iter()
                    .map(|s: &Stop| (s.at, s.vertex.0))
                    .collect(),
            )
        })
        .collect()
}

#[test]
fn free_endpoints_round_trip_without_residue() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let c = g.add_vertex();
    g.connect(a, b, 100).expect("ab");
    g.connect(b, c, 80).expect("bc");
    g.join(a, b, c).expect("join");
    let ab = g.find_between(a, b).expect("segment").edge;
    let bc = g.find_between(b, c).expect("segment").edge;
    let before = fingerprint(&g);

    let path = g
        .search(SearchEnd::on(ab, 25), SearchEnd::on(bc, 55))
        .expect("path");
    assert_eq!(
        path,
        vec![
            PathPoint::Free { edge: ab, at: 25 },
            PathPoint::Vertex(b),
            PathPoint::Free { edge: bc, at: 55 },
        ]
    );
    assert_eq!(fingerprint(&g), before);
    assert_clean(&g);
}

#[test]
fn both_endpoints_on_one_edge() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let e = g.connect(a, b, 100).expect("connect");
    let before = fingerprint(&g);

    let path = g
        .search(SearchEnd::on(e, 70), SearchEnd::on(e, 30))
        .expect("path");
    assert_eq!(
        path,
        vec![
            PathPoint::Free { edge: e, at: 70 },
            PathPoint::Free { edge: e, at: 30 },
        ]
    );
    assert_eq!(fingerprint(&g), before);

    // Same position on both ends degenerates to a single free point.
    let path = g
        .search(SearchEnd::on(e, 50), SearchEnd::on(e, 50))
        .expect("path");
    assert_eq!(path, vec![PathPoint::Free { edge: e, at: 50 }]);
    assert_eq!(fingerprint(&g), before);
    assert_clean(&g);
}

#[test]
fn endpoints_at_stops_reuse_the_vertex() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let e = g.connect(a, b, 100).expect("connect");

    let path = g
        .search(SearchEnd::on(e, 0), SearchEnd::on(e, 100))
        .expect("path");
    assert_eq!(path, vec![PathPoint::Vertex(a), PathPoint::Vertex(b)]);
    assert_eq!(g.vertex_count(), 2);
    assert_clean(&g);
}

#[test]
fn unjoined_crossings_block_turns() {
    // A plus-shaped crossing: both lines run straight through x, and a
    // route from the west arm to the north arm does not exist until the
    // turn is joined.
    let mut g = Graph::new();
    let w = g.add_vertex();
    let e = g.add_vertex();
    let n = g.add_vertex();
    let s = g.add_vertex();
    g.connect(w, e, 100).expect("we");
    g.connect(n, s, 100).expect("ns");
    let x1 = g.split(w, None, e, 50).expect("split we").via;
    let x2 = g.split(n, None, s, 50).expect("split ns").via;
    let x = g.merge(x1, x2).expect("crossing");

    let through = g.search(SearchEnd::At(w), SearchEnd::At(e)).expect("path");
    assert_eq!(through[1], PathPoint::Vertex(x));
    assert!(matches!(
        g.search(SearchEnd::At(w), SearchEnd::At(n)),
        Err(GraphError::NoPath)
    ));

    g.join(w, x, n).expect("join the turn");
    let turning = g.search(SearchEnd::At(w), SearchEnd::At(n)).expect("path");
    assert_eq!(
        turning,
        vec![PathPoint::Vertex(w), PathPoint::Vertex(x), PathPoint::Vertex(n)]
    );
    assert_clean(&g);
}

#[test]
fn hints_pin_the_departure_direction() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let e = g.connect(a, b, 100).expect("connect");

    let toward_b = SearchEnd::On {
        edge: e,
        at: 40,
        prev: Some(a),
    };
    assert!(g.search(toward_b, SearchEnd::At(b)).is_ok());
    assert!(matches!(
        g.search(toward_b, SearchEnd::At(a)),
        Err(GraphError::NoPath)
    ));

    let toward_a = SearchEnd::On {
        edge: e,
        at: 40,
        prev: Some(b),
    };
    assert!(g.search(toward_a, SearchEnd::At(a)).is_ok());
    assert!(matches!(
        g.search(toward_a, SearchEnd::At(b)),
        Err(GraphError::NoPath)
    ));
    assert_clean(&g);
}

#[test]
fn hint_must_sit_on_the_named_edge() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let c = g.add_vertex();
    let e = g.connect(a, b, 100).expect("connect");
    g.connect(b, c, 50).expect("bc");

    let bad = SearchEnd::On {
        edge: e,
        at: 40,
        prev: Some(c),
    };
    assert!(matches!(
        g.search(bad, SearchEnd::At(b)),
        Err(GraphError::InvalidEndpoint(_))
    ));
    assert_clean(&g);
}

#[test]
fn budget_exhaustion_reports_and_cleans_up() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let e = g.connect(a, b, 100).expect("connect");
    let before = fingerprint(&g);

    let result = g.search_with(
        SearchEnd::on(e, 10),
        SearchEnd::on(e, 90),
        1,
        &mut NoopSplitHook,
    );
    assert!(matches!(result, Err(GraphError::SearchBudgetExceeded(1))));
    // The synthesized endpoints are gone even on the failure path.
    assert_eq!(fingerprint(&g), before);
    assert_clean(&g);
}

#[test]
fn long_lines_route_end_to_end() {
    // A subdivided line stays routable along its whole run because every
    // cut carries the straight-through pair.
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    g.connect(a, b, 1000).expect("connect");
    let mut cuts: Vec<VertexId> = Vec::new();
    let mut low = a;
    for at in [100, 300, 500, 900] {
        // Positions are measured from the low end of the remaining flank.
        let seg = g.find_between(low, b).expect("segment");
        let rel = at - (1000 - seg.distance);
        let via = g.split(low, None, b, rel).expect("split").via;
        cuts.push(via);
        low = via;
    }

    let path = g.search(SearchEnd::At(a), SearchEnd::At(b)).expect("path");
    let expected: Vec<PathPoint> = std::iter::once(a)
        .chain(cuts.iter().copied())
        .chain(std::iter::once(b))
        .map(PathPoint::Vertex)
        .collect();
    assert_eq!(path, expected);
    assert_clean(&g);
}

#[test]
fn find_vertex_agrees_with_search_endpoints() {
    let mut g = Graph::new();
    let a = g.add_vertex();
    let b = g.add_vertex();
    let e = g.connect(a, b, 100).expect("connect");
    let m = g.split(a, None, b, 40).expect("split").via;

    assert_eq!(
        g.find_vertex(e, 35, None).expect("query"),
        Some(Stop { at: 40, vertex: m })
    );
    assert_eq!(
        g.find_vertex(e, 35, Some(Dir::Down)).expect("query"),
        Some(Stop { at: 0, vertex: a })
    );
}
