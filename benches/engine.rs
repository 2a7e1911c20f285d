#![forbid(unsafe_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use shunt::{Anchor, End, FirstCandidate, Graph, SearchEnd, Session, VertexId};

const GRID: usize = 16;
const EDGE_LENGTH: i64 = 10;

/// A GRID x GRID lattice with straight-through routing along every row
/// and column.
fn lattice() -> (Graph, Vec<VertexId>) {
    let mut g = Graph::new();
    let vertices: Vec<VertexId> = (0..GRID * GRID).map(|_| g.add_vertex()).collect();
    let at = |r: usize, c: usize| vertices[r * GRID + c];
    for r in 0..GRID {
        for c in 0..GRID {
            if c + 1 < GRID {
                g.connect(at(r, c), at(r, c + 1), EDGE_LENGTH).expect("row edge");
            }
            if r + 1 < GRID {
                g.connect(at(r, c), at(r + 1, c), EDGE_LENGTH).expect("col edge");
            }
        }
    }
    for r in 0..GRID {
        for c in 1..GRID - 1 {
            g.join(at(r, c - 1), at(r, c), at(r, c + 1)).expect("row join");
            g.join(at(c - 1, r), at(c, r), at(c + 1, r)).expect("col join");
        }
    }
    // Row-into-column turns so routes can leave their starting line.
    for r in 0..GRID - 1 {
        for c in 1..GRID {
            g.join(at(r, c - 1), at(r, c), at(r + 1, c)).expect("turn join");
        }
    }
    (g, vertices)
}

fn bench_structure(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/structure");
    group.throughput(Throughput::Elements(1));

    group.bench_function("connect_chain", |b| {
        b.iter(|| {
            let mut g = Graph::new();
            let mut prev = g.add_vertex();
            for _ in 0..64 {
                let next = g.add_vertex();
                g.connect(prev, next, EDGE_LENGTH).expect("connect");
                prev = next;
            }
            black_box(g.edge_count())
        });
    });

    group.bench_function("split_churn", |b| {
        b.iter(|| {
            let mut g = Graph::new();
            let a = g.add_vertex();
            let z = g.add_vertex();
            g.connect(a, z, 1 << 16).expect("connect");
            let mut low = a;
            for i in 1..64i64 {
                low = g.split(low, None, z, i * 7).expect("split").via;
            }
            black_box(g.vertex_count())
        });
    });
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/search");
    group.sample_size(40);

    let (mut g, vertices) = lattice();
    let corner = vertices[0];
    for span in [GRID / 2, GRID - 1] {
        let target = vertices[span * GRID + span];
        group.bench_with_input(BenchmarkId::new("lattice", span), &target, |b, &target| {
            b.iter(|| {
                black_box(
                    g.search(SearchEnd::At(corner), SearchEnd::At(target))
                        .expect("path"),
                )
            });
        });
    }
    group.finish();
}

fn bench_snakes(c: &mut Criterion) {
    let mut group = c.benchmark_group("reserve/march");
    group.throughput(Throughput::Elements(64));

    group.bench_function("step_population", |b| {
        let mut session = Session::new();
        let mut prev = session.add_vertex();
        let mut chain = vec![prev];
        for _ in 0..64 {
            let next = session.add_vertex();
            session.connect(prev, next, 100).expect("connect");
            chain.push(next);
            prev = next;
        }
        for window in chain.windows(3) {
            session.join(window[0], window[1], window[2]).expect("join");
        }
        for i in 0..8 {
            let s = session
                .add_snake_at(Anchor::Vertex(chain[i * 8]))
                .expect("snake");
            session
                .grow(s, End::Head, 40, &mut FirstCandidate)
                .expect("grow");
        }
        b.iter(|| {
            session.step(black_box(5)).expect("step");
        });
    });
    group.finish();
}

criterion_group!(benches, bench_structure, bench_search, bench_snakes);
criterion_main!(benches);
