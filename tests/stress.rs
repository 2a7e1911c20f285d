//! Deterministic long-haul run: a ring of track, a population of snakes
//! bouncing around it, and structural churn while they move. Invariants
//! are re-checked after every mutation.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shunt::{Anchor, EdgeId, End, FirstCandidate, Session, VertexId};

const RING_VERTICES: usize = 8;
const EDGE_LENGTH: i64 = 20;
const SNAKES: usize = 4;
const TICKS: usize = 200;

fn assert_clean(session: &Session, tick: usize) {
    let report = session.verify();
    assert!(
        report.success,
        "invariant breach at tick {tick}: {:?}",
        report.findings
    );
}

fn ring(session: &mut Session) -> Vec<VertexId> {
    let vertices: Vec<VertexId> = (0..RING_VERTICES).map(|_| session.add_vertex()).collect();
    for i in 0..RING_VERTICES {
        let a = vertices[i];
        let b = vertices[(i + 1) % RING_VERTICES];
        session.connect(a, b, EDGE_LENGTH).expect("ring edge");
    }
    for i in 0..RING_VERTICES {
        let prev = vertices[(i + RING_VERTICES - 1) % RING_VERTICES];
        let here = vertices[i];
        let next = vertices[(i + 1) % RING_VERTICES];
        session.join(prev, here, next).expect("ring join");
    }
    vertices
}

fn random_edge(session: &Session, rng: &mut ChaCha8Rng) -> EdgeId {
    let count = session.graph().edge_count();
    let idx = rng.gen_range(0..count);
    session
        .graph()
        .all_edges()
        .nth(idx)
        .map(|e| e.id)
        .expect("edge")
}

#[test]
fn snakes_survive_structural_churn() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let mut session = Session::new();
    let vertices = ring(&mut session);

    let mut snakes = Vec::with_capacity(SNAKES);
    for i in 0..SNAKES {
        let seat = vertices[i * 2];
        snakes.push(
            session
                .add_snake_at(Anchor::Vertex(seat))
                .expect("seat snake"),
        );
    }
    assert_clean(&session, 0);

    for tick in 1..=TICKS {
        let delta = rng.gen_range(1..=6);
        session.step(delta).expect("step");
        assert_clean(&session, tick);

        // Occasional mid-run subdivision, right under the traffic.
        if tick % 25 == 0 {
            let edge = random_edge(&session, &mut rng);
            let details = session.graph().edge_details(edge).expect("details");
            if details.length >= 4 {
                let at = rng.gen_range(1..details.length);
                let split = session.split(details.low_vertex, None, details.high_vertex, at);
                if let Ok(via) = split {
                    assert!(session.graph().contains_vertex(via));
                }
                assert_clean(&session, tick);
            }
        }

        // Every snake keeps its (zero) length through all of it.
        for &s in &snakes {
            assert_eq!(session.snake_state(s).expect("state").length(), 0);
        }
    }

    // The ring kept all its track: total length is invariant under splits.
    let total: i64 = session.graph().all_edges().map(|e| e.length()).sum();
    assert_eq!(total, (RING_VERTICES as i64) * EDGE_LENGTH);
}

#[test]
fn fat_snakes_contend_without_corruption() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xbeef);
    let mut session = Session::new();
    let vertices = ring(&mut session);

    let mut snakes = Vec::new();
    for i in 0..SNAKES {
        let s = session
            .add_snake_at(Anchor::Vertex(vertices[i * 2]))
            .expect("seat snake");
        session
            .grow(s, End::Head, 15, &mut FirstCandidate)
            .expect("fatten");
        snakes.push(s);
    }
    assert_clean(&session, 0);
    let lengths: Vec<i64> = snakes
        .iter()
        .map(|&s| session.snake_state(s).expect("state").length())
        .collect();

    for tick in 1..=TICKS {
        let delta = rng.gen_range(1..=4);
        session.step(delta).expect("step");
        assert_clean(&session, tick);
        for (&s, &len) in snakes.iter().zip(&lengths) {
            assert_eq!(session.snake_state(s).expect("state").length(), len);
        }
    }
}

#[test]
fn split_rejections_never_leak_state() {
    // Hammer split with mostly-invalid inputs; every refusal must leave
    // the session exactly as consistent as before.
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut session = Session::new();
    let vertices = ring(&mut session);

    for round in 0..300 {
        let a = vertices[rng.gen_range(0..vertices.len())];
        let b = vertices[rng.gen_range(0..vertices.len())];
        let at = rng.gen_range(-30..30);
        let _ = session.split(a, None, b, at);
        assert_clean(&session, round);
    }
}
