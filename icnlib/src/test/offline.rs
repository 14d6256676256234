use super::{line_topology, request, Call, RecordingNetwork};
use crate::artifacts::{ContentIndex, MembershipMatrix, Snapshot};
use crate::error::{ArtifactError, StrategyError};
use crate::strategy::{Event, Hybrid, Optimal, StaticOptimal, Strategy};

/// 0 - 1 - 2 - 3, nodes 1 and 2 cache two contents each, 3 serves 1..=4
fn line() -> RecordingNetwork {
    RecordingNetwork::new(line_topology(4, &[(1, 2), (2, 2)], 3, 1..=4))
}

/// A snapshot where `members` lists the `(node, content)` pairs of the matrix
fn snapshot(members: &[(usize, usize)], placement: Vec<(u32, u64)>) -> Snapshot {
    let mut rows = vec![vec![false; 4]; 4];
    for &(node, content) in members {
        rows[node][content - 1] = true;
    }
    Snapshot::new(MembershipMatrix::from_rows(rows), placement, ContentIndex::OneBased)
}

fn two_snapshots() -> Vec<Snapshot> {
    vec![
        snapshot(&[(1, 1)], vec![(2, 2)]),
        snapshot(&[(2, 1)], vec![(1, 3)]),
    ]
}

#[test]
fn optimal_preloads_then_follows_the_snapshot() {
    let mut net = line();
    let mut strategy = Optimal::new(Box::new(two_snapshots()), 0, 2, None).unwrap();
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(
        net.take(),
        vec![
            Call::Start {
                receiver: 0,
                content: 2,
                log: false
            },
            Call::Put(2),
            Call::End,
            Call::Start {
                receiver: 0,
                content: 1,
                log: true
            },
            Call::RequestHop(0, 1),
            Call::Get(1, false),
            Call::RequestHop(1, 2),
            Call::Get(2, false),
            Call::RequestHop(2, 3),
            Call::Get(3, true),
            Call::ContentHop(3, 2, true),
            Call::ContentHop(2, 1, true),
            Call::Put(1),
            Call::ContentHop(1, 0, true),
            Call::End,
        ]
    );
    assert_eq!(net.inner.cache_dump(2), vec![2]);
    assert_eq!(strategy.current_snapshot(), 0);
}

#[test]
fn optimal_swaps_snapshots_at_checkpoints() {
    let mut net = line();
    let mut strategy = Optimal::new(Box::new(two_snapshots()), 0, 2, None).unwrap();
    net.replay(&mut strategy, &[request(0.0, 0, 1), request(1.0, 0, 1)]).unwrap();
    assert_eq!(strategy.current_snapshot(), 0);
    net.take();

    net.replay(&mut strategy, &[request(2.0, 0, 1)]).unwrap();
    assert_eq!(strategy.current_snapshot(), 1);
    assert!(net.calls.contains(&Call::Record("optimal.checkpoint".to_string())));
    assert!(net.inner.cache_dump(1).contains(&3));
    net.take();

    // Snapshot 1 wants content 1 at node 2 only
    net.replay(&mut strategy, &[request(3.0, 0, 4)]).unwrap();
    assert!(net.puts().is_empty());

    // No snapshot left to swap in
    net.replay(&mut strategy, &[request(4.0, 0, 1), request(5.0, 0, 1), request(6.0, 0, 1)]).unwrap();
    assert_eq!(strategy.current_snapshot(), 1);
    assert_eq!(
        net.calls.iter().filter(|c| matches!(c, Call::Record(_))).count(),
        0
    );
}

#[test]
fn optimal_stops_at_max_snapshots() {
    let mut net = line();
    let mut strategy = Optimal::new(Box::new(two_snapshots()), 0, 1, Some(1)).unwrap();
    let events: Vec<_> = (0..5).map(|i| request(i as f64, 0, 1)).collect();
    net.replay(&mut strategy, &events).unwrap();
    assert_eq!(strategy.current_snapshot(), 0);
}

#[test]
fn optimal_warmup_moves_nothing() {
    let mut net = line();
    let mut strategy = Optimal::new(Box::new(two_snapshots()), 2, 10, None).unwrap();
    net.replay(&mut strategy, &[request(0.0, 0, 1), request(1.0, 0, 1)]).unwrap();
    assert!(net.request_hops().is_empty());
    assert_eq!(net.puts(), vec![2], "only the preloaded placement");
    assert!(net
        .calls
        .iter()
        .all(|c| !matches!(c, Call::Start { log: true, .. })));
    net.take();

    net.replay(&mut strategy, &[request(2.0, 0, 1)]).unwrap();
    assert_eq!(net.request_hops(), vec![(0, 1), (1, 2), (2, 3)]);
}

#[test]
fn optimal_rejects_bad_parameters() {
    assert!(matches!(
        Optimal::new(Box::new(two_snapshots()), 0, 0, None),
        Err(StrategyError::InvalidParameter { name: "checkpoint_interval", .. })
    ));
    assert!(matches!(
        Optimal::new(Box::new(Vec::<Snapshot>::new()), 0, 1, None),
        Err(StrategyError::Artifact(ArtifactError::MissingSnapshot(0)))
    ));
}

#[test]
fn static_optimal_never_changes_the_placement() {
    let mut net = line();
    let mut strategy = StaticOptimal::new(vec![(1, 2)], 1);
    net.replay(&mut strategy, &[request(0.0, 0, 2)]).unwrap();
    assert_eq!(
        net.take(),
        vec![
            Call::Start {
                receiver: 0,
                content: 2,
                log: false
            },
            Call::Put(1),
            Call::End,
            Call::Start {
                receiver: 0,
                content: 2,
                log: false
            },
            Call::End,
        ]
    );

    net.replay(&mut strategy, &[request(1.0, 0, 2), request(2.0, 0, 1), request(3.0, 0, 1)])
        .unwrap();
    assert!(net.puts().is_empty());
    assert_eq!(net.calls.iter().filter(|c| **c == Call::Get(1, true)).count(), 1);
    assert_eq!(net.calls.iter().filter(|c| **c == Call::Get(3, true)).count(), 2);
    assert_eq!(strategy.name(), "STATIC_OPTIMAL");
}

/// Node 1 has room for three contents and node 2 for two, half of each is static
fn hybrid_setup() -> (RecordingNetwork, Hybrid) {
    let net = RecordingNetwork::new(line_topology(4, &[(1, 3), (2, 2)], 3, 1..=6));
    let strategy = Hybrid::new(vec![5, 6, 1, 2], 0.5).unwrap();
    (net, strategy)
}

#[test]
fn hybrid_partitions_before_the_first_request() {
    let (mut net, mut strategy) = hybrid_setup();
    assert_eq!(strategy.static_capacity(3), 2);
    assert_eq!(strategy.static_capacity(2), 1);
    net.replay(&mut strategy, &[request(0.0, 0, 6)]).unwrap();
    let calls = net.take();
    let partitions: Vec<_> = calls
        .iter()
        .filter(|c| matches!(c, Call::Partition(..) | Call::PutStatic(_)))
        .cloned()
        .collect();
    assert_eq!(
        partitions,
        vec![
            Call::Partition(1, 2),
            Call::PutStatic(1),
            Call::PutStatic(1),
            Call::Partition(2, 1),
            Call::PutStatic(2),
        ]
    );
    assert_eq!(net.inner.static_cache(1).map(|s| s.contents().to_vec()), Some(vec![5, 6]));
    assert_eq!(net.inner.static_cache(2).map(|s| s.contents().to_vec()), Some(vec![5]));
    assert_eq!(net.inner.cache(1).map(|c| crate::cache::ContentCache::capacity(c)), Some(1));

    // Content 6 is pinned at node 1
    assert!(calls.contains(&Call::GetStatic(1, true)));
    assert!(calls.contains(&Call::Record("hybrid.static_hit".to_string())));
    assert!(!calls.iter().any(|c| matches!(c, Call::PutDynamic(_))));
}

#[test]
fn hybrid_misses_fill_the_dynamic_partition() {
    let (mut net, mut strategy) = hybrid_setup();
    net.replay(&mut strategy, &[request(0.0, 0, 3)]).unwrap();
    let calls = net.take();
    let probes: Vec<_> = calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                Call::GetStatic(..) | Call::GetDynamic(..) | Call::PutDynamic(_) | Call::PutStatic(_)
            )
        })
        .skip(3)
        .cloned()
        .collect();
    assert_eq!(
        probes,
        vec![
            Call::GetStatic(1, false),
            Call::GetDynamic(1, false),
            Call::GetStatic(2, false),
            Call::GetDynamic(2, false),
            Call::GetDynamic(3, true),
            Call::PutDynamic(2),
            Call::PutDynamic(1),
        ]
    );

    net.replay(&mut strategy, &[request(1.0, 0, 3)]).unwrap();
    assert!(net.calls.contains(&Call::GetDynamic(1, true)));
    assert!(net.calls.contains(&Call::Record("hybrid.dynamic_hit".to_string())));
    // Static partitions never change after the preload
    assert_eq!(net.inner.static_cache(1).map(|s| s.contents().to_vec()), Some(vec![5, 6]));
}

#[test]
fn hybrid_skips_records_of_unlogged_requests() {
    let (mut net, mut strategy) = hybrid_setup();
    net.replay(&mut strategy, &[Event::new(0.0, 0, 5, false)]).unwrap();
    assert!(!net.calls.iter().any(|c| matches!(c, Call::Record(_))));
    assert!(net.calls.contains(&Call::GetStatic(1, true)));
}

#[test]
fn hybrid_rejects_bad_fractions() {
    assert!(Hybrid::new(vec![1], 1.5).is_err());
    assert!(Hybrid::new(vec![1], -0.5).is_err());
    assert!(Hybrid::new(vec![1], f64::NAN).is_err());
    assert_eq!(Hybrid::new(vec![1], 1.0).unwrap().name(), "HYBRID");
}
