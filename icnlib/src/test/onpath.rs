use rand::rngs::StdRng;
use rand::SeedableRng;

use super::{enable_tracing, line_topology, request, Call, RecordingNetwork};
use crate::error::StrategyError;
use crate::network::NetworkView;
use crate::strategy::onpath::admission_probability;
use crate::strategy::{
    CacheLessForMore, Edge, LeaveCopyDown, LeaveCopyEverywhere, NoCache, ProbCache, RandomBernoulli, RandomChoice,
    Strategy,
};

/// A - B - C, B caching one content, C serving content 1
fn abc() -> RecordingNetwork {
    RecordingNetwork::new(line_topology(3, &[(1, 1)], 2, [1]))
}

#[test]
fn no_cache_never_inserts() {
    enable_tracing();
    let mut net = abc();
    let mut strategy = NoCache::new();
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(
        net.take(),
        vec![
            Call::Start {
                receiver: 0,
                content: 1,
                log: true
            },
            Call::RequestHop(0, 1),
            Call::RequestHop(1, 2),
            Call::Get(2, true),
            Call::ContentHop(2, 1, true),
            Call::ContentHop(1, 0, true),
            Call::End,
        ]
    );
    net.replay(&mut strategy, &[request(1.0, 0, 1), request(2.0, 0, 1)]).unwrap();
    assert!(net.puts().is_empty());
    assert!(net.inner.cache_dump(1).is_empty());
}

#[test]
fn edge_inserts_once_on_the_first_miss() {
    let mut net = abc();
    let mut strategy = Edge::new();
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(
        net.take(),
        vec![
            Call::Start {
                receiver: 0,
                content: 1,
                log: true
            },
            Call::RequestHop(0, 1),
            Call::Get(1, false),
            Call::RequestHop(1, 2),
            Call::Get(2, true),
            Call::ContentHop(2, 1, true),
            Call::ContentHop(1, 0, true),
            Call::Put(1),
            Call::End,
        ]
    );
    net.replay(&mut strategy, &[request(1.0, 0, 1), request(2.0, 0, 1)]).unwrap();
    assert!(net.puts().is_empty());
    assert_eq!(
        net.request_hops(),
        vec![(0, 1), (0, 1)],
        "hits at the edge never travel further"
    );
}

#[test]
fn edge_skips_caches_past_the_first() {
    // 0 - 1 - 2 - 3, both 1 and 2 cache, 2 already holds the content
    let mut net = RecordingNetwork::new(line_topology(4, &[(1, 1), (2, 1)], 3, [1]));
    net.replay(&mut LeaveCopyDown::new(), &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(net.inner.cache_dump(2), vec![1]);
    net.take();

    net.replay(&mut Edge::new(), &[request(1.0, 0, 1)]).unwrap();
    assert!(!net.calls.contains(&Call::Get(2, true)));
    assert!(net.calls.contains(&Call::Get(3, true)));
    assert_eq!(net.puts(), vec![1]);
}

#[test]
fn lce_copies_at_every_cache() {
    let mut net = RecordingNetwork::new(line_topology(4, &[(1, 2), (2, 2)], 3, 1..=5));
    net.replay(&mut LeaveCopyEverywhere::new(), &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(net.puts(), vec![2, 1]);
    net.take();

    net.replay(&mut LeaveCopyEverywhere::new(), &[request(1.0, 0, 1)]).unwrap();
    assert!(net.calls.contains(&Call::Get(1, true)));
    assert!(net.puts().is_empty());
}

#[test]
fn lcd_moves_one_level_down_per_hit() {
    let mut net = RecordingNetwork::new(line_topology(4, &[(1, 2), (2, 2)], 3, 1..=5));
    let mut strategy = LeaveCopyDown::new();
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(net.take().into_iter().filter(|c| matches!(c, Call::Put(_))).count(), 1);
    assert_eq!(net.inner.cache_dump(2), vec![1]);
    assert!(net.inner.cache_dump(1).is_empty());

    net.replay(&mut strategy, &[request(1.0, 0, 1)]).unwrap();
    assert_eq!(net.take().last(), Some(&Call::End));
    assert_eq!(net.inner.cache_dump(1), vec![1]);

    net.replay(&mut strategy, &[request(2.0, 0, 1)]).unwrap();
    assert!(net.puts().is_empty());
}

#[test]
fn prob_cache_admits_everywhere_with_a_tiny_window() {
    let mut net = RecordingNetwork::new(line_topology(4, &[(1, 1), (2, 1)], 3, [1]));
    let mut strategy = ProbCache::new(&net, 0.25, StdRng::seed_from_u64(0)).unwrap();
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(net.puts(), vec![2, 1]);
}

#[test]
fn prob_cache_admits_nothing_with_a_huge_window() {
    let mut net = RecordingNetwork::new(line_topology(4, &[(1, 1), (2, 1)], 3, [1]));
    let mut strategy = ProbCache::new(&net, 1e12, StdRng::seed_from_u64(0)).unwrap();
    let events: Vec<_> = (0..20).map(|i| request(i as f64, 0, 1)).collect();
    net.replay(&mut strategy, &events).unwrap();
    assert!(net.puts().is_empty());
}

#[test]
fn prob_cache_rejects_a_non_positive_window() {
    let net = abc();
    for t_tw in [0.0, -1.0, f64::NAN] {
        assert!(matches!(
            ProbCache::new(&net, t_tw, StdRng::seed_from_u64(0)),
            Err(StrategyError::InvalidParameter { name: "t_tw", .. })
        ));
    }
}

#[test]
fn admission_probability_matches_the_formula() {
    // Two caches of size 1 on the path, first one crossed, both still ahead
    let p = admission_probability(2.0, 10.0, 1.0, 1.0, 2.0);
    assert!((p - 0.05).abs() < 1e-12);
    assert_eq!(admission_probability(100.0, 1.0, 1.0, 1.0, 1.0), 1.0);
    assert_eq!(admission_probability(1.0, 1.0, 1.0, 0.0, 0.0), 0.0);
}

#[test]
fn cl4m_breaks_ties_towards_the_receiver() {
    // 0 - 1 - 2 - 3 - 4: nodes 1 and 3 have the same betweenness, both cache
    let mut net = RecordingNetwork::new(line_topology(5, &[(1, 1), (3, 1)], 4, [1]));
    let mut strategy = CacheLessForMore::new(&net, false);
    assert_eq!(strategy.betweenness(1), strategy.betweenness(3));
    assert!(strategy.betweenness(2) > strategy.betweenness(1));
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(net.puts(), vec![1]);
}

#[test]
fn cl4m_prefers_the_most_central_cache() {
    let mut net = RecordingNetwork::new(line_topology(5, &[(1, 1), (2, 1), (3, 1)], 4, [1]));
    let mut strategy = CacheLessForMore::new(&net, false);
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert_eq!(net.puts(), vec![2]);
}

#[test]
fn cl4m_with_ego_betweenness() {
    let net = RecordingNetwork::new(line_topology(5, &[(1, 1), (3, 1)], 4, [1]));
    let strategy = CacheLessForMore::new(&net, true);
    // Every interior node of a line sits in the middle of a three node ego network
    assert_eq!(strategy.betweenness(1), strategy.betweenness(2));
    assert_eq!(strategy.betweenness(0), 0.0);
    assert_eq!(strategy.name(), "CL4M");
}

#[test]
fn random_choice_picks_one_inner_cache() {
    let mut net = RecordingNetwork::new(line_topology(5, &[(1, 1), (2, 1), (3, 1)], 4, 1..=10));
    let mut strategy = RandomChoice::new(StdRng::seed_from_u64(3));
    for content in 1..=10 {
        net.take();
        net.replay(&mut strategy, &[request(content as f64, 0, content)]).unwrap();
        let puts = net.puts();
        assert_eq!(puts.len(), 1);
        assert!([1, 2, 3].contains(&puts[0]));
    }
}

#[test]
fn random_choice_without_inner_caches() {
    let mut net = RecordingNetwork::new(line_topology(3, &[], 2, [1]));
    let mut strategy = RandomChoice::new(StdRng::seed_from_u64(3));
    net.replay(&mut strategy, &[request(0.0, 0, 1)]).unwrap();
    assert!(net.puts().is_empty());
}

#[test]
fn random_bernoulli_extremes() {
    let mut net = RecordingNetwork::new(line_topology(4, &[(1, 4), (2, 4)], 3, 1..=3));
    let mut never = RandomBernoulli::new(0.0, StdRng::seed_from_u64(1)).unwrap();
    net.replay(&mut never, &[request(0.0, 0, 1), request(1.0, 0, 2)]).unwrap();
    assert!(net.puts().is_empty());

    let mut always = RandomBernoulli::new(1.0, StdRng::seed_from_u64(1)).unwrap();
    net.replay(&mut always, &[request(2.0, 0, 3)]).unwrap();
    assert_eq!(net.puts(), vec![2, 1]);

    assert!(RandomBernoulli::new(1.5, StdRng::seed_from_u64(1)).is_err());
}

#[test]
fn seeded_strategies_replay_identically() {
    let events: Vec<_> = (0..50).map(|i| request(i as f64, 0, 1 + (i * 7) % 11)).collect();
    let run = |seed: u64| {
        let mut net = RecordingNetwork::new(line_topology(6, &[(1, 2), (2, 2), (3, 2), (4, 2)], 5, 1..=11));
        let mut bernoulli = RandomBernoulli::new(0.4, StdRng::seed_from_u64(seed)).unwrap();
        net.replay(&mut bernoulli, &events).unwrap();
        let mut prob = ProbCache::new(&net, 2.0, StdRng::seed_from_u64(seed)).unwrap();
        net.replay(&mut prob, &events).unwrap();
        net.take()
    };
    assert_eq!(run(42), run(42));
}

#[test]
fn unknown_content_is_an_error() {
    let mut net = abc();
    let err = net.replay(&mut LeaveCopyEverywhere::new(), &[request(0.0, 0, 99)]);
    assert!(matches!(err, Err(StrategyError::UnknownContent(99))));
}

#[test]
fn missing_content_at_the_source_is_fatal() {
    let mut net = abc();
    net.lose_sources = true;
    let err = NoCache::new().process_event(&mut net, &request(0.0, 0, 1));
    assert!(matches!(err, Err(StrategyError::ContentNotAtSource { content: 1, node: 2 })));
    let mut net = abc();
    net.lose_sources = true;
    let err = LeaveCopyDown::new().process_event(&mut net, &request(0.0, 0, 1));
    assert!(matches!(err, Err(StrategyError::ContentNotAtSource { content: 1, node: 2 })));
}

#[test]
fn names_match_the_registry() {
    let net = abc();
    let names = [
        NoCache::new().name(),
        Edge::new().name(),
        LeaveCopyEverywhere::new().name(),
        LeaveCopyDown::new().name(),
        ProbCache::new(&net, 10.0, StdRng::seed_from_u64(0)).unwrap().name(),
        CacheLessForMore::new(&net, false).name(),
        RandomChoice::new(StdRng::seed_from_u64(0)).name(),
        RandomBernoulli::new(0.2, StdRng::seed_from_u64(0)).unwrap().name(),
    ];
    assert_eq!(
        names,
        ["NO_CACHE", "EDGE", "LCE", "LCD", "PROB_CACHE", "CL4M", "RAND_CHOICE", "RAND_BERNOULLI"]
    );
    assert!(net.has_cache(1));
}
