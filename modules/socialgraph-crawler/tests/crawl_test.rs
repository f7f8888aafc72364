//! End-to-end crawl scenarios against in-memory collaborators.
//!
//! MockSource stands in for VK, MemoryGraph for Neo4j. No network, no Docker.

use std::sync::Arc;
use std::time::Duration;

use socialgraph_crawler::testing::{MemoryGraph, MockSource};
use socialgraph_crawler::{CrawlConfig, CrawlStats, Crawler, RateLimitedFetcher, UpsertSink};

fn crawler(source: &Arc<MockSource>, graph: &Arc<MemoryGraph>, max_depth: u32, pool_size: usize) -> Crawler {
    Crawler::new(
        RateLimitedFetcher::new(source.clone(), Duration::ZERO),
        UpsertSink::new(graph.clone()),
        CrawlConfig {
            max_depth,
            pool_size,
        },
    )
}

#[tokio::test]
async fn unreachable_child_does_not_stop_siblings() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .connections("A", &["B", "C"])
            .connections("B", &["A"])
            .failing("C"),
    );
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 2, 4).crawl("A").await;

    assert!(graph.has_user("A"));
    assert!(graph.has_user("B"));
    assert!(!graph.has_user("C"), "failed profile leaves no node");
    assert!(graph.has_follow("A", "B"));
    assert!(graph.has_follow("B", "A"));
    assert!(!graph.has_follow("A", "C"));
    assert_eq!(report.stats.entities_persisted, 2);
    assert_eq!(report.stats.entities_claimed, 3);
    assert!(report.stats.failures >= 1);
}

#[tokio::test]
async fn groups_persisted_with_placeholder_name() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .groups("A", &["G1", "G2"])
            .group("G2", Some("Devs")),
    );
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 1, 2).crawl("A").await;

    assert_eq!(graph.group_name("G1").as_deref(), Some("Unnamed Group"));
    assert_eq!(graph.group_name("G2").as_deref(), Some("Devs"));
    assert!(graph.has_subscribe("A", "G1"));
    assert!(graph.has_subscribe("A", "G2"));
    assert_eq!(report.stats.groups_persisted, 2);
    assert_eq!(source.group_detail_calls(), 1, "group details fetched in one batch");
}

#[tokio::test]
async fn seed_discoveries_are_reported() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .user("C", "Cy")
            .connections("A", &["B"])
            .pending("A", &["C"])
            .groups("A", &["G2"])
            .group("G2", Some("Devs")),
    );
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 1, 2).crawl("A").await;

    let seed = report.seed.expect("seed profile reported");
    assert_eq!(seed.id, "A");
    assert_eq!(seed.display_name, "Ada");
    assert_eq!(report.discovered_connections, vec!["B", "C"]);
    assert_eq!(report.discovered_groups.len(), 1);
    assert_eq!(report.discovered_groups[0].name.as_deref(), Some("Devs"));
    assert!(graph.has_follow("A", "C"), "pending requests become Follow edges");
}

#[tokio::test]
async fn zero_depth_is_a_no_op() {
    let source = Arc::new(MockSource::new().user("A", "Ada").connections("A", &["B"]));
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 0, 2).crawl("A").await;

    assert_eq!(source.profile_calls("A"), 0);
    assert_eq!(graph.user_count(), 0);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(report.stats, CrawlStats::default());
}

#[tokio::test]
async fn expansion_stops_at_max_depth() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .user("C", "Cy")
            .user("D", "Di")
            .connections("A", &["B"])
            .connections("B", &["C"])
            .connections("C", &["D"]),
    );
    let graph = Arc::new(MemoryGraph::new());

    crawler(&source, &graph, 2, 2).crawl("A").await;

    assert!(graph.has_follow("A", "B"));
    assert!(graph.has_follow("B", "C"));
    assert!(graph.has_user("C"), "leaf at the depth bound is persisted");
    assert_eq!(source.connection_calls("C"), 0, "leaf at the depth bound is not expanded");
    assert_eq!(source.profile_calls("D"), 0);
    assert!(!graph.has_user("D"));
}

#[tokio::test]
async fn depth_one_persists_direct_connections_only() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .connections("A", &["B"])
            .connections("B", &["C"])
            .groups("B", &["G1"]),
    );
    let graph = Arc::new(MemoryGraph::new());

    crawler(&source, &graph, 1, 2).crawl("A").await;

    assert!(graph.has_user("B"));
    assert_eq!(source.connection_calls("B"), 0);
    assert_eq!(source.group_calls("B"), 0);
    assert_eq!(graph.group_count(), 0);
}

#[tokio::test]
async fn cyclic_graph_expands_each_entity_once() {
    let ids = ["A", "B", "C", "D"];
    let mut source = MockSource::new().with_latency(Duration::from_millis(10));
    for id in ids {
        let others: Vec<&str> = ids.iter().copied().filter(|o| *o != id).collect();
        source = source.user(id, id).connections(id, &others);
    }
    let source = Arc::new(source);
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 3, 4).crawl("A").await;

    assert_eq!(source.max_connection_calls(), 1);
    for id in ids {
        assert_eq!(source.profile_calls(id), 1, "{id} fetched once");
    }
    assert_eq!(graph.user_count(), 4);
    assert_eq!(graph.edge_count(), 12, "every directed pair linked exactly once");
    assert_eq!(report.stats.entities_claimed, 4);
    assert_eq!(report.stats.failures, 0);
}

#[tokio::test]
async fn invalid_entities_never_reach_the_store() {
    let source = Arc::new(
        MockSource::new()
            .anonymous("A")
            .user("B", "Bob")
            .connections("A", &["", "B"]),
    );
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 1, 2).crawl("A").await;

    assert_eq!(graph.merged_user_ids(), vec!["B"]);
    assert!(graph.has_user("B"), "children of an invalid entity are still visited");
    assert_eq!(graph.edge_count(), 0, "no edges from an entity without a node");
    assert_eq!(report.stats.invalid_entities, 2);
}

#[tokio::test]
async fn empty_seed_is_rejected() {
    let source = Arc::new(MockSource::new());
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 2, 2).crawl("").await;

    assert_eq!(source.profile_calls(""), 0);
    assert_eq!(report.stats.invalid_entities, 1);
    assert!(graph.merged_user_ids().is_empty());
}

#[tokio::test]
async fn failures_are_isolated_among_siblings() {
    let children = ["B1", "B2", "B3", "B4", "B5"];
    let mut source = MockSource::new().user("A", "Ada").connections("A", &children).failing("B3");
    for child in children {
        source = source.user(child, child);
    }
    let source = Arc::new(source);
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 1, 3).crawl("A").await;

    assert_eq!(report.stats.entities_persisted, 5);
    assert_eq!(report.stats.failures, 1);
    for child in children {
        assert_eq!(graph.has_follow("A", child), child != "B3", "edge A->{child}");
    }
}

#[tokio::test]
async fn duplicate_connection_ids_visit_once() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .user("C", "Cy")
            .connections("A", &["B"])
            .pending("A", &["B", "C"]),
    );
    let graph = Arc::new(MemoryGraph::new());

    crawler(&source, &graph, 1, 2).crawl("A").await;

    assert_eq!(source.profile_calls("B"), 1);
    let merged_b = graph.merged_user_ids().iter().filter(|id| *id == "B").count();
    assert_eq!(merged_b, 1);
    assert_eq!(graph.edge_count(), 2);
}

#[tokio::test]
async fn persistence_failure_stops_only_that_branch() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .user("C", "Cy")
            .user("D", "Di")
            .connections("A", &["B", "C"])
            .connections("B", &["D"]),
    );
    let graph = Arc::new(MemoryGraph::new().failing_user("B"));

    let report = crawler(&source, &graph, 2, 2).crawl("A").await;

    assert!(!graph.has_user("B"));
    assert_eq!(source.connection_calls("B"), 0);
    assert_eq!(source.profile_calls("D"), 0);
    assert!(graph.has_follow("A", "C"));
    assert_eq!(report.stats.failures, 1);
}

#[tokio::test(start_paused = true)]
async fn pacing_applies_once_per_entity() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .user("B", "Bob")
            .connections("A", &["B"]),
    );
    let graph = Arc::new(MemoryGraph::new());
    let crawler = Crawler::new(
        RateLimitedFetcher::new(source.clone(), Duration::from_secs(1)),
        UpsertSink::new(graph.clone()),
        CrawlConfig {
            max_depth: 1,
            pool_size: 2,
        },
    );

    let started = tokio::time::Instant::now();
    crawler.crawl("A").await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(2), "two entities, two pauses: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "no extra pauses: {elapsed:?}");
    assert!(graph.has_follow("A", "B"));
}

#[tokio::test]
async fn links_to_unreachable_entity_are_dropped() {
    for pool_size in [1, 4] {
        let source = Arc::new(
            MockSource::new()
                .user("A", "Ada")
                .user("B", "Bob")
                .connections("A", &["B", "C"])
                .connections("B", &["C"])
                .failing("C"),
        );
        let graph = Arc::new(MemoryGraph::new());

        let report = crawler(&source, &graph, 2, pool_size).crawl("A").await;

        assert!(!graph.has_user("C"), "pool {pool_size}: no stub for a failed entity");
        assert!(!graph.has_follow("A", "C"), "pool {pool_size}");
        assert!(!graph.has_follow("B", "C"), "pool {pool_size}");
        assert!(graph.has_follow("A", "B"), "pool {pool_size}");
        assert_eq!(graph.user_count(), 2, "pool {pool_size}");
        assert_eq!(report.stats.failures, 1, "pool {pool_size}");
    }
}

#[tokio::test]
async fn link_to_entity_still_being_visited_lands_after_it_persists() {
    for pool_size in [1, 4] {
        let source = Arc::new(
            MockSource::new()
                .user("A", "Ada")
                .user("B", "Bob")
                .user("C", "Cy")
                .connections("A", &["B", "C"])
                .connections("B", &["C"])
                .with_latency(Duration::from_millis(5)),
        );
        let graph = Arc::new(MemoryGraph::new());

        crawler(&source, &graph, 2, pool_size).crawl("A").await;

        assert!(graph.has_follow("A", "C"), "pool {pool_size}");
        assert!(graph.has_follow("B", "C"), "pool {pool_size}");
        assert_eq!(source.profile_calls("C"), 1, "pool {pool_size}");
        assert_eq!(graph.user("C").and_then(|n| n.name).as_deref(), Some("Cy"));
    }
}

#[tokio::test]
async fn aliased_seed_is_expanded_under_its_canonical_id() {
    let source = Arc::new(
        MockSource::new()
            .alias("durov", "1")
            .user("1", "Pavel")
            .user("2", "Bob")
            .connections("1", &["2"])
            .connections("2", &["1"]),
    );
    let graph = Arc::new(MemoryGraph::new());

    let report = crawler(&source, &graph, 3, 2).crawl("durov").await;

    assert_eq!(source.connection_calls("durov"), 0, "lookups use the canonical id");
    assert_eq!(source.connection_calls("1"), 1);
    assert_eq!(source.connection_calls("2"), 1);
    assert_eq!(source.profile_calls("1"), 0, "canonical id already claimed by the seed");
    assert!(!graph.has_user("durov"));
    assert_eq!(graph.user_count(), 2);
    assert!(graph.has_follow("1", "2"));
    assert!(graph.has_follow("2", "1"));
    assert_eq!(report.seed.map(|e| e.id).as_deref(), Some("1"));
}

#[tokio::test]
async fn alias_of_claimed_entity_is_not_expanded_again() {
    let source = Arc::new(
        MockSource::new()
            .user("A", "Ada")
            .alias("durov", "1")
            .user("1", "Pavel")
            .connections("A", &["1", "durov"])
            .connections("1", &["A"]),
    );
    let graph = Arc::new(MemoryGraph::new());

    crawler(&source, &graph, 2, 2).crawl("A").await;

    assert_eq!(source.max_connection_calls(), 1);
    assert_eq!(source.connection_calls("durov"), 0);
    let merged_1 = graph.merged_user_ids().iter().filter(|id| *id == "1").count();
    assert_eq!(merged_1, 1);
    assert_eq!(graph.user_count(), 2);
    assert!(graph.has_follow("A", "1"));
    assert!(graph.has_follow("1", "A"));
}
