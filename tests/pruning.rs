//! Retention and chain-integrity tests.

use deltastore::{
    ChainEvent, StoreConfig, SubscriptionConfig, SubscriptionFilter, VersionChainStore,
    VersionDescriptor, VersionKind,
};
use serde_json::{json, Value};
use std::collections::HashSet;

fn assert_chain_invariants(store: &VersionChainStore) {
    let versions = store.list_versions();
    assert!(versions.len() <= store.config().max_versions);
    if versions.is_empty() {
        return;
    }

    assert_eq!(versions[0].kind, VersionKind::Full);
    assert!(versions.iter().any(|v| v.kind == VersionKind::Full));

    let present: HashSet<_> = versions.iter().map(|v| v.version_id.clone()).collect();
    for v in &versions {
        match v.kind {
            VersionKind::Full => assert!(v.base_version_id.is_none()),
            VersionKind::Delta => {
                let base = v.base_version_id.as_ref().expect("delta without base");
                assert!(present.contains(base), "dangling base {} on {}", base, v.version_id);
            }
        }
    }

    assert!(versions.windows(2).all(|w| w[0].sequence < w[1].sequence));
    assert_eq!(versions.iter().filter(|v| v.is_current).count(), 1);
}

fn state_for(i: usize) -> Value {
    json!({"i": i, "items": (0..i % 4).collect::<Vec<_>>(), "meta": {"even": i % 2 == 0}})
}

#[test]
fn test_sequential_snapshots_stay_bounded() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(3)).unwrap();

    for i in 0..20 {
        store.create_snapshot(&state_for(i), None).unwrap();
        assert_chain_invariants(&store);
    }

    let versions: Vec<VersionDescriptor> = store.list_versions();
    assert_eq!(versions.len(), 3);
    for (offset, v) in versions.iter().enumerate() {
        assert_eq!(store.restore_version(&v.version_id).unwrap(), state_for(17 + offset));
    }
}

#[test]
fn test_max_one_version() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(1)).unwrap();

    for i in 0..5 {
        let id = store.create_snapshot(&state_for(i), None).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.list_versions()[0].kind, VersionKind::Full);
        assert_eq!(store.restore_version(&id).unwrap(), state_for(i));
    }
}

#[test]
fn test_pruning_after_restore_rebases_every_dependent() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(4)).unwrap();

    let v1 = store.create_snapshot(&state_for(1), None).unwrap();
    store.create_snapshot(&state_for(2), None).unwrap();
    store.create_snapshot(&state_for(3), None).unwrap();

    // Two more deltas based on v1, so v1 has three dependents.
    store.restore_version(&v1).unwrap();
    let v4 = store.create_snapshot(&state_for(4), None).unwrap();
    store.restore_version(&v1).unwrap();
    let v5 = store.create_snapshot(&state_for(5), None).unwrap();

    assert_chain_invariants(&store);
    assert_eq!(store.len(), 4);
    assert!(store.get_version(&v1).is_none());

    assert_eq!(store.restore_version(&v4).unwrap(), state_for(4));
    assert_eq!(store.restore_version(&v5).unwrap(), state_for(5));
}

#[test]
fn test_snapshot_from_oldest_version_then_prune() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(3)).unwrap();
    let v1 = store.create_snapshot(&state_for(1), None).unwrap();
    store.create_snapshot(&state_for(2), None).unwrap();
    store.create_snapshot(&state_for(3), None).unwrap();

    store.restore_version(&v1).unwrap();
    let v4 = store.create_snapshot(&state_for(4), None).unwrap();

    assert_chain_invariants(&store);
    assert_eq!(store.current_version().unwrap().version_id, v4);
    assert_eq!(store.current_state().unwrap(), Some(state_for(4)));
}

#[test]
fn test_manual_prune_is_noop_within_limit() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(5)).unwrap();
    let handle = store.subscribe(SubscriptionConfig {
        filter: SubscriptionFilter::retention(),
        ..Default::default()
    });

    for i in 0..3 {
        store.create_snapshot(&state_for(i), None).unwrap();
    }
    let outcome = store.prune_to_limit().unwrap();

    assert_eq!(outcome.removed_count, 0);
    assert_eq!(outcome.remaining, 3);
    assert!(handle.drain().is_empty());
}

#[test]
fn test_pruned_events_report_counts() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(2)).unwrap();
    let handle = store.subscribe(SubscriptionConfig {
        filter: SubscriptionFilter::retention(),
        ..Default::default()
    });

    for i in 0..4 {
        store.create_snapshot(&state_for(i), None).unwrap();
    }

    let events = handle.drain();
    assert_eq!(events.len(), 2);
    for event in events {
        match event {
            ChainEvent::VersionsPruned {
                entity_id,
                removed_count,
                remaining,
            } => {
                assert_eq!(entity_id, "e");
                assert_eq!(removed_count, 1);
                assert_eq!(remaining, 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}

#[test]
fn test_periodic_full_snapshots_survive_pruning() {
    let config = StoreConfig::default()
        .with_max_versions(5)
        .with_full_snapshot_every(2);
    let mut store = VersionChainStore::new("e", config).unwrap();

    for i in 0..12 {
        store.create_snapshot(&state_for(i), None).unwrap();
        assert_chain_invariants(&store);
    }

    let versions = store.list_versions();
    for (offset, v) in versions.iter().enumerate() {
        assert_eq!(store.restore_version(&v.version_id).unwrap(), state_for(7 + offset));
    }
}

#[test]
fn test_performance_stats_track_storage() {
    let mut store = VersionChainStore::new("e", StoreConfig::default().with_max_versions(3)).unwrap();
    for i in 0..5 {
        store.create_snapshot(&state_for(i), None).unwrap();
    }
    let versions = store.list_versions();
    store.restore_version(&versions[0].version_id).unwrap();

    let stats = store.performance_stats();
    assert_eq!(stats.snapshot_count, 5);
    assert_eq!(stats.restore_count, 1);
    assert_eq!(stats.full_count + stats.delta_count, 3);
    assert_eq!(
        stats.storage_bytes,
        versions.iter().map(|v| v.metadata.size_bytes).sum::<usize>()
    );
}
