//! Property tests for the codec and chain invariants.

use deltastore::{apply, diff, StoreConfig, VersionChainStore, VersionKind};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| Value::from(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-d]{1,2}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

#[derive(Clone, Debug)]
enum Op {
    Snapshot(Value),
    Restore(usize),
    Prune,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_value().prop_map(Op::Snapshot),
        1 => any::<usize>().prop_map(Op::Restore),
        1 => Just(Op::Prune),
    ]
}

proptest! {
    #[test]
    fn prop_apply_inverts_diff(a in arb_value(), b in arb_value()) {
        let patch = diff(&a, &b);
        prop_assert_eq!(apply(&a, &patch).unwrap(), b);
    }

    #[test]
    fn prop_self_diff_is_empty(a in arb_value()) {
        prop_assert!(diff(&a, &a).is_empty());
    }

    #[test]
    fn prop_snapshot_roundtrip(states in prop::collection::vec(arb_value(), 1..8)) {
        let mut store = VersionChainStore::new("p", StoreConfig::default().with_max_versions(20)).unwrap();
        for state in &states {
            let id = store.create_snapshot(state, None).unwrap();
            prop_assert_eq!(&store.restore_version(&id).unwrap(), state);
        }
    }

    #[test]
    fn prop_chain_invariants_hold(
        max_versions in 1usize..6,
        ops in prop::collection::vec(arb_op(), 1..30),
    ) {
        let mut store = VersionChainStore::new("p", StoreConfig::default().with_max_versions(max_versions)).unwrap();
        let mut expected = std::collections::HashMap::new();

        for op in ops {
            match op {
                Op::Snapshot(state) => {
                    let id = store.create_snapshot(&state, None).unwrap();
                    expected.insert(id, state);
                }
                Op::Restore(pick) => {
                    let versions = store.list_versions();
                    if !versions.is_empty() {
                        let id = &versions[pick % versions.len()].version_id;
                        prop_assert_eq!(&store.restore_version(id).unwrap(), &expected[id]);
                    }
                }
                Op::Prune => {
                    store.prune_to_limit().unwrap();
                }
            }

            let versions = store.list_versions();
            prop_assert!(versions.len() <= max_versions);
            if !versions.is_empty() {
                prop_assert_eq!(versions[0].kind, VersionKind::Full);
            }
        }

        for v in store.list_versions() {
            prop_assert_eq!(&store.restore_version(&v.version_id).unwrap(), &expected[&v.version_id]);
        }
    }

    #[test]
    fn prop_change_set_totals_consistent(a in arb_value(), b in arb_value()) {
        let mut store = VersionChainStore::new("p", StoreConfig::default()).unwrap();
        let v1 = store.create_snapshot(&a, None).unwrap();
        let v2 = store.create_snapshot(&b, None).unwrap();

        let change_set = store.compare_versions(&v1, &v2).unwrap();
        prop_assert_eq!(
            change_set.total_changes,
            change_set.additions.len() + change_set.modifications.len() + change_set.deletions.len()
        );
    }
}
