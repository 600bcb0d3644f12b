mod common;

use bytes::Bytes;
use common::{Health, Pos};
use tessera::prelude::*;
use test_log::test;

#[test]
fn state_snapshot_restores_through_emplace() {
    let source = Registry::new();
    source.register::<Pos>("pos");
    source.register::<Health>("health");

    let e0 = source.spawn();
    let e1 = source.spawn();
    source.add(e0, Pos { x: 1, y: 2 }).expect("registered");
    source.add(e1, Pos { x: 3, y: 4 }).expect("registered");
    source
        .add(e1, Health { current: 9, max: 10 })
        .expect("registered");

    let snapshot = source.state_snapshot();

    let target = Registry::new();
    target.register::<Pos>("pos");
    target.register::<Health>("health");
    for state in &snapshot {
        for (entity, bytes) in &state.entries {
            target.emplace_from_bytes(*entity, &state.key, bytes);
        }
    }

    assert_eq!(target.get_cloned::<Pos>(e0), Some(Pos { x: 1, y: 2 }));
    assert_eq!(target.get_cloned::<Pos>(e1), Some(Pos { x: 3, y: 4 }));
    assert_eq!(
        target.get_cloned::<Health>(e1),
        Some(Health { current: 9, max: 10 })
    );
    assert_eq!(target.get_cloned::<Health>(e0), None);
}

#[test]
fn snapshot_is_sorted_by_key_and_complete() {
    let registry = Registry::new();
    registry.register::<Pos>("pos");
    registry.register::<Health>("health");

    let entity = registry.spawn();
    registry.add(entity, Pos { x: 0, y: 0 }).expect("registered");

    let snapshot = registry.state_snapshot();
    let keys: Vec<_> = snapshot.iter().map(|state| state.key.as_str()).collect();
    assert_eq!(keys, vec!["health", "pos"]);

    let empty = snapshot
        .iter()
        .find(|state| state.key == "health")
        .expect("registered");
    assert!(empty.entries.is_empty());
}

#[test]
fn emplace_with_unknown_key_is_a_no_op() {
    let registry = Registry::new();
    registry.register::<Pos>("pos");

    let entity = registry.spawn();
    registry.emplace_from_bytes(entity, "bogus", &Bytes::from_static(&[0, 0, 0, 1]));

    assert!(!registry.has::<Pos>(entity));
}

#[test]
fn emplace_with_malformed_bytes_is_a_no_op() {
    let registry = Registry::new();
    registry.register::<Pos>("pos");

    let entity = registry.spawn();
    registry.emplace_from_bytes(entity, "pos", &Bytes::from_static(&[1, 2]));

    assert!(!registry.has::<Pos>(entity));
}

#[test]
fn emplace_routes_by_key() {
    let registry = Registry::new();
    registry.register::<Pos>("pos");
    registry.register::<Health>("health");

    let entity = registry.spawn();
    registry.emplace_from_bytes(entity, "pos", &Pos { x: 5, y: 6 }.to_bytes());
    registry.emplace_from_bytes(
        entity,
        "health",
        &Health { current: 1, max: 2 }.to_bytes(),
    );

    assert_eq!(registry.get_cloned::<Pos>(entity), Some(Pos { x: 5, y: 6 }));
    assert_eq!(
        registry.get_cloned::<Health>(entity),
        Some(Health { current: 1, max: 2 })
    );
}
