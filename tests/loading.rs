mod common;

use std::fs;

use common::{Follower, Health, Pos, engine_with_plugins};
use tessera::prelude::*;
use test_log::test;

fn write_config(dir: &std::path::Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).expect("writable temp dir");
}

#[test]
fn configuration_load_spawns_entities() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "game.json",
        r#"{
            "plugins": ["test", "health"],
            "templates": [
                {"name": "grunt", "config": {"health": {"current": 100, "max": 100}}}
            ],
            "entities": [
                {"template": "grunt", "pos": {"x": 0, "y": 0}}
            ]
        }"#,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    let entity = Entity::from_index(0);
    assert_eq!(
        engine.registry().get_cloned::<Pos>(entity),
        Some(Pos { x: 0, y: 0 })
    );
    assert_eq!(
        engine.registry().get_cloned::<Health>(entity),
        Some(Health {
            current: 100,
            max: 100
        })
    );
}

#[test]
fn templates_inherit_recursively() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "templates.json",
        r#"{
            "plugins": ["test", "health"],
            "templates": [
                {"name": "mob", "config": {"health": {"current": 50, "max": 50}, "pos": {"x": 1, "y": 1}}},
                {"name": "elite_mob", "config": {"template": "mob", "health": {"current": 200, "max": 200}}}
            ],
            "entities": [
                {"template": "elite_mob"}
            ]
        }"#,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    let entity = Entity::from_index(0);
    // The child template overrides health but inherits pos from its parent.
    assert_eq!(
        engine.registry().get_cloned::<Health>(entity),
        Some(Health {
            current: 200,
            max: 200
        })
    );
    assert_eq!(
        engine.registry().get_cloned::<Pos>(entity),
        Some(Pos { x: 1, y: 1 })
    );
}

#[test]
fn template_instantiation_substitutes_parameters() {
    let engine = engine_with_plugins();
    let ctx = engine.ctx();
    engine
        .loader()
        .load_plugin(&ctx, "health", None)
        .expect("static plugin");

    let template: ValueMap = [(
        "health".to_string(),
        Value::Object(
            [
                ("current".to_string(), Value::Str("$hp".to_string())),
                ("max".to_string(), Value::Str("$hp".to_string())),
            ]
            .into_iter()
            .collect(),
        ),
    )]
    .into_iter()
    .collect();
    engine.registry().add_template("grunt", template);

    let params: ValueMap = [("hp".to_string(), Value::Int(75))].into_iter().collect();
    let entity = engine
        .loader()
        .load_entity_template(&ctx, "grunt", &[], Some(&params))
        .expect("known template");

    assert_eq!(
        engine.registry().get_cloned::<Health>(entity),
        Some(Health {
            current: 75,
            max: 75
        })
    );
}

#[test]
fn template_instantiation_applies_raw_components() {
    let engine = engine_with_plugins();
    let ctx = engine.ctx();
    engine
        .loader()
        .load_plugin(&ctx, "test", None)
        .expect("static plugin");

    engine.registry().add_template("marker", ValueMap::new());

    let pos = Pos { x: 3, y: 4 };
    let entity = engine
        .loader()
        .load_entity_template(&ctx, "marker", &[("pos".to_string(), pos.to_bytes())], None)
        .expect("known template");

    assert_eq!(engine.registry().get_cloned::<Pos>(entity), Some(pos));
}

#[test]
fn missing_fields_abort_only_that_component() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "broken.json",
        r#"{
            "plugins": ["test", "health"],
            "entities": [
                {"pos": {"x": 9, "y": 9}, "health": {"current": 10}}
            ]
        }"#,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    let entity = Entity::from_index(0);
    assert_eq!(
        engine.registry().get_cloned::<Pos>(entity),
        Some(Pos { x: 9, y: 9 })
    );
    assert!(!engine.registry().has::<Health>(entity));
}

#[test]
fn unknown_component_keys_are_diagnosed_not_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "unknown.json",
        r#"{
            "plugins": ["test"],
            "entities": [
                {"pos": {"x": 1, "y": 2}, "gizmo": {"level": 3}}
            ]
        }"#,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    assert_eq!(
        engine.registry().get_cloned::<Pos>(Entity::from_index(0)),
        Some(Pos { x: 1, y: 2 })
    );
}

#[test]
fn scenes_and_scene_tags_load_from_configuration() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "scenes.json",
        r#"{
            "plugins": ["test"],
            "scenes": [
                {"name": "game", "state": "main"},
                {"name": "menu", "state": "disabled"}
            ],
            "entities": [
                {"pos": {"x": 0, "y": 0}, "scene": {"name": "game", "state": "active"}},
                {"pos": {"x": 1, "y": 1}, "scene": "menu"}
            ]
        }"#,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");
    engine.registry().setup_scene_systems();

    assert_eq!(engine.registry().current_scenes(), vec!["game"]);
    assert!(engine.registry().is_in_current_scene(Entity::from_index(0)));
    assert!(!engine.registry().is_in_current_scene(Entity::from_index(1)));
}

#[test]
fn nested_directories_are_walked() {
    let dir = tempfile::tempdir().expect("temp dir");
    let nested = dir.path().join("level1");
    fs::create_dir(&nested).expect("writable temp dir");
    write_config(
        &nested,
        "entities.json",
        r#"{"plugins": ["test"], "entities": [{"pos": {"x": 5, "y": 5}}]}"#,
    );
    // Non-configuration files are ignored.
    write_config(dir.path(), "notes.txt", "not json");

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    assert_eq!(
        engine.registry().get_cloned::<Pos>(Entity::from_index(0)),
        Some(Pos { x: 5, y: 5 })
    );
}

#[test]
fn plugin_loading_is_idempotent() {
    let engine = engine_with_plugins();
    let ctx = engine.ctx();

    engine.loader().load_plugin(&ctx, "test", None).expect("static plugin");
    let entity = engine.registry().spawn();
    engine
        .registry()
        .add(entity, Pos { x: 2, y: 2 })
        .expect("registered");

    // A second load must not re-run registration and wipe existing slots.
    engine.loader().load_plugin(&ctx, "test", None).expect("static plugin");
    assert_eq!(
        engine.registry().get_cloned::<Pos>(entity),
        Some(Pos { x: 2, y: 2 })
    );

    assert!(engine.loader().host().is_loaded("test"));
    assert_eq!(
        engine.loader().host().owner_of("follower"),
        Some("test".to_string())
    );
}

#[test]
fn missing_dynamic_libraries_are_an_error() {
    let engine = Engine::new();
    let ctx = engine.ctx();
    engine.loader().host().set_search_dir("does/not/exist");

    assert!(engine.loader().load_plugin(&ctx, "ghost", None).is_err());
}

#[test]
fn spawn_request_event_instantiates_a_template() {
    let engine = engine_with_plugins();
    let ctx = engine.ctx();
    engine
        .loader()
        .load_plugin(&ctx, "test", None)
        .expect("static plugin");

    let template: ValueMap = [(
        "pos".to_string(),
        Value::Object(
            [
                ("x".to_string(), Value::Str("$x".to_string())),
                ("y".to_string(), Value::Int(0)),
            ]
            .into_iter()
            .collect(),
        ),
    )]
    .into_iter()
    .collect();
    engine.registry().add_template("bullet", template);

    let overrides: ValueMap = [("x".to_string(), Value::Int(64))].into_iter().collect();
    engine.events().emit(&ctx, SpawnRequest {
        template: "bullet".to_string(),
        overrides,
    });

    assert_eq!(
        engine.registry().get_cloned::<Pos>(Entity::from_index(0)),
        Some(Pos { x: 64, y: 0 })
    );
}

#[test]
fn explicit_plugin_component_keys_are_routed() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "explicit.json",
        r#"{"entities": [{"test:pos": {"x": 8, "y": 8}}]}"#,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    assert_eq!(
        engine.registry().get_cloned::<Pos>(Entity::from_index(0)),
        Some(Pos { x: 8, y: 8 })
    );
}

#[test]
fn follower_binding_from_configuration() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_config(
        dir.path(),
        "follow.json",
        r##"{
            "plugins": ["test"],
            "entities": [
                {"pos": {"x": 100, "y": 0}},
                {"follower": {"target": "#global:leader.pos:value"}}
            ]
        }"##,
    );

    let engine = engine_with_plugins();
    engine.load(dir.path()).expect("readable dir");

    let leader = Entity::from_index(0);
    let follower = Entity::from_index(1);
    engine
        .registry()
        .register_global_hook::<Pos>("leader.pos", leader);

    engine.tick().expect("tick");
    assert_eq!(
        engine.registry().get_cloned::<Follower>(follower),
        Some(Follower {
            target: Pos { x: 100, y: 0 }
        })
    );

    engine
        .registry()
        .with_mut::<Pos, _>(leader, |pos| *pos = Pos { x: 200, y: 0 });
    engine.tick().expect("tick");
    assert_eq!(
        engine.registry().get_cloned::<Follower>(follower),
        Some(Follower {
            target: Pos { x: 200, y: 0 }
        })
    );
}
