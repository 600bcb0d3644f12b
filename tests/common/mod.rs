#![allow(dead_code)]

use bytes::Bytes;
use tessera::config::{get_value, get_value_copy, object_value};
use tessera::prelude::*;
use tessera::wire::DecodeError;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Encode for Pos {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.x.encode(buf);
        self.y.encode(buf);
    }
}

impl Decode for Pos {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            x: i32::decode(buf)?,
            y: i32::decode(buf)?,
        })
    }
}

impl MapEntities for Pos {}

tessera::hookable!(Pos { "x" => x, "y" => y });

impl FromConfig for Pos {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        Ok(Self {
            x: int_field(config, "pos", "x")? as i32,
            y: int_field(config, "pos", "y")? as i32,
        })
    }
}

impl tessera::config::ConfigValue for Pos {
    fn from_value(ctx: &Ctx, value: &Value, entity: Option<Entity>) -> Option<Self> {
        object_value(ctx, value, entity)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Encode for Health {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.current.encode(buf);
        self.max.encode(buf);
    }
}

impl Decode for Health {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            current: i32::decode(buf)?,
            max: i32::decode(buf)?,
        })
    }
}

impl MapEntities for Health {}

tessera::hookable!(Health { "current" => current, "max" => max });

impl FromConfig for Health {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        Ok(Self {
            current: int_field(config, "health", "current")? as i32,
            max: int_field(config, "health", "max")? as i32,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Follower {
    pub target: Pos,
}

impl Encode for Follower {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.target.encode(buf);
    }
}

impl Decode for Follower {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            target: Pos::decode(buf)?,
        })
    }
}

impl MapEntities for Follower {}

tessera::hookable!(Follower { "target" => target });

impl FromConfig for Follower {
    fn from_config(ctx: &Ctx, config: &ValueMap, entity: Option<Entity>) -> Result<Self, Error> {
        let target = match entity {
            Some(entity) => get_value::<Follower, Pos>(ctx, config, entity, "target"),
            None => get_value_copy::<Pos>(ctx, config, "target"),
        }
        .unwrap_or_default();
        Ok(Self { target })
    }
}

/// Component holding an entity reference, for translation tests.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Owner {
    pub owner: Entity,
}

impl Encode for Owner {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.owner.encode(buf);
    }
}

impl Decode for Owner {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            owner: Entity::decode(buf)?,
        })
    }
}

impl MapEntities for Owner {
    fn map_entities(&mut self, map: &EntityIdMap) {
        self.owner = map.translate(self.owner);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Damage {
    pub attacker: Entity,
    pub victim: Entity,
    pub amount: i32,
}

impl Encode for Damage {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.attacker.encode(buf);
        self.victim.encode(buf);
        self.amount.encode(buf);
    }
}

impl Decode for Damage {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            attacker: Entity::decode(buf)?,
            victim: Entity::decode(buf)?,
            amount: i32::decode(buf)?,
        })
    }
}

impl MapEntities for Damage {
    fn map_entities(&mut self, map: &EntityIdMap) {
        self.attacker = map.translate(self.attacker);
        self.victim = map.translate(self.victim);
    }
}

impl FromConfig for Damage {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        Ok(Self {
            attacker: Entity::from_index(int_field(config, "damage", "attacker")? as u32),
            victim: Entity::from_index(int_field(config, "damage", "victim")? as u32),
            amount: int_field(config, "damage", "amount")? as i32,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Ping;

impl Encode for Ping {
    fn encode(&self, _buf: &mut Vec<u8>) {}
}

impl Decode for Ping {
    fn decode(_buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self)
    }
}

impl MapEntities for Ping {}

impl FromConfig for Ping {
    fn from_config(_ctx: &Ctx, _config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        Ok(Self)
    }
}

fn int_field(config: &ValueMap, component: &str, field: &str) -> Result<i64, Error> {
    config
        .get(field)
        .and_then(Value::as_int)
        .ok_or_else(|| Error::MissingField {
            component: component.to_string(),
            field: field.to_string(),
        })
}

/// Statically linked plugin providing `pos` and `follower`.
pub struct TestPlugin;

pub fn test_plugin_entry(ctx: &Ctx, _config: Option<&Value>) -> Box<dyn Plugin> {
    ctx.registry.register::<Pos>("pos");
    ctx.registry.register::<Follower>("follower");
    Box::new(TestPlugin)
}

impl Plugin for TestPlugin {
    fn component_keys(&self) -> Vec<String> {
        vec!["pos".to_string(), "follower".to_string()]
    }

    fn set_component(
        &self,
        ctx: &Ctx,
        entity: Entity,
        key: &str,
        value: &Value,
    ) -> Result<(), Error> {
        let config = value
            .as_object()
            .ok_or_else(|| Error::MissingField {
                component: key.to_string(),
                field: "<object>".to_string(),
            })?;
        match key {
            "pos" => {
                let pos = Pos::from_config(ctx, config, Some(entity))?;
                ctx.registry.add(entity, pos)?;
                ctx.registry.register_self_hook::<Pos>("pos", entity);
            }
            "follower" => {
                let follower = Follower::from_config(ctx, config, Some(entity))?;
                ctx.registry.add(entity, follower)?;
                ctx.registry.register_self_hook::<Follower>("follower", entity);
            }
            _ => return Err(Error::UnknownComponent(key.to_string())),
        }
        Ok(())
    }
}

/// Statically linked plugin providing `health`.
pub struct HealthPlugin;

pub fn health_plugin_entry(ctx: &Ctx, _config: Option<&Value>) -> Box<dyn Plugin> {
    ctx.registry.register::<Health>("health");
    Box::new(HealthPlugin)
}

impl Plugin for HealthPlugin {
    fn component_keys(&self) -> Vec<String> {
        vec!["health".to_string()]
    }

    fn set_component(
        &self,
        ctx: &Ctx,
        entity: Entity,
        key: &str,
        value: &Value,
    ) -> Result<(), Error> {
        let config = value
            .as_object()
            .ok_or_else(|| Error::MissingField {
                component: key.to_string(),
                field: "<object>".to_string(),
            })?;
        let health = Health::from_config(ctx, config, Some(entity))?;
        ctx.registry.add(entity, health)?;
        ctx.registry.register_self_hook::<Health>("health", entity);
        Ok(())
    }
}

/// Engine with both static test plugins registered and loaded.
pub fn engine_with_plugins() -> Engine {
    let engine = Engine::new();
    engine
        .loader()
        .register_static_plugin("test", test_plugin_entry);
    engine
        .loader()
        .register_static_plugin("health", health_plugin_entry);
    engine
}
