//! Events every runtime carries: shutdown, logging, scene changes and
//! template spawning. The driver installs default handlers for all of them.

use bytes::{BufMut, Bytes};

use crate::component::FromConfig;
use crate::ctx::Ctx;
use crate::entity::{Entity, MapEntities};
use crate::error::Error;
use crate::scene::SceneState;
use crate::value::{Value, ValueMap};
use crate::wire::{Decode, DecodeError, Encode};

/// Requests a clean exit. The current tick completes, then the driver
/// returns `exit_code`.
#[derive(Clone, Debug, PartialEq)]
pub struct Shutdown {
    pub exit_code: i32,
    pub reason: String,
}

impl Encode for Shutdown {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.exit_code.encode(buf);
        self.reason.encode(buf);
    }
}

impl Decode for Shutdown {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            exit_code: i32::decode(buf)?,
            reason: String::decode(buf)?,
        })
    }
}

impl MapEntities for Shutdown {}

impl FromConfig for Shutdown {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        Ok(Self {
            exit_code: config
                .get("exit_code")
                .and_then(Value::as_int)
                .unwrap_or(0) as i32,
            reason: config
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Severity of a [`Log`] event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "error" => Some(LogLevel::Error),
            "warning" => Some(LogLevel::Warning),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl Encode for LogLevel {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(match self {
            LogLevel::Error => 0,
            LogLevel::Warning => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
        });
    }
}

impl Decode for LogLevel {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(buf)? {
            0 => Ok(LogLevel::Error),
            1 => Ok(LogLevel::Warning),
            2 => Ok(LogLevel::Info),
            3 => Ok(LogLevel::Debug),
            value => Err(DecodeError::InvalidDiscriminator {
                kind: "log level",
                value,
            }),
        }
    }
}

/// The logging interface, itself an event: plugins emit these and the default
/// handler forwards them to the `log` crate.
#[derive(Clone, Debug, PartialEq)]
pub struct Log {
    pub source: String,
    pub level: LogLevel,
    pub message: String,
}

impl Log {
    pub fn new(
        source: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            level,
            message: message.into(),
        }
    }
}

impl Encode for Log {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.source.encode(buf);
        self.level.encode(buf);
        self.message.encode(buf);
    }
}

impl Decode for Log {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            source: String::decode(buf)?,
            level: LogLevel::decode(buf)?,
            message: String::decode(buf)?,
        })
    }
}

impl MapEntities for Log {}

impl FromConfig for Log {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        Ok(Self {
            source: config
                .get("source")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            level: config
                .get("level")
                .and_then(Value::as_str)
                .and_then(LogLevel::parse)
                .unwrap_or(LogLevel::Info),
            message: config
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Switches a scene in or out of the current-scene list.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneChange {
    pub scene: String,
    pub state: SceneState,
}

impl Encode for SceneChange {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.scene.encode(buf);
        self.state.encode(buf);
    }
}

impl Decode for SceneChange {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            scene: String::decode(buf)?,
            state: SceneState::decode(buf)?,
        })
    }
}

impl MapEntities for SceneChange {}

impl FromConfig for SceneChange {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        let scene = config
            .get("scene")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField {
                component: "scene_change".to_string(),
                field: "scene".to_string(),
            })?
            .to_string();
        let state = config
            .get("state")
            .and_then(Value::as_str)
            .and_then(SceneState::parse)
            .unwrap_or(SceneState::Active);
        Ok(Self { scene, state })
    }
}

/// Requests instantiation of a named template with `$name` substitutions
/// taken from `overrides`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnRequest {
    pub template: String,
    pub overrides: ValueMap,
}

impl Encode for SpawnRequest {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.template.encode(buf);
        self.overrides.encode(buf);
    }
}

impl Decode for SpawnRequest {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            template: String::decode(buf)?,
            overrides: ValueMap::decode(buf)?,
        })
    }
}

impl MapEntities for SpawnRequest {}

impl FromConfig for SpawnRequest {
    fn from_config(_ctx: &Ctx, config: &ValueMap, _entity: Option<Entity>) -> Result<Self, Error> {
        let template = config
            .get("template")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField {
                component: "spawn_request".to_string(),
                field: "template".to_string(),
            })?
            .to_string();
        let overrides = config
            .get("overrides")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            template,
            overrides,
        })
    }
}
