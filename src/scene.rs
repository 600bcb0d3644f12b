//! Per-entity scene tag controlling whether iteration includes an entity.

use bytes::{BufMut, Bytes};

use crate::entity::MapEntities;
use crate::wire::{Decode, DecodeError, Encode};

/// Activation state of a scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    /// Active overlay (HUD, pause menu, ...).
    Active,
    /// The single primary scene.
    Main,
    /// Hidden from iteration.
    Disabled,
}

impl SceneState {
    pub fn as_str(self) -> &'static str {
        match self {
            SceneState::Active => "active",
            SceneState::Main => "main",
            SceneState::Disabled => "disabled",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "active" => Some(SceneState::Active),
            "main" => Some(SceneState::Main),
            "disabled" => Some(SceneState::Disabled),
            _ => None,
        }
    }
}

impl Encode for SceneState {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(match self {
            SceneState::Active => 0,
            SceneState::Main => 1,
            SceneState::Disabled => 2,
        });
    }
}

impl Decode for SceneState {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode(buf)? {
            0 => Ok(SceneState::Active),
            1 => Ok(SceneState::Main),
            2 => Ok(SceneState::Disabled),
            value => Err(DecodeError::InvalidDiscriminator {
                kind: "scene state",
                value,
            }),
        }
    }
}

/// Component marking the scene an entity belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub scene_name: String,
    pub state: SceneState,
}

impl Encode for Scene {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.scene_name.encode(buf);
        self.state.encode(buf);
    }
}

impl Decode for Scene {
    fn decode(buf: &mut Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            scene_name: String::decode(buf)?,
            state: SceneState::decode(buf)?,
        })
    }
}

impl MapEntities for Scene {}
