use core::fmt::{self, Display, Formatter};

use fnv::FnvHashMap;

/// Identifier for a collection of components.
///
/// Entities are dense, recyclable indices into the per-type sparse stores.
/// `Entity` ids start at 0 and grow monotonically; killed ids are queued and
/// handed out again before any fresh id. On the wire an entity is a `u32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(u32);

impl Entity {
    /// Creates an entity from its raw index.
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index of this entity.
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Returns the index widened for store addressing.
    pub(crate) const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mapping between entity id spaces of two peers.
///
/// Used when decoded components or events cross a process boundary: every
/// entity reference inside them is rewritten through the map. Ids without a
/// mapping are passed through unchanged, so a partial map is always safe.
#[derive(Clone, Debug, Default)]
pub struct EntityIdMap {
    map: FnvHashMap<Entity, Entity>,
}

impl EntityIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a mapping from `from` to `to`, replacing any previous entry.
    pub fn insert(&mut self, from: Entity, to: Entity) {
        self.map.insert(from, to);
    }

    /// Returns the mapped id, or `entity` itself when unmapped.
    pub fn translate(&self, entity: Entity) -> Entity {
        self.map.get(&entity).copied().unwrap_or(entity)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, Entity)> + '_ {
        self.map.iter().map(|(&from, &to)| (from, to))
    }
}

impl FromIterator<(Entity, Entity)> for EntityIdMap {
    fn from_iter<I: IntoIterator<Item = (Entity, Entity)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// Rewrites entity references contained in a value through an [`EntityIdMap`].
///
/// Types without entity references keep the default no-op body.
pub trait MapEntities {
    fn map_entities(&mut self, map: &EntityIdMap) {
        let _ = map;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_ids_pass_through() {
        let mut map = EntityIdMap::new();
        map.insert(Entity::from_index(5), Entity::from_index(12));

        assert_eq!(map.translate(Entity::from_index(5)), Entity::from_index(12));
        assert_eq!(map.translate(Entity::from_index(7)), Entity::from_index(7));
    }
}
