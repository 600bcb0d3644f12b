use core::any::TypeId;

use fnv::FnvHashMap;

/// Bidirectional map between a registered type and its string key.
///
/// Total and injective for every registered component and event type:
/// inserting either side again replaces both directions.
#[derive(Default)]
pub(crate) struct TypeKeyMap {
    by_type: FnvHashMap<TypeId, String>,
    by_key: FnvHashMap<String, TypeId>,
}

impl TypeKeyMap {
    pub(crate) fn insert(&mut self, type_id: TypeId, key: &str) {
        if let Some(previous) = self.by_type.insert(type_id, key.to_string()) {
            self.by_key.remove(&previous);
        }
        if let Some(previous) = self.by_key.insert(key.to_string(), type_id) {
            self.by_type.remove(&previous);
            // Re-insert in case both directions pointed at each other.
            self.by_type.insert(type_id, key.to_string());
        }
    }

    pub(crate) fn type_of(&self, key: &str) -> Option<TypeId> {
        self.by_key.get(key).copied()
    }

    pub(crate) fn key_of(&self, type_id: TypeId) -> Option<String> {
        self.by_type.get(&type_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_both_directions() {
        let mut map = TypeKeyMap::default();
        map.insert(TypeId::of::<u32>(), "pos");
        map.insert(TypeId::of::<u64>(), "pos");

        assert_eq!(map.type_of("pos"), Some(TypeId::of::<u64>()));
        assert_eq!(map.key_of(TypeId::of::<u32>()), None);
        assert_eq!(map.key_of(TypeId::of::<u64>()), Some("pos".to_string()));
    }

    #[test]
    fn rekeying_a_type_drops_the_old_key() {
        let mut map = TypeKeyMap::default();
        map.insert(TypeId::of::<u32>(), "pos");
        map.insert(TypeId::of::<u32>(), "position");

        assert_eq!(map.type_of("pos"), None);
        assert_eq!(map.type_of("position"), Some(TypeId::of::<u32>()));
    }
}
