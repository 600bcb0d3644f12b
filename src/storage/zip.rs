//! Lock-step iteration over several sparse stores at once.
//!
//! A zip yields items only at indices where every zipped store has a present
//! slot. Stores advance together, one index per step, so the first missing
//! slot aborts advancement for that index. Stores can be zipped shared or
//! mutable in any mix.

use core::slice;

use variadics_please::all_tuples;

use crate::entity::Entity;
use crate::scene::{Scene, SceneState};
use crate::storage::sparse::SparseStore;

/// Per-store cursor advanced one slot per step.
///
/// `advance` returns `None` once the store is exhausted, `Some(None)` for an
/// empty slot and `Some(Some(item))` for a present one.
pub trait ZipCursor {
    type Item;

    fn advance(&mut self) -> Option<Option<Self::Item>>;
}

pub struct ReadCursor<'w, T>(slice::Iter<'w, Option<T>>);

pub struct WriteCursor<'w, T>(slice::IterMut<'w, Option<T>>);

impl<'w, T> ZipCursor for ReadCursor<'w, T> {
    type Item = &'w T;

    fn advance(&mut self) -> Option<Option<Self::Item>> {
        self.0.next().map(Option::as_ref)
    }
}

impl<'w, T> ZipCursor for WriteCursor<'w, T> {
    type Item = &'w mut T;

    fn advance(&mut self) -> Option<Option<Self::Item>> {
        self.0.next().map(Option::as_mut)
    }
}

/// A store reference that can participate in a zip.
pub trait IntoZipCursor<'w> {
    type Cursor: ZipCursor;

    fn into_cursor(self) -> Self::Cursor;
}

impl<'w, T> IntoZipCursor<'w> for &'w SparseStore<T> {
    type Cursor = ReadCursor<'w, T>;

    fn into_cursor(self) -> Self::Cursor {
        ReadCursor(self.slots().iter())
    }
}

impl<'w, T> IntoZipCursor<'w> for &'w mut SparseStore<T> {
    type Cursor = WriteCursor<'w, T>;

    fn into_cursor(self) -> Self::Cursor {
        WriteCursor(self.slots_mut().iter_mut())
    }
}

/// Tuple of cursors advanced together.
pub trait ZipList {
    type Item;

    fn advance_all(&mut self) -> Option<Option<Self::Item>>;
}

/// Tuple of store references convertible into a [`ZipList`].
pub trait IntoZipList<'w> {
    type List: ZipList;

    fn into_list(self) -> Self::List;
}

macro_rules! impl_zip_list {
    ($(($C:ident, $c:ident)),*) => {
        impl<$($C: ZipCursor),*> ZipList for ($($C,)*) {
            type Item = ($($C::Item,)*);

            fn advance_all(&mut self) -> Option<Option<Self::Item>> {
                let ($($c,)*) = self;
                $(let $c = $c.advance()?;)*
                Some(match ($($c,)*) {
                    ($(Some($c),)*) => Some(($($c,)*)),
                    _ => None,
                })
            }
        }

        impl<'w, $($C: IntoZipCursor<'w>),*> IntoZipList<'w> for ($($C,)*) {
            type List = ($($C::Cursor,)*);

            fn into_list(self) -> Self::List {
                let ($($c,)*) = self;
                ($($c.into_cursor(),)*)
            }
        }
    };
}

all_tuples!(impl_zip_list, 1, 12, C, c);

/// Iterator over indices where every zipped store has a present slot.
pub struct Zip<'w, L> {
    cursors: L,
    scenes: Option<slice::Iter<'w, Option<Scene>>>,
    index: usize,
}

impl<'w, L: ZipList> Zip<'w, L> {
    fn advance(&mut self) -> Option<(usize, L::Item)> {
        loop {
            let scene_disabled = match self.scenes.as_mut().map(Iterator::next) {
                Some(Some(slot)) => slot
                    .as_ref()
                    .is_some_and(|scene| scene.state == SceneState::Disabled),
                _ => false,
            };
            let index = self.index;
            self.index += 1;
            let slots = self.cursors.advance_all()?;
            if scene_disabled {
                continue;
            }
            if let Some(items) = slots {
                return Some((index, items));
            }
        }
    }

    /// Makes the zip also yield the entity id for each index.
    pub fn indexed(self) -> ZipIndexed<'w, L> {
        ZipIndexed(self)
    }
}

impl<L: ZipList> Iterator for Zip<'_, L> {
    type Item = L::Item;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().map(|(_, items)| items)
    }
}

/// [`Zip`] variant yielding `(Entity, items…)`.
pub struct ZipIndexed<'w, L>(Zip<'w, L>);

impl<L: ZipList> Iterator for ZipIndexed<'_, L> {
    type Item = (Entity, L::Item);

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .advance()
            .map(|(index, items)| (Entity::from_index(index as u32), items))
    }
}

/// Zips stores together.
pub fn zip<'w, S: IntoZipList<'w>>(stores: S) -> Zip<'w, S::List> {
    Zip {
        cursors: stores.into_list(),
        scenes: None,
        index: 0,
    }
}

/// Zips stores together, skipping entities whose scene state is
/// [`SceneState::Disabled`]. Entities without a `Scene` component are kept.
pub fn zip_filtered<'w, S: IntoZipList<'w>>(
    scenes: &'w SparseStore<Scene>,
    stores: S,
) -> Zip<'w, S::List> {
    Zip {
        cursors: stores.into_list(),
        scenes: Some(scenes.slots().iter()),
        index: 0,
    }
}
