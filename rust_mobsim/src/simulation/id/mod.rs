use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::simulation::id::id_store::{IdStore, UntypedId};
use crate::simulation::id::serializable_type::StableTypeId;

// keep this private, we don't want to leak how ids are cached.
mod id_store;
pub mod serializable_type;

static ID_STORE: Lazy<IdStore> = Lazy::new(IdStore::default);

/// A typed, reference counted id. Cloning produces another pointer to the same interned
/// id; equality, ordering and hashing all use the dense internal id, so `Id` works as a
/// key in `nohash_hasher` maps and in ordered collections where deterministic iteration
/// order matters.
#[derive(Debug)]
pub struct Id<T: StableTypeId> {
    _type_marker: PhantomData<T>,
    id: Arc<UntypedId>,
}

impl<T: StableTypeId + 'static> Id<T> {
    fn new(untyped: Arc<UntypedId>) -> Self {
        Self {
            _type_marker: PhantomData,
            id: untyped,
        }
    }

    pub fn internal(&self) -> u64 {
        self.id.internal
    }

    pub fn external(&self) -> &str {
        &self.id.external
    }

    /// Interns `external` for this type, or returns the existing id for it.
    pub fn create(external: &str) -> Self {
        ID_STORE.create_id(external)
    }

    /// Resolves an internal id. Panics when the slot does not exist.
    pub fn get(internal: u64) -> Self {
        ID_STORE.get(internal)
    }

    /// Resolves an external id. Panics when it was never created.
    pub fn get_from_ext(external: &str) -> Self {
        ID_STORE
            .try_get_from_ext(external)
            .unwrap_or_else(|| panic!("No id found for external id {external}"))
    }

    pub fn try_get_from_ext(external: &str) -> Option<Self> {
        ID_STORE.try_get_from_ext(external)
    }
}

/// Forces initialization of the global store. Tests call this through the
/// `integration_test` macro before resetting, so that the reset never races the lazy init.
#[cfg(feature = "test_util")]
pub fn init_store() {
    Lazy::force(&ID_STORE);
}

/// Wipes all interned ids. Only meaningful between test cases; internal ids are dense per
/// type, so two scenarios built in the same process must not share a store.
#[cfg(feature = "test_util")]
pub fn reset_store() {
    ID_STORE.clear();
}

impl<T: StableTypeId> nohash_hasher::IsEnabled for Id<T> {}
impl<T: StableTypeId> nohash_hasher::IsEnabled for &Id<T> {}

impl<T: StableTypeId + 'static> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.internal() == other.internal()
    }
}

impl<T: StableTypeId + 'static> Eq for Id<T> {}

impl<T: StableTypeId + 'static> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // write the internal id directly, so that NoHashHasher can pass it through
        state.write_u64(self.internal());
    }
}

impl<T: StableTypeId + 'static> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.internal().cmp(&other.internal())
    }
}

impl<T: StableTypeId + 'static> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: StableTypeId + 'static> Display for Id<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.external())
    }
}

impl<T: StableTypeId> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            _type_marker: PhantomData,
            id: self.id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use macros::integration_test;

    use crate::simulation::id::Id;

    #[integration_test]
    fn create_assigns_dense_internals() {
        let first: Id<()> = Id::create("first");
        let second: Id<()> = Id::create("second");

        assert_eq!(0, first.internal());
        assert_eq!(1, second.internal());
        assert_eq!("first", first.external());
    }

    #[integration_test]
    fn create_is_idempotent() {
        let id: Id<()> = Id::create("again");
        let duplicate: Id<()> = Id::create("again");

        assert_eq!(id, duplicate);
        assert_eq!(id.internal(), duplicate.internal());
    }

    #[integration_test]
    fn separate_stores_per_type() {
        let str_id: Id<String> = Id::create("shared-external");
        let unit_id: Id<()> = Id::create("shared-external");

        // both types start counting at zero
        assert_eq!(0, str_id.internal());
        assert_eq!(0, unit_id.internal());
    }

    #[integration_test]
    fn lookup_by_internal_and_external() {
        let id: Id<()> = Id::create("lookup");

        let by_internal: Id<()> = Id::get(id.internal());
        let by_external: Id<()> = Id::get_from_ext("lookup");

        assert_eq!(id, by_internal);
        assert_eq!(id, by_external);
        assert!(Id::<()>::try_get_from_ext("never-created").is_none());
    }
}
