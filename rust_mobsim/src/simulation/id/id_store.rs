use ahash::HashMap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::simulation::id::serializable_type::StableTypeId;
use crate::simulation::id::Id;

/// The untyped payload behind an [`Id`]. Internal ids are dense per type, assigned in
/// creation order, which makes them usable as direct indices into flat arrays.
#[derive(Debug)]
pub struct UntypedId {
    pub(super) internal: u64,
    pub(super) external: String,
}

impl UntypedId {
    pub(super) fn new(internal: u64, external: String) -> Self {
        UntypedId { internal, external }
    }
}

#[derive(Default)]
struct TypedIds {
    ids: Vec<Arc<UntypedId>>,
    mapping: HashMap<String, usize>,
}

/// Process-wide id interning store. Partitions run on threads and share ids, hence the
/// concurrent map. Lookups during a run only touch the per-type vec through cloned Arcs.
#[derive(Default)]
pub(super) struct IdStore {
    ids_by_type: DashMap<u64, TypedIds>,
}

impl IdStore {
    pub(super) fn create_id<T: StableTypeId + 'static>(&self, external: &str) -> Id<T> {
        let mut typed = self.ids_by_type.entry(T::stable_type_id()).or_default();

        if let Some(index) = typed.mapping.get(external) {
            return Id::new(typed.ids[*index].clone());
        }

        let internal = typed.ids.len() as u64;
        let untyped = Arc::new(UntypedId::new(internal, String::from(external)));
        typed.ids.push(untyped.clone());
        typed.mapping.insert(String::from(external), internal as usize);
        Id::new(untyped)
    }

    pub(super) fn get<T: StableTypeId + 'static>(&self, internal: u64) -> Id<T> {
        let typed = self
            .ids_by_type
            .get(&T::stable_type_id())
            .unwrap_or_else(|| panic!("No ids created for this type yet."));
        let untyped = typed
            .ids
            .get(internal as usize)
            .unwrap_or_else(|| panic!("No id found for internal id {internal}"))
            .clone();
        Id::new(untyped)
    }

    pub(super) fn try_get_from_ext<T: StableTypeId + 'static>(&self, external: &str) -> Option<Id<T>> {
        let typed = self.ids_by_type.get(&T::stable_type_id())?;
        let index = typed.mapping.get(external)?;
        Some(Id::new(typed.ids[*index].clone()))
    }

    pub(super) fn clear(&self) {
        self.ids_by_type.clear();
    }
}
