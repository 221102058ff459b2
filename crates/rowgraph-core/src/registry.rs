//! The schema registry: a process-wide cache from entity type to mapping.
//!
//! This is the only mutable shared state in the hydration core. Mappings are
//! published as `Arc`s and never mutated afterwards, so readers only take the
//! read lock long enough to clone the `Arc`. First access to an unregistered
//! type is a double-checked get-or-create under the write lock, which keeps
//! concurrent first accesses from building the same mapping twice.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entity::Entity;
use crate::error::Result;
use crate::mapping::{EntityMapping, MappingSummary};

/// A schema bootstrap routine, typically emitted by a code generator, that
/// registers mappings (and precompiled hydrators) for a closed set of types.
///
/// Bootstrap routines may call [`SchemaRegistry::register`] but must not call
/// `resolve` or `add_bootstrap` on the same registry.
pub type Bootstrap = fn(&SchemaRegistry);

struct Registered {
    mapping: Arc<dyn Any + Send + Sync>,
    summary: MappingSummary,
}

/// Cache of [`EntityMapping`]s keyed by entity type.
#[derive(Default)]
pub struct SchemaRegistry {
    mappings: RwLock<HashMap<TypeId, Registered>>,
    bootstraps: Mutex<Vec<Bootstrap>>,
}

static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used when a call does not name one.
    pub fn global() -> &'static SchemaRegistry {
        GLOBAL.get_or_init(SchemaRegistry::new)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeId, Registered>> {
        self.mappings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeId, Registered>> {
        self.mappings.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite the mapping for `T`.
    pub fn register<T: 'static>(&self, mapping: EntityMapping<T>) -> Arc<EntityMapping<T>> {
        let mapping = Arc::new(mapping);
        let summary = mapping.summary();
        tracing::debug!(
            entity = summary.type_name,
            table = summary.table_name,
            columns = summary.columns.len(),
            precompiled = summary.precompiled,
            "Registering entity mapping"
        );
        self.write().insert(
            TypeId::of::<T>(),
            Registered {
                mapping: Arc::clone(&mapping) as Arc<dyn Any + Send + Sync>,
                summary,
            },
        );
        mapping
    }

    /// Queue a bootstrap routine. It runs at most once, the first time a
    /// lookup misses.
    pub fn add_bootstrap(&self, bootstrap: Bootstrap) {
        self.bootstraps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(bootstrap);
    }

    /// Run every queued bootstrap routine.
    ///
    /// Routines are drained under a lock, so concurrent callers wait for the
    /// in-flight run and then find nothing left to do.
    pub fn run_bootstraps(&self) {
        let mut pending = self.bootstraps.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.is_empty() {
            return;
        }
        let routines = std::mem::take(&mut *pending);
        tracing::debug!(routines = routines.len(), "Running schema bootstrap");
        for routine in routines {
            routine(self);
        }
    }

    /// The registered mapping for `T`, without building one.
    pub fn get<T: 'static>(&self) -> Option<Arc<EntityMapping<T>>> {
        self.read()
            .get(&TypeId::of::<T>())
            .and_then(|r| Arc::clone(&r.mapping).downcast::<EntityMapping<T>>().ok())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.read().contains_key(&TypeId::of::<T>())
    }

    /// The mapping for `T`, building it by introspection if nothing was
    /// registered (after giving queued bootstrap routines a chance to run).
    pub fn resolve<T: Entity>(&self) -> Result<Arc<EntityMapping<T>>> {
        if let Some(mapping) = self.get::<T>() {
            return Ok(mapping);
        }

        self.run_bootstraps();
        if let Some(mapping) = self.get::<T>() {
            return Ok(mapping);
        }

        let mut mappings = self.write();
        if let Some(existing) = mappings.get(&TypeId::of::<T>()) {
            if let Ok(mapping) = Arc::clone(&existing.mapping).downcast::<EntityMapping<T>>() {
                return Ok(mapping);
            }
        }

        let mapping = Arc::new(EntityMapping::<T>::introspect()?);
        let summary = mapping.summary();
        tracing::debug!(
            entity = summary.type_name,
            table = summary.table_name,
            columns = summary.columns.len(),
            "Built entity mapping by introspection"
        );
        mappings.insert(
            TypeId::of::<T>(),
            Registered {
                mapping: Arc::clone(&mapping) as Arc<dyn Any + Send + Sync>,
                summary,
            },
        );
        Ok(mapping)
    }

    /// Every registered mapping, sorted by type name.
    pub fn summary(&self) -> Vec<MappingSummary> {
        let mut all: Vec<MappingSummary> = self.read().values().map(|r| r.summary.clone()).collect();
        all.sort_by(|a, b| a.type_name.cmp(b.type_name));
        all
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("mappings", &self.summary())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapped_column;
    use crate::error::Error;
    use crate::field::FieldDef;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug, Default)]
    struct Widget {
        id: i64,
        label: String,
    }

    impl Entity for Widget {
        const TABLE_NAME: &'static str = "widgets";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::column(mapped_column!(Widget, id).primary_key()),
                FieldDef::column(mapped_column!(Widget, label)),
            ]
        }
    }

    #[derive(Debug, Default)]
    struct Gadget {
        id: i64,
    }

    impl Entity for Gadget {
        const TABLE_NAME: &'static str = "gadgets";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![FieldDef::column(mapped_column!(Gadget, id).primary_key())]
        }
    }

    #[derive(Debug, Default)]
    struct Empty;

    impl Entity for Empty {
        const TABLE_NAME: &'static str = "empty";

        fn fields() -> Vec<FieldDef<Self>> {
            Vec::new()
        }
    }

    #[test]
    fn test_resolve_introspects_once_and_caches() {
        let registry = SchemaRegistry::new();
        assert!(!registry.contains::<Widget>());

        let first = registry.resolve::<Widget>().unwrap();
        let second = registry.resolve::<Widget>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.column_names(), vec!["id", "label"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_overwrites() {
        let registry = SchemaRegistry::new();
        registry.resolve::<Widget>().unwrap();
        registry.register(
            EntityMapping::<Widget>::builder("widget_v2")
                .column(mapped_column!(Widget, label))
                .build(),
        );
        let mapping = registry.get::<Widget>().unwrap();
        assert_eq!(mapping.table_name(), "widget_v2");
        assert_eq!(mapping.column_count(), 1);
    }

    #[test]
    fn test_unsupported_shape_is_mapping_not_found() {
        let registry = SchemaRegistry::new();
        let err = registry.resolve::<Empty>().unwrap_err();
        assert!(matches!(err, Error::MappingNotFound { .. }));
        assert!(!registry.contains::<Empty>());
    }

    static BOOTSTRAP_RUNS: AtomicUsize = AtomicUsize::new(0);

    fn bootstrap_gadget(registry: &SchemaRegistry) {
        BOOTSTRAP_RUNS.fetch_add(1, Ordering::SeqCst);
        registry.register(
            EntityMapping::<Gadget>::builder("gadget_table")
                .column(mapped_column!(Gadget, id).primary_key())
                .build(),
        );
    }

    #[test]
    fn test_bootstrap_runs_once_under_concurrent_first_access() {
        let registry = Arc::new(SchemaRegistry::new());
        registry.add_bootstrap(bootstrap_gadget);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.resolve::<Gadget>().unwrap())
            })
            .collect();
        let mappings: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(BOOTSTRAP_RUNS.load(Ordering::SeqCst), 1);
        for mapping in &mappings {
            assert_eq!(mapping.table_name(), "gadget_table");
            assert!(Arc::ptr_eq(mapping, &mappings[0]));
        }
    }

    #[test]
    fn test_concurrent_introspection_publishes_one_mapping() {
        let registry = Arc::new(SchemaRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.resolve::<Widget>().unwrap())
            })
            .collect();
        let mappings: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for mapping in &mappings {
            assert!(Arc::ptr_eq(mapping, &mappings[0]));
        }
    }

    #[test]
    fn test_summary_lists_registered_types() {
        let registry = SchemaRegistry::new();
        registry.resolve::<Widget>().unwrap();
        registry.resolve::<Gadget>().unwrap();
        let tables: Vec<_> = registry.summary().iter().map(|s| s.table_name).collect();
        assert_eq!(tables.len(), 2);
        assert!(tables.contains(&"widgets"));
        assert!(tables.contains(&"gadgets"));
    }
}
