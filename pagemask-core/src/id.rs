//! # IDs
//! Process-unique IDs, namespaced by a marker type `T`. A `LocalID<T>` is only ever compared against
//! other IDs of the same namespace, and two IDs compare equal only if they came from the same
//! allocation.
//!
//! Allocate with `LocalID::<YourNamespaceTy>::default()`. Order of IDs is not guaranteed, and they
//! must never be persisted - they mean nothing outside this run of the program.

use std::sync::atomic::{AtomicU64, Ordering};

// Next free ID per namespace. Namespaces are inserted once and never removed, so the write lock is
// taken only a handful of times over the life of the program.
static ID_SERVER: parking_lot::RwLock<std::collections::BTreeMap<std::any::TypeId, AtomicU64>> =
    parking_lot::const_rwlock(std::collections::BTreeMap::new());

pub struct LocalID<T: std::any::Any> {
    id: std::num::NonZeroU64,
    // Namespace marker. `fn() -> T` keeps us Send + Sync regardless of T.
    _phantom: std::marker::PhantomData<fn() -> T>,
}
impl<T: std::any::Any> Clone for LocalID<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for LocalID<T> {}
impl<T: std::any::Any> PartialEq for LocalID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T: std::any::Any> Eq for LocalID<T> {}
impl<T: std::any::Any> std::hash::Hash for LocalID<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl<T: std::any::Any> LocalID<T> {
    /// Raw numeric value. IDs from differing namespaces may share a value!
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id.get()
    }
    fn allocate() -> Self {
        let namespace = std::any::TypeId::of::<T>();
        let id = {
            let read = ID_SERVER.upgradable_read();
            if let Some(next) = read.get(&namespace) {
                next.fetch_add(1, Ordering::Relaxed)
            } else {
                let mut write = parking_lot::RwLockUpgradableReadGuard::upgrade(read);
                // Zero is never handed out, start at one.
                write.insert(namespace, AtomicU64::new(2));
                1
            }
        };
        let Some(id) = std::num::NonZeroU64::new(id) else {
            // Wrapped after 2^64 allocations. Handing out a duplicate would silently break every
            // staleness check, so refuse to continue.
            log::error!("{} ID overflow! Aborting!", std::any::type_name::<T>());
            log::logger().flush();
            std::process::abort();
        };
        Self {
            id,
            _phantom: std::marker::PhantomData,
        }
    }
}
impl<T: std::any::Any> Default for LocalID<T> {
    /// Allocate a fresh, never before seen ID.
    fn default() -> Self {
        Self::allocate()
    }
}
impl<T: std::any::Any> std::fmt::Display for LocalID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // rsplit always yields at least one element.
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default();
        write!(f, "{name}#{}", self.id)
    }
}
impl<T: std::any::Any> std::fmt::Debug for LocalID<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod test {
    use super::LocalID;
    // Tests share the global server, so each uses its own namespace.

    #[test]
    fn ids_unique() {
        struct Namespace;
        let mut ids: Vec<_> = (0..1024)
            .map(|_| LocalID::<Namespace>::default().id())
            .collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len(), "had duplicate ids");
    }
    #[test]
    fn never_zero() {
        struct Namespace;
        assert!(LocalID::<Namespace>::default().id() >= 1);
    }
    #[test]
    fn equality_is_identity() {
        struct Namespace;
        let a = LocalID::<Namespace>::default();
        let b = LocalID::<Namespace>::default();
        let a_copy = a;
        assert_eq!(a, a_copy);
        assert_ne!(a, b);
    }
    #[test]
    fn display_names_namespace() {
        struct Generation;
        let id = LocalID::<Generation>::default();
        assert_eq!(id.to_string(), format!("Generation#{}", id.id()));
    }
}
