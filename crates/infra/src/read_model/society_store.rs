use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use confreg_core::SocietyId;
use std::sync::Arc;

/// Society-isolated key/value store abstraction for disposable read models.
pub trait SocietyStore<K, V>: Send + Sync {
    fn get(&self, society_id: SocietyId, key: &K) -> Option<V>;
    fn upsert(&self, society_id: SocietyId, key: K, value: V);
    fn list(&self, society_id: SocietyId) -> Vec<V>;
    /// Clear all read-model records for a society (rebuild support).
    fn clear_society(&self, society_id: SocietyId);
}

impl<K, V, S> SocietyStore<K, V> for Arc<S>
where
    S: SocietyStore<K, V> + ?Sized,
{
    fn get(&self, society_id: SocietyId, key: &K) -> Option<V> {
        (**self).get(society_id, key)
    }

    fn upsert(&self, society_id: SocietyId, key: K, value: V) {
        (**self).upsert(society_id, key, value)
    }

    fn list(&self, society_id: SocietyId) -> Vec<V> {
        (**self).list(society_id)
    }

    fn clear_society(&self, society_id: SocietyId) {
        (**self).clear_society(society_id)
    }
}

/// In-memory society-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemorySocietyStore<K, V> {
    inner: RwLock<HashMap<(SocietyId, K), V>>,
}

impl<K, V> InMemorySocietyStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemorySocietyStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SocietyStore<K, V> for InMemorySocietyStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, society_id: SocietyId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&(society_id, key.clone())).cloned()
    }

    fn upsert(&self, society_id: SocietyId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((society_id, key), value);
        }
    }

    fn list(&self, society_id: SocietyId) -> Vec<V> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((s, _k), v)| if *s == society_id { Some(v.clone()) } else { None })
            .collect()
    }

    fn clear_society(&self, society_id: SocietyId) {
        if let Ok(mut map) = self.inner.write() {
            map.retain(|(s, _k), _v| *s != society_id);
        }
    }
}
