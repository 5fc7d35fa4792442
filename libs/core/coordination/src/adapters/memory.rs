// [libs/core/coordination/src/adapters/memory.rs]
/*!
 * Backend en memoria: único proceso, usado en pruebas y en despliegues
 * de un solo nodo donde no hay cluster que coordinar. Respaldado por
 * un `DashMap` para que las lecturas de llaves distintas no se
 * serialicen entre sí, igual que el registro de máquinas del almacén
 * de datos (§4.3).
 */

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::ports::{CoordinationBackend, CoordinationError, Record};

struct Entry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(expiry) => Utc::now() <= expiry,
            None => true,
        }
    }
}

pub struct InMemoryBackend {
    entries: DashMap<String, Entry>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self { entries: DashMap::new() }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationBackend for InMemoryBackend {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CoordinationError> {
        let expires_at = ttl.and_then(|d| chrono::Duration::from_std(d).ok()).map(|d| Utc::now() + d);
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Record>, CoordinationError> {
        match self.entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(Record { value: entry.value.clone() })),
            Some(_) => Ok(None),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinationError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Record)>, CoordinationError> {
        Ok(self
            .entries
            .iter()
            .filter(|kv| kv.key().starts_with(prefix) && kv.value().is_live())
            .map(|kv| (kv.key().clone(), Record { value: kv.value().value.clone() }))
            .collect())
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, CoordinationError> {
        let expires_at = ttl.and_then(|d| chrono::Duration::from_std(d).ok()).map(|d| Utc::now() + d);
        let mut slot = self.entries.entry(key.to_string());
        match &mut slot {
            dashmap::mapref::entry::Entry::Occupied(occupied) => {
                let matches = expected == Some(occupied.get().value.as_slice());
                if matches {
                    occupied.insert(Entry { value: new, expires_at });
                }
                Ok(matches)
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(Entry { value: new, expires_at });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let backend = InMemoryBackend::new();
        backend.put("k", b"v".to_vec(), None).await.unwrap();
        let got = backend.get("k").await.unwrap().unwrap();
        assert_eq!(got.value, b"v");
    }

    #[tokio::test]
    async fn ttl_expiry_hides_the_value() {
        let backend = InMemoryBackend::new();
        backend.put("k", b"v".to_vec(), Some(Duration::from_millis(10))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(backend.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compare_and_set_detects_collision() {
        let backend = InMemoryBackend::new();
        assert!(backend.compare_and_set("node", None, b"a".to_vec(), None).await.unwrap());
        assert!(!backend.compare_and_set("node", None, b"b".to_vec(), None).await.unwrap());
        assert!(backend.compare_and_set("node", Some(b"a"), b"b".to_vec(), None).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let backend = InMemoryBackend::new();
        backend.put("fleet:cluster:node-1", b"1".to_vec(), None).await.unwrap();
        backend.put("fleet:session:tok-1", b"2".to_vec(), None).await.unwrap();
        let nodes = backend.list("fleet:cluster:").await.unwrap();
        assert_eq!(nodes.len(), 1);
    }
}
