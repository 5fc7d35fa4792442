// [libs/core/coordination/src/ports.rs]
/*!
 * El puerto `CoordinationBackend`: la única pieza polimórfica que el
 * núcleo necesita (§9 de la especificación original ya señalaba que
 * la única interfaz con múltiples implementaciones debía ser el
 * almacén de coordinación). Generaliza el `KeyValueStore` síncrono
 * del almacenamiento de bloques en una variante async con TTL y
 * compare-and-set, porque el cluster y las sesiones viven detrás de
 * una latencia de red real y el self-registro de nodo necesita
 * detectar colisiones concurrentes de node id.
 */

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoordinationError {
    #[error("BACKEND_IO_FAULT: {0}")]
    Io(String),
    #[error("BACKEND_SERIALIZATION_FAULT: {0}")]
    Serialization(String),
    #[error("BACKEND_UNAVAILABLE: {0}")]
    Unavailable(String),
    #[error("BACKEND_LOCK_CONTENDED: another writer holds the file lock")]
    LockContended,
}

/// A single stored record, carried with its remaining TTL so callers
/// can re-check freshness even when the backend let it survive a
/// little past expiry (TTL here is explicitly best-effort, per §4.2).
#[derive(Debug, Clone)]
pub struct Record {
    pub value: Vec<u8>,
}

/// Abstraction over an external key/value store. Every method may
/// block on network I/O; implementations own connection pooling and
/// retries internally (the in-process caller never sees raw transient
/// failures — see `crate::backoff`).
#[async_trait]
pub trait CoordinationBackend: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CoordinationError>;

    async fn get(&self, key: &str) -> Result<Option<Record>, CoordinationError>;

    async fn delete(&self, key: &str) -> Result<(), CoordinationError>;

    /// Returns every (key, record) pair whose key starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Record)>, CoordinationError>;

    /// Atomically writes `new` under `key` only if the current value
    /// equals `expected` (`None` meaning "key must be absent"). Returns
    /// `true` on a successful swap, `false` on a conflict. The core
    /// uses this exclusively for node self-registration.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, CoordinationError>;
}
