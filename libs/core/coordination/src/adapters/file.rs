// [libs/core/coordination/src/adapters/file.rs]
/*!
 * Backend de archivo local: durable pero de un solo escritor, exigido
 * mediante un lock de archivo a nivel de sistema operativo (`fs2`).
 * El formato binario en disco es el mismo diseño de longitud-prefijada
 * que el almacén de bloques usa para su KV de archivo, extendido con
 * una marca de expiración por entrada ya que ese almacén no conocía
 * TTL en absoluto:
 *
 *   [key_len:u32][key][expires_at_unix:i64][value_len:u32][value] ...
 *
 * `expires_at_unix == 0` significa "sin TTL". Cada escritura reescribe
 * el archivo completo a un temporal hermano y lo renombra atómicamente,
 * igual que el adaptador original.
 */

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use byteorder::{ReadBytesExt, WriteBytesExt, BigEndian};
use chrono::{DateTime, Utc};

use crate::ports::{CoordinationBackend, CoordinationError, Record};

struct StoredEntry {
    value: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(expiry) => Utc::now() <= expiry,
            None => true,
        }
    }
}

pub struct FileBackend {
    path: PathBuf,
    lock_file: File,
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl FileBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoordinationError> {
        let path = path.as_ref().to_path_buf();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| CoordinationError::Io(e.to_string()))?;
        fs2::FileExt::try_lock_exclusive(&lock_file).map_err(|_| CoordinationError::LockContended)?;

        let entries = if path.metadata().map(|m| m.len()).unwrap_or(0) > 0 {
            tracing::info!(path = %path.display(), "found existing coordination snapshot, loading");
            Self::load_from_file(&path)?
        } else {
            HashMap::new()
        };

        Ok(Self { path, lock_file, entries: Mutex::new(entries) })
    }

    fn load_from_file(path: &Path) -> Result<HashMap<String, StoredEntry>, CoordinationError> {
        let mut file = File::open(path).map_err(|e| CoordinationError::Io(e.to_string()))?;
        let mut map = HashMap::new();

        loop {
            let key_len = match file.read_u32::<BigEndian>() {
                Ok(len) => len,
                Err(_) => break,
            };
            let mut key_buf = vec![0u8; key_len as usize];
            file.read_exact(&mut key_buf).map_err(|e| CoordinationError::Io(e.to_string()))?;
            let key = String::from_utf8(key_buf).map_err(|e| CoordinationError::Serialization(e.to_string()))?;

            let expires_at_unix = file.read_i64::<BigEndian>().map_err(|e| CoordinationError::Io(e.to_string()))?;
            let expires_at = if expires_at_unix == 0 {
                None
            } else {
                DateTime::from_timestamp(expires_at_unix, 0)
            };

            let value_len = file.read_u32::<BigEndian>().map_err(|e| CoordinationError::Io(e.to_string()))?;
            let mut value = vec![0u8; value_len as usize];
            file.read_exact(&mut value).map_err(|e| CoordinationError::Io(e.to_string()))?;

            map.insert(key, StoredEntry { value, expires_at });
        }

        Ok(map)
    }

    fn save_to_file(&self, entries: &HashMap<String, StoredEntry>) -> Result<(), CoordinationError> {
        let tmp_path = self.path.with_extension("tmp");
        let mut file = File::create(&tmp_path).map_err(|e| CoordinationError::Io(e.to_string()))?;

        for (key, entry) in entries {
            let key_bytes = key.as_bytes();
            file.write_u32::<BigEndian>(key_bytes.len() as u32).map_err(|e| CoordinationError::Io(e.to_string()))?;
            file.write_all(key_bytes).map_err(|e| CoordinationError::Io(e.to_string()))?;
            file.write_i64::<BigEndian>(entry.expires_at.map(|e| e.timestamp()).unwrap_or(0))
                .map_err(|e| CoordinationError::Io(e.to_string()))?;
            file.write_u32::<BigEndian>(entry.value.len() as u32).map_err(|e| CoordinationError::Io(e.to_string()))?;
            file.write_all(&entry.value).map_err(|e| CoordinationError::Io(e.to_string()))?;
        }
        file.sync_all().map_err(|e| CoordinationError::Io(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| CoordinationError::Io(e.to_string()))?;
        Ok(())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.lock_file);
    }
}

#[async_trait]
impl CoordinationBackend for FileBackend {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CoordinationError> {
        let expires_at = ttl.and_then(|d| chrono::Duration::from_std(d).ok()).map(|d| Utc::now() + d);
        let mut entries = self.entries.lock().expect("FILE_BACKEND_LOCK_POISONED");
        entries.insert(key.to_string(), StoredEntry { value, expires_at });
        self.save_to_file(&entries)
    }

    async fn get(&self, key: &str) -> Result<Option<Record>, CoordinationError> {
        let entries = self.entries.lock().expect("FILE_BACKEND_LOCK_POISONED");
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(Record { value: entry.value.clone() })),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinationError> {
        let mut entries = self.entries.lock().expect("FILE_BACKEND_LOCK_POISONED");
        entries.remove(key);
        self.save_to_file(&entries)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Record)>, CoordinationError> {
        let entries = self.entries.lock().expect("FILE_BACKEND_LOCK_POISONED");
        Ok(entries
            .iter()
            .filter(|(k, v)| k.starts_with(prefix) && v.is_live())
            .map(|(k, v)| (k.clone(), Record { value: v.value.clone() }))
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
        let mut entries = self.entries.lock().expect("FILE_BACKEND_LOCK_POISONED");
        let current = entries.get(key).map(|e| e.value.as_slice());
        if current != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredEntry { value: new, expires_at });
        self.save_to_file(&entries)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordination.bin");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.put("fleet:cluster:node-1", b"payload".to_vec(), None).await.unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        let got = backend.get("fleet:cluster:node-1").await.unwrap().unwrap();
        assert_eq!(got.value, b"payload");
    }

    #[tokio::test]
    async fn expired_entries_are_invisible_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coordination.bin");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.put("k", b"v".to_vec(), Some(Duration::from_millis(1))).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let backend = FileBackend::open(&path).unwrap();
        assert!(backend.get("k").await.unwrap().is_none());
    }
}
