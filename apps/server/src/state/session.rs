// [apps/server/src/state/session.rs]
/*!
 * =================================================================
 * APARATO: SESSION MANAGER (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: TOKENS DE SESIÓN OPACOS SOBRE EL BACKEND COMPARTIDO
 *
 * Sessions live in the same coordination backend as cluster
 * membership (§4.5), deliberately: a login on one node stays valid
 * when the load balancer steers the next request to a different
 * node. A short (5s) in-process read cache avoids hitting the backend
 * on every authenticated request, matching the cap `§5` puts on any
 * in-process cache of shared ephemeral state.
 * =================================================================
 */

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use dashmap::DashMap;
use fleetops_coordination::CoordinationBackend;
use fleetops_domain::SessionRecord;

pub const SESSION_KEY_PREFIX: &str = "fleet:session:";
const LOCAL_CACHE_TTL: chrono::Duration = chrono::Duration::seconds(5);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Coordination(#[from] fleetops_coordination::CoordinationError),
}

struct CachedSession {
    record: SessionRecord,
    cached_at: chrono::DateTime<Utc>,
}

pub struct SessionManager {
    backend: Arc<dyn CoordinationBackend>,
    ttl: StdDuration,
    cache: DashMap<String, CachedSession>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn CoordinationBackend>, ttl_seconds: i64) -> Self {
        Self { backend, ttl: StdDuration::from_secs(ttl_seconds.max(0) as u64), cache: DashMap::new() }
    }

    fn key(token: &str) -> String {
        format!("{SESSION_KEY_PREFIX}{token}")
    }

    /// Mints a session token and CSRF token for `user_id`, storing the
    /// pair in the coordination backend with the configured TTL.
    pub async fn create(&self, user_id: &str) -> Result<(String, String), SessionError> {
        let token = fleetops_crypto::new_session_token();
        let csrf_token = fleetops_crypto::new_csrf_token();
        let now = Utc::now();
        let record = SessionRecord {
            user_id: user_id.to_string(),
            issued_at: now,
            expires_at: now + chrono::Duration::from_std(self.ttl).unwrap_or_default(),
            csrf_token: csrf_token.clone(),
        };

        let payload = serde_json::to_vec(&record).expect("SessionRecord is always serializable");
        self.backend.put(&Self::key(&token), payload, Some(self.ttl)).await?;
        self.cache.insert(token.clone(), CachedSession { record, cached_at: now });

        Ok((token, csrf_token))
    }

    /// Resolves a token to its session record, serving from the local
    /// cache when it is fresh (`< 5s` old) and falling through to the
    /// backend otherwise. Returns `None` for an absent or expired
    /// session — there is no distinct "invalid token" signal by
    /// design (§3: resolving an unknown token and an expired one are
    /// both simply "not authenticated").
    pub async fn resolve(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let now = Utc::now();

        if let Some(cached) = self.cache.get(token) {
            if now - cached.cached_at < LOCAL_CACHE_TTL {
                return Ok(if cached.record.is_live(now) { Some(cached.record.clone()) } else { None });
            }
        }

        match self.backend.get(&Self::key(token)).await? {
            Some(record) => {
                let parsed: SessionRecord = serde_json::from_slice(&record.value)
                    .map_err(|e| SessionError::Coordination(fleetops_coordination::CoordinationError::Serialization(e.to_string())))?;
                self.cache.insert(token.to_string(), CachedSession { record: parsed.clone(), cached_at: now });
                Ok(if parsed.is_live(now) { Some(parsed) } else { None })
            }
            None => {
                self.cache.remove(token);
                Ok(None)
            }
        }
    }

    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        self.backend.delete(&Self::key(token)).await?;
        self.cache.remove(token);
        Ok(())
    }

    /// Resets `expires_at` to `now + ttl`, implementing sliding
    /// expiry — called on every authenticated request (§4.5).
    pub async fn extend(&self, token: &str) -> Result<(), SessionError> {
        if let Some(mut record) = self.resolve(token).await? {
            let now = Utc::now();
            record.expires_at = now + chrono::Duration::from_std(self.ttl).unwrap_or_default();
            let payload = serde_json::to_vec(&record).expect("SessionRecord is always serializable");
            self.backend.put(&Self::key(token), payload, Some(self.ttl)).await?;
            self.cache.insert(token.to_string(), CachedSession { record, cached_at: now });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetops_coordination::InMemoryBackend;

    #[tokio::test]
    async fn create_then_resolve_round_trips() {
        let manager = SessionManager::new(Arc::new(InMemoryBackend::new()), 3600);
        let (token, csrf) = manager.create("alice").await.unwrap();
        let session = manager.resolve(&token).await.unwrap().unwrap();
        assert_eq!(session.user_id, "alice");
        assert_eq!(session.csrf_token, csrf);
    }

    #[tokio::test]
    async fn revoke_makes_the_token_unresolvable() {
        let manager = SessionManager::new(Arc::new(InMemoryBackend::new()), 3600);
        let (token, _) = manager.create("alice").await.unwrap();
        manager.revoke(&token).await.unwrap();
        assert!(manager.resolve(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn an_unknown_token_resolves_to_none() {
        let manager = SessionManager::new(Arc::new(InMemoryBackend::new()), 3600);
        assert!(manager.resolve("does-not-exist").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn extend_pushes_expiry_forward() {
        let manager = SessionManager::new(Arc::new(InMemoryBackend::new()), 3600);
        let (token, _) = manager.create("alice").await.unwrap();
        let before = manager.resolve(&token).await.unwrap().unwrap().expires_at;
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        manager.extend(&token).await.unwrap();
        let after = manager.resolve(&token).await.unwrap().unwrap().expires_at;
        assert!(after >= before);
    }
}
