// [apps/server/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION STATE COMPOSITION ROOT (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: ENSAMBLAJE DE BACKEND, ALMACÉN, CLÚSTER Y SESIONES
 *
 * Generaliza la placa base neural del teacher original en un
 * ensamblaje mucho más pequeño: un backend de coordinación (elegido
 * por `cluster.backend`), el almacén de datos en memoria, el gestor
 * de sesiones que vive sobre ese mismo backend, el gestor de clúster
 * (solo si `cluster.enabled`), y el almacén de usuarios bootstrapeado
 * desde configuración. No hay AI cortex, no hay GraphQL, no hay
 * repositorios Turso — el teacher resolvía un problema distinto.
 * =================================================================
 */

pub mod cluster;
pub mod session;
pub mod store;
pub mod users;

use std::sync::{Arc, Mutex};

use fleetops_coordination::{CoordinationBackend, FileBackend, InMemoryBackend, RemoteKvBackend};

use crate::config::{ClusterBackendKind, Config};
use crate::middleware::{new_rate_limiter, IpRateLimiter};
use cluster::ClusterManager;
use session::SessionManager;
use store::{DataStore, StatusWindows};
use users::UserStore;

pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn CoordinationBackend>,
    pub store: Arc<DataStore>,
    pub sessions: Arc<SessionManager>,
    pub cluster: Option<Arc<ClusterManager>>,
    pub users: Arc<Mutex<UserStore>>,
    pub limiter: Arc<IpRateLimiter>,
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn CoordinationBackend>> {
    let backend: Arc<dyn CoordinationBackend> = match config.cluster_backend {
        ClusterBackendKind::Memory => Arc::new(InMemoryBackend::new()),
        ClusterBackendKind::File => Arc::new(FileBackend::open(&config.cluster_file_path)?),
        ClusterBackendKind::Kv => {
            let host = config.kv.host.as_deref().unwrap_or("127.0.0.1");
            let port = config.kv.port.unwrap_or(6380);
            Arc::new(RemoteKvBackend::new(host, port, config.kv.auth.clone()))
        }
    };
    Ok(backend)
}

impl AppState {
    /// Assembles every stateful component from a validated `Config`.
    /// Cluster self-registration (the only fallible, networked step)
    /// happens here so a node that cannot claim an identity never
    /// finishes booting (§4.4).
    pub async fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let backend = build_backend(&config)?;

        let store = Arc::new(DataStore::new(
            config.history_size,
            config.db_encryption_key.clone().map(|key| {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&key);
                arr
            }),
        ));

        let sessions = Arc::new(SessionManager::new(backend.clone(), config.session_ttl_seconds));

        let cluster = if config.cluster_enabled {
            let manager = ClusterManager::register(
                backend.clone(),
                hostname(),
                config.port,
                config.cluster_secret.clone(),
                std::time::Duration::from_secs(config.heartbeat_interval_seconds),
                config.node_timeout_seconds,
            )
            .await?;
            Some(Arc::new(manager))
        } else {
            None
        };

        let users = Arc::new(Mutex::new(UserStore::bootstrap_admin(
            &config.initial_admin_username,
            &config.initial_admin_password,
        )?));

        let limiter = new_rate_limiter(config.rate_limit_per_minute);

        Ok(Self { config, backend, store, sessions, cluster, users, limiter })
    }

    pub fn status_windows(&self) -> StatusWindows {
        StatusWindows {
            online: chrono::Duration::seconds(self.config.online_window_seconds),
            stale: chrono::Duration::seconds(self.config.stale_window_seconds),
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "fleet-node".to_string())
}
