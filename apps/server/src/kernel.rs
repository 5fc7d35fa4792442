// [apps/server/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: SERVER KERNEL (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: IGNICIÓN, DAEMONS DE FONDO Y APAGADO ORDENADO
 *
 * Generaliza el kernel soberano del teacher (bootstrap -> daemons ->
 * axum::serve) en un arranque de dos fases: `bootstrap` ensambla
 * `AppState` y restaura cualquier snapshot persistido; `serve` lanza
 * los daemons de fondo (§4.4 latido, §4.3 expiración de comandos,
 * §10.3 persistencia periódica) y sirve el router hasta recibir una
 * señal de apagado, momento en el que se desregistra del clúster y
 * vuelca un snapshot final (§10.5).
 * =================================================================
 */

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::routes::build_router;
use crate::services;
use crate::state::AppState;

pub struct Kernel {
    state: Arc<AppState>,
}

impl Kernel {
    pub async fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let state = Arc::new(AppState::bootstrap(config).await?);

        if let Some(path) = state.config.persistence_path.clone() {
            services::load_snapshot(&path, &state.store)?;
        }

        Ok(Self { state })
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let state = self.state;

        if let Some(path) = state.config.persistence_path.clone() {
            let store = state.store.clone();
            let interval = Duration::from_secs(state.config.persistence_interval_seconds.max(1));
            tokio::spawn(services::spawn_persister(store, path, interval));
        }

        if let Some(cluster) = state.cluster.clone() {
            tokio::spawn(services::spawn_heartbeat(cluster));
        }

        {
            let store = state.store.clone();
            let ttl = chrono::Duration::seconds(state.config.command_ttl_seconds);
            tokio::spawn(services::spawn_reaper(store, ttl));
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.port));
        let router = build_router(state.clone());
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(%addr, "fleetops-server listening");

        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal(state.clone()))
            .await?;

        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM, then deregisters this node's cluster
/// membership and flushes a final snapshot before axum stops draining
/// in-flight requests (§10.5).
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight requests");

    if let Some(cluster) = &state.cluster {
        if let Err(error) = cluster.deregister().await {
            tracing::warn!(%error, "failed to deregister cluster membership during shutdown");
        }
    }

    if let Some(path) = &state.config.persistence_path {
        if let Err(error) = services::save_snapshot(path, &state.store) {
            tracing::error!(%error, "final snapshot persistence failed during shutdown");
        }
    }
}
