// [apps/server/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SERVER LIBRARY ROOT (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: CRATE ROOT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN DEL ÁRBOL DE MÓDULOS
 * =================================================================
 */

/// Layered configuration: compiled defaults, YAML file, environment,
/// CLI flags (§6, §10.3).
pub mod config;
/// The umbrella `ApiError` and its HTTP translation.
pub mod errors;
/// Route handlers, grouped by §4.7's tag.
pub mod handlers;
/// Composition root: bootstrap, background daemons, graceful shutdown.
pub mod kernel;
/// Auth & request pipeline guards (§4.6).
pub mod middleware;
/// Router assembly (§4.7).
pub mod routes;
/// Background daemons the kernel spawns alongside the HTTP listener.
pub mod services;
/// In-process application state: data store, sessions, cluster, users.
pub mod state;

pub mod prelude {
    pub use crate::config::{Cli, Config, ConfigError};
    pub use crate::kernel::Kernel;
    pub use crate::state::AppState;
}
