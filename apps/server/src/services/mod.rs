// [apps/server/src/services/mod.rs]
/*!
 * Background daemons the kernel spawns alongside the HTTP listener:
 * the cluster heartbeat writer, the command-expiry sweeper, and the
 * snapshot persister. None of these are request-driven; all run on
 * their own `tokio::time::interval` for the lifetime of the process.
 */

pub mod heartbeat;
pub mod persist;
pub mod reaper;

pub use heartbeat::spawn_heartbeat;
pub use persist::{load_snapshot, save_snapshot, spawn_persister};
pub use reaper::spawn_reaper;
