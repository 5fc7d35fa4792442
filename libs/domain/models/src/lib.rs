// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: SHARED DOMAIN TYPES (ESTRATO L2)
 * RESPONSABILIDAD: SINGLE SOURCE OF TRUTH DE LAS ENTIDADES DEL DOMINIO
 * =================================================================
 */

pub mod command;
pub mod history;
pub mod machine;
pub mod node;
pub mod session;
pub mod user;

pub use command::{Command, CommandStatus, MAX_COMMAND_RESULT_BYTES};
pub use history::HistoryEntry;
pub use machine::{Machine, MachineSnapshot, MachineStatus};
pub use node::{NodeRecord, NodeSnapshot, NodeStatus};
pub use session::SessionRecord;
pub use user::{User, UserPublic, UserRole};
