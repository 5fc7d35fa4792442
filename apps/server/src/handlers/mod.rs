// [apps/server/src/handlers/mod.rs]
/*!
 * Route handler modules, grouped by §4.7's tag: `auth` (public/login),
 * `ingestion` (agent-tagged), `dashboard` (dashboard-tagged reads plus
 * the one write route), `cluster` (status + public health probe).
 */

pub mod auth;
pub mod cluster;
pub mod dashboard;
pub mod ingestion;
