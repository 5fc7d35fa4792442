// [libs/domain/models/src/session.rs]
/*!
 * Un token de sesión opaco, respaldado por el backend de
 * coordinación y compartido entre todos los nodos, para que un login
 * en un nodo siga autenticado cuando el balanceador enruta la
 * siguiente petición a otro (§4.5).
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The wire shape written under `fleet:session:` in the coordination
/// backend (§6). The token itself is the key, not a field here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub csrf_token: String,
}

impl SessionRecord {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.issued_at <= now && now < self.expires_at
    }
}
