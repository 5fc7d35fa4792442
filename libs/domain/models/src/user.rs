// [libs/domain/models/src/user.rs]
/*!
 * Un usuario con acceso al dashboard. El hash de contraseña nunca
 * sale de este tipo hacia un llamador — `UserPublic` es la única
 * forma que cruza un límite de proceso o de serialización hacia un
 * cliente.
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Operator,
}

/// Stored record. `password_hash` is either a bcrypt hash or a legacy
/// plain SHA-256 hex digest; `legacy` disambiguates which, mirroring
/// `fleetops_crypto::PasswordHash` without this crate depending on
/// the crypto crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub legacy: bool,
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub username: String,
    pub role: UserRole,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        Self { username: user.username.clone(), role: user.role.clone() }
    }
}
