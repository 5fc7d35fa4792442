// [apps/server/src/state/users.rs]
/*!
 * =================================================================
 * APARATO: USER STORE (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: CREDENCIALES DE OPERADOR Y VERIFICACIÓN DE CONTRASEÑA
 *
 * §3 describes users as "created through an admin route" but §4.7's
 * route table lists no such endpoint. In the absence of a contracted
 * create-route, this core bootstraps a single admin account from
 * configuration at startup (see DESIGN.md's Open Question log) and
 * keeps it in memory — there is exactly one tenant, the fleet's own
 * operators, and no multi-node user replication requirement in the
 * spec's data model.
 * =================================================================
 */

use std::collections::HashMap;

use fleetops_crypto::PasswordHash;
use fleetops_domain::{User, UserRole};

fn to_wire(hash: &PasswordHash) -> (String, bool) {
    match hash {
        PasswordHash::Bcrypt(value) => (value.clone(), false),
        PasswordHash::Legacy(value) => (value.clone(), true),
    }
}

fn from_wire(user: &User) -> PasswordHash {
    if user.legacy {
        PasswordHash::Legacy(user.password_hash.clone())
    } else {
        PasswordHash::Bcrypt(user.password_hash.clone())
    }
}

pub struct UserStore {
    users: HashMap<String, User>,
}

impl UserStore {
    /// Bootstraps the store with a single admin account. The password
    /// is hashed immediately; the plaintext never lives longer than
    /// this call.
    pub fn bootstrap_admin(username: &str, password: &str) -> Result<Self, fleetops_crypto::CryptoError> {
        let hashed = fleetops_crypto::hash_password(password)?;
        let (password_hash, legacy) = to_wire(&hashed);

        let mut users = HashMap::new();
        users.insert(
            username.to_string(),
            User { username: username.to_string(), password_hash, legacy, role: UserRole::Admin },
        );

        Ok(Self { users })
    }

    pub fn find(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    /// Verifies `password` against the stored hash for `username`,
    /// returning the user on success. A legacy SHA-256 hash that
    /// verifies successfully is transparently upgraded to bcrypt
    /// in-place (§4.6's migration path).
    pub fn verify(&mut self, username: &str, password: &str) -> Option<&User> {
        let user = self.users.get(username)?;
        let stored = from_wire(user);
        let ok = fleetops_crypto::verify_password(password, &stored).unwrap_or(false);
        if !ok {
            return None;
        }

        if fleetops_crypto::needs_rehash(&stored) {
            if let Ok(upgraded) = fleetops_crypto::hash_password(password) {
                let (password_hash, legacy) = to_wire(&upgraded);
                if let Some(user) = self.users.get_mut(username) {
                    user.password_hash = password_hash;
                    user.legacy = legacy;
                }
            }
        }

        self.users.get(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_admin_can_then_verify_its_own_password() {
        let mut store = UserStore::bootstrap_admin("admin", "correct horse battery staple").unwrap();
        assert!(store.verify("admin", "correct horse battery staple").is_some());
    }

    #[test]
    fn wrong_password_does_not_verify() {
        let mut store = UserStore::bootstrap_admin("admin", "correct horse battery staple").unwrap();
        assert!(store.verify("admin", "wrong password").is_none());
    }

    #[test]
    fn unknown_username_does_not_verify() {
        let mut store = UserStore::bootstrap_admin("admin", "correct horse battery staple").unwrap();
        assert!(store.verify("nobody", "whatever").is_none());
    }
}
