// [libs/core/crypto/src/password.rs]
/*!
 * Hashing de contraseñas para usuarios del dashboard.
 *
 * El teacher original nunca autenticaba usuarios humanos (el vault
 * descifraba credenciales de un operador ya autenticado por otro
 * medio); este módulo es enteramente nuevo. Usa bcrypt (KDF lenta,
 * factor de trabajo >= 12) como ruta primaria, con una ruta heredada
 * que acepta un hash SHA-256 simple únicamente cuando el registro
 * almacenado está marcado `Legacy` — permite migrar cuentas creadas
 * antes de que bcrypt existiera sin forzar un reset de contraseña.
 */

use sha2::{Digest, Sha256};

use crate::CryptoError;

pub const MIN_BCRYPT_COST: u32 = 12;

/// A stored password record. `Legacy` records are plain SHA-256 hex
/// digests accepted exactly once, on the way to being rehashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordHash {
    Bcrypt(String),
    Legacy(String),
}

/// Hashes `plaintext` with bcrypt at `MIN_BCRYPT_COST`.
pub fn hash_password(plaintext: &str) -> Result<PasswordHash, CryptoError> {
    let hashed = bcrypt::hash(plaintext, MIN_BCRYPT_COST)
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    Ok(PasswordHash::Bcrypt(hashed))
}

fn legacy_sha256_hex(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies `plaintext` against a stored hash. bcrypt verification is
/// constant-time by construction; the legacy path compares hex digests
/// using the same constant-time primitive the rest of the crate uses
/// for tokens, so neither path leaks timing information proportional
/// to a prefix match.
pub fn verify_password(plaintext: &str, stored: &PasswordHash) -> Result<bool, CryptoError> {
    match stored {
        PasswordHash::Bcrypt(hash) => {
            bcrypt::verify(plaintext, hash).map_err(|e| CryptoError::PasswordHash(e.to_string()))
        }
        PasswordHash::Legacy(hash) => {
            let candidate = legacy_sha256_hex(plaintext);
            Ok(crate::constant_time_eq(candidate.as_bytes(), hash.as_bytes()))
        }
    }
}

/// True when a successful verify against `stored` must be followed by
/// a rehash onto the slow KDF before the session is returned to the
/// caller. Only ever true for the legacy path.
pub fn needs_rehash(stored: &PasswordHash) -> bool {
    matches!(stored, PasswordHash::Legacy(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcrypt_round_trips() {
        let stored = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &stored).unwrap());
        assert!(!verify_password("wrong password", &stored).unwrap());
    }

    #[test]
    fn legacy_hashes_verify_and_flag_for_migration() {
        let legacy = PasswordHash::Legacy(legacy_sha256_hex("old-password"));
        assert!(verify_password("old-password", &legacy).unwrap());
        assert!(needs_rehash(&legacy));
        assert!(!needs_rehash(&hash_password("x").unwrap()));
    }
}
