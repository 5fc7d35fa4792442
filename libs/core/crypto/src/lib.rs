// [libs/core/crypto/src/lib.rs]
/*!
 * =================================================================
 * APARATO: CRYPTOGRAPHIC PRIMITIVES ENGINE (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: CORE SECURITY (ESTRATO L1)
 * RESPONSABILIDAD: CIFRADO DE PAYLOADS, HASHING DE CONTRASEÑAS,
 *                   FIRMA DE IDENTIDAD DE NODO Y MINTEO DE TOKENS
 *
 * VISION HIPER-HOLÍSTICA:
 * Generaliza el motor de descifrado Zero-Knowledge original (AES-256-GCM
 * + PBKDF2 por contraseña) en cuatro primitivas independientes que ya
 * no comparten una única frase maestra de operador: el cable usa una
 * llave simétrica directa de configuración, el hashing de contraseñas
 * usa una KDF lenta dedicada, la identidad de nodo se firma con HMAC,
 * y los tokens de sesión/CSRF se mintean con aleatoriedad criptográfica
 * pura, sin estructura.
 * =================================================================
 */

mod aead;
mod hmac_sign;
mod password;
mod tokens;

pub use aead::{decrypt, encrypt, EncryptedEnvelope, ENVELOPE_VERSION};
pub use hmac_sign::{sign_node_identity, verify_node_identity};
pub use password::{hash_password, needs_rehash, verify_password, PasswordHash};
pub use tokens::{constant_time_eq, new_csrf_token, new_session_token};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("BASE64_DECODE_FAULT: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("DECRYPTION_MALFUNCTION: integrity compromised or wrong key")]
    Decryption,
    #[error("UNSUPPORTED_ENVELOPE_VERSION: {0}")]
    UnsupportedVersion(String),
    #[error("MALFORMED_NONCE: expected 12 bytes, found {0}")]
    MalformedNonce(usize),
    #[error("MALFORMED_KEY: expected 32 bytes, found {0}")]
    MalformedKey(usize),
    #[error("PASSWORD_HASH_FAULT: {0}")]
    PasswordHash(String),
    #[error("SIGNATURE_INVALID: node identity signature did not verify")]
    SignatureInvalid,
    #[error("SIGNATURE_STALE: issued_at is outside the acceptable clock skew window")]
    SignatureStale,
}
