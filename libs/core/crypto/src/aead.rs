// [libs/core/crypto/src/aead.rs]
/*!
 * Cifrado autenticado del payload de cable (agente <-> servidor).
 *
 * A diferencia del motor heredado (que derivaba la llave de una frase
 * maestra vía PBKDF2), la llave aquí llega directamente de configuración
 * como 32 bytes base64: la misma llave debe vivir en el agente y en el
 * servidor. Cada mensaje obtiene un nonce de 96 bits generado con
 * aleatoriedad criptográfica; reusar un nonce con la misma llave rompe
 * la garantía de autenticación de GCM, así que `encrypt` jamás acepta
 * un nonce del llamador.
 */

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::CryptoError;

const KEY_LENGTH_BYTES: usize = 32;
const NONCE_LENGTH_BYTES: usize = 12;
pub const ENVELOPE_VERSION: &str = "1";

/// Wire shape of an encrypted payload, per §6 of the contract.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptedEnvelope {
    pub encrypted: bool,
    pub version: String,
    pub nonce: String,
    pub ciphertext: String,
}

fn load_key(key: &[u8]) -> Result<&Key<Aes256Gcm>, CryptoError> {
    if key.len() != KEY_LENGTH_BYTES {
        return Err(CryptoError::MalformedKey(key.len()));
    }
    Ok(Key::<Aes256Gcm>::from_slice(key))
}

/// Encrypts `plaintext` under `key` (32 raw bytes), returning a wire
/// envelope with a freshly generated nonce.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<EncryptedEnvelope, CryptoError> {
    let cipher = Aes256Gcm::new(load_key(key)?);

    let mut nonce_bytes = [0u8; NONCE_LENGTH_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Decryption)?;

    Ok(EncryptedEnvelope {
        encrypted: true,
        version: ENVELOPE_VERSION.to_string(),
        nonce: BASE64.encode(nonce_bytes),
        ciphertext: BASE64.encode(ciphertext),
    })
}

/// Decrypts an envelope under `key`, verifying the GCM auth tag.
/// Fails closed on any mismatch: wrong key, wrong version, tampered
/// ciphertext, or a malformed nonce all collapse to `CryptoError`.
pub fn decrypt(key: &[u8], envelope: &EncryptedEnvelope) -> Result<Vec<u8>, CryptoError> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedVersion(envelope.version.clone()));
    }

    let cipher = Aes256Gcm::new(load_key(key)?);
    let nonce_bytes = BASE64.decode(&envelope.nonce)?;
    if nonce_bytes.len() != NONCE_LENGTH_BYTES {
        return Err(CryptoError::MalformedNonce(nonce_bytes.len()));
    }
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = BASE64.decode(&envelope.ciphertext)?;

    cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        [7u8; 32]
    }

    #[test]
    fn round_trips_for_the_same_key() {
        let plaintext = b"{\"machine_id\":\"M1\"}";
        let envelope = encrypt(&key(), plaintext).expect("encrypt should succeed");
        let recovered = decrypt(&key(), &envelope).expect("decrypt should succeed");
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn fails_closed_under_a_different_key() {
        let envelope = encrypt(&key(), b"secret").unwrap();
        let other_key = [9u8; 32];
        assert!(decrypt(&other_key, &envelope).is_err());
    }

    #[test]
    fn rejects_an_unknown_envelope_version() {
        let mut envelope = encrypt(&key(), b"secret").unwrap();
        envelope.version = "2".to_string();
        match decrypt(&key(), &envelope) {
            Err(CryptoError::UnsupportedVersion(v)) => assert_eq!(v, "2"),
            other => panic!("expected UnsupportedVersion, got {other:?}"),
        }
    }

    #[test]
    fn nonces_are_not_reused_across_calls() {
        let a = encrypt(&key(), b"same plaintext").unwrap();
        let b = encrypt(&key(), b"same plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }
}
