// [libs/core/crypto/src/tokens.rs]
/*!
 * Minteo de tokens opacos: sesiones (256 bits) y CSRF (128 bits), más
 * la comparación en tiempo constante que el resto del crate reutiliza
 * para contraseñas heredadas y firmas HMAC. Ningún token lleva
 * estructura ni claims embebidos — son únicamente handles de alta
 * entropía hacia un registro en el backend de coordinación.
 */

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use rand::RngCore;
use subtle::ConstantTimeEq;

const SESSION_TOKEN_BYTES: usize = 32; // 256 bits
const CSRF_TOKEN_BYTES: usize = 16; // 128 bits

fn random_url_safe_token(byte_len: usize) -> String {
    let mut buf = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut buf);
    BASE64_URL.encode(buf)
}

/// 256 bits of randomness, URL-safe encoded, no embedded structure.
pub fn new_session_token() -> String {
    random_url_safe_token(SESSION_TOKEN_BYTES)
}

/// 128 bits of randomness bound to a session at issuance time.
pub fn new_csrf_token() -> String {
    random_url_safe_token(CSRF_TOKEN_BYTES)
}

/// Constant-time byte comparison with respect to input length, used
/// for CSRF tokens, API keys, and legacy password digests alike.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_not_reused_across_calls() {
        assert_ne!(new_session_token(), new_session_token());
        assert_ne!(new_csrf_token(), new_csrf_token());
    }

    #[test]
    fn comparison_rejects_mismatched_length_and_content() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
