// [libs/core/coordination/src/backoff.rs]
/*!
 * Único punto de reintento para llamadas al backend de coordinación
 * (§9: "ad-hoc retry at call sites" se consolida en un solo helper).
 * Tres intentos con backoff exponencial 100ms/200ms/400ms, igual al
 * contrato de §4.7; quien agote los reintentos recibe el error tal
 * cual para que el llamador lo traduzca a `BackendUnavailable` (503).
 */

use std::future::Future;
use std::time::Duration;

use crate::ports::CoordinationError;

const RETRY_DELAYS_MS: [u64; 3] = [100, 200, 400];

pub async fn with_retry<T, F, Fut>(operation_name: &str, mut attempt: F) -> Result<T, CoordinationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CoordinationError>>,
{
    let mut last_error = None;
    for delay_ms in RETRY_DELAYS_MS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(operation = operation_name, error = %err, delay_ms, "coordination backend call failed, retrying");
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
    match attempt().await {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(operation = operation_name, error = %err, "coordination backend call exhausted retries");
            Err(last_error.unwrap_or(err))
        }
    }
}
