// [libs/core/coordination/src/adapters/remote.rs]
/*!
 * Backend de KV remoto: el único usado en producción detrás de un
 * balanceador de carga, porque es el único que realmente comparte
 * estado entre procesos en hosts distintos. Se comunica por HTTP con
 * un servicio de clave/valor externo (`cluster.kv.{host,port,auth}`
 * en configuración); cada llamada pasa por el helper de reintento
 * compartido para cumplir §4.7 (tres reintentos, 100/200/400ms) antes
 * de que el llamador vea `BackendUnavailable`.
 */

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::backoff::with_retry;
use crate::ports::{CoordinationBackend, CoordinationError, Record};

pub struct RemoteKvBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RemoteKvBackend {
    pub fn new(host: &str, port: u16, auth_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("http://{host}:{port}"),
            auth_token,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[derive(Serialize)]
struct PutRequest {
    value_base64: String,
    ttl_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct GetResponse {
    value_base64: String,
}

#[derive(Serialize, Deserialize)]
struct CasRequest {
    expected_base64: Option<String>,
    value_base64: String,
    ttl_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct ListEntry {
    key: String,
    value_base64: String,
}

fn encode(bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    STANDARD.encode(bytes)
}

fn decode(s: &str) -> Result<Vec<u8>, CoordinationError> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    STANDARD.decode(s).map_err(|e| CoordinationError::Serialization(e.to_string()))
}

#[async_trait]
impl CoordinationBackend for RemoteKvBackend {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CoordinationError> {
        with_retry("remote_kv.put", || async {
            let body = PutRequest { value_base64: encode(&value), ttl_seconds: ttl.map(|d| d.as_secs()) };
            let response = self
                .authed(self.client.put(format!("{}/v1/kv/{key}", self.base_url)))
                .json(&body)
                .send()
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(CoordinationError::Unavailable(response.status().to_string()))
            }
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Record>, CoordinationError> {
        with_retry("remote_kv.get", || async {
            let response = self
                .authed(self.client.get(format!("{}/v1/kv/{key}", self.base_url)))
                .send()
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => {
                    let parsed: GetResponse = response
                        .json()
                        .await
                        .map_err(|e| CoordinationError::Serialization(e.to_string()))?;
                    Ok(Some(Record { value: decode(&parsed.value_base64)? }))
                }
                status => Err(CoordinationError::Unavailable(status.to_string())),
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), CoordinationError> {
        with_retry("remote_kv.delete", || async {
            let response = self
                .authed(self.client.delete(format!("{}/v1/kv/{key}", self.base_url)))
                .send()
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
                Ok(())
            } else {
                Err(CoordinationError::Unavailable(response.status().to_string()))
            }
        })
        .await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Record)>, CoordinationError> {
        with_retry("remote_kv.list", || async {
            let response = self
                .authed(self.client.get(format!("{}/v1/kv?prefix={prefix}", self.base_url)))
                .send()
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            if !response.status().is_success() {
                return Err(CoordinationError::Unavailable(response.status().to_string()));
            }
            let entries: Vec<ListEntry> = response
                .json()
                .await
                .map_err(|e| CoordinationError::Serialization(e.to_string()))?;
            entries
                .into_iter()
                .map(|e| Ok((e.key, Record { value: decode(&e.value_base64)? })))
                .collect()
        })
        .await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, CoordinationError> {
        with_retry("remote_kv.compare_and_set", || async {
            let body = CasRequest {
                expected_base64: expected.map(encode),
                value_base64: encode(&new),
                ttl_seconds: ttl.map(|d| d.as_secs()),
            };
            let response = self
                .authed(self.client.post(format!("{}/v1/kv/{key}/cas", self.base_url)))
                .json(&body)
                .send()
                .await
                .map_err(|e| CoordinationError::Unavailable(e.to_string()))?;
            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::CONFLICT => Ok(false),
                status => Err(CoordinationError::Unavailable(status.to_string())),
            }
        })
        .await
    }
}
