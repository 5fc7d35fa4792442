// [libs/core/coordination/src/lib.rs]
/*!
 * =================================================================
 * APARATO: COORDINATION BACKEND ABSTRACTION (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: CORE INFRASTRUCTURE (ESTRATO L1)
 * RESPONSABILIDAD: PUERTO POLIMÓRFICO SOBRE EL ALMACÉN EXTERNO DE
 *                   CLAVE/VALOR USADO PARA CLUSTER Y SESIONES
 *
 * VISION HIPER-HOLÍSTICA:
 * El núcleo nunca asume transacciones a través de múltiples llaves;
 * compare-and-set existe únicamente para el self-registro de nodo.
 * Tres encarnaciones concretas viven en `adapters`: memoria (pruebas
 * y despliegues de un solo nodo), archivo (durable, un solo escritor)
 * y KV remoto (producción, compartido entre procesos).
 * =================================================================
 */

pub mod adapters;
mod backoff;
mod ports;

pub use adapters::{FileBackend, InMemoryBackend, RemoteKvBackend};
pub use backoff::with_retry;
pub use ports::{CoordinationBackend, CoordinationError, Record};
