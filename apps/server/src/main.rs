// [apps/server/src/main.rs]
/*!
 * =================================================================
 * APARATO: SERVER MAIN ENTRY POINT (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: APPLICATION SHELL (ESTRATO L3)
 * RESPONSABILIDAD: CARGA DE CONFIGURACIÓN E IGNICIÓN DEL KERNEL
 *
 * Exit codes per §6: 0 clean shutdown, 1 fatal configuration error
 * (or a runtime failure after the kernel was already serving), 2
 * coordination backend unreachable at startup, 64 usage error (an
 * unreadable or unparseable config file).
 * =================================================================
 */

use clap::Parser;
use fleetops_observability::init_tracing;
use fleetops_server::config::{Cli, Config, ConfigError};
use fleetops_server::kernel::Kernel;

fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();
    init_tracing("fleetops-server");

    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "configuration load failed");
            let code = match error {
                ConfigError::ReadFailed { .. } | ConfigError::ParseFailed { .. } => 64,
                _ => 1,
            };
            return std::process::ExitCode::from(code);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to start async runtime: {error}");
            return std::process::ExitCode::from(1);
        }
    };

    runtime.block_on(async move {
        let kernel = match Kernel::bootstrap(config).await {
            Ok(kernel) => kernel,
            Err(error) => {
                tracing::error!(%error, "kernel bootstrap failed (coordination backend unreachable?)");
                return std::process::ExitCode::from(2);
            }
        };

        tracing::info!("fleetops-server fully operational");

        if let Err(error) = kernel.serve().await {
            tracing::error!(%error, "server terminated with an error");
            return std::process::ExitCode::from(1);
        }

        std::process::ExitCode::SUCCESS
    })
}
