use std::future::Future;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use mnemosyne_mcp::{logging, McpServer, ServerConfig};
use tracing::{error, info};

fn main() -> ExitCode {
    let config = ServerConfig::from_env();

    if let Err(err) = logging::init(&config) {
        let _ = writeln!(io::stderr(), "mnemosyned: {err}");
        return ExitCode::FAILURE;
    }
    info!(
        db = %config.db_path.display(),
        log_file = %config.log_file.display(),
        "starting mnemosyned"
    );

    let server = match McpServer::from_config(&config) {
        Ok(server) => Arc::new(server),
        Err(err) => {
            error!(error = %err, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async move {
        let shutdown = shutdown_signal();
        let serve = tokio::task::spawn_blocking(move || server.serve_stdio());
        tokio::select! {
            joined = serve => match joined {
                Ok(Ok(())) => ExitCode::SUCCESS,
                Ok(Err(err)) => {
                    error!(error = %err, "stdio transport failed");
                    ExitCode::FAILURE
                }
                Err(err) => {
                    error!(error = %err, "request loop aborted");
                    ExitCode::FAILURE
                }
            },
            () = shutdown => {
                info!("shutdown signal received");
                ExitCode::SUCCESS
            }
        }
    });

    // The blocking stdin reader cannot be cancelled; do not wait for it.
    runtime.shutdown_background();
    info!("mnemosyned stopped");
    code
}

/// Installs the SIGINT/SIGTERM listeners immediately and returns a future
/// that completes on the first of them. Must be called inside the runtime.
fn shutdown_signal() -> impl Future<Output = ()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let interrupt = signal(SignalKind::interrupt());
        let terminate = signal(SignalKind::terminate());
        async move {
            let (mut interrupt, mut terminate) = match (interrupt, terminate) {
                (Ok(interrupt), Ok(terminate)) => (interrupt, terminate),
                (Err(err), _) | (_, Err(err)) => {
                    error!(error = %err, "signal handlers unavailable, relying on ctrl-c");
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        error!(error = %err, "ctrl-c handler failed");
                        std::future::pending::<()>().await;
                    }
                    return;
                }
            };
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
        }
    }

    #[cfg(not(unix))]
    async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    }
}
