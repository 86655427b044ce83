//! Operator entry point.
//!
//! Parses configuration, launches the job supervisor and blocks until a
//! shutdown signal arrives and every worker has unwound.

use clap::Parser;
use operator_core::runtime::StandaloneFactory;
use operator_core::supervisor::Pool;
use operator_core::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    operator_core::observability::init_tracing();

    if let Err(e) = config.validate() {
        tracing::error!("config_invalid: error={}", e);
        std::process::exit(1);
    }
    tracing::info!(
        "operator_starting: mode={}, api_group={}, secondary_api_group={:?}, operator_namespace={}",
        config.mode.map(|m| m.as_str()).unwrap_or("<unset>"),
        config.api_group,
        config.secondary_api_group,
        config.operator_namespace,
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let pool = Pool::with_default_jobs(
        Arc::new(config),
        cancel.clone(),
        Arc::new(StandaloneFactory::new()),
    );
    pool.start()?;

    tokio::select! {
        _ = cancel.cancelled() => tracing::info!("shutdown_requested: waiting for workers"),
        _ = pool.wait() => tracing::info!("workers_finished: no job left to supervise"),
    }
    cancel.cancel();
    pool.wait().await;

    tracing::info!("operator_exited");
    Ok(())
}

/// Cancel `cancel` on interrupt or terminate.
async fn cancel_on_signal(cancel: CancellationToken) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("signal_handler_failed: signal=interrupt, error={}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("signal_handler_failed: signal=terminate, error={}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!("signal_received: signal=interrupt"),
        _ = terminate => tracing::info!("signal_received: signal=terminate"),
    }
    cancel.cancel();
}
