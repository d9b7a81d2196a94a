use portfolio_config::Config;
use portfolio_email_contracts::EmailService;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::{
    email,
    environment::{ConfigProvider, Provider},
};

pub async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Connecting to smtp server");
    let email = email::connect(&config.email)?;
    match email.ping().await {
        Ok(()) => info!("Smtp server is ready"),
        Err(err) => warn!("Smtp server is not reachable, sending messages will fail: {err:#}"),
    }

    let background = TaskTracker::new();
    let config_provider = ConfigProvider::new(&config)?;
    let server = Provider::new(config_provider, email, background.clone()).provide()?;

    info!(
        "Starting http server on {}:{}",
        config.http.host, config.http.port
    );
    server.serve(shutdown_signal()).await?;

    background.close();
    if !background.is_empty() {
        info!("Waiting for {} pending auto replies", background.len());
    }
    background.wait().await;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutting down");
}
