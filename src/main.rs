use std::net::SocketAddr;
use std::sync::Arc;

use courier::config::Configuration;
use courier::{app, initialize_state, telemetry};

#[tokio::main]
async fn main() {
    // Read configuration first. The subscriber is not installed yet,
    // so the failure goes to stderr directly.
    let config = match Configuration::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            std::process::exit(1);
        },
    };

    telemetry::init(&config.log_level);

    let state = match initialize_state(Arc::clone(&config)) {
        Ok(state) => state,
        Err(err) => {
            tracing::error!(error = %err, "cannot initialize mail transport");
            std::process::exit(1);
        },
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, %addr, "cannot bind listener");
            std::process::exit(1);
        },
    };

    tracing::info!(
        %addr,
        provider = %config.email_provider,
        environment = %config.environment,
        "server started"
    );

    if let Err(err) = axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        tracing::error!(error = %err, "server exited with error");
        std::process::exit(1);
    }
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("cannot install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("cannot install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
