//! `hostrelay run` — start the proxy server.
//!
//! Resolves the upstream from `--upstream` or a config file, freezes it
//! into a [`ForwardingRule`], and serves the proxy listener (plus the
//! optional admin listener) until SIGTERM or Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::rule::ForwardingRule;
use crate::config::sources::{self, args::ArgsSource};
use crate::config::ConfigSource;
use crate::error::RelayError;
use crate::logging;
use crate::proxy::transport::HyperTransport;
use crate::server::{self, AppState};

const AUTO_DETECT: [&str; 4] = [
    "hostrelay.yaml",
    "hostrelay.yml",
    "hostrelay.json",
    "hostrelay.toml",
];

pub async fn execute(args: RunArgs) -> Result<(), RelayError> {
    logging::init(&args.log_level, logging::resolve_format(args.pretty, args.json));

    let source = resolve_config_source(&args).await?;
    let (mut config, version) = source.load().await?;

    if let Some(timeout) = args.timeout {
        config.upstream.timeout = timeout;
    }

    let listen: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let rule = ForwardingRule::new(&config, listen)?;
    let upstream = rule.upstream.to_string();

    let transport = Arc::new(HyperTransport::new(&config.upstream));
    let state = Arc::new(AppState::new(
        rule,
        &config,
        transport,
        version,
        source.name(),
    ));

    let listener = tokio::net::TcpListener::bind(listen).await?;

    tracing::info!(
        addr = %listen,
        upstream = %upstream,
        timeout_ms = config.upstream.timeout,
        source = source.name(),
        "hostrelay started"
    );

    // Dropping shutdown_tx without sending still wakes the admin listener.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let admin_handle = match args.admin_port {
        Some(port) => {
            let admin_addr: SocketAddr = format!("{}:{}", args.host, port).parse()?;
            let admin_listener = tokio::net::TcpListener::bind(admin_addr).await?;
            tracing::info!(addr = %admin_addr, "admin listener started");
            let admin_router = server::build_admin_router(state.clone());
            let mut rx = shutdown_rx;
            Some(tokio::spawn(async move {
                let shutdown = async move {
                    let _ = rx.changed().await;
                };
                if let Err(e) = axum::serve(admin_listener, admin_router)
                    .with_graceful_shutdown(shutdown)
                    .await
                {
                    tracing::error!(error = %e, "admin listener failed");
                }
            }))
        }
        None => None,
    };

    let router = server::build_router(state, args.max_body);

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Some(handle) = admin_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "admin listener task failed");
        }
    }

    tracing::info!("hostrelay stopped");
    Ok(())
}

async fn resolve_config_source(args: &RunArgs) -> Result<Box<dyn ConfigSource>, RelayError> {
    if let Some(ref upstream) = args.upstream {
        if let Some(ref path) = args.config {
            tracing::warn!(
                path = %path.display(),
                "--upstream given, ignoring config file"
            );
        }
        return Ok(Box::new(ArgsSource::new(upstream.clone())));
    }

    if let Some(ref path) = args.config {
        return sources::file_source_for(path);
    }

    for name in &AUTO_DETECT {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return sources::file_source_for(&path);
        }
    }

    Err(RelayError::NoConfigSource {
        hint: "Provide --upstream <url> (or UPSTREAM_URL), or --config <file>.\n  \
               Run 'hostrelay init --upstream <url>' to create a config file."
            .into(),
    })
}
