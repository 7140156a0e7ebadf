// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `nbrd`: serves the broker protocol on stdin/stdout.

use nbr_adapters::NetworkBroker;
use nbr_broker::{env, serve};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _guard = init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "nbrd starting");

    let (broker, events) = NetworkBroker::new(env::http_timeout());
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let result =
        serve(Arc::new(broker), events, tokio::io::stdin(), tokio::io::stdout(), shutdown).await;
    match result {
        Ok(()) => {
            info!("nbrd stopped");
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "nbrd failed");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Stdout carries protocol frames, so logs go to a daily file, or to stderr
/// when no log directory resolves.
fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let dir = env::log_dir().filter(|dir| std::fs::create_dir_all(dir).is_ok());
    match dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, env::LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    }
}
