//! Binary entry point for the mcpd-filesystem server.

use clap::{Parser, error::ErrorKind};
use mcpd::transport::{self, SseServer};
use mcpd_filesystem::{
    Error, FilesystemServer, logging,
    config::{Cli, Config, Mode},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stderr too; stdout is the wire.
            eprint!("{}", e.render());
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };
    logging::init(cli.log_level);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            1
        }
    };
    // The blocking stdin reader would otherwise hold runtime shutdown.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), Error> {
    let base_dir = std::env::current_dir()?;
    let config = cli.into_config(base_dir)?;
    let Config {
        mode,
        listen,
        sandbox,
        ..
    } = config;
    for root in sandbox.roots() {
        info!(root = %root.path().display(), resolved = %root.resolved().display(), "allowed directory");
    }

    let server = FilesystemServer::new(sandbox);
    let dispatcher = server.dispatcher()?;
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    match mode {
        Mode::Stdio => {
            info!("serving on stdio");
            mcpd::serve(&dispatcher, transport::stdio(), shutdown).await?;
        }
        Mode::Sse => {
            let listener = TcpListener::bind(listen)
                .await
                .map_err(|source| Error::Bind {
                    addr: listen,
                    source,
                })?;
            SseServer::new(Arc::new(dispatcher), shutdown).serve(listener).await?;
        }
    }
    info!("server stopped");
    Ok(())
}

async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                error!("cannot install SIGTERM handler: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown requested");
    shutdown.cancel();
}
