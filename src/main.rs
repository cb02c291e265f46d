use std::io;
use std::sync::Arc;

use clap::Parser;
use manual_metric::config::{Cli, Settings};
use manual_metric::measurement::MetricKind;
use manual_metric::{console, server, ticker, AppState, Measurement};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so the prompt on stdout stays readable.
    let env_filter = EnvFilter::from_default_env().add_directive("manual_metric=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        error!(error = %err, "fatal");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> manual_metric::Result<()> {
    // ── 1. Validate configuration ────────────────────────────────
    let settings = Settings::from_cli(cli)?;
    let measurement = Arc::new(Measurement::new(settings.measurement.clone())?);
    info!(
        name = %measurement.descriptor().name,
        kind = %measurement.kind(),
        "measurement created"
    );

    // ── 2. Bind ──────────────────────────────────────────────────
    let listen_address = settings.listen_address();
    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    info!(
        address = %listen_address,
        auth = settings.credentials.is_some(),
        "HTTP server listening"
    );

    // ── 3. Optional counter ticker ───────────────────────────────
    if let Some(period) = settings.counter_tick {
        if measurement.kind() == MetricKind::Counter {
            ticker::spawn_counter_ticker(Arc::clone(&measurement), period);
            info!(?period, "counter will also be incremented on a timer");
        } else {
            warn!("--counter-tick only applies to counters, ignoring it");
        }
    }

    // ── 4. Operator console on its own thread ────────────────────
    let console_measurement = Arc::clone(&measurement);
    // A plain thread: the runtime must not wait on a pending stdin read
    // when shutting down.
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = io::stdin();
            match console::run(&console_measurement, stdin.lock(), io::stdout()) {
                Ok(()) => info!("input closed, still serving the last value"),
                Err(err) => warn!(error = %err, "console stopped"),
            }
        })?;

    // ── 5. Serve until interrupted ───────────────────────────────
    let app = server::create_router(Arc::new(AppState::new(measurement)), settings.credentials);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
