// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate — signed print-job gateway.
//
// Entry point. Initialises logging, loads the gateway configuration and runs
// the doctor checks against the local print agent.
//
//   printgate [CONFIG.json] [PRINTER]
//
// The config path may also come from PRINTGATE_CONFIG; without either the
// built-in defaults are used.

mod doctor;

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;

use printgate_core::GatewayConfig;
use printgate_core::error::Result;
use printgate_core::human_errors::humanize_error;
use printgate_print::PrintGateway;

const CONFIG_ENV: &str = "PRINTGATE_CONFIG";

fn load_config(path: Option<String>) -> Result<GatewayConfig> {
    match path.or_else(|| std::env::var(CONFIG_ENV).ok()) {
        Some(path) => {
            tracing::info!(%path, "loading configuration");
            GatewayConfig::load(path)
        }
        None => {
            tracing::info!("no configuration given, using defaults");
            Ok(GatewayConfig::default())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Printgate doctor starting");

    let mut args = std::env::args().skip(1);
    let config_path = args.next();
    let printer = args.next();

    let gateway = match load_config(config_path).and_then(PrintGateway::new) {
        Ok(gateway) => gateway,
        Err(e) => {
            let human = humanize_error(&e);
            tracing::error!(error = %e, "gateway could not start");
            eprintln!("{}\n{}", human.message, human.suggestion);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, abandoning pending agent calls");
            on_interrupt.cancel();
        }
    });

    let report = doctor::run_doctor(&gateway, printer.as_deref(), &cancel).await;
    print!("{}", doctor::render_report(&report));

    if report.failed_step.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
