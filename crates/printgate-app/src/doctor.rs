// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Gateway doctor: end-to-end checks without printing anything.
//
// Runs signing material → agent connection → agent version → discovery →
// printer status, stopping at the first failure with guidance for whoever
// is setting up the till.

use tokio_util::sync::CancellationToken;
use tracing::info;

use printgate_core::types::{ConnectionStatus, PrinterStatus};
use printgate_print::PrintGateway;

/// Result of a single check.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
    /// What to do if the step failed.
    pub fix: Option<String>,
}

impl StepResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            passed: true,
            detail: detail.into(),
            fix: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            detail: detail.into(),
            fix: Some(fix.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub endpoint: String,
    pub steps: Vec<StepResult>,
    /// Index into `steps` of the check that failed.
    pub failed_step: Option<usize>,
    pub summary: String,
}

impl DoctorReport {
    fn push(&mut self, step: StepResult, summary_if_failed: &str) -> bool {
        info!(step = step.name, passed = step.passed, detail = %step.detail, "doctor step");
        let passed = step.passed;
        self.steps.push(step);
        if !passed {
            self.failed_step = Some(self.steps.len() - 1);
            self.summary = summary_if_failed.to_owned();
        }
        passed
    }
}

/// Run every check against the configured agent.
///
/// `printer` picks the printer whose status is probed; without it the
/// first discovered printer is used.
pub async fn run_doctor(
    gateway: &PrintGateway,
    printer: Option<&str>,
    cancel: &CancellationToken,
) -> DoctorReport {
    let mut report = DoctorReport {
        endpoint: gateway.config().agent_endpoint.clone(),
        steps: Vec::new(),
        failed_step: None,
        summary: String::new(),
    };

    // Step 1: Signing material
    let signing = if gateway.validate_signature_configuration() {
        StepResult::pass("Signing material", "Private key and certificate chain load.")
    } else {
        StepResult::fail(
            "Signing material",
            "The private key or certificate could not be loaded.",
            format!(
                "Check {} and {} exist and hold PEM data.",
                gateway.config().private_key_file().display(),
                gateway.config().certificate_file().display()
            ),
        )
    };
    if !report.push(signing, "Print jobs cannot be signed.") {
        return report;
    }

    // Step 2: Agent connection
    let connection = if gateway.test_connection(None, cancel).await {
        StepResult::pass("Agent connection", format!("Connected to {}.", report.endpoint))
    } else {
        StepResult::fail(
            "Agent connection",
            format!("Nothing answered at {}.", report.endpoint),
            "Start the print agent on this machine, or fix agent_endpoint in the config.",
        )
    };
    if !report.push(connection, "The print agent is not reachable.") {
        return report;
    }

    // Step 3: Agent version (informational)
    let version = match gateway.get_agent_version(None, cancel).await {
        Some(version) => StepResult::pass("Agent version", format!("Agent reports version {version}.")),
        None => StepResult::pass("Agent version", "Agent did not report a version."),
    };
    report.push(version, "");

    // Step 4: Printer discovery
    let discovery = gateway.discover_printers(None, cancel).await;
    let discovered = match (discovery.connection_status, discovery.printers.len()) {
        (ConnectionStatus::Failed, _) => StepResult::fail(
            "Printer discovery",
            discovery
                .error_message
                .clone()
                .unwrap_or_else(|| "Discovery failed.".into()),
            "Restart the print agent and try again.",
        ),
        (ConnectionStatus::Connected, 0) => StepResult::fail(
            "Printer discovery",
            "The agent sees no printers.",
            "Plug the printer in, switch it on and install its driver.",
        ),
        (ConnectionStatus::Connected, count) => {
            let names: Vec<&str> = discovery.printers.iter().map(|p| p.name.as_str()).collect();
            StepResult::pass(
                "Printer discovery",
                format!("Found {count} printer(s): {}.", names.join(", ")),
            )
        }
    };
    if !report.push(discovered, "No printers are available.") {
        return report;
    }

    // Step 5: Printer status
    let Some(target) = printer
        .map(str::to_owned)
        .or_else(|| discovery.printers.first().map(|p| p.id.clone()))
    else {
        report.summary = "Everything looks good.".into();
        return report;
    };
    let status = gateway.check_printer_status(&target, cancel).await;
    let step = match status.status {
        PrinterStatus::Online => StepResult::pass("Printer status", format!("{target} is online.")),
        PrinterStatus::Unknown => StepResult::pass(
            "Printer status",
            format!("{target} did not report a status."),
        ),
        PrinterStatus::Offline => StepResult::fail(
            "Printer status",
            format!("{target} is offline."),
            "Switch the printer on and check its cable.",
        ),
        PrinterStatus::Error => StepResult::fail(
            "Printer status",
            format!("{target} reports an error."),
            "Check paper, cover and jams on the printer.",
        ),
    };
    if !report.push(step, "The printer needs attention.") {
        return report;
    }

    report.summary = "Everything looks good. The gateway is ready to print.".into();
    report
}

/// Plain-text report for the terminal or a support ticket.
pub fn render_report(report: &DoctorReport) -> String {
    let now = chrono::Utc::now().format("%d %b %Y %H:%M UTC");
    let mut text = format!("Printgate Doctor\nDate: {now}\nAgent: {}\n\n", report.endpoint);

    for (index, step) in report.steps.iter().enumerate() {
        let mark = if step.passed { "ok  " } else { "FAIL" };
        text.push_str(&format!("[{mark}] {}. {}: {}\n", index + 1, step.name, step.detail));
        if let Some(fix) = &step.fix {
            text.push_str(&format!("       What to do: {fix}\n"));
        }
    }

    text.push('\n');
    text.push_str(&report.summary);
    text.push('\n');
    text
}
