// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing error messages.
//
// Till staff see these when a receipt or label does not come out. Every
// technical error maps to a short plain message and something to try.

use crate::error::GatewayError;

/// Severity of an error from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Agent busy or briefly unreachable; trying again may work.
    Transient,
    /// Someone has to do something (start the agent, pick a printer).
    ActionRequired,
    /// Setup is wrong; retrying will not help until it is fixed.
    Permanent,
}

/// A plain-language error with a suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether the operator can usefully press "print again".
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `GatewayError` into something a cashier can act on.
pub fn humanize_error(err: &GatewayError) -> HumanError {
    match err {
        // -- Trust material --
        GatewayError::Configuration(_) => HumanError {
            message: "Printing is not set up on this server.".into(),
            suggestion: "The signing certificate or key file is missing. Ask your administrator to check the print settings.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        GatewayError::KeyLoad(_) | GatewayError::Signing(_) => HumanError {
            message: "The print request could not be signed.".into(),
            suggestion: "The signing key appears to be damaged. Ask your administrator to reinstall it.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Agent --
        GatewayError::Channel(detail) => humanize_channel_error(detail),

        GatewayError::Protocol(_) => HumanError {
            message: "The print agent sent a reply we did not understand.".into(),
            suggestion: "Make sure the print agent is up to date, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        GatewayError::Agent(detail) => HumanError {
            message: "The print agent refused the request.".into(),
            suggestion: format!("Check the printer is connected and selected correctly. ({detail})"),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        GatewayError::Cancelled => HumanError {
            message: "Printing was stopped.".into(),
            suggestion: "Print again if you still need the document.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Caller / jobs --
        GatewayError::InvalidArgument(detail) => HumanError {
            message: "The print request was incomplete.".into(),
            suggestion: format!("Please report this problem. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        GatewayError::JobNotFound(_) => HumanError {
            message: "That print job is not known.".into(),
            suggestion: "It may have been sent before the server restarted. Print it again if needed.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        GatewayError::DuplicateJob(_) => HumanError {
            message: "This document is already being printed.".into(),
            suggestion: "Wait for the printer, then check whether it came out before printing again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        GatewayError::InvalidTransition { .. } => HumanError {
            message: "That print job has already finished.".into(),
            suggestion: "No action is needed.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Plumbing --
        GatewayError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A file the printer setup needs could not be found.".into(),
                    suggestion: "Ask your administrator to check the print settings.".into(),
                    retriable: false,
                    severity: Severity::Permanent,
                }
            } else {
                HumanError {
                    message: "There was a problem reading a file.".into(),
                    suggestion: "Try again. If this keeps happening, please report it.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        GatewayError::Serialization(_) => HumanError {
            message: "The server had an internal data problem.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}

/// Channel errors carry the transport's own wording; pick out the usual
/// suspects.
fn humanize_channel_error(detail: &str) -> HumanError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out") {
        HumanError {
            message: "The print agent did not answer in time.".into(),
            suggestion: "The printer may be busy. Wait a moment and try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else if lower.contains("connection refused") {
        HumanError {
            message: "The print agent is not running.".into(),
            suggestion: "Start the print agent on the till computer, then try again.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        }
    } else if lower.contains("closed") || lower.contains("reset") {
        HumanError {
            message: "The connection to the print agent was interrupted.".into(),
            suggestion: "Try again. If it keeps happening, restart the print agent.".into(),
            retriable: true,
            severity: Severity::Transient,
        }
    } else {
        HumanError {
            message: "We could not reach the print agent.".into(),
            suggestion: format!("Check the print agent is running, then try again. (Detail: {detail})"),
            retriable: true,
            severity: Severity::Transient,
        }
    }
}
