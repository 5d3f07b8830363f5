// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printgate print gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied identifier for a print job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle states of a print job.
///
/// `Queued` and `Printing` are live; the other three are terminal and a job
/// never leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Registered, not yet acknowledged by the agent.
    Queued,
    /// Accepted by the agent.
    Printing,
    /// Reported finished out of band.
    Completed,
    /// Dispatch failed; see the job's error message.
    Failed,
    /// Cancelled by the caller before reaching another terminal state.
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the job state machine allows `self -> next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Queued, Self::Printing) => true,
            (Self::Queued | Self::Printing, Self::Failed | Self::Cancelled) => true,
            (Self::Printing, Self::Completed) => true,
            _ => false,
        }
    }
}

/// Payload flavour understood by the print agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    /// Printer-native bytes (ESC/POS, ZPL, plain text).
    Raw,
    /// HTML rendered by the agent.
    Html,
    /// Anything the agent has no dedicated shape for; sent as raw.
    Other(String),
}

impl ContentType {
    /// Parse a caller-supplied content type label.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "raw" | "text/plain" | "plain" | "escpos" | "zpl" => Self::Raw,
            "html" | "text/html" => Self::Html,
            _ => Self::Other(label.trim().to_owned()),
        }
    }

    /// The `type` value used in the agent's print data entry.
    pub fn agent_data_type(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Raw | Self::Other(_) => "raw",
        }
    }
}

/// A print job tracked by the gateway for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub title: String,
    pub printer_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Correlation id handed back by the agent, when it sends one.
    pub agent_job_id: Option<String>,
}

impl PrintJob {
    pub fn new(
        id: impl Into<JobId>,
        title: impl Into<String>,
        printer_id: impl Into<String>,
        content: impl Into<String>,
        content_type: ContentType,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            printer_id: printer_id.into(),
            content: content.into(),
            content_type,
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            completed_at: None,
            error_message: None,
            agent_job_id: None,
        }
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Live status of a printer as reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterStatus {
    Unknown,
    Online,
    Offline,
    Error,
}

/// A printer attached to the local agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: String,
    pub name: String,
    pub status: PrinterStatus,
    pub available: bool,
    pub last_status_update: DateTime<Utc>,
}

impl Printer {
    /// A printer as seen at discovery time. The agent only reports names,
    /// so every discovered printer starts out online.
    pub fn discovered(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            status: PrinterStatus::Online,
            available: true,
            last_status_update: Utc::now(),
        }
    }
}

/// Whether the gateway managed to talk to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Failed,
}

/// Result of `DiscoverPrinters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOutcome {
    pub printers: Vec<Printer>,
    pub discovered_at: DateTime<Utc>,
    pub connection_status: ConnectionStatus,
    pub error_message: Option<String>,
}

/// Result of `CheckPrinterStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterStatusReport {
    pub printer_id: String,
    pub status: PrinterStatus,
    pub checked_at: DateTime<Utc>,
}

/// Result of `SubmitPrintJob`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub success: bool,
    pub agent_job_id: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SubmissionOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            agent_job_id: None,
            estimated_completion: None,
            error_message: Some(message.into()),
        }
    }
}
